use anyhow::{Result, bail};

use crate::commands::Context;
use crate::seamless::distill::load_metadata;
use crate::seamless::restore::render_resume;
use crate::seamless::sessions::{SessionSelector, find, recent};

#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    pub list: bool,
    pub latest: bool,
    pub selector: Option<String>,
}

fn list_sessions(ctx: &Context) -> String {
    let mut out = String::new();
    for session in recent(&ctx.paths) {
        match load_metadata(&session.metadata_path) {
            Ok(meta) => out.push_str(&format!(
                "{}  {}  {}  {} entries\n",
                meta.session_id.short(),
                meta.generated_at,
                meta.model,
                meta.transcript_entries
            )),
            Err(_) => out.push_str(&format!("{}  (unreadable metadata)\n", session.id.short())),
        }
    }
    out
}

pub fn run(ctx: &Context, opts: &ResumeOptions) -> Result<String> {
    if opts.list {
        let listing = list_sessions(ctx);
        if listing.is_empty() {
            eprintln!("No sessions available.");
        }
        return Ok(listing);
    }

    let selector = match (&opts.selector, opts.latest) {
        (Some(prefix), false) => SessionSelector::Prefix(prefix.clone()),
        _ => SessionSelector::Latest,
    };
    let Some(meta) = find(&ctx.paths, &selector)? else {
        bail!("no session found; use --list to see available sessions");
    };

    let rendered = render_resume(&ctx.cfg, &ctx.paths, &meta)?;
    if let Some(original) = rendered.truncated_from {
        eprintln!(
            "warning: output truncated from {original} to {} chars",
            ctx.cfg.max_output_chars
        );
    }
    Ok(rendered.text)
}
