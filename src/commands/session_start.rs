use anyhow::{Context as _, Result};
use std::fs;

use crate::commands::{Context, HookInput};
use crate::seamless::distill::load_metadata;
use crate::seamless::restore::{Capped, cap_output, render_resume, session_start_block};
use crate::seamless::resume_intent;

fn finish(capped: Capped, max_chars: usize) -> String {
    if let Some(original) = capped.truncated_from {
        eprintln!("seamless: output truncated from {original} to {max_chars} chars");
    }
    capped.text
}

/// Print restore context for a fresh session, if there is any.
///
/// The session's own summary wins. Otherwise a resume intent left for this
/// working directory names the session to continue; it is consumed once the
/// restore block has been built.
pub fn run(ctx: &Context, stdin: &str) -> Result<String> {
    let Some(input) = HookInput::parse(stdin) else {
        return Ok(String::new());
    };
    let max = ctx.cfg.max_output_chars;

    if let Some(id) = input.session_id() {
        let summary_path = ctx.paths.session_files(&id).summary;
        if summary_path.is_file() {
            let summary = fs::read_to_string(&summary_path)
                .with_context(|| format!("failed to read {}", summary_path.display()))?;
            return Ok(finish(cap_output(session_start_block(&summary), max), max));
        }
    }

    let Some(cwd) = input.cwd.as_deref().filter(|cwd| !cwd.is_empty()) else {
        return Ok(String::new());
    };
    let Some(intent) = resume_intent::read(&ctx.paths, cwd) else {
        return Ok(String::new());
    };
    let metadata_path = ctx.paths.session_files(&intent.session_id).metadata;
    if !metadata_path.is_file() {
        // Job still running or failed: leave the intent for a later start.
        return Ok(String::new());
    }
    let meta = load_metadata(&metadata_path)?;
    let rendered = render_resume(&ctx.cfg, &ctx.paths, &meta)?;
    resume_intent::take(&ctx.paths, cwd)?;
    Ok(finish(rendered, max))
}
