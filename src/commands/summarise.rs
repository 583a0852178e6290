use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::commands::compact::{distill_with_guard, resolve_prompts};
use crate::commands::{CommandOutput, CommandReport, Context};
use crate::seamless::audit::JobLog;
use crate::seamless::lock::{self, LockGuard};
use crate::seamless::sessions::{TranscriptMatch, transcripts_by_prefix};
use crate::seamless::summarizer::build_summarizer;

#[derive(Debug, Clone, Default)]
pub struct SummariseOptions {
    pub prefix: Option<String>,
    pub list: bool,
    pub force: bool,
}

fn fmt_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1_048_576 {
        format!("{:.0}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / 1_048_576.0)
    }
}

/// `-Users-me-projects-active-foo` → `foo`.
fn fmt_project(slug: &str) -> String {
    let parts: Vec<&str> = slug.trim_start_matches('-').split('-').collect();
    if let Some(idx) = parts.iter().position(|part| *part == "projects")
        && idx + 1 < parts.len()
    {
        let mut rest = &parts[idx + 1..];
        if rest.first() == Some(&"active") {
            rest = &rest[1..];
        }
        let joined = rest.join("-");
        return if joined.is_empty() { slug.to_string() } else { joined };
    }
    parts
        .last()
        .filter(|last| !last.is_empty())
        .map(|last| last.to_string())
        .unwrap_or_else(|| slug.to_string())
}

fn project_of(found: &TranscriptMatch) -> String {
    found
        .path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| fmt_project(&name.to_string_lossy()))
        .unwrap_or_default()
}

fn fmt_modified(found: &TranscriptMatch) -> String {
    DateTime::<Utc>::from(found.modified)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn listing(ctx: &Context, matches: &[TranscriptMatch]) -> String {
    let mut out = format!("Found {} session(s):\n\n", matches.len());
    for found in matches {
        let done = if ctx.paths.session_files(&found.id).summary.exists() {
            " [done]"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {}  {}  {:>6}  {}{done}\n",
            found.id.short(),
            fmt_modified(found),
            fmt_size(found.size),
            project_of(found)
        ));
    }
    out
}

/// Distill a historical transcript in the foreground.
pub fn run(ctx: &Context, opts: &SummariseOptions) -> Result<CommandOutput> {
    let prefix = opts.prefix.clone().unwrap_or_default();

    if opts.list {
        let matches = transcripts_by_prefix(&ctx.paths, &prefix);
        if matches.is_empty() {
            bail!("no sessions matching \"{prefix}\"");
        }
        return Ok(CommandOutput::Text(listing(ctx, &matches)));
    }

    if prefix.is_empty() {
        bail!("a session id or prefix is required (or pass --list)");
    }
    let matches = transcripts_by_prefix(&ctx.paths, &prefix);
    let found = match matches.as_slice() {
        [] => bail!("no sessions matching \"{prefix}\""),
        [only] => only,
        many => {
            let names: Vec<String> = many
                .iter()
                .map(|m| format!("{} {}", m.id, project_of(m)))
                .collect();
            bail!(
                "\"{prefix}\" matches {} sessions, use a longer prefix: {}",
                many.len(),
                names.join(", ")
            );
        }
    };

    let summary = ctx.paths.session_files(&found.id).summary;
    if summary.exists() && !opts.force {
        let mut report = CommandReport::new("summarise");
        report.detail(format!("summary exists: {}", summary.display()));
        report.detail("use --force to re-summarise");
        return Ok(CommandOutput::Report(report));
    }

    lock::reap_if_stale(&ctx.paths, &found.id, ctx.cfg.lock_stale_after())?;
    let Some(guard) = LockGuard::acquire(&ctx.paths, &found.id)? else {
        bail!("a distillation job is already running for {}", found.id);
    };
    eprintln!(
        "Summarising {}... ({}, {})",
        found.id.short(),
        project_of(found),
        fmt_size(found.size)
    );

    let log = JobLog::for_session(&ctx.paths, &found.id);
    let prompts = resolve_prompts(ctx, &log);
    let summarizer = build_summarizer(&ctx.cfg, &prompts)?;
    let report = distill_with_guard(
        ctx,
        guard,
        &found.path,
        summarizer.as_ref(),
        &prompts,
        "summarise",
    )?;
    Ok(CommandOutput::Report(report))
}
