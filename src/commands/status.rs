use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, Context};
use crate::seamless::config::SummarizerKind;
use crate::seamless::hooks::discover;
use crate::seamless::sessions::recent;
use crate::seamless::summarizer::Prompts;

fn summarizer_binary(claude_bin: &str) -> Option<String> {
    let candidate = Path::new(claude_bin);
    if candidate.components().count() > 1 {
        return candidate
            .is_file()
            .then(|| candidate.display().to_string());
    }
    which::which(claude_bin)
        .ok()
        .map(|found| found.display().to_string())
}

pub fn run(ctx: &Context) -> Result<CommandReport> {
    let paths = &ctx.paths;
    let cfg = &ctx.cfg;
    let mut report = CommandReport::new("status");

    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!(
        "data_dir_source={}",
        if paths.data_dir_is_explicit {
            "SEAMLESS_DATA_DIR"
        } else {
            "default"
        }
    ));
    report.detail(format!("sessions_dir={}", paths.sessions_dir.display()));
    report.detail(format!("state_dir={}", paths.state_dir.display()));
    report.detail(format!("hooks_dir={}", paths.hooks_dir.display()));
    report.detail(format!("projects_dir={}", paths.projects_dir.display()));
    report.detail(format!(
        "thresholds compact_pct={} wrapup_pct={}",
        cfg.compact_pct, cfg.wrapup_pct
    ));
    report.detail(format!(
        "summarizer={} model={} timeout_secs={}",
        cfg.summarizer.label(),
        cfg.model,
        cfg.summarize_timeout_secs
    ));
    match Prompts::load(cfg) {
        Ok(prompts) if prompts.custom => report.detail("prompts=custom"),
        Ok(_) => report.detail("prompts=builtin"),
        Err(err) => report.issue(format!("{err:#}; jobs fall back to the built-in prompts")),
    }
    report.detail(format!("hooks={}", discover(&paths.hooks_dir).len()));
    report.detail(format!("recent_summaries={}", recent(paths).len()));

    match cfg.summarizer {
        SummarizerKind::Cli => match summarizer_binary(&cfg.claude_bin) {
            Some(found) => report.detail(format!("claude_bin={found}")),
            None => report.issue(format!(
                "summarizer binary not found ({}); set SEAMLESS_CLAUDE_BIN or put it on PATH",
                cfg.claude_bin
            )),
        },
        SummarizerKind::Anthropic => {
            if cfg.anthropic_api_key.is_none() {
                report.issue("summarizer = anthropic but ANTHROPIC_API_KEY is not set");
            } else {
                report.detail("anthropic_api_key=set");
            }
        }
    }
    if !paths.projects_dir.exists() {
        report.issue(format!(
            "missing projects dir ({})",
            paths.projects_dir.display()
        ));
    }

    Ok(report)
}
