//! Post-distillation extension scripts (`hooks.d`).
//!
//! Each executable runs in its own process group with a private output
//! directory. A failing or hanging script only loses its own section.

use crate::seamless::session_id::SessionId;
use crate::seamless::util::run_command_with_timeout;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRun {
    pub name: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub run: HookRun,
    pub stdout: String,
    /// `(file name, trimmed contents)` of each `*.md` fragment, sorted by name.
    pub files: Vec<(String, String)>,
    /// Why the hook could not be started at all.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub session_id: &'a SessionId,
    pub transcript: &'a Path,
    pub summary: &'a Path,
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}

/// Executable regular files in `dir`, dotfiles skipped, sorted by file name.
/// A missing directory means no hooks.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut hooks: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .filter(|entry| {
            fs::metadata(entry.path()).is_ok_and(|meta| meta.is_file() && is_executable(&meta))
        })
        .map(|entry| entry.path())
        .collect();
    hooks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    hooks
}

fn hook_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_one(hook: &Path, ctx: HookContext<'_>, output_dir: &Path, timeout: Duration) -> HookResult {
    let name = hook_name(hook);
    let mut cmd = Command::new(hook);
    cmd.env("SEAMLESS_SESSION_ID", ctx.session_id.as_str())
        .env("SEAMLESS_TRANSCRIPT", ctx.transcript)
        .env("SEAMLESS_SUMMARY", ctx.summary)
        .env("SEAMLESS_OUTPUT_DIR", output_dir);

    match run_command_with_timeout(&mut cmd, None, timeout) {
        Ok(outcome) => HookResult {
            run: HookRun {
                name,
                exit_code: outcome.exit_code(),
                timed_out: outcome.timed_out,
            },
            stdout: outcome.stdout.trim().to_string(),
            files: Vec::new(),
            error: None,
        },
        Err(err) => HookResult {
            run: HookRun {
                name,
                exit_code: -1,
                timed_out: false,
            },
            stdout: String::new(),
            files: Vec::new(),
            error: Some(format!("{err:#}")),
        },
    }
}

/// Read the `*.md` fragments a hook left behind, then empty the directory.
fn drain_output_dir(dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        if is_markdown
            && path.is_file()
            && let Ok(content) = fs::read_to_string(&path)
        {
            files.push((hook_name(&path), content.trim().to_string()));
        }
        if path.is_dir() {
            let _ = fs::remove_dir_all(&path);
        } else {
            let _ = fs::remove_file(&path);
        }
    }
    files
}

/// Run every discovered hook in order. Returns one result per hook.
///
/// `before_each` is called ahead of every hook.
pub fn run_all(
    hooks_dir: &Path,
    ctx: HookContext<'_>,
    timeout: Duration,
    before_each: &dyn Fn(&str),
) -> Result<Vec<HookResult>> {
    let hooks = discover(hooks_dir);
    if hooks.is_empty() {
        return Ok(Vec::new());
    }

    let scratch = tempfile::Builder::new()
        .prefix("seamless-hooks-")
        .tempdir()
        .context("failed to create hook output directory")?;

    let mut results = Vec::with_capacity(hooks.len());
    for hook in &hooks {
        before_each(&hook_name(hook));
        let mut result = run_one(hook, ctx, scratch.path(), timeout);
        result.files = drain_output_dir(scratch.path());
        results.push(result);
    }
    Ok(results)
}

/// Render results as markdown sections. Hooks with no output are omitted.
pub fn format_sections(results: &[HookResult]) -> String {
    results
        .iter()
        .filter_map(|result| {
            let mut parts: Vec<&str> = Vec::new();
            if !result.stdout.is_empty() {
                parts.push(&result.stdout);
            }
            parts.extend(
                result
                    .files
                    .iter()
                    .map(|(_, content)| content.as_str())
                    .filter(|content| !content.is_empty()),
            );
            if parts.is_empty() {
                None
            } else {
                Some(format!(
                    "## Post-compaction: {}\n\n{}",
                    result.run.name,
                    parts.join("\n\n")
                ))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
