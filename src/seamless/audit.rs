use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub at: String,
    pub phase: String,
    pub status: String,
    pub message: String,
}

/// Append-only JSON-lines log owned by one background job.
#[derive(Debug, Clone)]
pub struct JobLog {
    path: PathBuf,
}

impl JobLog {
    pub fn for_session(paths: &SeamlessPaths, id: &SessionId) -> Self {
        Self {
            path: paths.session_files(id).log,
        }
    }

    pub fn append(&self, phase: &str, status: &str, message: &str) -> Result<()> {
        append_event(&self.path, phase, status, message)
    }

    /// Best-effort variant for the detached job, which has no caller to
    /// report a logging failure to.
    pub fn record(&self, phase: &str, status: &str, message: &str) {
        let _ = self.append(phase, status, message);
    }
}

pub fn append_event(path: &Path, phase: &str, status: &str, message: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let event = AuditEvent {
        at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        phase: phase.to_string(),
        status: status.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let _ = maybe_rotate_log(path);

    let mut options = fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

fn maybe_rotate_log(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::metadata(path)
        && meta.len() >= MAX_LOG_SIZE
    {
        let backup = format!("{}.1", path.display());
        let _ = fs::rename(path, backup);
    }
    Ok(())
}

/// Parse every well-formed event in a log; foreign lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<AuditEvent>(line.trim()).ok())
        .collect())
}

/// The last non-empty log line, rendered for a human.
pub fn last_entry_summary(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let line = raw.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    match serde_json::from_str::<AuditEvent>(line) {
        Ok(event) => Some(format!(
            "[{}] {} {}: {}",
            event.at, event.phase, event.status, event.message
        )),
        Err(_) => Some(line.to_string()),
    }
}
