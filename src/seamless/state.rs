use crate::error::SeamlessError;
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use crate::seamless::util::write_atomic;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A notification that may be delivered at most once per state record.
///
/// Persisted as a boolean (`true` once fired).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum OneShot {
    #[default]
    Pending,
    Fired,
}

impl OneShot {
    /// Move to `Fired`. Returns `true` only for the call that made the move.
    pub fn fire(&mut self) -> bool {
        match self {
            OneShot::Pending => {
                *self = OneShot::Fired;
                true
            }
            OneShot::Fired => false,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, OneShot::Pending)
    }
}

impl From<bool> for OneShot {
    fn from(fired: bool) -> Self {
        if fired { OneShot::Fired } else { OneShot::Pending }
    }
}

impl From<OneShot> for bool {
    fn from(value: OneShot) -> Self {
        matches!(value, OneShot::Fired)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    #[serde(default)]
    pub compact_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub wrapup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub wrapup_injected: OneShot,
    #[serde(default)]
    pub error_notified: OneShot,
    #[serde(default)]
    pub last_pct: f64,
}

impl SessionState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            compact_at: None,
            wrapup_at: None,
            wrapup_injected: OneShot::Pending,
            error_notified: OneShot::Pending,
            last_pct: 0.0,
        }
    }
}

pub fn state_file_path(paths: &SeamlessPaths, id: &SessionId) -> PathBuf {
    paths.state_file(id)
}

pub fn load(paths: &SeamlessPaths, id: &SessionId) -> Result<SessionState> {
    let file = state_file_path(paths, id);
    let raw = match fs::read_to_string(&file) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SessionState::new(id.clone())),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", file.display()));
        }
    };

    let parsed: SessionState =
        serde_json::from_str(&raw).map_err(|err| SeamlessError::CorruptState {
            path: file.clone(),
            reason: err.to_string(),
        })?;
    if parsed.session_id != *id {
        return Err(SeamlessError::CorruptState {
            path: file,
            reason: format!("record belongs to session {}", parsed.session_id),
        }
        .into());
    }
    Ok(parsed)
}

pub fn save(paths: &SeamlessPaths, id: &SessionId, state: &SessionState) -> Result<PathBuf> {
    let file = state_file_path(paths, id);
    let data = serde_json::to_string_pretty(state)?;
    write_atomic(&file, format!("{data}\n").as_bytes())
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(file)
}
