use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use crate::seamless::util::write_atomic;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;

pub const MAX_INTENT_AGE_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeIntent {
    pub project_dir: String,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Record that the next session started in `target_dir` should resume `id`.
pub fn create(paths: &SeamlessPaths, target_dir: &str, id: &SessionId) -> Result<ResumeIntent> {
    let intent = ResumeIntent {
        project_dir: target_dir.to_string(),
        session_id: id.clone(),
        created_at: Utc::now(),
    };
    let data = serde_json::to_string(&intent)?;
    write_atomic(&paths.intent_path, data.as_bytes())
        .with_context(|| format!("failed to write {}", paths.intent_path.display()))?;
    Ok(intent)
}

pub fn read_at(paths: &SeamlessPaths, target_dir: &str, now: DateTime<Utc>) -> Option<ResumeIntent> {
    let raw = fs::read_to_string(&paths.intent_path).ok()?;
    let intent: ResumeIntent = serde_json::from_str(&raw).ok()?;
    if intent.project_dir != target_dir {
        return None;
    }
    if now - intent.created_at > Duration::seconds(MAX_INTENT_AGE_SECS) {
        return None;
    }
    Some(intent)
}

/// The intent for `target_dir`, if one exists and is under an hour old.
/// Expired or foreign intents are left in place.
pub fn read(paths: &SeamlessPaths, target_dir: &str) -> Option<ResumeIntent> {
    read_at(paths, target_dir, Utc::now())
}

pub fn clear(paths: &SeamlessPaths) -> Result<()> {
    match fs::remove_file(&paths.intent_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to remove {}", paths.intent_path.display())),
    }
}

/// Consuming read: a matching intent is deleted once returned.
pub fn take(paths: &SeamlessPaths, target_dir: &str) -> Result<Option<ResumeIntent>> {
    let Some(intent) = read(paths, target_dir) else {
        return Ok(None);
    };
    clear(paths)?;
    Ok(Some(intent))
}
