//! Lookup of stored summaries and of host transcripts.

use crate::seamless::distill::{SummaryMetadata, load_metadata};
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub id: SessionId,
    pub metadata_path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSelector {
    Latest,
    /// A full identifier or a unique prefix of one.
    Prefix(String),
}

fn stored_sessions(paths: &SeamlessPaths) -> Vec<StoredSession> {
    let Ok(entries) = fs::read_dir(&paths.sessions_dir) else {
        return Vec::new();
    };
    let mut sessions: Vec<StoredSession> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                return None;
            }
            let id = SessionId::parse(path.file_stem()?.to_str()?).ok()?;
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(StoredSession {
                id,
                metadata_path: path,
                modified,
            })
        })
        .collect();
    sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
    sessions
}

/// The most recently written summaries, newest first.
pub fn recent(paths: &SeamlessPaths) -> Vec<StoredSession> {
    let mut sessions = stored_sessions(paths);
    sessions.truncate(RECENT_LIMIT);
    sessions
}

/// Resolve a selector to stored metadata. `Ok(None)` when nothing matches;
/// an ambiguous prefix is an error.
pub fn find(paths: &SeamlessPaths, selector: &SessionSelector) -> Result<Option<SummaryMetadata>> {
    let sessions = stored_sessions(paths);
    let chosen = match selector {
        SessionSelector::Latest => sessions.first(),
        SessionSelector::Prefix(prefix) => {
            if let Some(exact) = sessions.iter().find(|s| s.id.as_str() == prefix) {
                Some(exact)
            } else {
                let matches: Vec<&StoredSession> = sessions
                    .iter()
                    .filter(|s| s.id.as_str().starts_with(prefix.as_str()))
                    .collect();
                if matches.len() > 1 {
                    bail!("ambiguous prefix '{prefix}': {} matches", matches.len());
                }
                matches.first().copied()
            }
        }
    };
    chosen
        .map(|session| load_metadata(&session.metadata_path))
        .transpose()
}

/// `<projects_dir>/*/<id>.jsonl`, the first project directory that has it.
pub fn find_transcript(paths: &SeamlessPaths, id: &SessionId) -> Option<PathBuf> {
    let mut projects: Vec<PathBuf> = fs::read_dir(&paths.projects_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    projects.sort();
    projects
        .into_iter()
        .map(|project| project.join(format!("{id}.jsonl")))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMatch {
    pub id: SessionId,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

fn transcript_match(path: &Path) -> Option<TranscriptMatch> {
    if path.extension().is_none_or(|ext| ext != "jsonl") {
        return None;
    }
    let id = SessionId::parse(path.file_stem()?.to_str()?).ok()?;
    let meta = fs::metadata(path).ok()?;
    Some(TranscriptMatch {
        id,
        path: path.to_path_buf(),
        size: meta.len(),
        modified: meta.modified().ok()?,
    })
}

/// Every host transcript whose id starts with `prefix`, newest first.
pub fn transcripts_by_prefix(paths: &SeamlessPaths, prefix: &str) -> Vec<TranscriptMatch> {
    let Ok(projects) = fs::read_dir(&paths.projects_dir) else {
        return Vec::new();
    };
    let mut matches: Vec<TranscriptMatch> = projects
        .flatten()
        .filter(|project| project.path().is_dir())
        .filter_map(|project| fs::read_dir(project.path()).ok())
        .flat_map(|entries| entries.flatten())
        .filter_map(|entry| transcript_match(&entry.path()))
        .filter(|found| found.id.as_str().starts_with(prefix))
        .collect();
    matches.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    matches
}
