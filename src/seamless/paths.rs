use crate::seamless::session_id::SessionId;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SeamlessPaths {
    pub data_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub state_dir: PathBuf,
    pub hooks_dir: PathBuf,
    pub intent_path: PathBuf,
    pub projects_dir: PathBuf,
    pub hook_error_log: PathBuf,
    pub data_dir_is_explicit: bool,
}

/// Files owned by one session under `sessions_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub summary: PathBuf,
    pub metadata: PathBuf,
    pub log: PathBuf,
    pub lock: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

fn data_dir_from_inputs(home: &Path, data_dir_env: Option<&str>) -> (PathBuf, bool) {
    match data_dir_env {
        Some(v) if !v.trim().is_empty() => (PathBuf::from(v.trim()), true),
        _ => (home.join(".seamless"), false),
    }
}

impl SeamlessPaths {
    /// Lay out every path below `data_dir`.
    pub fn under(data_dir: impl Into<PathBuf>, projects_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            sessions_dir: data_dir.join("sessions"),
            state_dir: data_dir.join("state"),
            hooks_dir: data_dir.join("hooks.d"),
            intent_path: data_dir.join("resume-intent.json"),
            hook_error_log: data_dir.join("hook-errors.log"),
            projects_dir: projects_dir.into(),
            data_dir,
            data_dir_is_explicit: true,
        }
    }

    pub fn session_files(&self, id: &SessionId) -> SessionFiles {
        SessionFiles {
            summary: self.sessions_dir.join(format!("{id}.md")),
            metadata: self.sessions_dir.join(format!("{id}.json")),
            log: self.sessions_dir.join(format!("{id}.log")),
            lock: self.sessions_dir.join(format!("{id}.lock")),
        }
    }

    pub fn state_file(&self, id: &SessionId) -> PathBuf {
        self.state_dir.join(format!("{id}.json"))
    }

    pub fn ensure_sessions_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.sessions_dir)
            .with_context(|| format!("failed to create {}", self.sessions_dir.display()))
    }
}

pub fn resolve_paths() -> Result<SeamlessPaths> {
    let home = required_home_dir()?;
    let data_dir_env = env::var("SEAMLESS_DATA_DIR").ok();
    let (data_dir, is_explicit) = data_dir_from_inputs(&home, data_dir_env.as_deref());

    let mut paths = SeamlessPaths::under(
        data_dir,
        env_or_default_path("SEAMLESS_PROJECTS_DIR", home.join(".claude/projects")),
    );
    paths.state_dir = env_or_default_path("SEAMLESS_STATE_DIR", paths.state_dir);
    paths.hooks_dir = env_or_default_path("SEAMLESS_HOOKS_DIR", paths.hooks_dir);
    paths.intent_path = env_or_default_path("SEAMLESS_INTENT_PATH", paths.intent_path);
    paths.data_dir_is_explicit = is_explicit;
    Ok(paths)
}
