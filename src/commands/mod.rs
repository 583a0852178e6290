pub mod compact;
pub mod pre_compact;
pub mod prompt_submit;
pub mod resume;
pub mod session_start;
pub mod status;
pub mod statusline;
pub mod summarise;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::SeamlessError;
use crate::seamless::audit::append_event;
use crate::seamless::config::{SeamlessConfig, load_config};
use crate::seamless::paths::{SeamlessPaths, resolve_paths};
use crate::seamless::session_id::SessionId;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// What a command hands back to the CLI layer. Hook commands speak raw text
/// to the host; operator commands produce a report.
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Report(CommandReport),
    Text(String),
}

/// Resolved paths and configuration, built once per process.
#[derive(Debug, Clone)]
pub struct Context {
    pub cfg: SeamlessConfig,
    pub paths: SeamlessPaths,
}

impl Context {
    pub fn load() -> Result<Self> {
        let paths = resolve_paths()?;
        let cfg = load_config(&paths)?;
        Ok(Self { cfg, paths })
    }
}

/// The fields hook events share. Everything is optional at this layer;
/// each command decides what it requires.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
}

impl HookInput {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        SessionId::parse(self.session_id.as_deref()?).ok()
    }
}

/// Hook commands must never fail the host; their errors land here instead.
pub fn record_hook_error(paths: &SeamlessPaths, command: &str, err: &anyhow::Error) {
    let status = err
        .downcast_ref::<SeamlessError>()
        .map(|known| known.code().as_str())
        .unwrap_or("error");
    if append_event(&paths.hook_error_log, command, status, &format!("{err:#}")).is_err() {
        eprintln!("seamless {command}: {err:#}");
    }
}
