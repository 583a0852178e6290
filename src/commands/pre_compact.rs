use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::commands::{Context, HookInput};
use crate::error::SeamlessError;
use crate::seamless::monitor::{Admission, JobLauncher, admit_now};
use crate::seamless::session_id::SessionId;

/// Host is about to compact: make sure a distillation job is running.
pub fn run(ctx: &Context, stdin: &str, launcher: &dyn JobLauncher) -> Result<String> {
    let Some(input) = HookInput::parse(stdin) else {
        bail!("pre-compact payload is not valid JSON");
    };
    let id = SessionId::parse(input.session_id.as_deref().unwrap_or(""))?;
    let transcript = input
        .transcript_path
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| SeamlessError::TranscriptMissing(PathBuf::new()))?;
    if !transcript.is_file() {
        return Err(SeamlessError::TranscriptMissing(transcript).into());
    }

    match admit_now(&ctx.cfg, &ctx.paths, &id, &transcript, launcher)? {
        Admission::LaunchFailed(err) => bail!("failed to launch distillation: {err}"),
        _ => Ok(String::new()),
    }
}
