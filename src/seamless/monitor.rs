//! Per-turn threshold monitor.
//!
//! Runs once per host turn inside a short-lived process. Admission goes
//! through the lock; the job itself is launched detached and never awaited.

use crate::error::ErrorCode;
use crate::seamless::audit::JobLog;
use crate::seamless::config::SeamlessConfig;
use crate::seamless::lock::{self, LockPayload};
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::resume_intent;
use crate::seamless::session_id::SessionId;
use crate::seamless::sessions::find_transcript;
use crate::seamless::state::{self, SessionState};
use crate::seamless::thresholds::{should_admit_job, should_arm_wrapup};
use crate::seamless::warn::{self, WarnEvent};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq)]
pub struct TurnObservation {
    pub session_id: SessionId,
    pub pct: f64,
    pub cwd: Option<String>,
    pub transcript: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ContextWindow {
    used_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HookPayload {
    session_id: Option<String>,
    transcript_path: Option<String>,
    cwd: Option<String>,
    context_window: Option<ContextWindow>,
}

impl TurnObservation {
    /// Parse the host's per-turn JSON. The identifier is validated here,
    /// before anything touches the filesystem.
    pub fn from_hook_json(raw: &str) -> Result<Self> {
        let payload: HookPayload =
            serde_json::from_str(raw).context("turn payload is not valid JSON")?;
        let session_id = SessionId::parse(payload.session_id.as_deref().unwrap_or(""))?;
        let pct = payload
            .context_window
            .and_then(|window| window.used_percentage)
            .filter(|pct| pct.is_finite())
            .ok_or_else(|| anyhow!("turn payload has no context_window.used_percentage"))?;
        Ok(Self {
            session_id,
            pct,
            cwd: payload.cwd.filter(|cwd| !cwd.is_empty()),
            transcript: payload
                .transcript_path
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Starts the distillation job for a session whose lock is already held.
/// The job takes the lock over by its token.
pub trait JobLauncher {
    fn launch(&self, id: &SessionId, transcript: &Path, lock: &LockPayload) -> Result<()>;
}

/// Re-invokes this binary as `compact <id> <transcript> --lock-token <token>`
/// in its own process group with no stdio attached.
pub struct DetachedLauncher {
    exe: PathBuf,
}

impl DetachedLauncher {
    pub fn current() -> Result<Self> {
        Ok(Self {
            exe: std::env::current_exe().context("failed to locate own executable")?,
        })
    }
}

impl JobLauncher for DetachedLauncher {
    fn launch(&self, id: &SessionId, transcript: &Path, lock: &LockPayload) -> Result<()> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("compact")
            .arg(id.as_str())
            .arg(transcript)
            .arg("--lock-token")
            .arg(&lock.token)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn()
            .with_context(|| format!("failed to spawn {}", self.exe.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    NotDue,
    NoTranscript,
    /// Another holder owns a live lock.
    Busy,
    Launched,
    LaunchFailed(String),
    /// A summary already exists for this session.
    AlreadyDistilled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub state: SessionState,
    pub admission: Admission,
    pub wrapup_armed: bool,
}

fn resolve_transcript(paths: &SeamlessPaths, turn: &TurnObservation) -> Option<PathBuf> {
    turn.transcript
        .clone()
        .filter(|path| path.is_file())
        .or_else(|| find_transcript(paths, &turn.session_id))
}

fn admit(
    cfg: &SeamlessConfig,
    paths: &SeamlessPaths,
    id: &SessionId,
    state: &mut SessionState,
    transcript: &Path,
    launcher: &dyn JobLauncher,
) -> Result<Admission> {
    if lock::reap_if_stale(paths, id, cfg.lock_stale_after())? {
        JobLog::for_session(paths, id).record("lock", "reaped", "removed stale lock before admission");
    }
    let Some(held) = lock::try_acquire(paths, id)? else {
        return Ok(Admission::Busy);
    };

    state.compact_at = Some(Utc::now());
    if let Err(err) = state::save(paths, id, state) {
        if let Err(release_err) = lock::release_owned(paths, id, &held) {
            lock::warn_release_failed(id, &release_err);
        }
        state.compact_at = None;
        return Err(err);
    }

    match launcher.launch(id, transcript, &held) {
        Ok(()) => Ok(Admission::Launched),
        Err(err) => {
            let err_text = format!("{err:#}");
            warn::emit(WarnEvent {
                code: ErrorCode::E006LaunchFailed.as_str(),
                stage: "monitor",
                action: "launch-job",
                session: id.short(),
                reason: "launch failed; lock released for a later turn",
                err: &err_text,
            });
            lock::release_owned(paths, id, &held)?;
            state.compact_at = None;
            state::save(paths, id, state)?;
            Ok(Admission::LaunchFailed(err_text))
        }
    }
}

/// Admit a job for `transcript` right away, outside the usage thresholds.
/// Used when the host announces its own compaction.
pub fn admit_now(
    cfg: &SeamlessConfig,
    paths: &SeamlessPaths,
    id: &SessionId,
    transcript: &Path,
    launcher: &dyn JobLauncher,
) -> Result<Admission> {
    if paths.session_files(id).summary.exists() {
        return Ok(Admission::AlreadyDistilled);
    }
    let mut state = state::load(paths, id)?;
    admit(cfg, paths, id, &mut state, transcript, launcher)
}

/// Evaluate one turn: maybe admit a job, maybe arm wrap-up, always record
/// the usage percentage.
pub fn observe_turn(
    cfg: &SeamlessConfig,
    paths: &SeamlessPaths,
    turn: &TurnObservation,
    launcher: &dyn JobLauncher,
) -> Result<MonitorOutcome> {
    let id = &turn.session_id;
    let mut state = state::load(paths, id)?;

    let mut admission = Admission::NotDue;
    if should_admit_job(&state, turn.pct, cfg.compact_pct) {
        admission = match resolve_transcript(paths, turn) {
            Some(transcript) => admit(cfg, paths, id, &mut state, &transcript, launcher)?,
            None => Admission::NoTranscript,
        };
    }

    let wrapup_armed = should_arm_wrapup(&state, turn.pct, cfg.wrapup_pct);
    if wrapup_armed {
        state.wrapup_at = Some(Utc::now());
        state::save(paths, id, &state)?;
        if let Some(cwd) = &turn.cwd
            && let Err(err) = resume_intent::create(paths, cwd, id)
        {
            warn::emit(WarnEvent {
                code: ErrorCode::E007IntentWrite.as_str(),
                stage: "monitor",
                action: "create-resume-intent",
                session: id.short(),
                reason: "wrap-up armed without a resume intent",
                err: &format!("{err:#}"),
            });
        }
    }

    state.last_pct = turn.pct;
    state::save(paths, id, &state)?;

    Ok(MonitorOutcome {
        state,
        admission,
        wrapup_armed,
    })
}
