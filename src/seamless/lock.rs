//! Per-session job lock.
//!
//! The lock file's existence is the only admission signal. Acquisition uses an
//! exclusive create so concurrent monitors cannot both win; staleness is judged
//! by file age and acted on by callers, never by this module. Every acquisition
//! writes a fresh token, and a holder only refreshes or removes a lock whose
//! token is still its own.

use crate::error::{ErrorCode, SeamlessError};
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use crate::seamless::util::now_epoch_millis;
use crate::seamless::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static ACQUISITIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPayload {
    pub pid: u32,
    pub acquired_at_epoch_ms: u64,
    pub token: String,
}

impl LockPayload {
    fn fresh() -> Result<Self> {
        let pid = std::process::id();
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let seq = ACQUISITIONS.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            pid,
            acquired_at_epoch_ms: now_epoch_millis()?,
            token: format!("{pid:x}-{nanos:x}-{seq:x}"),
        })
    }
}

pub fn lock_path(paths: &SeamlessPaths, id: &SessionId) -> PathBuf {
    paths.session_files(id).lock
}

/// The payload on disk, or `None` when there is no lock or it is unreadable
/// as a payload.
pub fn read_lock_payload(paths: &SeamlessPaths, id: &SessionId) -> Result<Option<LockPayload>> {
    let path = lock_path(paths, id);
    match fs::read_to_string(&path) {
        Ok(raw) => Ok(serde_json::from_str(raw.trim()).ok()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read lock {}", path.display())),
    }
}

fn create_exclusive(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Atomically create the lock. `Some(payload)` means the caller now holds it.
pub fn try_acquire(paths: &SeamlessPaths, id: &SessionId) -> Result<Option<LockPayload>> {
    paths.ensure_sessions_dir()?;
    let path = lock_path(paths, id);
    let mut file = match create_exclusive(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create lock {}", path.display()));
        }
    };

    let payload = LockPayload::fresh()?;
    writeln!(file, "{}", serde_json::to_string(&payload)?)
        .with_context(|| format!("failed to write lock {}", path.display()))?;
    Ok(Some(payload))
}

fn owns(paths: &SeamlessPaths, id: &SessionId, held: &LockPayload) -> Result<bool> {
    Ok(read_lock_payload(paths, id)?.is_some_and(|on_disk| on_disk.token == held.token))
}

/// Remove the lock if it is still `held`. Returns `false` when the lock is
/// gone or now belongs to someone else; neither is an error.
pub fn release_owned(paths: &SeamlessPaths, id: &SessionId, held: &LockPayload) -> Result<bool> {
    if !owns(paths, id, held)? {
        return Ok(false);
    }
    remove_if_present(&lock_path(paths, id))?;
    Ok(true)
}

/// Reset the lock's age if it is still `held`.
pub fn refresh_owned(paths: &SeamlessPaths, id: &SessionId, held: &LockPayload) -> Result<bool> {
    if !owns(paths, id, held)? {
        return Ok(false);
    }
    let path = lock_path(paths, id);
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .and_then(|file| file.set_modified(SystemTime::now()))
        .with_context(|| format!("failed to refresh lock {}", path.display()))?;
    Ok(true)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove lock {}", path.display())),
    }
}

/// Age of the lock file, or `None` when there is no lock.
pub fn lock_age(paths: &SeamlessPaths, id: &SessionId) -> Result<Option<Duration>> {
    let path = lock_path(paths, id);
    let meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to stat lock {}", path.display()));
        }
    };
    let modified = meta.modified()?;
    Ok(Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    ))
}

pub fn is_held(paths: &SeamlessPaths, id: &SessionId) -> bool {
    lock_path(paths, id).exists()
}

/// True iff a lock exists and is older than `max_age`. An absent lock is not stale.
pub fn is_stale(paths: &SeamlessPaths, id: &SessionId, max_age: Duration) -> Result<bool> {
    Ok(lock_age(paths, id)?.is_some_and(|age| age > max_age))
}

/// Remove the lock only if it is still stale at the moment of the check.
///
/// Returns `true` when a stale lock was removed. Recovery is by age alone; two
/// monitors racing on the same stale lock are separated again by `try_acquire`.
pub fn reap_if_stale(paths: &SeamlessPaths, id: &SessionId, max_age: Duration) -> Result<bool> {
    if !is_stale(paths, id, max_age)? {
        return Ok(false);
    }
    remove_if_present(&lock_path(paths, id))?;
    Ok(true)
}

fn release_warning(id: &SessionId, err: &anyhow::Error) -> String {
    warn::format_event(WarnEvent {
        code: ErrorCode::E005LockIo.as_str(),
        stage: "lock",
        action: "release",
        session: id.short(),
        reason: "lock file left behind; it is reaped once stale",
        err: &format!("{err:#}"),
    })
}

pub fn warn_release_failed(id: &SessionId, err: &anyhow::Error) {
    eprintln!("{}", release_warning(id, err));
}

/// A held lock, released exactly once: explicitly through [`LockGuard::release`]
/// or on drop (early return, error, unwinding). A lock that was reaped and
/// re-acquired by another holder in the meantime is left alone.
#[derive(Debug)]
pub struct LockGuard {
    paths: SeamlessPaths,
    id: SessionId,
    payload: LockPayload,
    released: bool,
}

impl LockGuard {
    /// Acquire the lock for this process.
    pub fn acquire(paths: &SeamlessPaths, id: &SessionId) -> Result<Option<Self>> {
        Ok(try_acquire(paths, id)?.map(|payload| Self::owning(paths, id, payload)))
    }

    /// Take over a lock a launcher acquired on this job's behalf. The lock
    /// must exist and carry the launcher's token.
    pub fn adopt(paths: &SeamlessPaths, id: &SessionId, token: &str) -> Result<Self> {
        let not_owned = |reason: &str| SeamlessError::LockNotOwned {
            session: id.to_string(),
            reason: reason.to_string(),
        };
        let Some(payload) = read_lock_payload(paths, id)? else {
            return Err(not_owned("no lock is held").into());
        };
        if payload.token != token {
            return Err(not_owned("held by another job").into());
        }
        Ok(Self::owning(paths, id, payload))
    }

    fn owning(paths: &SeamlessPaths, id: &SessionId, payload: LockPayload) -> Self {
        Self {
            paths: paths.clone(),
            id: id.clone(),
            payload,
            released: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Reset the lock's age so a long but healthy job is never taken for a
    /// dead one. `Ok(false)` means the lock is no longer ours.
    pub fn refresh(&self) -> Result<bool> {
        refresh_owned(&self.paths, &self.id, &self.payload)
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        release_owned(&self.paths, &self.id, &self.payload).map(|_| ())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(err) = release_owned(&self.paths, &self.id, &self.payload) {
                warn_release_failed(&self.id, &err);
            }
        }
    }
}
