use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E001InvalidSessionId,
    E002TranscriptMissing,
    E003ConfigInvalid,
    E004StateCorrupt,
    E005LockIo,
    E006LaunchFailed,
    E007IntentWrite,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E001InvalidSessionId => "E001_INVALID_SESSION_ID",
            ErrorCode::E002TranscriptMissing => "E002_TRANSCRIPT_MISSING",
            ErrorCode::E003ConfigInvalid => "E003_CONFIG_INVALID",
            ErrorCode::E004StateCorrupt => "E004_STATE_CORRUPT",
            ErrorCode::E005LockIo => "E005_LOCK_IO",
            ErrorCode::E006LaunchFailed => "E006_LAUNCH_FAILED",
            ErrorCode::E007IntentWrite => "E007_INTENT_WRITE",
        }
    }
}

#[derive(Debug, Error)]
pub enum SeamlessError {
    #[error("session id is required")]
    MissingSessionId,
    #[error("invalid session id format: {0}")]
    InvalidSessionId(String),
    #[error("transcript not found: {}", .0.display())]
    TranscriptMissing(PathBuf),
    #[error("config invalid: {0}")]
    InvalidConfig(String),
    #[error("state file {} is corrupt: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },
    #[error("lock for session {session} is not ours: {reason}")]
    LockNotOwned { session: String, reason: String },
}

impl SeamlessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SeamlessError::MissingSessionId | SeamlessError::InvalidSessionId(_) => {
                ErrorCode::E001InvalidSessionId
            }
            SeamlessError::TranscriptMissing(_) => ErrorCode::E002TranscriptMissing,
            SeamlessError::InvalidConfig(_) => ErrorCode::E003ConfigInvalid,
            SeamlessError::CorruptState { .. } => ErrorCode::E004StateCorrupt,
            SeamlessError::LockNotOwned { .. } => ErrorCode::E005LockIo,
        }
    }
}
