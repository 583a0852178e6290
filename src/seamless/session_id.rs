use crate::error::SeamlessError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}$").expect("valid uuid regex")
});

/// A session identifier that has passed UUID validation.
///
/// Every path helper in this crate takes `&SessionId`, so a crafted identifier
/// can never reach the filesystem layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, SeamlessError> {
        if raw.is_empty() {
            return Err(SeamlessError::MissingSessionId);
        }
        if !UUID_PATTERN.is_match(raw) {
            let shown: String = raw.chars().take(20).collect();
            return Err(SeamlessError::InvalidSessionId(shown));
        }
        // The pattern admits no separators, but the file-name check keeps the
        // path invariant local to this type.
        let file_name = Path::new(raw).file_name().and_then(|n| n.to_str());
        if file_name != Some(raw) {
            return Err(SeamlessError::InvalidSessionId(
                "session id contains path separators".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SessionId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
