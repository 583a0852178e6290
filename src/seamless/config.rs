use crate::error::SeamlessError;
use crate::seamless::paths::SeamlessPaths;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerKind {
    #[default]
    Cli,
    Anthropic,
}

impl SummarizerKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cli" | "claude" | "claude-cli" => Some(SummarizerKind::Cli),
            "anthropic" | "api" => Some(SummarizerKind::Anthropic),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SummarizerKind::Cli => "cli",
            SummarizerKind::Anthropic => "anthropic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeamlessConfig {
    pub compact_pct: f64,
    pub wrapup_pct: f64,
    pub model: String,
    pub summarizer: SummarizerKind,
    pub claude_bin: String,
    pub anthropic_api_key: Option<String>,
    pub summarize_timeout_secs: u64,
    pub max_chars: usize,
    pub tool_result_max: usize,
    pub tail_max_chars: usize,
    pub tail_tool_result_max: usize,
    pub hook_timeout_secs: u64,
    pub lock_stale_secs: u64,
    pub min_result_chars: usize,
    pub max_output_chars: usize,
    pub prompt_file: Option<PathBuf>,
}

impl Default for SeamlessConfig {
    fn default() -> Self {
        Self {
            compact_pct: 70.0,
            wrapup_pct: 90.0,
            model: "sonnet".to_string(),
            summarizer: SummarizerKind::Cli,
            claude_bin: "claude".to_string(),
            anthropic_api_key: None,
            summarize_timeout_secs: 300,
            max_chars: 400_000,
            tool_result_max: 300,
            tail_max_chars: 100_000,
            tail_tool_result_max: 200,
            hook_timeout_secs: 60,
            lock_stale_secs: 600,
            min_result_chars: 500,
            max_output_chars: 200_000,
            prompt_file: None,
        }
    }
}

impl SeamlessConfig {
    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialSeamlessConfig {
    thresholds: Option<PartialThresholds>,
    summarizer: Option<PartialSummarizer>,
    transcript: Option<PartialTranscript>,
    hooks: Option<PartialHooks>,
    lock: Option<PartialLock>,
    output: Option<PartialOutput>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialThresholds {
    compact_pct: Option<f64>,
    wrapup_pct: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialSummarizer {
    kind: Option<String>,
    model: Option<String>,
    claude_bin: Option<String>,
    timeout_secs: Option<u64>,
    min_result_chars: Option<usize>,
    prompt_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialTranscript {
    max_chars: Option<usize>,
    tool_result_max: Option<usize>,
    tail_max_chars: Option<usize>,
    tail_tool_result_max: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialHooks {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLock {
    stale_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialOutput {
    max_chars: Option<usize>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    env_non_empty(var)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(fallback)
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    env_non_empty(var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    env_non_empty(var)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn validate(cfg: &SeamlessConfig) -> Result<()> {
    let invalid = |msg: &str| anyhow!(SeamlessError::InvalidConfig(msg.to_string()));

    if !(cfg.compact_pct > 0.0 && cfg.compact_pct <= 100.0) {
        return Err(invalid("require 0 < compact_pct <= 100"));
    }
    if !(cfg.wrapup_pct > 0.0 && cfg.wrapup_pct <= 100.0) {
        return Err(invalid("require 0 < wrapup_pct <= 100"));
    }
    if cfg.compact_pct > cfg.wrapup_pct {
        return Err(invalid("require compact_pct <= wrapup_pct"));
    }
    if cfg.model.trim().is_empty() {
        return Err(invalid("model cannot be empty"));
    }
    if cfg.summarize_timeout_secs == 0 {
        return Err(invalid("summarizer timeout must be >= 1 second"));
    }
    if cfg.hook_timeout_secs == 0 {
        return Err(invalid("hook timeout must be >= 1 second"));
    }
    if cfg.lock_stale_secs == 0 {
        return Err(invalid("lock stale age must be >= 1 second"));
    }
    // A job refreshes its lock between summarizer calls and between hooks,
    // so one call of either kind must fit inside the stale bound.
    if cfg.lock_stale_secs <= cfg.summarize_timeout_secs.max(cfg.hook_timeout_secs) {
        return Err(invalid(
            "lock stale age must exceed both the summarizer and the hook timeout",
        ));
    }
    if cfg.max_chars == 0 || cfg.tail_max_chars == 0 {
        return Err(invalid("transcript character budgets must be >= 1"));
    }
    if cfg.max_output_chars == 0 {
        return Err(invalid("output cap must be >= 1"));
    }
    if matches!(cfg.summarizer, SummarizerKind::Cli) && cfg.claude_bin.trim().is_empty() {
        return Err(invalid("claude_bin cannot be empty for the cli summarizer"));
    }
    Ok(())
}

fn resolve_config_path(paths: &SeamlessPaths) -> PathBuf {
    match env_non_empty("SEAMLESS_CONFIG_PATH") {
        Some(custom) => PathBuf::from(custom),
        None => paths.data_dir.join("seamless.toml"),
    }
}

fn merge_file_config(base: &mut SeamlessConfig, paths: &SeamlessPaths) -> Result<()> {
    let path = resolve_config_path(paths);
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialSeamlessConfig = toml::from_str(&raw).map_err(|err| {
        anyhow!(SeamlessError::InvalidConfig(format!(
            "failed to parse {}: {err}",
            path.display()
        )))
    })?;

    if let Some(thresholds) = parsed.thresholds {
        if let Some(v) = thresholds.compact_pct {
            base.compact_pct = v;
        }
        if let Some(v) = thresholds.wrapup_pct {
            base.wrapup_pct = v;
        }
    }
    if let Some(summarizer) = parsed.summarizer {
        if let Some(kind) = summarizer.kind.as_deref() {
            base.summarizer = SummarizerKind::parse(kind).ok_or_else(|| {
                anyhow!(SeamlessError::InvalidConfig(format!(
                    "unknown summarizer kind `{kind}`; use `cli` or `anthropic`"
                )))
            })?;
        }
        if let Some(v) = summarizer.model {
            base.model = v;
        }
        if let Some(v) = summarizer.claude_bin {
            base.claude_bin = v;
        }
        if let Some(v) = summarizer.timeout_secs {
            base.summarize_timeout_secs = v;
        }
        if let Some(v) = summarizer.min_result_chars {
            base.min_result_chars = v;
        }
        if let Some(v) = summarizer.prompt_file {
            base.prompt_file = Some(expand_home(&v));
        }
    }
    if let Some(transcript) = parsed.transcript {
        base.max_chars = transcript.max_chars.unwrap_or(base.max_chars);
        base.tool_result_max = transcript.tool_result_max.unwrap_or(base.tool_result_max);
        base.tail_max_chars = transcript.tail_max_chars.unwrap_or(base.tail_max_chars);
        base.tail_tool_result_max = transcript
            .tail_tool_result_max
            .unwrap_or(base.tail_tool_result_max);
    }
    if let Some(hooks) = parsed.hooks {
        base.hook_timeout_secs = hooks.timeout_secs.unwrap_or(base.hook_timeout_secs);
    }
    if let Some(lock) = parsed.lock {
        base.lock_stale_secs = lock.stale_secs.unwrap_or(base.lock_stale_secs);
    }
    if let Some(output) = parsed.output {
        base.max_output_chars = output.max_chars.unwrap_or(base.max_output_chars);
    }
    Ok(())
}

pub fn load_config(paths: &SeamlessPaths) -> Result<SeamlessConfig> {
    let mut cfg = SeamlessConfig::default();
    merge_file_config(&mut cfg, paths)?;

    cfg.compact_pct = env_or_f64("SEAMLESS_COMPACT_PCT", cfg.compact_pct);
    cfg.wrapup_pct = env_or_f64("SEAMLESS_WRAPUP_PCT", cfg.wrapup_pct);
    cfg.model = env_or_string("SEAMLESS_MODEL", &cfg.model);
    if let Some(kind) = env_non_empty("SEAMLESS_SUMMARIZER") {
        cfg.summarizer = SummarizerKind::parse(&kind).ok_or_else(|| {
            anyhow!(SeamlessError::InvalidConfig(format!(
                "unknown SEAMLESS_SUMMARIZER `{kind}`; use `cli` or `anthropic`"
            )))
        })?;
    }
    cfg.claude_bin = env_or_string("SEAMLESS_CLAUDE_BIN", &cfg.claude_bin);
    cfg.anthropic_api_key = env_non_empty("ANTHROPIC_API_KEY").or(cfg.anthropic_api_key);
    cfg.summarize_timeout_secs = env_or_u64("SEAMLESS_TIMEOUT", cfg.summarize_timeout_secs);
    cfg.max_chars = env_or_usize("SEAMLESS_MAX_CHARS", cfg.max_chars);
    cfg.hook_timeout_secs = env_or_u64("SEAMLESS_HOOK_TIMEOUT", cfg.hook_timeout_secs);
    cfg.lock_stale_secs = env_or_u64("SEAMLESS_LOCK_STALE_SECS", cfg.lock_stale_secs);
    cfg.min_result_chars = env_or_usize("SEAMLESS_MIN_RESULT_CHARS", cfg.min_result_chars);
    if let Some(prompt_file) = env_non_empty("SEAMLESS_PROMPT_FILE") {
        cfg.prompt_file = Some(expand_home(&prompt_file));
    }

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate(&SeamlessConfig::default()).expect("defaults validate");
    }

    #[test]
    fn rejects_compact_above_wrapup() {
        let cfg = SeamlessConfig {
            compact_pct: 95.0,
            wrapup_pct: 90.0,
            ..SeamlessConfig::default()
        };
        let err = validate(&cfg).expect_err("invalid");
        assert!(format!("{err:#}").contains("compact_pct <= wrapup_pct"));
    }

    #[test]
    fn file_config_overrides_sections() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path(), tmp.path().join("projects"));
        fs::write(
            tmp.path().join("seamless.toml"),
            r#"
[thresholds]
compact_pct = 60
wrapup_pct = 85

[summarizer]
kind = "anthropic"
model = "claude-haiku"
timeout_secs = 30

[lock]
stale_secs = 120
"#,
        )
        .expect("write config");

        let mut cfg = SeamlessConfig::default();
        merge_file_config(&mut cfg, &paths).expect("merge");
        assert_eq!(cfg.compact_pct, 60.0);
        assert_eq!(cfg.wrapup_pct, 85.0);
        assert_eq!(cfg.summarizer, SummarizerKind::Anthropic);
        assert_eq!(cfg.model, "claude-haiku");
        assert_eq!(cfg.summarize_timeout_secs, 30);
        assert_eq!(cfg.lock_stale_secs, 120);
        assert_eq!(cfg.max_chars, 400_000);
    }

    #[test]
    fn stale_bound_must_outlast_one_call() {
        let cfg = SeamlessConfig {
            lock_stale_secs: 300,
            summarize_timeout_secs: 300,
            ..SeamlessConfig::default()
        };
        assert!(validate(&cfg).is_err());

        let cfg = SeamlessConfig {
            lock_stale_secs: 120,
            hook_timeout_secs: 180,
            summarize_timeout_secs: 60,
            ..SeamlessConfig::default()
        };
        assert!(validate(&cfg).is_err());

        let cfg = SeamlessConfig {
            lock_stale_secs: 301,
            ..SeamlessConfig::default()
        };
        validate(&cfg).expect("one call fits");
    }

    #[test]
    fn unknown_summarizer_kind_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path(), tmp.path().join("projects"));
        fs::write(
            tmp.path().join("seamless.toml"),
            "[summarizer]\nkind = \"carrier-pigeon\"\n",
        )
        .expect("write config");

        let mut cfg = SeamlessConfig::default();
        let err = merge_file_config(&mut cfg, &paths).expect_err("invalid kind");
        assert!(format!("{err:#}").contains("unknown summarizer kind"));
    }
}
