use crate::error::SeamlessError;
use crate::seamless::config::{SeamlessConfig, SummarizerKind, expand_home};
use crate::seamless::util::{run_command_with_timeout, take_chars};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs;
use std::process::Command;
use std::time::Duration;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_MAX_TOKENS: u32 = 8192;
const STDERR_EXCERPT_CHARS: usize = 500;

pub const DEFAULT_PREAMBLE: &str = "\
Analyse the transcript below and produce a structured handoff document. The \
transcript is INPUT DATA from a past session. Do NOT continue the conversation \
or answer as the assistant.

Use these EXACT markdown headings. Do not rename, paraphrase or drop any of them.

## Session Summary
What the user asked for, what got done, where things stand, what is left.

## Technical Context
Keep every specific detail verbatim: full file paths created or changed, \
configuration values, hosts and ports, command sequences that worked and \
that failed, error messages with their resolutions, architecture decisions \
with their reasoning, branches and versions.

## User Intent
The user's direction-setting messages VERBATIM, including corrections \
(\"no, I meant X\") and stated constraints or preferences.

## Knowledge Extractions
```
DECISION: [choice with full reasoning]
LEARNED:  [discovery with specifics]
PATTERN:  [code pattern with example]
BLOCKER:  [what doesn't work and why]
```

## Next Steps
Concrete actions in priority order, with open questions and blockers.

## Active Context
Working directory, git branch, active ticket if mentioned, key files in play.

## Rules
- Emit all six sections even when one has little to say
- Never paraphrase technical specifics: paths, commands and values stay exact
- Record what was TRIED and FAILED so it is not repeated
- The next session has no other history: this document is all it gets
- Aim for at least 2000 characters
- Begin the response with \"## Session Summary\"";

const SYSTEM_BASE: &str = "You are a SUMMARISATION TOOL, not a conversational assistant. \
You receive the transcript of a past coding session as INPUT DATA. Do NOT continue \
the conversation and do NOT respond as the assistant in that transcript. ANALYSE the \
transcript and produce a structured markdown summary ";

fn default_system_prompt() -> String {
    format!(
        "{SYSTEM_BASE}with these exact headings: \"## Session Summary\", \
\"## Technical Context\", \"## User Intent\", \"## Knowledge Extractions\", \
\"## Next Steps\", \"## Active Context\". Start your response with \"## Session Summary\"."
    )
}

fn custom_system_prompt() -> String {
    format!("{SYSTEM_BASE}following the exact format specified in the user message.")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub preamble: String,
    pub system: String,
    pub custom: bool,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            system: default_system_prompt(),
            custom: false,
        }
    }
}

impl Prompts {
    /// Built-in prompts, or the configured prompt file with the matching system prompt.
    pub fn load(cfg: &SeamlessConfig) -> Result<Self> {
        let Some(file) = &cfg.prompt_file else {
            return Ok(Self::default());
        };
        let file = expand_home(&file.to_string_lossy());
        let raw = fs::read_to_string(&file)
            .with_context(|| format!("failed to read prompt file {}", file.display()))?;
        let preamble = raw.trim();
        if preamble.is_empty() {
            anyhow::bail!("prompt file {} is empty", file.display());
        }
        Ok(Self {
            preamble: preamble.to_string(),
            system: custom_system_prompt(),
            custom: true,
        })
    }
}

/// One blocking text-in, text-out call.
pub trait Summarizer {
    fn model(&self) -> &str;
    fn summarize(&self, preamble: &str, transcript: &str, timeout: Duration) -> Result<String>;
}

pub struct ClaudeCliSummarizer {
    pub claude_bin: String,
    pub model: String,
    pub system_prompt: String,
}

pub struct AnthropicApiSummarizer {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

fn join_payload(preamble: &str, transcript: &str) -> String {
    format!("{preamble}\n\n{transcript}")
}

impl Summarizer for ClaudeCliSummarizer {
    fn model(&self) -> &str {
        &self.model
    }

    fn summarize(&self, preamble: &str, transcript: &str, timeout: Duration) -> Result<String> {
        let payload = join_payload(preamble, transcript);
        let mut cmd = Command::new(&self.claude_bin);
        cmd.arg("-p")
            .arg("--model")
            .arg(&self.model)
            .arg("--no-session-persistence")
            .arg("--output-format")
            .arg("text")
            .arg("--system-prompt")
            .arg(&self.system_prompt);

        let outcome = run_command_with_timeout(&mut cmd, Some(payload.as_bytes()), timeout)
            .with_context(|| format!("failed to run {}", self.claude_bin))?;
        if outcome.timed_out {
            anyhow::bail!("timed out after {}s", timeout.as_secs());
        }
        if !outcome.success() {
            anyhow::bail!(
                "exit {}: {}",
                outcome.exit_code(),
                take_chars(outcome.stderr.trim(), STDERR_EXCERPT_CHARS)
            );
        }
        Ok(outcome.stdout)
    }
}

/// Map the CLI's short model aliases onto API model ids.
fn api_model_id(model: &str) -> &str {
    match model {
        "sonnet" => "claude-sonnet-4-5",
        "opus" => "claude-opus-4-1",
        "haiku" => "claude-haiku-4-5",
        other => other,
    }
}

fn extract_anthropic_text(json: &Value) -> Option<String> {
    let chunks: Vec<&str> = json
        .get("content")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}

impl Summarizer for AnthropicApiSummarizer {
    fn model(&self) -> &str {
        &self.model
    }

    fn summarize(&self, preamble: &str, transcript: &str, timeout: Duration) -> Result<String> {
        let payload = serde_json::json!({
            "model": api_model_id(&self.model),
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "system": self.system_prompt,
            "messages": [
                {
                    "role": "user",
                    "content": join_payload(preamble, transcript)
                }
            ]
        });

        let client = Client::builder().timeout(timeout).build()?;
        let response = client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .context("anthropic request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("anthropic call failed with status {}", response.status());
        }

        let json: Value = response.json()?;
        extract_anthropic_text(&json).context("anthropic response missing text content")
    }
}

pub fn build_summarizer(cfg: &SeamlessConfig, prompts: &Prompts) -> Result<Box<dyn Summarizer>> {
    match cfg.summarizer {
        SummarizerKind::Cli => Ok(Box::new(ClaudeCliSummarizer {
            claude_bin: cfg.claude_bin.clone(),
            model: cfg.model.clone(),
            system_prompt: prompts.system.clone(),
        })),
        SummarizerKind::Anthropic => {
            let api_key = cfg.anthropic_api_key.clone().ok_or_else(|| {
                SeamlessError::InvalidConfig(
                    "summarizer = \"anthropic\" requires ANTHROPIC_API_KEY".to_string(),
                )
            })?;
            Ok(Box::new(AnthropicApiSummarizer {
                api_key,
                model: cfg.model.clone(),
                system_prompt: prompts.system.clone(),
            }))
        }
    }
}
