//! Context blocks printed back into a fresh session.

use crate::seamless::config::SeamlessConfig;
use crate::seamless::distill::SummaryMetadata;
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::transcript::extract_tail;
use crate::seamless::util::take_chars;
use anyhow::{Context, Result};
use std::fs;

const SESSION_START_PREAMBLE: &str = "# Session Context (restored by seamless)\n\n\
The following is a structured summary of your session before compaction.\n\
Treat it as your working memory and pick up where you left off.\n";

const TAIL_PREAMBLE: &str = "## Post-compaction Conversation\n\n\
The following exchanges happened AFTER the summary above was generated.\n\
Treat them as the most recent context:\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capped {
    pub text: String,
    /// Original length in chars when the text was cut.
    pub truncated_from: Option<usize>,
}

pub fn cap_output(text: String, max_chars: usize) -> Capped {
    let total = text.chars().count();
    if total <= max_chars {
        return Capped {
            text,
            truncated_from: None,
        };
    }
    Capped {
        text: take_chars(&text, max_chars).to_string(),
        truncated_from: Some(total),
    }
}

/// Same-session restore after the host compacted its context.
pub fn session_start_block(summary: &str) -> String {
    format!("{SESSION_START_PREAMBLE}\n{summary}")
}

/// Cross-session restore: the summary plus whatever the transcript gained
/// after it was written.
pub fn resume_block(summary: &str, tail: &[String]) -> String {
    let mut out = format!("# Session Resume (seamless)\n\n{summary}\n");
    if !tail.is_empty() {
        out.push_str("\n---\n\n");
        out.push_str(TAIL_PREAMBLE);
        for line in tail {
            out.push('\n');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Tail entries past the summary's byte offset. A transcript that has gone
/// missing simply has no tail.
pub fn post_summary_tail(cfg: &SeamlessConfig, meta: &SummaryMetadata) -> Result<Vec<String>> {
    if meta.transcript_byte_offset == 0 || !meta.transcript_path.is_file() {
        return Ok(Vec::new());
    }
    extract_tail(
        &meta.transcript_path,
        meta.transcript_byte_offset,
        cfg.tail_max_chars,
        cfg.tail_tool_result_max,
    )
}

/// Summary and tail for a stored session, ready to print.
pub fn render_resume(cfg: &SeamlessConfig, paths: &SeamlessPaths, meta: &SummaryMetadata) -> Result<Capped> {
    let summary_path = paths.session_files(&meta.session_id).summary;
    let summary = fs::read_to_string(&summary_path)
        .with_context(|| format!("summary not found: {}", summary_path.display()))?;
    let tail = post_summary_tail(cfg, meta)?;
    Ok(cap_output(resume_block(&summary, &tail), cfg.max_output_chars))
}
