//! Streaming projection of a JSONL conversation transcript.
//!
//! The source is append-only and may be growing while we read it, so every
//! line is parsed on its own and bad lines are skipped. Lines are read through
//! a bounded reader; nothing larger than [`MAX_LINE_BYTES`] is ever buffered.

use crate::seamless::util::take_chars;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;
pub const TRUNCATION_MARKER: &str = "...[truncated]";
const BASH_BRIEF_CHARS: usize = 120;
const FALLBACK_BRIEF_CHARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entries: Vec<String>,
    pub total_chars: usize,
    /// Offset just past the last record this extraction consumed.
    pub bytes_consumed: u64,
}

/// Projection of one transcript record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projected {
    pub entries: Vec<String>,
    pub chars: usize,
}

impl Projected {
    fn push(&mut self, entry: String, chars: usize) {
        self.entries.push(entry);
        self.chars += chars;
    }
}

struct RawLine {
    bytes_read: u64,
    terminated: bool,
    oversized: bool,
}

fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    cap: usize,
) -> io::Result<Option<RawLine>> {
    buf.clear();
    let mut bytes_read = 0u64;
    let mut oversized = false;
    loop {
        let (take, terminated) = {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                if bytes_read == 0 {
                    return Ok(None);
                }
                return Ok(Some(RawLine {
                    bytes_read,
                    terminated: false,
                    oversized,
                }));
            }
            let (chunk, terminated) = match available.iter().position(|b| *b == b'\n') {
                Some(idx) => (&available[..=idx], true),
                None => (available, false),
            };
            if !oversized {
                if buf.len() + chunk.len() > cap {
                    oversized = true;
                    buf.clear();
                } else {
                    buf.extend_from_slice(chunk);
                }
            }
            (chunk.len(), terminated)
        };
        reader.consume(take);
        bytes_read += take as u64;
        if terminated {
            return Ok(Some(RawLine {
                bytes_read,
                terminated: true,
                oversized,
            }));
        }
    }
}

fn string_field(input: &Value, key: &str) -> String {
    match input.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn tool_brief(name: &str, input: &Value) -> String {
    match name {
        "Bash" => take_chars(&string_field(input, "command"), BASH_BRIEF_CHARS).to_string(),
        "Read" | "Write" | "Edit" => string_field(input, "file_path"),
        "Glob" => string_field(input, "pattern"),
        "Grep" => format!(
            "{} in {}",
            string_field(input, "pattern"),
            string_field(input, "path")
        ),
        "WebSearch" => string_field(input, "query"),
        "Task" => format!(
            "{}: {}",
            string_field(input, "subagent_type"),
            string_field(input, "description")
        ),
        _ => {
            let dump = serde_json::to_string(input).unwrap_or_default();
            take_chars(&dump, FALLBACK_BRIEF_CHARS).to_string()
        }
    }
}

fn tool_result_payload(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn cap_tool_output(raw: &str, cap: usize) -> String {
    if raw.chars().count() > cap {
        format!("{}{TRUNCATION_MARKER}", take_chars(raw, cap))
    } else {
        raw.to_string()
    }
}

fn push_text(out: &mut Projected, role: &str, text: Option<&str>) {
    let text = text.unwrap_or("").trim();
    if !text.is_empty() {
        out.push(format!("{role}: {text}"), text.chars().count());
    }
}

fn project_user(message: Option<&Value>, tool_output_cap: usize, out: &mut Projected) {
    match message.and_then(|m| m.get("content")) {
        Some(Value::String(text)) => push_text(out, "USER", Some(text)),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        push_text(out, "USER", block.get("text").and_then(Value::as_str))
                    }
                    Some("tool_result") => {
                        let payload = cap_tool_output(
                            &tool_result_payload(block.get("content")),
                            tool_output_cap,
                        );
                        let chars = payload.chars().count();
                        out.push(format!("TOOL_RESULT: {payload}"), chars);
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn project_assistant(message: Option<&Value>, out: &mut Projected) {
    let Some(blocks) = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
    else {
        return;
    };
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => push_text(out, "ASSISTANT", block.get("text").and_then(Value::as_str)),
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                let empty = Value::Object(Default::default());
                let input = block.get("input").unwrap_or(&empty);
                let brief = tool_brief(name, input);
                let chars = brief.chars().count() + name.chars().count();
                out.push(format!("TOOL [{name}]: {brief}"), chars);
            }
            _ => {}
        }
    }
}

/// Project one parsed record into tagged conversation lines.
pub fn project_record(record: &Value, tool_output_cap: usize) -> Projected {
    let mut out = Projected::default();
    let message = record.get("message");
    match record.get("type").and_then(Value::as_str) {
        Some("user") => {
            if record.get("isMeta").and_then(Value::as_bool) == Some(true) {
                return out;
            }
            project_user(message, tool_output_cap, &mut out);
        }
        Some("assistant") => project_assistant(message, &mut out),
        _ => {}
    }
    out
}

fn parse_record(raw: &[u8]) -> Option<Value> {
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    if trimmed.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(trimmed).ok()
}

/// Stream records from `reader`, stopping once the character budget is exceeded.
///
/// The record that crosses the budget is kept, so the result exceeds
/// `max_chars` by at most one record's worth of characters.
pub fn extract_from<R: BufRead>(
    mut reader: R,
    max_chars: usize,
    tool_output_cap: usize,
) -> Result<Extraction> {
    let mut out = Extraction::default();
    let mut buf = Vec::new();

    while let Some(line) = read_bounded_line(&mut reader, &mut buf, MAX_LINE_BYTES)? {
        let record = if line.oversized {
            None
        } else {
            parse_record(&buf)
        };

        // A writer may be mid-append: leave an unparseable tail for the next reader.
        if record.is_none() && !line.terminated {
            break;
        }
        out.bytes_consumed += line.bytes_read;

        let Some(record) = record else {
            continue;
        };
        let projected = project_record(&record, tool_output_cap);
        out.entries.extend(projected.entries);
        out.total_chars += projected.chars;

        if out.total_chars > max_chars {
            break;
        }
    }

    Ok(out)
}

/// Project a transcript from its first byte.
pub fn extract_full(path: &Path, max_chars: usize, tool_output_cap: usize) -> Result<Extraction> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    extract_from(BufReader::new(file), max_chars, tool_output_cap)
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Project only what was appended after `byte_offset`.
pub fn extract_tail(
    path: &Path,
    byte_offset: u64,
    max_chars: usize,
    tool_output_cap: usize,
) -> Result<Vec<String>> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(byte_offset))
        .with_context(|| format!("failed to seek {} to {byte_offset}", path.display()))?;
    let extraction = extract_from(BufReader::new(file), max_chars, tool_output_cap)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(extraction.entries)
}
