//! The background distillation job.
//!
//! Extract, summarize, validate, retry once on the trailing half of the
//! transcript, persist, then fan out to hooks. Every transition is written to
//! the session's job log. The lock guard handed in is released on every path.

use crate::seamless::audit::JobLog;
use crate::seamless::config::SeamlessConfig;
use crate::seamless::hooks::{self, HookContext, HookRun};
use crate::seamless::lock::LockGuard;
use crate::seamless::paths::SeamlessPaths;
use crate::seamless::session_id::SessionId;
use crate::seamless::summarizer::{Prompts, Summarizer};
use crate::seamless::transcript::{Extraction, extract_full};
use crate::seamless::util::{last_chars, write_atomic};
use crate::seamless::validate::check_summary;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistillPhase {
    Idle,
    Admitted,
    Extracting,
    Summarizing,
    Validating,
    Retrying,
    Persisted,
    Failed,
}

impl DistillPhase {
    pub fn label(self) -> &'static str {
        match self {
            DistillPhase::Idle => "idle",
            DistillPhase::Admitted => "admitted",
            DistillPhase::Extracting => "extracting",
            DistillPhase::Summarizing => "summarizing",
            DistillPhase::Validating => "validating",
            DistillPhase::Retrying => "retrying",
            DistillPhase::Persisted => "persisted",
            DistillPhase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub session_id: SessionId,
    pub generated_at: String,
    pub model: String,
    pub transcript_path: PathBuf,
    pub transcript_entries: usize,
    pub transcript_chars: usize,
    pub transcript_byte_offset: u64,
    pub summary_chars: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks_ran: Vec<HookRun>,
}

pub fn load_metadata(path: &Path) -> Result<SummaryMetadata> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistillOutcome {
    Persisted(SummaryMetadata),
    Failed {
        /// Phase the job was in when it gave up.
        phase: DistillPhase,
        attempts: u32,
        reason: String,
    },
}

impl DistillOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, DistillOutcome::Persisted(_))
    }
}

pub struct PipelineContext<'a> {
    pub cfg: &'a SeamlessConfig,
    pub paths: &'a SeamlessPaths,
    pub summarizer: &'a dyn Summarizer,
    pub prompts: &'a Prompts,
}

struct Job<'g> {
    log: JobLog,
    guard: &'g LockGuard,
    phase: DistillPhase,
    attempts: u32,
    lock_lost: bool,
}

impl Job<'_> {
    fn enter(&mut self, phase: DistillPhase, message: &str) {
        self.phase = phase;
        self.log.record(phase.label(), "ok", message);
        self.heartbeat();
    }

    /// Keep the lock young while the job makes progress.
    fn heartbeat(&mut self) {
        match self.guard.refresh() {
            Ok(true) => {}
            Ok(false) if self.lock_lost => {}
            Ok(false) => {
                self.lock_lost = true;
                self.log
                    .record("lock", "lost", "lock was reaped or taken over by another job");
            }
            Err(err) => self.log.record("lock", "error", &format!("{err:#}")),
        }
    }

    fn fail(&mut self, reason: String) -> DistillOutcome {
        let phase = self.phase;
        self.log.record(
            DistillPhase::Failed.label(),
            "error",
            &format!("{} failed after {} attempt(s): {reason}", phase.label(), self.attempts),
        );
        self.phase = DistillPhase::Failed;
        DistillOutcome::Failed {
            phase,
            attempts: self.attempts,
            reason,
        }
    }
}

pub fn wrap_transcript(text: &str, entries: usize, truncated: bool) -> String {
    let truncated_attr = if truncated { " truncated=\"true\"" } else { "" };
    format!(
        "<transcript entries=\"{entries}\"{truncated_attr}>\n{text}\n</transcript>\n\nProduce the structured summary now."
    )
}

pub fn render_header(id: &SessionId, generated_at: &str, model: &str, entries: usize) -> String {
    format!(
        "<!-- seamless: {id} -->\n<!-- generated: {generated_at} -->\n<!-- model: {model} -->\n<!-- entries: {entries} -->\n"
    )
}

/// Run the job for the session the guard holds. The guard is released
/// before this returns.
pub fn run_pipeline(
    guard: LockGuard,
    ctx: &PipelineContext<'_>,
    transcript: &Path,
) -> DistillOutcome {
    let id = guard.session_id().clone();
    let mut job = Job {
        log: JobLog::for_session(ctx.paths, &id),
        guard: &guard,
        phase: DistillPhase::Idle,
        attempts: 0,
        lock_lost: false,
    };

    let outcome = if transcript.is_file() {
        job.enter(
            DistillPhase::Admitted,
            &format!(
                "model={} transcript={}",
                ctx.summarizer.model(),
                transcript.display()
            ),
        );
        match drive(&mut job, ctx, &id, transcript) {
            Ok(outcome) => outcome,
            Err(err) => job.fail(format!("{err:#}")),
        }
    } else {
        job.fail(format!("transcript not found: {}", transcript.display()))
    };

    let log = job.log.clone();
    if let Err(err) = guard.release() {
        log.record("lock", "error", &format!("failed to release lock: {err:#}"));
    }
    outcome
}

fn drive(
    job: &mut Job<'_>,
    ctx: &PipelineContext<'_>,
    id: &SessionId,
    transcript: &Path,
) -> Result<DistillOutcome> {
    job.enter(DistillPhase::Extracting, "reading transcript");
    let extraction = extract_full(transcript, ctx.cfg.max_chars, ctx.cfg.tool_result_max)?;
    if extraction.entries.is_empty() {
        return Ok(job.fail("no conversation content".to_string()));
    }
    job.log.record(
        DistillPhase::Extracting.label(),
        "ok",
        &format!(
            "extracted {} entries, {} chars",
            extraction.entries.len(),
            extraction.total_chars
        ),
    );

    let Some(summary) = summarize_with_retry(job, ctx, &extraction) else {
        let reason = format!("giving up after {MAX_ATTEMPTS} attempts");
        return Ok(job.fail(reason));
    };

    let metadata = persist(job, ctx, id, transcript, &extraction, &summary)?;
    Ok(DistillOutcome::Persisted(metadata))
}

fn summarize_with_retry(
    job: &mut Job<'_>,
    ctx: &PipelineContext<'_>,
    extraction: &Extraction,
) -> Option<String> {
    let text = extraction.entries.join("\n\n");
    let entries = extraction.entries.len();

    for attempt in 1..=MAX_ATTEMPTS {
        job.attempts = attempt;
        let payload = if attempt == 1 {
            wrap_transcript(&text, entries, false)
        } else {
            let half = text.chars().count() / 2;
            wrap_transcript(last_chars(&text, half), entries, true)
        };

        job.enter(
            DistillPhase::Summarizing,
            &format!(
                "attempt {attempt}: calling {} with {} chars",
                ctx.summarizer.model(),
                payload.chars().count()
            ),
        );
        let reason = match ctx.summarizer.summarize(
            &ctx.prompts.preamble,
            &payload,
            ctx.cfg.summarize_timeout(),
        ) {
            Ok(output) => {
                job.enter(
                    DistillPhase::Validating,
                    &format!("attempt {attempt}: got {} chars", output.chars().count()),
                );
                match check_summary(&output, ctx.cfg.min_result_chars) {
                    Ok(()) => return Some(output),
                    Err(rejection) => format!("output failed validation: {rejection}"),
                }
            }
            Err(err) => format!("{err:#}"),
        };

        job.log.record(
            job.phase.label(),
            "error",
            &format!("attempt {attempt} failed: {reason}"),
        );
        if attempt < MAX_ATTEMPTS {
            job.enter(DistillPhase::Retrying, "retrying with the trailing half of the transcript");
        }
    }
    None
}

fn persist(
    job: &mut Job<'_>,
    ctx: &PipelineContext<'_>,
    id: &SessionId,
    transcript: &Path,
    extraction: &Extraction,
    summary: &str,
) -> Result<SummaryMetadata> {
    let files = ctx.paths.session_files(id);
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let model = ctx.summarizer.model().to_string();
    let header = render_header(id, &generated_at, &model, extraction.entries.len());
    let base = format!("{header}\n{summary}");

    write_atomic(&files.summary, base.as_bytes())
        .with_context(|| format!("failed to write {}", files.summary.display()))?;

    let mut metadata = SummaryMetadata {
        session_id: id.clone(),
        generated_at,
        model,
        transcript_path: transcript.to_path_buf(),
        transcript_entries: extraction.entries.len(),
        transcript_chars: extraction.total_chars,
        transcript_byte_offset: extraction.bytes_consumed,
        summary_chars: summary.chars().count(),
        hooks_ran: Vec::new(),
    };
    write_metadata(&files.metadata, &metadata)?;
    job.enter(
        DistillPhase::Persisted,
        &format!("wrote {}", files.summary.display()),
    );

    let hook_ctx = HookContext {
        session_id: id,
        transcript,
        summary: &files.summary,
    };
    let guard = job.guard;
    let log = job.log.clone();
    let before_each = |name: &str| {
        if let Err(err) = guard.refresh() {
            log.record("hooks", "error", &format!("lock refresh before {name}: {err:#}"));
        }
    };
    let results = match hooks::run_all(
        &ctx.paths.hooks_dir,
        hook_ctx,
        ctx.cfg.hook_timeout(),
        &before_each,
    ) {
        Ok(results) => results,
        Err(err) => {
            job.log.record("hooks", "error", &format!("{err:#}"));
            return Ok(metadata);
        }
    };
    if results.is_empty() {
        return Ok(metadata);
    }

    for result in &results {
        let status = if result.run.timed_out {
            "timeout"
        } else if result.run.exit_code == 0 {
            "ok"
        } else {
            "error"
        };
        let message = match &result.error {
            Some(err) => format!("{} failed to start: {err}", result.run.name),
            None => format!("{} exited {}", result.run.name, result.run.exit_code),
        };
        job.log.record("hooks", status, &message);
    }

    let sections = hooks::format_sections(&results);
    if !sections.is_empty() {
        let enriched = format!("{base}\n\n---\n\n{sections}");
        if let Err(err) = write_atomic(&files.summary, enriched.as_bytes()) {
            job.log.record("hooks", "error", &format!("failed to append hook output: {err:#}"));
        }
    }

    metadata.hooks_ran = results.into_iter().map(|result| result.run).collect();
    if let Err(err) = write_metadata(&files.metadata, &metadata) {
        job.log.record("hooks", "error", &format!("{err:#}"));
    }
    Ok(metadata)
}

fn write_metadata(path: &Path, metadata: &SummaryMetadata) -> Result<()> {
    let data = serde_json::to_string_pretty(metadata)?;
    write_atomic(path, format!("{data}\n").as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seamless::audit::read_events;
    use crate::seamless::lock::{self, is_held, lock_path, read_lock_payload};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};

    struct StubSummarizer {
        responses: RefCell<VecDeque<Result<String>>>,
        payloads: RefCell<Vec<String>>,
        lock_file: PathBuf,
        lock_seen: RefCell<Vec<bool>>,
        during_call: Option<Box<dyn Fn(usize)>>,
    }

    impl StubSummarizer {
        fn new(lock_file: PathBuf, responses: Vec<Result<String>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                payloads: RefCell::new(Vec::new()),
                lock_file,
                lock_seen: RefCell::new(Vec::new()),
                during_call: None,
            }
        }

        /// Run `f` with the zero-based call index while each call is in flight.
        fn during_call(mut self, f: impl Fn(usize) + 'static) -> Self {
            self.during_call = Some(Box::new(f));
            self
        }
    }

    impl Summarizer for StubSummarizer {
        fn model(&self) -> &str {
            "stub-model"
        }

        fn summarize(&self, _preamble: &str, transcript: &str, _timeout: Duration) -> Result<String> {
            let call = self.payloads.borrow().len();
            self.payloads.borrow_mut().push(transcript.to_string());
            self.lock_seen.borrow_mut().push(self.lock_file.exists());
            if let Some(f) = &self.during_call {
                f(call);
            }
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok("short".to_string()))
        }
    }

    fn session() -> SessionId {
        SessionId::parse("a1b2c3d4-e5f6-7890-abcd-ef1234567890").expect("id")
    }

    fn valid_summary() -> String {
        let body = "## Session Summary\nFixed login.\n## Technical Context\nsrc/auth.rs\n## Next Steps\nShip it.\n";
        format!("{body}{}", "x".repeat(600 - body.len()))
    }

    fn write_transcript(dir: &Path, entries: usize) -> PathBuf {
        let path = dir.join("transcript.jsonl");
        let mut raw = String::new();
        for i in 0..entries {
            raw.push_str(
                &json!({"type": "user", "message": {"content": format!("request {i}")}}).to_string(),
            );
            raw.push('\n');
        }
        fs::write(&path, raw).expect("write transcript");
        path
    }

    fn held_guard(paths: &SeamlessPaths) -> LockGuard {
        LockGuard::acquire(paths, &session())
            .expect("acquire")
            .expect("held")
    }

    fn backdate_lock(paths: &SeamlessPaths, by: Duration) {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(lock_path(paths, &session()))
            .expect("open lock");
        file.set_modified(SystemTime::now() - by).expect("set mtime");
    }

    fn log_messages(paths: &SeamlessPaths) -> Vec<String> {
        read_events(&paths.session_files(&session()).log)
            .expect("log")
            .into_iter()
            .map(|event| event.message)
            .collect()
    }

    #[test]
    fn valid_response_persists_artifact_and_metadata() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 10);
        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(lock_path(&paths, &session()), vec![Ok(valid_summary())]);
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        let meta = match run_pipeline(held_guard(&paths), &ctx, &transcript) {
            DistillOutcome::Persisted(meta) => meta,
            other => panic!("expected persisted, got {other:?}"),
        };
        assert_eq!(meta.transcript_entries, 10);
        assert_eq!(meta.summary_chars, 600);
        assert_eq!(
            meta.transcript_byte_offset,
            fs::metadata(&transcript).expect("meta").len()
        );
        assert!(meta.hooks_ran.is_empty());

        let files = paths.session_files(&session());
        let md = fs::read_to_string(&files.summary).expect("md");
        assert!(md.starts_with(&format!("<!-- seamless: {} -->\n<!-- generated: ", session())));
        assert!(md.contains("<!-- model: stub-model -->\n<!-- entries: 10 -->\n\n## Session Summary"));

        let stored = load_metadata(&files.metadata).expect("metadata");
        assert_eq!(stored, meta);
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.metadata).expect("json")).expect("parse");
        assert!(raw.get("hooks_ran").is_none());

        assert_eq!(*stub.lock_seen.borrow(), vec![true]);
        assert!(!is_held(&paths, &session()));
    }

    #[test]
    fn short_response_fails_after_one_retry() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 10);
        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(
            lock_path(&paths, &session()),
            vec![Ok("tiny reply".to_string()), Ok("tiny reply".to_string())],
        );
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        let outcome = run_pipeline(held_guard(&paths), &ctx, &transcript);
        match outcome {
            DistillOutcome::Failed { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected failure, got {other:?}"),
        }

        let payloads = stub.payloads.borrow();
        assert_eq!(payloads.len(), 2);
        assert!(payloads[0].starts_with("<transcript entries=\"10\">\n"));
        assert!(payloads[1].starts_with("<transcript entries=\"10\" truncated=\"true\">\n"));
        assert!(payloads[1].len() < payloads[0].len());

        let files = paths.session_files(&session());
        assert!(!files.summary.exists());
        assert!(!files.metadata.exists());
        assert!(!is_held(&paths, &session()));

        let messages = log_messages(&paths);
        assert!(messages.iter().any(|m| m.starts_with("attempt 1 failed")));
        assert!(messages.iter().any(|m| m.starts_with("attempt 2 failed")));
        assert!(messages.last().expect("last").contains("giving up after 2 attempts"));
    }

    #[test]
    fn summarizer_error_then_valid_retry_persists() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 4);
        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(
            lock_path(&paths, &session()),
            vec![Err(anyhow::anyhow!("timed out after 300s")), Ok(valid_summary())],
        );
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        assert!(run_pipeline(held_guard(&paths), &ctx, &transcript).is_persisted());
        assert_eq!(stub.payloads.borrow().len(), 2);
        assert!(log_messages(&paths).iter().any(|m| m.contains("timed out after 300s")));
        assert!(!is_held(&paths, &session()));
    }

    #[test]
    fn progress_keeps_a_long_job_lock_fresh() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 6);
        let cfg = SeamlessConfig::default();
        let stale_during_call = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&stale_during_call);
        let watched = paths.clone();
        let max_age = cfg.lock_stale_after();
        let stub = StubSummarizer::new(
            lock_path(&paths, &session()),
            vec![Ok("tiny reply".to_string()), Ok(valid_summary())],
        )
        .during_call(move |call| {
            let stale = lock::is_stale(&watched, &session(), max_age).expect("stat");
            seen.borrow_mut().push(stale);
            if call == 0 {
                // The first call runs past the stale bound.
                backdate_lock(&watched, max_age + Duration::from_secs(60));
            }
        });
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        assert!(run_pipeline(held_guard(&paths), &ctx, &transcript).is_persisted());
        assert_eq!(*stale_during_call.borrow(), vec![false, false]);
        assert!(!is_held(&paths, &session()));
    }

    #[test]
    fn job_whose_lock_was_taken_over_leaves_the_new_lock_alone() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 6);
        let cfg = SeamlessConfig::default();
        let successor = Rc::new(RefCell::new(None));
        let taken = Rc::clone(&successor);
        let watched = paths.clone();
        let max_age = cfg.lock_stale_after();
        let stub = StubSummarizer::new(lock_path(&paths, &session()), vec![Ok(valid_summary())])
            .during_call(move |_| {
                backdate_lock(&watched, max_age + Duration::from_secs(60));
                assert!(lock::reap_if_stale(&watched, &session(), max_age).expect("reap"));
                *taken.borrow_mut() = lock::try_acquire(&watched, &session()).expect("acquire");
            });
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        assert!(run_pipeline(held_guard(&paths), &ctx, &transcript).is_persisted());

        let successor = successor.borrow().clone().expect("second job took the lock");
        let on_disk = read_lock_payload(&paths, &session())
            .expect("read")
            .expect("still held");
        assert_eq!(on_disk, successor);
        let lost = log_messages(&paths)
            .iter()
            .filter(|m| m.contains("lock was reaped or taken over"))
            .count();
        assert_eq!(lost, 1);
    }

    #[test]
    fn failure_leaves_previous_artifact_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let transcript = write_transcript(tmp.path(), 3);
        let files = paths.session_files(&session());
        paths.ensure_sessions_dir().expect("mkdir");
        fs::write(&files.summary, "previous summary").expect("seed");

        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(lock_path(&paths, &session()), Vec::new());
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };
        assert!(!run_pipeline(held_guard(&paths), &ctx, &transcript).is_persisted());
        assert_eq!(fs::read_to_string(&files.summary).expect("md"), "previous summary");
    }

    #[test]
    fn empty_or_missing_transcript_fails_without_calling_summarizer() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        let meta_only = tmp.path().join("meta.jsonl");
        fs::write(
            &meta_only,
            format!("{}\n", json!({"type": "user", "isMeta": true, "message": {"content": "x"}})),
        )
        .expect("write");
        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(lock_path(&paths, &session()), Vec::new());
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        match run_pipeline(held_guard(&paths), &ctx, &meta_only) {
            DistillOutcome::Failed { phase, reason, .. } => {
                assert_eq!(phase, DistillPhase::Extracting);
                assert_eq!(reason, "no conversation content");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!is_held(&paths, &session()));

        match run_pipeline(held_guard(&paths), &ctx, &tmp.path().join("absent.jsonl")) {
            DistillOutcome::Failed { phase, .. } => assert_eq!(phase, DistillPhase::Idle),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!is_held(&paths, &session()));
        assert!(stub.payloads.borrow().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn hook_output_is_appended_after_persist() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = SeamlessPaths::under(tmp.path().join("data"), tmp.path());
        fs::create_dir_all(&paths.hooks_dir).expect("mkdir");
        let hook = paths.hooks_dir.join("10-notes");
        fs::write(&hook, "#!/bin/sh\necho \"linked $SEAMLESS_SESSION_ID\"\n").expect("hook");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).expect("chmod");

        let transcript = write_transcript(tmp.path(), 2);
        let cfg = SeamlessConfig::default();
        let stub = StubSummarizer::new(lock_path(&paths, &session()), vec![Ok(valid_summary())]);
        let prompts = Prompts::default();
        let ctx = PipelineContext {
            cfg: &cfg,
            paths: &paths,
            summarizer: &stub,
            prompts: &prompts,
        };

        let DistillOutcome::Persisted(meta) = run_pipeline(held_guard(&paths), &ctx, &transcript)
        else {
            panic!("expected persisted");
        };
        assert_eq!(
            meta.hooks_ran,
            vec![HookRun {
                name: "10-notes".to_string(),
                exit_code: 0,
                timed_out: false
            }]
        );
        let md = fs::read_to_string(paths.session_files(&session()).summary).expect("md");
        assert!(md.ends_with(&format!(
            "{}\n\n---\n\n## Post-compaction: 10-notes\n\nlinked {}",
            valid_summary(),
            session()
        )));
    }
}
