use anyhow::{Result, bail};
use std::path::Path;

use crate::commands::{CommandReport, Context};
use crate::error::SeamlessError;
use crate::seamless::audit::JobLog;
use crate::seamless::distill::{DistillOutcome, PipelineContext, run_pipeline};
use crate::seamless::lock::{self, LockGuard};
use crate::seamless::session_id::SessionId;
use crate::seamless::summarizer::{Prompts, Summarizer, build_summarizer};

/// Resolve prompts, falling back to the built-in ones when the configured
/// prompt file cannot be used.
pub fn resolve_prompts(ctx: &Context, log: &JobLog) -> Prompts {
    Prompts::load(&ctx.cfg).unwrap_or_else(|err| {
        log.record("prompt", "fallback", &format!("{err:#}"));
        Prompts::default()
    })
}

/// Run the pipeline for a lock this process already owns and turn the
/// outcome into a report, or an error when nothing was persisted.
pub fn distill_with_guard(
    ctx: &Context,
    guard: LockGuard,
    transcript: &Path,
    summarizer: &dyn Summarizer,
    prompts: &Prompts,
    command: &str,
) -> Result<CommandReport> {
    let pipeline = PipelineContext {
        cfg: &ctx.cfg,
        paths: &ctx.paths,
        summarizer,
        prompts,
    };
    let id = guard.session_id().clone();
    match run_pipeline(guard, &pipeline, transcript) {
        DistillOutcome::Persisted(meta) => {
            let mut report = CommandReport::new(command);
            report.detail(format!("session={}", meta.session_id));
            report.detail(format!(
                "summary={}",
                ctx.paths.session_files(&id).summary.display()
            ));
            report.detail(format!(
                "entries={} chars={} byte_offset={}",
                meta.transcript_entries, meta.transcript_chars, meta.transcript_byte_offset
            ));
            report.detail(format!("summary_chars={}", meta.summary_chars));
            for hook in &meta.hooks_ran {
                report.detail(format!(
                    "hook={} exit_code={} timed_out={}",
                    hook.name, hook.exit_code, hook.timed_out
                ));
            }
            Ok(report)
        }
        DistillOutcome::Failed {
            phase,
            attempts,
            reason,
        } => bail!(
            "distillation failed in {} after {attempts} attempt(s): {reason}; log: {}",
            phase.label(),
            ctx.paths.session_files(&id).log.display()
        ),
    }
}

/// The detached worker. With a token the launcher's lock is taken over and
/// must still carry that token; a manual run takes the lock itself.
pub fn run(
    ctx: &Context,
    raw_id: &str,
    transcript: &Path,
    lock_token: Option<&str>,
) -> Result<CommandReport> {
    let id = SessionId::parse(raw_id)?;
    let log = JobLog::for_session(&ctx.paths, &id);
    let guard = match lock_token {
        Some(token) => match LockGuard::adopt(&ctx.paths, &id, token) {
            Ok(guard) => guard,
            Err(err) => {
                log.record("lock", "refused", &format!("{err:#}"));
                return Err(err);
            }
        },
        None => {
            lock::reap_if_stale(&ctx.paths, &id, ctx.cfg.lock_stale_after())?;
            match LockGuard::acquire(&ctx.paths, &id)? {
                Some(guard) => guard,
                None => {
                    log.record("lock", "busy", "another job holds the lock");
                    bail!("a distillation job is already running for {id}");
                }
            }
        }
    };

    if !transcript.is_file() {
        log.record(
            "idle",
            "error",
            &format!("transcript not found: {}", transcript.display()),
        );
        drop(guard);
        return Err(SeamlessError::TranscriptMissing(transcript.to_path_buf()).into());
    }

    let prompts = resolve_prompts(ctx, &log);
    let summarizer = match build_summarizer(&ctx.cfg, &prompts) {
        Ok(summarizer) => summarizer,
        Err(err) => {
            log.record("idle", "error", &format!("{err:#}"));
            return Err(err);
        }
    };
    distill_with_guard(ctx, guard, transcript, summarizer.as_ref(), &prompts, "compact")
}
