use anyhow::Result;

use crate::commands::{Context, HookInput};
use crate::seamless::audit::last_entry_summary;
use crate::seamless::lock;
use crate::seamless::state;
use crate::seamless::thresholds::job_looks_dead;

const WRAPUP_NOTICE: &str = "[seamless] Context window is critically full.\n\n\
A session summary has been prepared in the background.\n\
Finish the current task, then tell the user to start a fresh session.\n\
Their context will be restored automatically.\n\n\
Do not start new tasks.\n";

/// Deliver at most one pending one-shot notice before the user's prompt.
pub fn run(ctx: &Context, stdin: &str) -> Result<String> {
    let Some(id) = HookInput::parse(stdin).and_then(|input| input.session_id()) else {
        return Ok(String::new());
    };

    let mut session = state::load(&ctx.paths, &id)?;
    let files = ctx.paths.session_files(&id);

    let lock_free_or_stale = !lock::is_held(&ctx.paths, &id)
        || lock::is_stale(&ctx.paths, &id, ctx.cfg.lock_stale_after())?;
    if session.error_notified.is_pending()
        && job_looks_dead(&session, files.summary.exists(), lock_free_or_stale)
    {
        session.error_notified.fire();
        state::save(&ctx.paths, &id, &session)?;
        let detail = last_entry_summary(&files.log).unwrap_or_else(|| "No log available.".to_string());
        return Ok(format!(
            "[seamless] Background compaction failed.\n\nLast log entry: {detail}\nFull log: {}\n",
            files.log.display()
        ));
    }

    if session.wrapup_at.is_some() && session.wrapup_injected.fire() {
        state::save(&ctx.paths, &id, &session)?;
        return Ok(WRAPUP_NOTICE.to_string());
    }

    Ok(String::new())
}
