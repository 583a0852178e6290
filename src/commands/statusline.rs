use anyhow::Result;

use crate::commands::Context;
use crate::seamless::lock;
use crate::seamless::monitor::{JobLauncher, TurnObservation, observe_turn};
use crate::seamless::statusline::{PLACEHOLDER_LINE, format_line, resolve_status};

/// Per-turn entry point: run the monitor, then render the display line.
pub fn run(ctx: &Context, stdin: &str, launcher: &dyn JobLauncher) -> Result<String> {
    let Ok(turn) = TurnObservation::from_hook_json(stdin) else {
        return Ok(format!("{PLACEHOLDER_LINE}\n"));
    };

    let outcome = observe_turn(&ctx.cfg, &ctx.paths, &turn, launcher)?;

    let id = &turn.session_id;
    let summary_exists = ctx.paths.session_files(id).summary.exists();
    let lock_free_or_stale =
        !lock::is_held(&ctx.paths, id) || lock::is_stale(&ctx.paths, id, ctx.cfg.lock_stale_after())?;
    let status = resolve_status(
        &outcome.state,
        turn.pct,
        ctx.cfg.wrapup_pct,
        summary_exists,
        lock_free_or_stale,
    );
    Ok(format!("{}\n", format_line(turn.pct, status, id.short())))
}
