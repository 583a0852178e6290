use crate::seamless::state::SessionState;
use crate::seamless::thresholds::job_looks_dead;

const BAR_CELLS: usize = 20;
pub const PLACEHOLDER_LINE: &str = "seamless: --% ░░░░░░░░░░░░░░░░░░░░";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Idle,
    Compacting,
    Ready,
    Wrapup,
    Error,
}

impl DisplayStatus {
    pub fn icon(self) -> &'static str {
        match self {
            DisplayStatus::Idle => "",
            DisplayStatus::Compacting => "🔄",
            DisplayStatus::Ready => "✅",
            DisplayStatus::Wrapup => "⚠️",
            DisplayStatus::Error => "❌",
        }
    }
}

pub fn build_bar(pct: f64) -> String {
    let filled = ((pct / 100.0) * BAR_CELLS as f64).round().clamp(0.0, BAR_CELLS as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

pub fn resolve_status(
    state: &SessionState,
    pct: f64,
    wrapup_pct: f64,
    summary_exists: bool,
    lock_free_or_stale: bool,
) -> DisplayStatus {
    if pct >= wrapup_pct {
        DisplayStatus::Wrapup
    } else if state.compact_at.is_some() && summary_exists {
        DisplayStatus::Ready
    } else if job_looks_dead(state, summary_exists, lock_free_or_stale) {
        DisplayStatus::Error
    } else if state.compact_at.is_some() {
        DisplayStatus::Compacting
    } else {
        DisplayStatus::Idle
    }
}

pub fn format_line(pct: f64, status: DisplayStatus, short_id: &str) -> String {
    let mut line = format!("seamless: {}% {}", pct.round() as i64, build_bar(pct));
    if !status.icon().is_empty() {
        line.push(' ');
        line.push_str(status.icon());
    }
    if status != DisplayStatus::Idle {
        line.push(' ');
        line.push_str(short_id);
    }
    line
}
