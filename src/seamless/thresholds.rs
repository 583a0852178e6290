use crate::seamless::state::SessionState;

/// Rising edge on the compaction threshold: admit once per state record.
pub fn should_admit_job(state: &SessionState, pct: f64, compact_threshold: f64) -> bool {
    pct >= compact_threshold && state.compact_at.is_none()
}

pub fn should_arm_wrapup(state: &SessionState, pct: f64, wrapup_threshold: f64) -> bool {
    pct >= wrapup_threshold && state.wrapup_at.is_none()
}

/// A job was admitted but produced no artifact and nothing is still running.
pub fn job_looks_dead(state: &SessionState, summary_exists: bool, lock_free_or_stale: bool) -> bool {
    state.compact_at.is_some() && !summary_exists && lock_free_or_stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seamless::session_id::SessionId;
    use chrono::Utc;

    fn fresh() -> SessionState {
        SessionState::new(SessionId::parse("a1b2c3d4-e5f6-7890-abcd-ef1234567890").expect("id"))
    }

    #[test]
    fn admit_truth_table() {
        let mut state = fresh();
        assert!(!should_admit_job(&state, 69.9, 70.0));
        assert!(should_admit_job(&state, 70.0, 70.0));
        assert!(should_admit_job(&state, 95.0, 70.0));

        state.compact_at = Some(Utc::now());
        assert!(!should_admit_job(&state, 69.9, 70.0));
        assert!(!should_admit_job(&state, 70.0, 70.0));
        assert!(!should_admit_job(&state, 95.0, 70.0));
    }

    #[test]
    fn wrapup_arms_once() {
        let mut state = fresh();
        assert!(!should_arm_wrapup(&state, 89.0, 90.0));
        assert!(should_arm_wrapup(&state, 90.0, 90.0));
        state.wrapup_at = Some(Utc::now());
        assert!(!should_arm_wrapup(&state, 99.0, 90.0));
    }

    #[test]
    fn dead_job_needs_admission_and_no_artifact() {
        let mut state = fresh();
        assert!(!job_looks_dead(&state, false, true));
        state.compact_at = Some(Utc::now());
        assert!(job_looks_dead(&state, false, true));
        assert!(!job_looks_dead(&state, true, true));
        assert!(!job_looks_dead(&state, false, false));
    }
}
