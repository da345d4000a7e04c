//! Fasting session state machine and metabolic stages.
//!
//! `FastingState` is either `Idle` or `Active { started_at }`:
//! - `start` moves Idle → Active
//! - `end` moves Active → Idle and yields a [`FastingLog`]
//!
//! Elapsed time is clamped at zero so clock skew never shows a negative fast.
//! Stage lookup and the milestone list share [`STAGES`].

use crate::{FastingLog, FastingState};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Default fasting goal used for the progress display
pub const DEFAULT_GOAL_HOURS: f64 = 16.0;

/// A named metabolic phase starting at `from_hours` of elapsed fasting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FastingStage {
    pub from_hours: u32,
    pub name: &'static str,
    pub description: &'static str,
}

/// Ordered by `from_hours`; each stage runs until the next one begins.
pub const STAGES: [FastingStage; 7] = [
    FastingStage {
        from_hours: 0,
        name: "Fed State",
        description: "Digesting and absorbing the last meal",
    },
    FastingStage {
        from_hours: 4,
        name: "Early Fasting",
        description: "Insulin falls and stored glycogen takes over",
    },
    FastingStage {
        from_hours: 12,
        name: "Glycogen Depletion",
        description: "Liver glycogen runs low and fat burning ramps up",
    },
    FastingStage {
        from_hours: 24,
        name: "Ketosis Initiation",
        description: "Ketone production becomes a meaningful fuel source",
    },
    FastingStage {
        from_hours: 48,
        name: "Deep Ketosis",
        description: "Ketones supply much of the brain's energy",
    },
    FastingStage {
        from_hours: 72,
        name: "Autophagy Activation",
        description: "Cellular cleanup processes are strongly upregulated",
    },
    FastingStage {
        from_hours: 96,
        name: "Protein Conservation",
        description: "The body spares muscle protein and relies on fat",
    },
];

/// Index into [`STAGES`] for the given elapsed hours.
///
/// Brackets are half-open with the lower bound inclusive. Negative or NaN
/// hours map to the first stage.
pub fn stage_index(elapsed_hours: f64) -> usize {
    STAGES
        .iter()
        .rposition(|stage| elapsed_hours >= f64::from(stage.from_hours))
        .unwrap_or(0)
}

pub fn stage_for(elapsed_hours: f64) -> &'static FastingStage {
    &STAGES[stage_index(elapsed_hours)]
}

/// A stage as shown in the milestone list
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Milestone {
    pub stage: &'static FastingStage,
    pub reached: bool,
    pub current: bool,
}

/// Every stage, flagged reached/current for the given elapsed hours
pub fn milestones(elapsed_hours: f64) -> Vec<Milestone> {
    let current = stage_index(elapsed_hours);
    STAGES
        .iter()
        .enumerate()
        .map(|(i, stage)| Milestone {
            stage,
            reached: i <= current,
            current: i == current,
        })
        .collect()
}

/// Display progress toward `goal_hours`, capped at 100. Does not gate `end`.
pub fn progress_percent(elapsed_hours: f64, goal_hours: f64) -> f64 {
    if !(goal_hours > 0.0) || !(elapsed_hours > 0.0) {
        return 0.0;
    }
    (elapsed_hours / goal_hours * 100.0).min(100.0)
}

/// Elapsed duration as fractional hours
pub fn hours(elapsed: Duration) -> f64 {
    elapsed.num_milliseconds() as f64 / 3_600_000.0
}

impl FastingState {
    pub fn is_active(&self) -> bool {
        matches!(self, FastingState::Active { .. })
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FastingState::Idle => None,
            FastingState::Active { started_at } => Some(*started_at),
        }
    }

    /// Begin a fast at `at` (which may be backdated).
    ///
    /// Returns false, keeping the original start, if a fast is already running.
    pub fn start(&mut self, at: DateTime<Utc>) -> bool {
        if let FastingState::Active { started_at } = self {
            tracing::debug!("Fast already active since {}, ignoring start", started_at);
            return false;
        }
        *self = FastingState::Active { started_at: at };
        tracing::debug!("Fast started at {}", at);
        true
    }

    /// End the current fast, returning its history record.
    ///
    /// Always leaves the state Idle; yields nothing if no fast was running.
    pub fn end(&mut self, now: DateTime<Utc>) -> Option<FastingLog> {
        let previous = std::mem::take(self);
        let FastingState::Active { started_at } = previous else {
            tracing::debug!("No active fast to end");
            return None;
        };

        let duration = clamp_non_negative(now - started_at);
        tracing::debug!("Fast ended after {} minutes", duration.num_minutes());
        Some(FastingLog {
            id: Uuid::new_v4(),
            started_at,
            ended_at: now,
            duration_ms: duration.num_milliseconds(),
        })
    }

    /// Time since the fast started, zero when idle or if `now` precedes the start
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self {
            FastingState::Idle => Duration::zero(),
            FastingState::Active { started_at } => clamp_non_negative(now - *started_at),
        }
    }

    /// Snapshot for display
    pub fn status(&self, now: DateTime<Utc>, goal_hours: f64) -> FastingStatus {
        let elapsed = self.elapsed(now);
        let elapsed_hours = hours(elapsed);
        FastingStatus {
            active: self.is_active(),
            started_at: self.started_at(),
            elapsed_seconds: elapsed.num_seconds(),
            elapsed_hours,
            stage: stage_for(elapsed_hours),
            progress: progress_percent(elapsed_hours, goal_hours),
            goal_hours,
        }
    }
}

/// Everything the fasting view needs at one instant
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FastingStatus {
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
    pub elapsed_hours: f64,
    pub stage: &'static FastingStage,
    pub progress: f64,
    pub goal_hours: f64,
}

impl FastingStatus {
    /// Elapsed time as `HH:MM:SS`; hours are not wrapped at 24
    pub fn elapsed_clock(&self) -> String {
        let total = self.elapsed_seconds.max(0);
        format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    }
}

fn clamp_non_negative(d: Duration) -> Duration {
    d.max(Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_start_then_end_same_instant() {
        let mut state = FastingState::Idle;
        assert!(state.start(at(8, 0)));
        assert!(state.is_active());

        let log = state.end(at(8, 0)).unwrap();
        assert_eq!(log.duration_ms, 0);
        assert_eq!(log.started_at, at(8, 0));
        assert_eq!(log.ended_at, at(8, 0));
        assert_eq!(state, FastingState::Idle);
    }

    #[test]
    fn test_end_records_duration() {
        let mut state = FastingState::Idle;
        state.start(at(6, 0));
        let log = state.end(at(22, 30)).unwrap();
        assert_eq!(log.duration(), Duration::minutes(16 * 60 + 30));
    }

    #[test]
    fn test_end_while_idle_is_noop() {
        let mut state = FastingState::Idle;
        assert!(state.end(at(9, 0)).is_none());
        assert_eq!(state, FastingState::Idle);
    }

    #[test]
    fn test_start_while_active_keeps_original() {
        let mut state = FastingState::Idle;
        state.start(at(6, 0));
        assert!(!state.start(at(7, 0)));
        assert_eq!(state.started_at(), Some(at(6, 0)));
    }

    #[test]
    fn test_elapsed_never_negative() {
        let mut state = FastingState::Idle;
        assert_eq!(state.elapsed(at(10, 0)), Duration::zero());

        state.start(at(10, 0));
        assert_eq!(state.elapsed(at(9, 0)), Duration::zero());
        assert_eq!(state.elapsed(at(12, 15)), Duration::minutes(135));

        // Ending before the start still yields a zero-length log
        let log = state.end(at(9, 0)).unwrap();
        assert_eq!(log.duration_ms, 0);
    }

    #[test]
    fn test_stage_boundaries_belong_to_upper_bracket() {
        let expected = [
            (0.0, "Fed State"),
            (3.99, "Fed State"),
            (4.0, "Early Fasting"),
            (12.0, "Glycogen Depletion"),
            (24.0, "Ketosis Initiation"),
            (48.0, "Deep Ketosis"),
            (72.0, "Autophagy Activation"),
            (96.0, "Protein Conservation"),
            (500.0, "Protein Conservation"),
        ];
        for (hours, name) in expected {
            assert_eq!(stage_for(hours).name, name, "at {} hours", hours);
        }
        assert_eq!(stage_for(-5.0).name, "Fed State");
        assert_eq!(stage_for(f64::NAN).name, "Fed State");
    }

    #[test]
    fn test_stage_monotonic() {
        let mut last = 0;
        for tenth in 0..=2000 {
            let idx = stage_index(tenth as f64 / 10.0);
            assert!(idx >= last, "stage went backwards at {}", tenth);
            last = idx;
        }
        assert_eq!(last, STAGES.len() - 1);
    }

    #[test]
    fn test_milestones_agree_with_stage() {
        for h in [0.0, 5.0, 30.0, 100.0] {
            let list = milestones(h);
            assert_eq!(list.len(), STAGES.len());
            let current: Vec<_> = list.iter().filter(|m| m.current).collect();
            assert_eq!(current.len(), 1);
            assert_eq!(current[0].stage, stage_for(h));
            let reached = list.iter().filter(|m| m.reached).count();
            assert_eq!(reached, stage_index(h) + 1);
        }
    }

    #[test]
    fn test_progress_capped() {
        assert_eq!(progress_percent(8.0, 16.0), 50.0);
        assert_eq!(progress_percent(40.0, 16.0), 100.0);
        assert_eq!(progress_percent(5.0, 0.0), 0.0);
        assert_eq!(progress_percent(-1.0, 16.0), 0.0);
    }

    #[test]
    fn test_status_snapshot() {
        let mut state = FastingState::Idle;
        state.start(at(2, 0));
        let status = state.status(at(14, 30), DEFAULT_GOAL_HOURS);
        assert!(status.active);
        assert_eq!(status.elapsed_hours, 12.5);
        assert_eq!(status.stage.name, "Glycogen Depletion");
        assert_eq!(status.elapsed_clock(), "12:30:00");
        assert_eq!(status.progress, 12.5 / 16.0 * 100.0);

        let idle = FastingState::Idle.status(at(14, 30), DEFAULT_GOAL_HOURS);
        assert!(!idle.active);
        assert_eq!(idle.elapsed_seconds, 0);
        assert_eq!(idle.stage.name, "Fed State");
    }
}
