//! Day-scoped calorie aggregation.
//!
//! Only entries whose timestamp falls on the reference instant's calendar day
//! (in the reference's own time zone) are counted. The host passes a
//! `DateTime<Local>`; nothing here converts between zones beyond that.

use crate::{EntryKind, LogEntry};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Totals for one calendar day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailySummary {
    pub consumed: f64,
    pub burned: f64,
    pub net: f64,
    pub remaining: f64,
    /// Net as a share of the target, for progress display. Not clamped.
    pub percentage: f64,
    pub is_over_limit: bool,
}

/// True when `instant` falls on the same calendar day as `reference`
pub fn same_local_day<Tz: TimeZone>(instant: &DateTime<Utc>, reference: &DateTime<Tz>) -> bool {
    instant.with_timezone(&reference.timezone()).date_naive() == reference.date_naive()
}

/// Entries logged on the reference day, newest first
pub fn entries_on<'a, Tz: TimeZone>(
    logs: &'a [LogEntry],
    reference: &'a DateTime<Tz>,
) -> impl Iterator<Item = &'a LogEntry> + 'a {
    logs.iter()
        .filter(move |entry| same_local_day(&entry.logged_at, reference))
}

/// Summarize the reference day's entries against `daily_target`
pub fn summarize<Tz: TimeZone>(
    logs: &[LogEntry],
    reference: &DateTime<Tz>,
    daily_target: f64,
) -> DailySummary {
    let mut consumed = 0.0;
    let mut burned = 0.0;

    for entry in entries_on(logs, reference) {
        match entry.kind {
            EntryKind::Food => consumed += entry.calories,
            EntryKind::Activity => burned += entry.calories,
        }
    }

    let net = consumed - burned;
    let remaining = daily_target - net;
    let percentage = if daily_target == 0.0 {
        0.0
    } else {
        net / daily_target * 100.0
    };

    DailySummary {
        consumed,
        burned,
        net,
        remaining,
        percentage,
        is_over_limit: remaining <= 0.0,
    }
}

/// Remove the entry with `id`, keeping the order of the rest.
///
/// Returns `None` and leaves `logs` untouched when no entry matches.
pub fn remove_entry(logs: &mut Vec<LogEntry>, id: Uuid) -> Option<LogEntry> {
    let index = logs.iter().position(|entry| entry.id == id)?;
    Some(logs.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn entry(kind: EntryKind, calories: f64, at: DateTime<FixedOffset>) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            kind,
            name: format!("{} {}", kind, calories),
            calories,
            logged_at: at.with_timezone(&Utc),
            activity_subtype: None,
        }
    }

    #[test]
    fn test_summary_totals() {
        let now = local(2026, 3, 10, 18, 0);
        let logs = vec![
            entry(EntryKind::Food, 650.0, now - Duration::hours(1)),
            entry(EntryKind::Activity, 300.0, now - Duration::hours(3)),
            entry(EntryKind::Food, 400.0, now - Duration::hours(8)),
        ];

        let summary = summarize(&logs, &now, 2000.0);
        assert_eq!(summary.consumed, 1050.0);
        assert_eq!(summary.burned, 300.0);
        assert_eq!(summary.net, 750.0);
        assert_eq!(summary.remaining, 1250.0);
        assert_eq!(summary.percentage, 37.5);
        assert!(!summary.is_over_limit);
    }

    #[test]
    fn test_yesterday_late_entry_excluded() {
        let now = local(2026, 3, 10, 0, 5);
        let logs = vec![
            entry(EntryKind::Food, 900.0, local(2026, 3, 9, 23, 59)),
            entry(EntryKind::Food, 100.0, local(2026, 3, 10, 0, 1)),
        ];

        let summary = summarize(&logs, &now, 2000.0);
        assert_eq!(summary.consumed, 100.0);
        assert_eq!(entries_on(&logs, &now).count(), 1);
    }

    #[test]
    fn test_day_boundary_uses_reference_zone() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2
        let logged = Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap();
        assert!(same_local_day(&logged, &local(2026, 3, 10, 12, 0)));
        // but still the 9th in UTC
        let utc_reference = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert!(!same_local_day(&logged, &utc_reference));
    }

    #[test]
    fn test_remaining_identity_holds() {
        let now = local(2026, 3, 10, 20, 0);
        let target = 1850.5;
        let mut logs = Vec::new();
        for i in 0..12 {
            let kind = if i % 3 == 0 { EntryKind::Activity } else { EntryKind::Food };
            logs.push(entry(kind, 37.25 * i as f64, now - Duration::minutes(i * 45)));
            let s = summarize(&logs, &now, target);
            assert_eq!(s.remaining, target - (s.consumed - s.burned));
            assert_eq!(s.net, s.consumed - s.burned);
        }
    }

    #[test]
    fn test_over_limit_and_negative_remaining() {
        let now = local(2026, 3, 10, 21, 0);
        let logs = vec![entry(EntryKind::Food, 2200.0, now)];
        let summary = summarize(&logs, &now, 2000.0);
        assert_eq!(summary.remaining, -200.0);
        assert!(summary.is_over_limit);

        let exact = vec![entry(EntryKind::Food, 2000.0, now)];
        assert!(summarize(&exact, &now, 2000.0).is_over_limit);
    }

    #[test]
    fn test_zero_target_percentage_is_zero() {
        let now = local(2026, 3, 10, 9, 0);
        let logs = vec![entry(EntryKind::Food, 500.0, now)];
        let summary = summarize(&logs, &now, 0.0);
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.is_over_limit);
    }

    #[test]
    fn test_remove_entry_preserves_order() {
        let now = local(2026, 3, 10, 9, 0);
        let mut logs: Vec<LogEntry> = (0..4)
            .map(|i| entry(EntryKind::Food, 100.0 * i as f64, now))
            .collect();
        let ids: Vec<Uuid> = logs.iter().map(|e| e.id).collect();

        let removed = remove_entry(&mut logs, ids[1]).unwrap();
        assert_eq!(removed.id, ids[1]);
        let remaining: Vec<Uuid> = logs.iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);

        assert!(remove_entry(&mut logs, Uuid::new_v4()).is_none());
        assert_eq!(logs.len(), 3);
    }
}
