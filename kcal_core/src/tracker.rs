//! The state container.
//!
//! `Tracker` owns every persisted record and is the only thing that mutates
//! them. Each accepted mutation is applied to the stored record under its
//! write lock and saved immediately, so edits from another process in the
//! meantime are kept. Rejected input leaves both memory and storage
//! untouched. The pure modules (`profile`, `ledger`,
//! `fasting`) receive snapshots of this state and never reach for it
//! themselves.

use crate::fasting::FastingStatus;
use crate::ledger::{self, DailySummary};
use crate::profile;
use crate::store::{self, RecordStore};
use crate::{
    Error, EntryKind, FastingLog, FastingState, LastReset, LogEntry, NewEntry, Result,
    UserProfile,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

/// How far in the future a fast start may be stamped before it is rejected
const START_TOLERANCE_SECS: i64 = 60;

pub struct Tracker<S: RecordStore> {
    store: S,
    profile: UserProfile,
    entries: Vec<LogEntry>,
    fasting_logs: Vec<FastingLog>,
    fasting: FastingState,
    last_reset: LastReset,
}

impl<S: RecordStore> Tracker<S> {
    /// Load every record from `store`, each falling back to its default
    pub fn open(store: S) -> Self {
        let mut tracker = Self {
            store,
            profile: UserProfile::default(),
            entries: Vec::new(),
            fasting_logs: Vec::new(),
            fasting: FastingState::Idle,
            last_reset: LastReset::default(),
        };
        tracker.reload();
        tracker
    }

    /// Re-read all records, picking up changes made by another process
    pub fn reload(&mut self) {
        self.profile = store::load(&self.store);
        self.entries = store::load(&self.store);
        self.fasting_logs = store::load(&self.store);
        self.fasting = store::load(&self.store);
        self.last_reset = store::load(&self.store);
        tracing::debug!(
            entries = self.entries.len(),
            fasts = self.fasting_logs.len(),
            active = self.fasting.is_active(),
            "Tracker state loaded"
        );
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// All entries, newest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Completed fasts, newest first
    pub fn fasting_logs(&self) -> &[FastingLog] {
        &self.fasting_logs
    }

    pub fn fasting_state(&self) -> &FastingState {
        &self.fasting
    }

    pub fn last_reset(&self) -> LastReset {
        self.last_reset
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Replace the profile wholesale
    pub fn save_profile(&mut self, profile: UserProfile) -> Result<()> {
        validate_profile(&profile)?;
        store::save(&self.store, &profile)?;
        self.profile = profile;
        tracing::info!("Profile saved");
        Ok(())
    }

    /// Effective daily target on `today`: the manual limit if set, else derived
    pub fn daily_target(&self, today: NaiveDate) -> f64 {
        profile::effective_daily_target(&self.profile, today)
    }

    // ------------------------------------------------------------------
    // Calorie log
    // ------------------------------------------------------------------

    /// Record a new entry stamped `now`
    pub fn add_entry(&mut self, new: NewEntry, now: DateTime<Utc>) -> Result<LogEntry> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::invalid("entry name cannot be empty"));
        }
        if !(new.calories.is_finite() && new.calories >= 0.0) {
            return Err(Error::invalid(format!(
                "calories must be a non-negative number, got {}",
                new.calories
            )));
        }

        let entry = LogEntry {
            id: Uuid::new_v4(),
            kind: new.kind,
            name: name.to_string(),
            calories: new.calories,
            logged_at: now,
            activity_subtype: match new.kind {
                EntryKind::Activity => new.activity_subtype,
                EntryKind::Food => None,
            },
        };

        let (entries, _) = store::update(&self.store, |entries: &mut Vec<LogEntry>| {
            entries.insert(0, entry.clone());
            Ok(Some(()))
        })?;
        self.entries = entries;

        tracing::info!(id = %entry.id, kind = %entry.kind, calories = entry.calories, "Entry added");
        Ok(entry)
    }

    /// Delete an entry; unknown ids are a no-op and nothing is written
    pub fn delete_entry(&mut self, id: Uuid) -> Result<Option<LogEntry>> {
        let (entries, removed) = store::update(&self.store, |entries: &mut Vec<LogEntry>| {
            Ok(ledger::remove_entry(entries, id))
        })?;
        self.entries = entries;

        match removed {
            Some(_) => tracing::info!(%id, "Entry deleted"),
            None => tracing::debug!(%id, "No entry to delete"),
        }
        Ok(removed)
    }

    /// Summary for the calendar day of `now` in `now`'s time zone
    pub fn today_summary<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DailySummary {
        let target = self.daily_target(now.date_naive());
        ledger::summarize(&self.entries, now, target)
    }

    /// Entries on the calendar day of `now`, newest first
    pub fn entries_on<'a, Tz: TimeZone>(&'a self, now: &'a DateTime<Tz>) -> Vec<&'a LogEntry> {
        ledger::entries_on(&self.entries, now).collect()
    }

    // ------------------------------------------------------------------
    // Fasting
    // ------------------------------------------------------------------

    /// Start a fast at `at`. Returns false if one was already running.
    ///
    /// `at` may be backdated but not stamped more than a minute past `now`.
    pub fn start_fast(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
        if at > now + Duration::seconds(START_TOLERANCE_SECS) {
            return Err(Error::invalid(format!(
                "fast start {} is in the future",
                at.to_rfc3339()
            )));
        }

        let (state, started) = store::update(&self.store, |state: &mut FastingState| {
            Ok(state.start(at).then_some(()))
        })?;
        self.fasting = state;

        if started.is_none() {
            return Ok(false);
        }
        tracing::info!(started_at = %at, "Fast started");
        Ok(true)
    }

    /// End the running fast, prepending its log to the history.
    ///
    /// The idle state is written first, so a retry after a failed history
    /// write cannot log the same fast twice. If the history write fails the
    /// fast is put back and the error returned.
    pub fn end_fast(&mut self, now: DateTime<Utc>) -> Result<Option<FastingLog>> {
        // Idle is persisted either way so a stale record cannot linger
        let (state, ended) = store::update(&self.store, |state: &mut FastingState| {
            Ok(Some(state.end(now)))
        })?;
        self.fasting = state;

        let Some(log) = ended.flatten() else {
            return Ok(None);
        };

        let prepended = store::update(&self.store, |history: &mut Vec<FastingLog>| {
            history.insert(0, log.clone());
            Ok(Some(()))
        });
        let history = match prepended {
            Ok((history, _)) => history,
            Err(e) => {
                self.restore_fast(log.started_at);
                return Err(e);
            }
        };
        self.fasting_logs = history;

        tracing::info!(id = %log.id, minutes = log.duration().num_minutes(), "Fast ended");
        Ok(Some(log))
    }

    fn restore_fast(&mut self, started_at: DateTime<Utc>) {
        let state = FastingState::Active { started_at };
        match store::save(&self.store, &state) {
            Ok(()) => self.fasting = state,
            Err(e) => tracing::error!("Failed to restore fast after history write error: {}", e),
        }
    }

    /// Delete a completed fast; unknown ids are a no-op
    pub fn delete_fasting_log(&mut self, id: Uuid) -> Result<Option<FastingLog>> {
        let (history, removed) = store::update(&self.store, |history: &mut Vec<FastingLog>| {
            let index = history.iter().position(|log| log.id == id);
            Ok(index.map(|index| history.remove(index)))
        })?;
        self.fasting_logs = history;

        if removed.is_some() {
            tracing::info!(%id, "Fasting log deleted");
        }
        Ok(removed)
    }

    pub fn fasting_status(&self, now: DateTime<Utc>, goal_hours: f64) -> FastingStatus {
        self.fasting.status(now, goal_hours)
    }

    // ------------------------------------------------------------------
    // Day rollover
    // ------------------------------------------------------------------

    /// Record `now` as the last reset if its calendar day differs from the
    /// stored marker's. Returns whether a rollover was recorded.
    ///
    /// Logs are left alone; day-scoped summaries pick up the new day on their
    /// own. Calling this again on the same day changes nothing.
    pub fn check_rollover<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<bool> {
        let today = now.date_naive();
        let (marker, rolled) = store::update(&self.store, |marker: &mut LastReset| {
            let last_day = marker
                .instant()
                .map(|instant| instant.with_timezone(&now.timezone()).date_naive());
            if last_day == Some(today) {
                return Ok(None);
            }
            *marker = LastReset::at(now.with_timezone(&Utc));
            Ok(Some(()))
        })?;
        self.last_reset = marker;

        if rolled.is_none() {
            return Ok(false);
        }
        tracing::info!(%today, "Day rollover recorded");
        Ok(true)
    }
}

fn validate_profile(profile: &UserProfile) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(profile.height_cm) {
        return Err(Error::invalid("height must be a positive number of centimetres"));
    }
    if !positive(profile.weight_kg) {
        return Err(Error::invalid("weight must be a positive number of kilograms"));
    }
    if !(profile.deficit_goal.is_finite() && profile.deficit_goal >= 0.0) {
        return Err(Error::invalid("deficit goal must be a non-negative number"));
    }
    if let Some(limit) = profile.manual_limit {
        if !positive(limit) {
            return Err(Error::invalid("manual limit must be a positive number"));
        }
    }
    Ok(())
}
