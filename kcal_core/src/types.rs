//! Core domain types for kcal.
//!
//! This module defines the records the tracker persists:
//! - The user profile used to derive a daily calorie target
//! - Food and activity log entries
//! - Fasting session state and the fasting history
//! - The last-reset marker used by the day rollover check

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Profile Types
// ============================================================================

/// Biological sex used by the Mifflin-St Jeor equation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}' (expected male or female)", other)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
        }
    }
}

/// Habitual activity level, scaling BMR into total daily expenditure
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    /// TDEE multiplier applied to BMR
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            "active" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            other => Err(format!("unknown activity level '{}'", other)),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very-active",
        };
        f.write_str(label)
    }
}

/// The user's profile
///
/// `manual_limit`, when set, replaces the computed daily target. Applying it is
/// the caller's job; see [`crate::profile::effective_daily_target`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    /// Stored as `YYYY-MM-DD`; unparseable stored values load as `None`.
    #[serde(deserialize_with = "lenient_date")]
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: Gender,
    /// `None` selects the simpler variant where BMR itself is the target.
    pub activity_level: Option<ActivityLevel>,
    pub deficit_goal: f64,
    pub manual_limit: Option<f64>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            height_cm: 170.0,
            weight_kg: 70.0,
            gender: Gender::Male,
            activity_level: Some(ActivityLevel::Moderate),
            deficit_goal: 500.0,
            manual_limit: None,
        }
    }
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    // Any JSON value is accepted here so a bad birth date cannot sink the profile
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

// ============================================================================
// Calorie Log Types
// ============================================================================

/// Whether an entry adds or removes calories from the day's net
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Food,
    Activity,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Food => f.write_str("food"),
            EntryKind::Activity => f.write_str("activity"),
        }
    }
}

/// Kind of activity for activity entries
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySubtype {
    Walking,
    Running,
    Cycling,
    Swimming,
    Strength,
    Yoga,
    Other(String),
}

impl FromStr for ActivitySubtype {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("activity subtype cannot be empty".into());
        }
        Ok(match trimmed.to_lowercase().as_str() {
            "walking" | "walk" => ActivitySubtype::Walking,
            "running" | "run" => ActivitySubtype::Running,
            "cycling" | "bike" => ActivitySubtype::Cycling,
            "swimming" | "swim" => ActivitySubtype::Swimming,
            "strength" => ActivitySubtype::Strength,
            "yoga" => ActivitySubtype::Yoga,
            _ => ActivitySubtype::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for ActivitySubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivitySubtype::Walking => f.write_str("walking"),
            ActivitySubtype::Running => f.write_str("running"),
            ActivitySubtype::Cycling => f.write_str("cycling"),
            ActivitySubtype::Swimming => f.write_str("swimming"),
            ActivitySubtype::Strength => f.write_str("strength"),
            ActivitySubtype::Yoga => f.write_str("yoga"),
            ActivitySubtype::Other(s) => f.write_str(s),
        }
    }
}

/// A recorded food or activity entry. Never edited in place.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub name: String,
    pub calories: f64,
    pub logged_at: DateTime<Utc>,
    #[serde(default)]
    pub activity_subtype: Option<ActivitySubtype>,
}

/// User-submitted entry before it gets an id and timestamp
#[derive(Clone, Debug)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub name: String,
    pub calories: f64,
    pub activity_subtype: Option<ActivitySubtype>,
}

impl NewEntry {
    pub fn food(name: impl Into<String>, calories: f64) -> Self {
        Self {
            kind: EntryKind::Food,
            name: name.into(),
            calories,
            activity_subtype: None,
        }
    }

    pub fn activity(
        name: impl Into<String>,
        calories: f64,
        subtype: Option<ActivitySubtype>,
    ) -> Self {
        Self {
            kind: EntryKind::Activity,
            name: name.into(),
            calories,
            activity_subtype: subtype,
        }
    }
}

// ============================================================================
// Fasting Types
// ============================================================================

/// The in-progress fasting session
///
/// Persisted as `{active, started_at}`. Inconsistent combinations load as
/// `Idle`, so a start instant exists exactly when the session is active.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "RawFastingState", into = "RawFastingState")]
pub enum FastingState {
    #[default]
    Idle,
    Active { started_at: DateTime<Utc> },
}

#[derive(Serialize, Deserialize)]
struct RawFastingState {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
}

impl From<RawFastingState> for FastingState {
    fn from(raw: RawFastingState) -> Self {
        match (raw.active, raw.started_at) {
            (true, Some(started_at)) => FastingState::Active { started_at },
            _ => FastingState::Idle,
        }
    }
}

impl From<FastingState> for RawFastingState {
    fn from(state: FastingState) -> Self {
        match state {
            FastingState::Idle => RawFastingState {
                active: false,
                started_at: None,
            },
            FastingState::Active { started_at } => RawFastingState {
                active: true,
                started_at: Some(started_at),
            },
        }
    }
}

/// A completed fast
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FastingLog {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl FastingLog {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration_ms)
    }
}

// ============================================================================
// Rollover Marker
// ============================================================================

/// Milliseconds since the Unix epoch of the last observed day rollover.
/// Zero means the check has never run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct LastReset(pub i64);

impl LastReset {
    pub fn at(instant: DateTime<Utc>) -> Self {
        LastReset(instant.timestamp_millis())
    }

    pub fn instant(self) -> Option<DateTime<Utc>> {
        if self.0 == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_unparseable_dob_loads_as_none() {
        let json = r#"{"name":"Sam","date_of_birth":"not-a-date","height_cm":180.0}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "Sam");
        assert_eq!(profile.date_of_birth, None);
        assert_eq!(profile.height_cm, 180.0);
        // Missing fields fall back to defaults
        assert_eq!(profile.weight_kg, 70.0);
    }

    #[test]
    fn test_profile_non_string_dob_loads_as_none() {
        for dob in ["19900101", "true", r#"{"year":1990}"#, r#"["1990-01-01"]"#] {
            let json = format!(r#"{{"name":"Sam","date_of_birth":{},"weight_kg":82.0}}"#, dob);
            let profile: UserProfile = serde_json::from_str(&json).unwrap();
            assert_eq!(profile.name, "Sam");
            assert_eq!(profile.date_of_birth, None, "date_of_birth {}", dob);
            assert_eq!(profile.weight_kg, 82.0);
        }

        let profile: UserProfile =
            serde_json::from_str(r#"{"date_of_birth":" 1990-06-15 "}"#).unwrap();
        assert_eq!(profile.date_of_birth, NaiveDate::from_ymd_opt(1990, 6, 15));
    }

    #[test]
    fn test_fasting_state_active_without_start_is_idle() {
        let state: FastingState = serde_json::from_str(r#"{"active":true}"#).unwrap();
        assert_eq!(state, FastingState::Idle);

        let stale: FastingState = serde_json::from_str(
            r#"{"active":false,"started_at":"2026-03-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(stale, FastingState::Idle);
    }

    #[test]
    fn test_fasting_state_flat_shape() {
        let started_at = "2026-03-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let json = serde_json::to_value(FastingState::Active { started_at }).unwrap();
        assert_eq!(json["active"], true);
        assert_eq!(json["started_at"], "2026-03-01T08:00:00Z");

        let idle = serde_json::to_value(FastingState::Idle).unwrap();
        assert_eq!(idle["active"], false);
        assert!(idle["started_at"].is_null());
    }

    #[test]
    fn test_activity_subtype_parsing() {
        assert_eq!("Run".parse::<ActivitySubtype>().unwrap(), ActivitySubtype::Running);
        assert_eq!(
            "Rock climbing".parse::<ActivitySubtype>().unwrap(),
            ActivitySubtype::Other("Rock climbing".into())
        );
        assert!("  ".parse::<ActivitySubtype>().is_err());
    }

    #[test]
    fn test_activity_level_parsing() {
        assert_eq!("very-active".parse::<ActivityLevel>().unwrap(), ActivityLevel::VeryActive);
        for level in ActivityLevel::ALL {
            assert_eq!(level.to_string().parse::<ActivityLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_last_reset_zero_means_never() {
        assert_eq!(LastReset::default().instant(), None);
        let now = "2026-03-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(LastReset::at(now).instant(), Some(now));
    }
}
