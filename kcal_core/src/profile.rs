//! Daily calorie target derivation.
//!
//! Uses the Mifflin-St Jeor equation for BMR, scaled by the activity
//! multiplier and reduced by the deficit goal:
//! - Male:   `10×kg + 6.25×cm − 5×age + 5`
//! - Female: `10×kg + 6.25×cm − 5×age − 161`

use crate::{Gender, UserProfile};
use chrono::{Datelike, NaiveDate};

/// Target used whenever the profile cannot produce a sensible number
pub const DEFAULT_DAILY_TARGET: f64 = 2000.0;

/// Whole years between `date_of_birth` and `today`, birthday-adjusted.
///
/// Returns `None` for a birth date in the future.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Basal metabolic rate in kcal/day, or `None` if the profile is degenerate
pub fn basal_metabolic_rate(profile: &UserProfile, today: NaiveDate) -> Option<f64> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(profile.weight_kg) || !valid(profile.height_cm) {
        return None;
    }
    let age = age_on(profile.date_of_birth?, today)?;

    let offset = match profile.gender {
        Gender::Male => 5.0,
        Gender::Female => -161.0,
    };
    Some(10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * f64::from(age) + offset)
}

/// Computed daily target, ignoring any manual limit.
///
/// With an activity level: `BMR × multiplier − deficit_goal`. Without one, BMR
/// is the target. Falls back to [`DEFAULT_DAILY_TARGET`] when the inputs are
/// degenerate or the result is not a positive finite number.
pub fn compute_daily_target(profile: &UserProfile, today: NaiveDate) -> f64 {
    let Some(bmr) = basal_metabolic_rate(profile, today) else {
        tracing::debug!("Profile incomplete, using default daily target");
        return DEFAULT_DAILY_TARGET;
    };

    let target = match profile.activity_level {
        Some(level) => bmr * level.multiplier() - profile.deficit_goal,
        None => bmr,
    };

    if target.is_finite() && target > 0.0 {
        target
    } else {
        tracing::debug!(computed = target, "Computed target out of range, using default");
        DEFAULT_DAILY_TARGET
    }
}

/// The target the rest of the app should use: the manual limit when set,
/// otherwise the computed value.
pub fn effective_daily_target(profile: &UserProfile, today: NaiveDate) -> f64 {
    match profile.manual_limit {
        Some(limit) => limit,
        None => compute_daily_target(profile, today),
    }
}
