//! Session-scoped constraint derivation.
//!
//! Nothing here is persisted as a rule. Each session rebuilds its constraints
//! from the safety configuration, the user's stated limits, recent data and,
//! once proposals are in, what the higher-priority domains reported.

use super::model::{priority, Binding, Constraint, ConstraintKind, ConstraintSet};
use super::rule::Rule;
use crate::config::SafetyConfig;
use crate::domain::{Domain, Intensity, Level, RecoveryStatus};
use crate::proposal::ValidatedProposals;
use crate::state::{RecentData, UserProfile};
use tracing::debug;

/// Sleep debt at which workout intensity is capped for the session
pub const SLEEP_DEBT_CAP_HOURS: f64 = 5.0;
/// Sleep debt at which only low intensity remains
pub const SLEEP_DEBT_SEVERE_HOURS: f64 = 10.0;
pub const HIGH_STRESS_LEVEL: f64 = 8.0;
pub const LOW_MOTIVATION_MAX_SESSIONS: usize = 3;

const DYNAMIC_HARD: ConstraintKind = ConstraintKind::Dynamic {
    binding: Binding::Hard,
};
const DYNAMIC_SOFT: ConstraintKind = ConstraintKind::Dynamic {
    binding: Binding::Soft,
};

/// Limits from the safety configuration
pub fn safety_constraints(safety: &SafetyConfig) -> Vec<Constraint> {
    vec![
        Constraint::new(
            "calorie_bounds",
            ConstraintKind::Hard,
            priority::SAFETY,
            Rule::CalorieRange {
                min: safety.min_daily_calories,
                max: safety.max_daily_calories,
            },
        )
        .because("Daily intake must stay within safe bounds"),
        Constraint::new(
            "minimum_sleep",
            ConstraintKind::Hard,
            priority::SAFETY,
            Rule::MinSleepHours {
                hours: safety.min_sleep_hours,
            },
        )
        .because("Sleep target may not fall below the safe minimum"),
        Constraint::new(
            "training_volume_cap",
            ConstraintKind::Hard,
            priority::SAFETY,
            Rule::MaxWeeklyMinutes {
                minutes: safety.max_weekly_training_minutes as f64,
            },
        )
        .because("Weekly training volume is capped"),
        Constraint::new(
            "budget_ceiling",
            ConstraintKind::Hard,
            priority::SAFETY,
            Rule::MaxBudgetUtilization {
                ratio: safety.max_budget_utilization,
            },
        )
        .because("Meal plans keep a share of the budget in reserve"),
        Constraint::new(
            "medical_boundary",
            ConstraintKind::Hard,
            priority::SAFETY,
            Rule::MedicalBoundary,
        )
        .because("Recommendations never diagnose, prescribe or dose"),
    ]
}

/// Limits the user stated in their profile
pub fn user_constraints(profile: &UserProfile) -> Vec<Constraint> {
    let mut out = Vec::new();

    if let Some(minutes) = profile.weekly_training_minutes {
        out.push(
            Constraint::new(
                "time_available",
                ConstraintKind::Hard,
                priority::USER,
                Rule::MaxWeeklyMinutes {
                    minutes: minutes as f64,
                },
            )
            .because(format!("User has {} minutes per week for training", minutes)),
        );
    }

    if let Some(ratio) = profile.budget_utilization_cap {
        out.push(
            Constraint::new(
                "budget_limit",
                ConstraintKind::Hard,
                priority::USER,
                Rule::MaxBudgetUtilization { ratio },
            )
            .because(format!("User caps food spending at {:.0}% of budget", ratio * 100.0)),
        );
    }

    out
}

/// Session-only constraints read off recent data
pub fn recent_data_constraints(recent: &RecentData, safety: &SafetyConfig) -> Vec<Constraint> {
    let mut out = Vec::new();

    let debt = recent.sleep_debt_hours.unwrap_or(0.0);
    let short_sleep = recent
        .average_sleep()
        .map(|avg| avg < safety.min_sleep_hours)
        .unwrap_or(false);

    if debt >= SLEEP_DEBT_CAP_HOURS || short_sleep {
        let cap = if debt >= SLEEP_DEBT_SEVERE_HOURS {
            Intensity::Low
        } else {
            Intensity::Moderate
        };
        out.push(
            Constraint::new(
                "sleep_debt_cap",
                DYNAMIC_HARD,
                priority::RECOVERY,
                Rule::MaxIntensity { cap },
            )
            .owned_by(Domain::Sleep)
            .because(format!(
                "Sleep debt of {:.1}h caps workout intensity at {} this session",
                debt, cap
            )),
        );
    }

    if let Some(stress) = recent.stress_level.filter(|s| *s >= HIGH_STRESS_LEVEL) {
        out.push(
            Constraint::new(
                "stress_load",
                DYNAMIC_SOFT,
                priority::PREFERENCE,
                Rule::MaxIntensity {
                    cap: Intensity::Moderate,
                },
            )
            .owned_by(Domain::MentalWellness)
            .because(format!("Stress level {} favours moderate training load", stress)),
        );
    }

    out
}

/// Everything known before any reasoning call
pub fn session_constraints(
    profile: &UserProfile,
    recent: &RecentData,
    safety: &SafetyConfig,
) -> ConstraintSet {
    let mut set = ConstraintSet::new();
    set.extend(safety_constraints(safety));
    set.extend(user_constraints(profile));
    set.extend(recent_data_constraints(recent, safety));
    debug!("Derived {} session constraints", set.len());
    set
}

/// Constraints higher-priority domains place on the others.
///
/// Synthesized proposals never raise constraints, so a substituted domain cannot
/// drive a conflict against a real one.
pub fn cross_domain_constraints(proposals: &ValidatedProposals) -> Vec<Constraint> {
    let mut out = Vec::new();

    let sleep = proposals.get(Domain::Sleep);
    if !sleep.is_synthesized() {
        match sleep.recovery_status() {
            Some(RecoveryStatus::Poor) => out.push(
                Constraint::new(
                    "overtraining_safety",
                    DYNAMIC_HARD,
                    priority::RECOVERY,
                    Rule::MaxIntensity {
                        cap: Intensity::Moderate,
                    },
                )
                .owned_by(Domain::Sleep)
                .because("Poor recovery rules out high-intensity training"),
            ),
            Some(RecoveryStatus::Fair) => out.push(
                Constraint::new(
                    "recovery_preference",
                    DYNAMIC_SOFT,
                    priority::PREFERENCE,
                    Rule::MaxIntensity {
                        cap: Intensity::Moderate,
                    },
                )
                .owned_by(Domain::Sleep)
                .because("Fair recovery favours moderate training"),
            ),
            _ => {}
        }
    }

    let nutrition = proposals.get(Domain::Nutrition);
    if !nutrition.is_synthesized() && nutrition.nutritional_adequacy() == Some(Level::Low) {
        out.push(
            Constraint::new(
                "energy_availability",
                DYNAMIC_HARD,
                priority::RECOVERY,
                Rule::MaxIntensity {
                    cap: Intensity::Moderate,
                },
            )
            .owned_by(Domain::Nutrition)
            .because("Low nutritional adequacy cannot fuel high-intensity training"),
        );
    }

    let mental = proposals.get(Domain::MentalWellness);
    if !mental.is_synthesized() && mental.motivation_level() == Some(Level::Low) {
        out.push(
            Constraint::new(
                "adherence_capacity",
                DYNAMIC_SOFT,
                priority::PREFERENCE,
                Rule::MaxSessions {
                    sessions: LOW_MOTIVATION_MAX_SESSIONS,
                },
            )
            .owned_by(Domain::MentalWellness)
            .because("Low motivation favours fewer, shorter sessions"),
        );
    }

    out
}
