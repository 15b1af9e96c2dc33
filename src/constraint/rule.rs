use crate::domain::{Domain, Intensity};
use crate::proposal::{content_intensity, content_sessions, content_weekly_minutes, object_at};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Text that replaces anything crossing the medical boundary
pub const MEDICAL_REFERRAL: &str =
    "Please discuss this with a qualified healthcare professional before acting on it.";

fn medical_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(diagnos(e|is|ed)|prescri(be|ption|bed)|medication|dosage|\d+\s?mg\b|antidepressant|insulin|stop taking|treat(s|ment of)? (your )?(depression|diabetes|insomnia|disorder))",
            )
            .ok()
        })
        .as_ref()
}

fn reads_medical(text: &str) -> bool {
    medical_pattern().map(|re| re.is_match(text)).unwrap_or(false)
}

/// The measurable part of a constraint: how far content is from compliance and
/// how to rewrite it so it complies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    MaxIntensity { cap: Intensity },
    MaxWeeklyMinutes { minutes: f64 },
    MaxSessions { sessions: usize },
    MinSleepHours { hours: f64 },
    CalorieRange { min: u32, max: u32 },
    MaxBudgetUtilization { ratio: f64 },
    MedicalBoundary,
}

impl Rule {
    /// Domain whose content this rule measures; `None` means every domain
    pub fn target(&self) -> Option<Domain> {
        match self {
            Rule::MaxIntensity { .. } | Rule::MaxWeeklyMinutes { .. } | Rule::MaxSessions { .. } => {
                Some(Domain::Fitness)
            }
            Rule::MinSleepHours { .. } => Some(Domain::Sleep),
            Rule::CalorieRange { .. } | Rule::MaxBudgetUtilization { .. } => {
                Some(Domain::Nutrition)
            }
            Rule::MedicalBoundary => None,
        }
    }

    pub fn applies_to(&self, domain: Domain) -> bool {
        self.target().map(|t| t == domain).unwrap_or(true)
    }

    /// Violation cost in [0, 1]; zero means satisfied
    pub fn cost(&self, domain: Domain, content: &Value) -> f64 {
        if !self.applies_to(domain) {
            return 0.0;
        }

        let raw = match self {
            Rule::MaxIntensity { cap } => content_intensity(content)
                .map(|i| i.steps_above(*cap) as f64 / 2.0)
                .unwrap_or(0.0),
            Rule::MaxWeeklyMinutes { minutes } => {
                let total = content_weekly_minutes(content);
                if total <= *minutes {
                    0.0
                } else if *minutes <= 0.0 {
                    // No training time at all; any scheduled minute is a full violation
                    1.0
                } else {
                    (total - minutes) / minutes
                }
            }
            Rule::MaxSessions { sessions } => {
                let n = content_sessions(content).len();
                if n > *sessions {
                    (n - sessions) as f64 / n as f64
                } else {
                    0.0
                }
            }
            Rule::MinSleepHours { hours } => sleep_hours(content)
                .filter(|h| h < hours)
                .map(|h| (hours - h) / hours)
                .unwrap_or(0.0),
            Rule::CalorieRange { min, max } => match daily_calories(content) {
                Some(c) if c < *min as f64 => (*min as f64 - c) / *min as f64,
                Some(c) if c > *max as f64 => (c - *max as f64) / *max as f64,
                _ => 0.0,
            },
            Rule::MaxBudgetUtilization { ratio } => content
                .get("budget_utilization")
                .and_then(Value::as_f64)
                .filter(|u| u > ratio)
                .map(|u| u - ratio)
                .unwrap_or(0.0),
            Rule::MedicalBoundary => {
                if crosses_medical_boundary(content) {
                    1.0
                } else {
                    0.0
                }
            }
        };

        raw.clamp(0.0, 1.0)
    }

    /// Deterministic rewrite of `content` that brings its cost to zero.
    /// Returns `None` when the content already complies or cannot be rewritten.
    pub fn comply(&self, domain: Domain, content: &Value) -> Option<Value> {
        if self.cost(domain, content) == 0.0 {
            return None;
        }

        let mut rewritten = content.clone();
        match self {
            Rule::MaxIntensity { cap } => {
                let previous = content_intensity(content)?;
                let plan = object_at(&mut rewritten, "workout_plan")?;
                plan.insert("intensity".to_string(), json!(cap.as_str()));
                plan.insert(
                    "intensity_adjustment".to_string(),
                    json!(format!("reduced from {} to {}", previous, cap)),
                );
                rewritten
                    .as_object_mut()?
                    .insert("energy_demand".to_string(), json!(cap.as_str()));
            }
            Rule::MaxWeeklyMinutes { minutes } => {
                let total = content_weekly_minutes(content);
                let scale = minutes / total;
                let sessions = object_at(&mut rewritten, "workout_plan")?
                    .get_mut("sessions")?
                    .as_array_mut()?;
                for session in sessions.iter_mut() {
                    let Some(obj) = session.as_object_mut() else {
                        continue;
                    };
                    for key in ["duration_minutes", "duration"] {
                        if let Some(d) = obj.get(key).and_then(Value::as_f64) {
                            obj.insert(key.to_string(), json!((d * scale).floor() as u64));
                        }
                    }
                }
            }
            Rule::MaxSessions { sessions } => {
                let list = object_at(&mut rewritten, "workout_plan")?
                    .get_mut("sessions")?
                    .as_array_mut()?;
                list.truncate(*sessions);
            }
            Rule::MinSleepHours { hours } => {
                object_at(&mut rewritten, "sleep_recommendations")?
                    .insert("target_hours".to_string(), json!(hours));
            }
            Rule::CalorieRange { min, max } => {
                let calories = daily_calories(content)?;
                let clamped = calories.clamp(*min as f64, *max as f64).round() as u64;
                object_at(&mut rewritten, "meal_plan")?
                    .insert("daily_calories".to_string(), json!(clamped));
            }
            Rule::MaxBudgetUtilization { ratio } => {
                let root = rewritten.as_object_mut()?;
                root.insert("budget_utilization".to_string(), json!(ratio));
                object_at(&mut rewritten, "meal_plan")?
                    .insert("cost_optimization".to_string(), json!("budget_first"));
            }
            Rule::MedicalBoundary => {
                redact_medical(&mut rewritten);
            }
        }

        (self.cost(domain, &rewritten) == 0.0).then_some(rewritten)
    }
}

fn sleep_hours(content: &Value) -> Option<f64> {
    content
        .get("sleep_recommendations")
        .and_then(|s| s.get("target_hours"))
        .and_then(Value::as_f64)
}

fn daily_calories(content: &Value) -> Option<f64> {
    content
        .get("meal_plan")
        .and_then(|m| m.get("daily_calories"))
        .and_then(Value::as_f64)
}

/// True if any string anywhere in `content` reads as medical advice
pub fn crosses_medical_boundary(content: &Value) -> bool {
    match content {
        Value::String(s) => reads_medical(s),
        Value::Array(items) => items.iter().any(crosses_medical_boundary),
        Value::Object(map) => map.values().any(crosses_medical_boundary),
        _ => false,
    }
}

fn redact_medical(content: &mut Value) {
    match content {
        Value::String(s) if reads_medical(s) => {
            *s = MEDICAL_REFERRAL.to_string();
        }
        Value::Array(items) => items.iter_mut().for_each(redact_medical),
        Value::Object(map) => map.values_mut().for_each(redact_medical),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitness(intensity: &str) -> Value {
        json!({
            "workout_plan": {
                "intensity": intensity,
                "sessions": [
                    {"day": "Mon", "duration_minutes": 60},
                    {"day": "Tue", "duration_minutes": 60},
                    {"day": "Thu", "duration_minutes": 60},
                    {"day": "Sat", "duration_minutes": 60}
                ]
            },
            "energy_demand": intensity
        })
    }

    #[test]
    fn test_max_intensity_cost_and_rewrite() {
        let rule = Rule::MaxIntensity {
            cap: Intensity::Moderate,
        };
        let content = fitness("high");
        assert_eq!(rule.cost(Domain::Fitness, &content), 0.5);
        // Rules never measure domains they do not target
        assert_eq!(rule.cost(Domain::Sleep, &content), 0.0);

        let rewritten = rule.comply(Domain::Fitness, &content).unwrap();
        assert_eq!(rewritten["workout_plan"]["intensity"], "moderate");
        assert_eq!(rewritten["energy_demand"], "moderate");
        assert_eq!(rule.cost(Domain::Fitness, &rewritten), 0.0);
        assert!(rule.comply(Domain::Fitness, &rewritten).is_none());
    }

    #[test]
    fn test_weekly_minutes_scaled_down() {
        let rule = Rule::MaxWeeklyMinutes { minutes: 180.0 };
        let content = fitness("moderate");
        assert!(rule.cost(Domain::Fitness, &content) > 0.0);

        let rewritten = rule.comply(Domain::Fitness, &content).unwrap();
        assert!(content_weekly_minutes(&rewritten) <= 180.0);
    }

    #[test]
    fn test_zero_weekly_minutes_clears_schedule() {
        let rule = Rule::MaxWeeklyMinutes { minutes: 0.0 };
        let content = fitness("moderate");
        assert_eq!(rule.cost(Domain::Fitness, &content), 1.0);

        let rewritten = rule.comply(Domain::Fitness, &content).unwrap();
        assert_eq!(content_weekly_minutes(&rewritten), 0.0);
        assert_eq!(rule.cost(Domain::Fitness, &rewritten), 0.0);
    }

    #[test]
    fn test_max_sessions_truncates() {
        let rule = Rule::MaxSessions { sessions: 3 };
        let content = fitness("low");
        assert_eq!(rule.cost(Domain::Fitness, &content), 0.25);
        let rewritten = rule.comply(Domain::Fitness, &content).unwrap();
        assert_eq!(content_sessions(&rewritten).len(), 3);
    }

    #[test]
    fn test_calorie_range_clamps() {
        let rule = Rule::CalorieRange {
            min: 1200,
            max: 4000,
        };
        let content = json!({"meal_plan": {"daily_calories": 900}});
        assert_eq!(rule.cost(Domain::Nutrition, &content), 0.25);
        let rewritten = rule.comply(Domain::Nutrition, &content).unwrap();
        assert_eq!(rewritten["meal_plan"]["daily_calories"], 1200);
    }

    #[test]
    fn test_min_sleep_hours() {
        let rule = Rule::MinSleepHours { hours: 6.0 };
        let content = json!({"sleep_recommendations": {"target_hours": 4.5}});
        assert_eq!(rule.cost(Domain::Sleep, &content), 0.25);
        let rewritten = rule.comply(Domain::Sleep, &content).unwrap();
        assert_eq!(rewritten["sleep_recommendations"]["target_hours"], 6.0);
    }

    #[test]
    fn test_medical_boundary_redacts_nested_strings() {
        let rule = Rule::MedicalBoundary;
        let content = json!({
            "wellness_recommendations": {
                "daily_practices": [
                    {"activity": "Take 50 mg of sertraline nightly"},
                    {"activity": "Evening walk"}
                ]
            }
        });
        assert_eq!(rule.cost(Domain::MentalWellness, &content), 1.0);

        let rewritten = rule.comply(Domain::MentalWellness, &content).unwrap();
        let practices = &rewritten["wellness_recommendations"]["daily_practices"];
        assert_eq!(practices[0]["activity"], MEDICAL_REFERRAL);
        assert_eq!(practices[1]["activity"], "Evening walk");
    }
}
