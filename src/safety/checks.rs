use crate::config::SafetyConfig;
use crate::constraint::{crosses_medical_boundary, Rule};
use crate::domain::{Domain, Intensity, RecoveryStatus};
use crate::plan::UnifiedPlan;
use crate::proposal::{content_intensity, object_at};
use serde_json::{json, Value};

/// Sleep target used when the sleep section names none
pub const DEFAULT_SLEEP_TARGET_HOURS: f64 = 8.0;

/// A failed check and the deterministic rewrites that fix it.
/// No corrections means the failure cannot be repaired.
#[derive(Debug, Clone)]
pub struct Finding {
    pub message: String,
    pub domains: Vec<Domain>,
    pub corrections: Vec<(Domain, Value)>,
}

pub trait SafetyCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the plan passes
    fn inspect(&self, plan: &UnifiedPlan) -> Option<Finding>;
}

fn rewrite(rule: &Rule, domain: Domain, plan: &UnifiedPlan) -> Vec<(Domain, Value)> {
    plan.content(domain)
        .and_then(|content| rule.comply(domain, content))
        .map(|fixed| (domain, fixed))
        .into_iter()
        .collect()
}

/// Workout intensity must respect the recovery the sleep section reports
pub struct IntensityVsRecovery;

impl SafetyCheck for IntensityVsRecovery {
    fn name(&self) -> &'static str {
        "intensity_vs_recovery"
    }

    fn inspect(&self, plan: &UnifiedPlan) -> Option<Finding> {
        let recovery = plan
            .content(Domain::Sleep)?
            .get("recovery_status")
            .and_then(Value::as_str)
            .and_then(RecoveryStatus::parse)?;
        let intensity = content_intensity(plan.content(Domain::Fitness)?)?;

        let cap = match recovery {
            RecoveryStatus::Poor => Intensity::Moderate,
            _ => return None,
        };
        if intensity <= cap {
            return None;
        }

        Some(Finding {
            message: format!(
                "{} intensity scheduled with {:?} recovery",
                intensity, recovery
            ),
            domains: vec![Domain::Sleep, Domain::Fitness],
            corrections: rewrite(&Rule::MaxIntensity { cap }, Domain::Fitness, plan),
        })
    }
}

/// Daily intake must stay within the configured bounds
pub struct NutritionMinimum {
    pub min_daily_calories: u32,
    pub max_daily_calories: u32,
}

impl SafetyCheck for NutritionMinimum {
    fn name(&self) -> &'static str {
        "nutrition_minimum_adequacy"
    }

    fn inspect(&self, plan: &UnifiedPlan) -> Option<Finding> {
        let rule = Rule::CalorieRange {
            min: self.min_daily_calories,
            max: self.max_daily_calories,
        };
        let content = plan.content(Domain::Nutrition)?;
        if rule.cost(Domain::Nutrition, content) == 0.0 {
            return None;
        }

        let calories = content
            .get("meal_plan")
            .and_then(|m| m.get("daily_calories"))
            .and_then(Value::as_f64)
            .unwrap_or_default();

        Some(Finding {
            message: format!(
                "{:.0} kcal/day is outside {}..{}",
                calories, self.min_daily_calories, self.max_daily_calories
            ),
            domains: vec![Domain::Nutrition],
            corrections: rewrite(&rule, Domain::Nutrition, plan),
        })
    }
}

/// Sleep target must exist and meet the minimum
pub struct SleepMinimumDuration {
    pub min_sleep_hours: f64,
}

impl SafetyCheck for SleepMinimumDuration {
    fn name(&self) -> &'static str {
        "sleep_minimum_duration"
    }

    fn inspect(&self, plan: &UnifiedPlan) -> Option<Finding> {
        let content = plan.content(Domain::Sleep)?;
        let target = content
            .get("sleep_recommendations")
            .and_then(|s| s.get("target_hours"))
            .and_then(Value::as_f64);

        match target {
            Some(hours) if hours >= self.min_sleep_hours => None,
            Some(hours) => Some(Finding {
                message: format!(
                    "sleep target {:.1}h is below the {:.1}h minimum",
                    hours, self.min_sleep_hours
                ),
                domains: vec![Domain::Sleep],
                corrections: rewrite(
                    &Rule::MinSleepHours {
                        hours: self.min_sleep_hours,
                    },
                    Domain::Sleep,
                    plan,
                ),
            }),
            None => {
                let mut fixed = content.clone();
                let repaired = object_at(&mut fixed, "sleep_recommendations")
                    .map(|recs| {
                        recs.insert(
                            "target_hours".to_string(),
                            json!(DEFAULT_SLEEP_TARGET_HOURS.max(self.min_sleep_hours)),
                        );
                    })
                    .is_some();
                Some(Finding {
                    message: "sleep section names no target duration".to_string(),
                    domains: vec![Domain::Sleep],
                    corrections: if repaired {
                        vec![(Domain::Sleep, fixed)]
                    } else {
                        Vec::new()
                    },
                })
            }
        }
    }
}

/// No section may diagnose, prescribe or dose
pub struct MedicalBoundary;

impl SafetyCheck for MedicalBoundary {
    fn name(&self) -> &'static str {
        "medical_boundary"
    }

    fn inspect(&self, plan: &UnifiedPlan) -> Option<Finding> {
        let domains: Vec<Domain> = Domain::ALL
            .into_iter()
            .filter(|d| plan.content(*d).map(crosses_medical_boundary).unwrap_or(false))
            .collect();
        if domains.is_empty() {
            return None;
        }

        let corrections = domains
            .iter()
            .flat_map(|&d| rewrite(&Rule::MedicalBoundary, d, plan))
            .collect();

        Some(Finding {
            message: format!(
                "medical advice in {}",
                domains
                    .iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            domains,
            corrections,
        })
    }
}

/// The ordered battery
pub fn battery(safety: &SafetyConfig) -> Vec<Box<dyn SafetyCheck>> {
    vec![
        Box::new(IntensityVsRecovery),
        Box::new(NutritionMinimum {
            min_daily_calories: safety.min_daily_calories,
            max_daily_calories: safety.max_daily_calories,
        }),
        Box::new(SleepMinimumDuration {
            min_sleep_hours: safety.min_sleep_hours,
        }),
        Box::new(MedicalBoundary),
    ]
}
