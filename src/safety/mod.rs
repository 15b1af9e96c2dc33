//! Post-merge safety battery with deterministic corrections

mod checks;

pub use checks::{
    battery, Finding, IntensityVsRecovery, MedicalBoundary, NutritionMinimum, SafetyCheck,
    SleepMinimumDuration, DEFAULT_SLEEP_TARGET_HOURS,
};

use crate::config::SafetyConfig;
use crate::constraint::ConstraintSet;
use crate::domain::Domain;
use crate::error::WorkflowError;
use crate::plan::{TradeOff, UnifiedPlan};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What one check found on its first run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub check: &'static str,
    pub passed: bool,
    pub corrected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SafetyReport {
    pub plan: UnifiedPlan,
    pub outcomes: Vec<CheckOutcome>,
}

impl SafetyReport {
    pub fn corrections(&self) -> usize {
        self.outcomes.iter().filter(|o| o.corrected).count()
    }
}

pub struct SafetyValidator {
    checks: Vec<Box<dyn SafetyCheck>>,
}

impl SafetyValidator {
    pub fn new(safety: &SafetyConfig) -> Self {
        Self {
            checks: battery(safety),
        }
    }

    /// Run every check, apply corrections, then confirm nothing is left failing
    /// and every applicable hard constraint is at zero cost.
    pub fn validate(
        &self,
        plan: &UnifiedPlan,
        constraints: &ConstraintSet,
    ) -> Result<SafetyReport, WorkflowError> {
        let mut plan = plan.clone();
        plan.safety_validated = false;

        let mut outcomes = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let outcome = match check.inspect(&plan) {
                None => {
                    debug!("Safety check '{}' passed", check.name());
                    CheckOutcome {
                        check: check.name(),
                        passed: true,
                        corrected: false,
                        message: None,
                    }
                }
                Some(finding) => {
                    let corrected = !finding.corrections.is_empty();
                    warn!(
                        "Safety check '{}' failed: {}{}",
                        check.name(),
                        finding.message,
                        if corrected { " (correcting)" } else { "" }
                    );
                    apply(&mut plan, check.name(), finding.clone());
                    CheckOutcome {
                        check: check.name(),
                        passed: false,
                        corrected,
                        message: Some(finding.message),
                    }
                }
            };
            outcomes.push(outcome);
        }

        self.verify(&plan)?;
        close_hard_constraints(&mut plan, constraints)?;
        // Closure rewrites may touch sections the battery already cleared
        self.verify(&plan)?;

        plan.safety_validated = true;
        info!(
            "Safety battery complete: {} checks, {} corrected",
            outcomes.len(),
            outcomes.iter().filter(|o| o.corrected).count()
        );

        Ok(SafetyReport { plan, outcomes })
    }

    fn verify(&self, plan: &UnifiedPlan) -> Result<(), WorkflowError> {
        match self.checks.iter().find(|c| c.inspect(plan).is_some()) {
            Some(check) => Err(WorkflowError::UnresolvedSafety(check.name().to_string())),
            None => Ok(()),
        }
    }
}

fn apply(plan: &mut UnifiedPlan, check: &str, finding: Finding) {
    if finding.corrections.is_empty() {
        return;
    }
    for (domain, content) in finding.corrections {
        plan.per_domain_content.insert(domain, content);
    }
    plan.trade_offs.push(TradeOff {
        constraint_violated: check.to_string(),
        domains_affected: finding.domains,
        resolution_rationale: format!(
            "Safety correction: {}. The affected section was rewritten to a safe value.",
            finding.message
        ),
    });
}

/// Every hard constraint that was not waived must end at zero cost
fn close_hard_constraints(
    plan: &mut UnifiedPlan,
    constraints: &ConstraintSet,
) -> Result<(), WorkflowError> {
    for constraint in constraints.iter().filter(|c| c.is_hard()) {
        if plan.waived.contains(&constraint.name) {
            continue;
        }

        for domain in Domain::ALL {
            if !constraint.may_rewrite(domain) {
                continue;
            }
            let Some(section) = plan.content(domain) else {
                continue;
            };
            if constraint.cost_on(domain, section) == 0.0 {
                continue;
            }

            let fixed = constraint
                .rule
                .comply(domain, section)
                .filter(|fixed| constraint.cost_on(domain, fixed) == 0.0);
            let Some(fixed) = fixed else {
                warn!(
                    "Hard constraint '{}' has no correction for {}",
                    constraint.name, domain
                );
                return Err(WorkflowError::Unsatisfiable(constraint.name.clone()));
            };

            warn!(
                "Hard constraint '{}' still violated on {}; correcting",
                constraint.name, domain
            );
            plan.per_domain_content.insert(domain, fixed);
            plan.trade_offs.push(TradeOff {
                constraint_violated: constraint.name.clone(),
                domains_affected: vec![domain],
                resolution_rationale: format!(
                    "{} The {} section was corrected after merging.",
                    constraint.rationale,
                    domain.title().to_lowercase()
                )
                .trim()
                .to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintKind, Rule, MEDICAL_REFERRAL};
    use crate::domain::Intensity;
    use crate::plan::MergeStrategy;
    use crate::proposal::baseline_content;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn plan_with(patches: Vec<(Domain, Value)>) -> UnifiedPlan {
        let mut content: BTreeMap<Domain, Value> =
            Domain::ALL.iter().map(|&d| (d, baseline_content(d))).collect();
        for (domain, section) in patches {
            content.insert(domain, section);
        }
        UnifiedPlan {
            session_id: Uuid::nil(),
            per_domain_content: content,
            trade_offs: Vec::new(),
            confidence: 0.7,
            agent_contributions: BTreeMap::new(),
            synthesized: BTreeMap::new(),
            waived: Vec::new(),
            safety_validated: false,
            strategy: MergeStrategy::Deterministic,
            explanation: None,
        }
    }

    fn validator() -> SafetyValidator {
        SafetyValidator::new(&SafetyConfig::default())
    }

    #[test]
    fn test_clean_plan_passes_untouched() {
        let plan = plan_with(vec![]);
        let report = validator().validate(&plan, &ConstraintSet::new()).unwrap();
        assert!(report.plan.safety_validated);
        assert_eq!(report.outcomes.len(), 4);
        assert!(report.outcomes.iter().all(|o| o.passed));
        assert_eq!(report.plan.per_domain_content, plan.per_domain_content);
        assert!(report.plan.trade_offs.is_empty());
    }

    #[test]
    fn test_every_check_runs_and_corrects() {
        let plan = plan_with(vec![
            (
                Domain::Sleep,
                json!({
                    "sleep_recommendations": {"target_hours": 4},
                    "recovery_status": "poor"
                }),
            ),
            (
                Domain::Fitness,
                json!({"workout_plan": {"intensity": "high", "sessions": []}, "energy_demand": "high"}),
            ),
            (
                Domain::Nutrition,
                json!({"meal_plan": {"daily_calories": 800}, "nutritional_adequacy": "low"}),
            ),
        ]);

        let report = validator().validate(&plan, &ConstraintSet::new()).unwrap();
        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.check)
            .collect();
        assert_eq!(
            failed,
            vec![
                "intensity_vs_recovery",
                "nutrition_minimum_adequacy",
                "sleep_minimum_duration"
            ]
        );
        assert_eq!(report.corrections(), 3);

        let fixed = &report.plan;
        assert!(fixed.safety_validated);
        assert_eq!(
            fixed.content(Domain::Fitness).unwrap()["workout_plan"]["intensity"],
            "moderate"
        );
        assert_eq!(
            fixed.content(Domain::Nutrition).unwrap()["meal_plan"]["daily_calories"],
            1200
        );
        assert!(
            fixed.content(Domain::Sleep).unwrap()["sleep_recommendations"]["target_hours"]
                .as_f64()
                .unwrap()
                >= 6.0
        );
        assert_eq!(fixed.trade_offs.len(), 3);
    }

    #[test]
    fn test_missing_sleep_target_gets_default() {
        let plan = plan_with(vec![(
            Domain::Sleep,
            json!({"sleep_recommendations": {"bedtime": "23:00"}, "recovery_status": "good"}),
        )]);
        let report = validator().validate(&plan, &ConstraintSet::new()).unwrap();
        assert_eq!(
            report.plan.content(Domain::Sleep).unwrap()["sleep_recommendations"]["target_hours"],
            DEFAULT_SLEEP_TARGET_HOURS
        );
    }

    #[test]
    fn test_medical_advice_redacted_in_every_section() {
        let plan = plan_with(vec![
            (
                Domain::MentalWellness,
                json!({
                    "wellness_recommendations": {"note": "Take 20 mg of sertraline daily"},
                    "motivation_level": "medium"
                }),
            ),
            (
                Domain::Sleep,
                json!({
                    "sleep_recommendations": {"target_hours": 8, "note": "Ask for a prescription sleeping pill"},
                    "recovery_status": "good"
                }),
            ),
        ]);
        let report = validator().validate(&plan, &ConstraintSet::new()).unwrap();
        let text = serde_json::to_string(&report.plan.per_domain_content).unwrap();
        assert!(!text.contains("sertraline"));
        assert!(text.contains(MEDICAL_REFERRAL));
        assert_eq!(report.corrections(), 1);
    }

    #[test]
    fn test_uncorrectable_finding_is_unresolved() {
        // Intensity hidden in a string, so there is nothing to rewrite
        let plan = plan_with(vec![
            (
                Domain::Sleep,
                json!({"sleep_recommendations": {"target_hours": 8}, "recovery_status": "poor"}),
            ),
            (
                Domain::Fitness,
                json!({"workout_plan": "daily HIIT", "energy_demand": "high"}),
            ),
        ]);
        let err = validator()
            .validate(&plan, &ConstraintSet::new())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnresolvedSafety(ref name) if name == "intensity_vs_recovery"));
    }

    #[test]
    fn test_hard_closure_corrects_leftover_violation() {
        let plan = plan_with(vec![(
            Domain::Fitness,
            json!({"workout_plan": {"intensity": "moderate", "sessions": []}, "energy_demand": "medium"}),
        )]);
        let mut constraints = ConstraintSet::new();
        constraints.register(Constraint::new(
            "sleep_debt_cap",
            ConstraintKind::Hard,
            80,
            Rule::MaxIntensity {
                cap: Intensity::Low,
            },
        ));

        let report = validator().validate(&plan, &constraints).unwrap();
        assert_eq!(
            report.plan.content(Domain::Fitness).unwrap()["workout_plan"]["intensity"],
            "low"
        );
        assert_eq!(report.plan.trade_offs[0].constraint_violated, "sleep_debt_cap");
    }

    #[test]
    fn test_hard_closure_without_correction_is_unsatisfiable() {
        let plan = plan_with(vec![(
            Domain::Fitness,
            json!({"workout_plan": "daily HIIT", "energy_demand": "high"}),
        )]);
        let mut constraints = ConstraintSet::new();
        constraints.register(Constraint::new(
            "overtraining_safety",
            ConstraintKind::Hard,
            80,
            Rule::MaxIntensity {
                cap: Intensity::Moderate,
            },
        ));

        let err = validator().validate(&plan, &constraints).unwrap_err();
        assert!(matches!(err, WorkflowError::Unsatisfiable(ref name) if name == "overtraining_safety"));
    }

    #[test]
    fn test_waived_constraint_is_not_enforced() {
        let mut plan = plan_with(vec![]);
        plan.waived.push("mood_sleep_floor".to_string());
        let mut constraints = ConstraintSet::new();
        constraints.register(
            Constraint::new(
                "mood_sleep_floor",
                ConstraintKind::Hard,
                80,
                Rule::MinSleepHours { hours: 9.5 },
            )
            .owned_by(Domain::MentalWellness),
        );

        let report = validator().validate(&plan, &constraints).unwrap();
        assert_eq!(
            report.plan.content(Domain::Sleep).unwrap()["sleep_recommendations"]["target_hours"],
            8
        );
    }
}
