use super::score::{aggregate_confidence, contributions, score, unresolved_soft_cost};
use crate::constraint::{Constraint, ConstraintSet};
use crate::domain::Domain;
use crate::error::ResolverError;
use crate::plan::{MergeStrategy, TradeOff, UnifiedPlan};
use crate::proposal::{baseline_content, ProposalOrigin, ValidatedProposals};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on rewrite passes over the hard constraints
pub const MAX_PASSES: usize = 8;

/// Name used for trade-offs that disclose a substituted domain
pub const SUBSTITUTION: &str = "proposal_substitution";

fn affected(constraint: &Constraint, target: Domain) -> Vec<Domain> {
    let mut domains: Vec<Domain> = constraint.owner.into_iter().chain([target]).collect();
    domains.sort();
    domains.dedup();
    domains
}

fn rewrite_rationale(constraint: &Constraint, target: Domain) -> String {
    let lead = match constraint.owner {
        Some(owner) if owner != target => format!(
            "{} outranks {}: {}",
            owner.title(),
            target.title().to_lowercase(),
            constraint.rationale
        ),
        _ => constraint.rationale.clone(),
    };
    format!(
        "{}. The {} section was rewritten to comply.",
        lead.trim_end_matches('.'),
        target.title().to_lowercase()
    )
}

/// Trade-offs disclosing every substituted domain, in priority order
pub fn substitution_trade_offs(proposals: &ValidatedProposals) -> Vec<TradeOff> {
    proposals
        .iter()
        .filter_map(|p| match &p.origin {
            ProposalOrigin::Synthesized { reason } => Some(TradeOff {
                constraint_violated: SUBSTITUTION.to_string(),
                domains_affected: vec![p.domain],
                resolution_rationale: format!(
                    "No usable {} proposal ({}); a static baseline was substituted.",
                    p.domain.title().to_lowercase(),
                    reason
                ),
            }),
            ProposalOrigin::Reasoned => None,
        })
        .collect()
}

/// Rule-based merge. Always terminates: either it settles within
/// `MAX_PASSES` or it reports `NonTerminating`.
pub fn deterministic_merge(
    session_id: Uuid,
    proposals: &ValidatedProposals,
    constraints: &ConstraintSet,
) -> Result<UnifiedPlan, ResolverError> {
    for (domain, violations) in score(proposals, constraints) {
        for v in violations {
            debug!(
                "{} violates {} '{}' at cost {:.2}",
                domain,
                if v.hard { "hard" } else { "soft" },
                v.constraint,
                v.cost
            );
        }
    }

    let mut content: BTreeMap<Domain, Value> = proposals
        .iter()
        .map(|p| {
            let section = p
                .content
                .clone()
                .unwrap_or_else(|| baseline_content(p.domain));
            (p.domain, section)
        })
        .collect();

    let mut trade_offs = substitution_trade_offs(proposals);
    let mut recorded: BTreeSet<(String, Domain)> = BTreeSet::new();
    let mut rewritten = BTreeSet::new();
    let mut waived: Vec<String> = Vec::new();
    let mut settled = false;

    for pass in 1..=MAX_PASSES {
        let mut changed = false;

        for constraint in constraints.iter().filter(|c| c.is_hard()) {
            if waived.contains(&constraint.name) {
                continue;
            }

            for domain in Domain::ALL {
                let Some(section) = content.get(&domain) else {
                    continue;
                };
                if constraint.cost_on(domain, section) == 0.0 {
                    continue;
                }

                if !constraint.may_rewrite(domain) {
                    warn!(
                        "'{}' waived: {} outranks its owner",
                        constraint.name, domain
                    );
                    waived.push(constraint.name.clone());
                    trade_offs.push(TradeOff {
                        constraint_violated: constraint.name.clone(),
                        domains_affected: affected(constraint, domain),
                        resolution_rationale: format!(
                            "{} outranks the owner of this constraint; its content was kept as proposed.",
                            domain.title()
                        ),
                    });
                    break;
                }

                match constraint.rule.comply(domain, section) {
                    Some(updated) => {
                        debug!("Pass {}: '{}' rewrote {}", pass, constraint.name, domain);
                        content.insert(domain, updated);
                        rewritten.insert(domain);
                        changed = true;

                        if recorded.insert((constraint.name.clone(), domain)) {
                            trade_offs.push(TradeOff {
                                constraint_violated: constraint.name.clone(),
                                domains_affected: affected(constraint, domain),
                                resolution_rationale: rewrite_rationale(constraint, domain),
                            });
                        }
                    }
                    None => {
                        warn!(
                            "'{}' has no rewrite for {}; left for the safety pass",
                            constraint.name, domain
                        );
                    }
                }
            }
        }

        if !changed {
            settled = true;
            break;
        }
    }

    if !settled {
        return Err(ResolverError::NonTerminating { passes: MAX_PASSES });
    }

    Ok(assemble(
        session_id,
        proposals,
        constraints,
        content,
        trade_offs,
        &rewritten,
        waived,
        MergeStrategy::Deterministic,
    ))
}

/// Build the plan record around merged content
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    session_id: Uuid,
    proposals: &ValidatedProposals,
    constraints: &ConstraintSet,
    content: BTreeMap<Domain, Value>,
    trade_offs: Vec<TradeOff>,
    rewritten: &BTreeSet<Domain>,
    waived: Vec<String>,
    strategy: MergeStrategy,
) -> UnifiedPlan {
    let soft_cost = unresolved_soft_cost(constraints, &content);
    let confidence = aggregate_confidence(proposals, rewritten, soft_cost);

    let synthesized = proposals
        .iter()
        .filter_map(|p| match &p.origin {
            ProposalOrigin::Synthesized { reason } => Some((p.domain, reason.clone())),
            ProposalOrigin::Reasoned => None,
        })
        .collect();

    UnifiedPlan {
        session_id,
        per_domain_content: content,
        trade_offs,
        confidence,
        agent_contributions: contributions(proposals),
        synthesized,
        waived,
        safety_validated: false,
        strategy,
        explanation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{
        cross_domain_constraints, session_constraints, ConstraintKind, Rule,
    };
    use crate::config::SafetyConfig;
    use crate::proposal::{content_weekly_minutes, synthesize, AgentProposal};
    use crate::state::{RecentData, UserProfile};
    use serde_json::json;

    fn reasoned(domain: Domain, patch: Value, confidence: f64) -> AgentProposal {
        let mut raw = baseline_content(domain);
        if let (Some(obj), Some(extra)) = (raw.as_object_mut(), patch.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        raw["confidence"] = json!(confidence);
        raw["reasoning"] = json!("x");
        AgentProposal::from_response(domain, raw)
    }

    fn conflict() -> ValidatedProposals {
        ValidatedProposals::from_proposals(vec![
            reasoned(Domain::Sleep, json!({"recovery_status": "poor"}), 0.85),
            reasoned(Domain::Nutrition, json!({}), 0.8),
            reasoned(
                Domain::Fitness,
                json!({
                    "workout_plan": {"intensity": "high", "sessions": [
                        {"day": "Monday", "type": "Intervals", "duration_minutes": 45}
                    ]},
                    "energy_demand": "high"
                }),
                0.9,
            ),
            reasoned(Domain::MentalWellness, json!({}), 0.75),
        ])
    }

    fn constraints_for(proposals: &ValidatedProposals) -> ConstraintSet {
        let mut set = session_constraints(
            &UserProfile::default(),
            &RecentData::default(),
            &SafetyConfig::default(),
        );
        set.extend(cross_domain_constraints(proposals));
        set
    }

    #[test]
    fn test_sleep_wins_over_fitness() {
        let proposals = conflict();
        let constraints = constraints_for(&proposals);
        let plan = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap();

        let fitness = plan.content(Domain::Fitness).unwrap();
        assert_eq!(fitness["workout_plan"]["intensity"], "moderate");
        assert_eq!(plan.trade_offs.len(), 1);
        assert_eq!(plan.trade_offs[0].constraint_violated, "overtraining_safety");
        assert_eq!(
            plan.trade_offs[0].domains_affected,
            vec![Domain::Sleep, Domain::Fitness]
        );
        // Rewritten, not discarded
        assert_eq!(fitness["workout_plan"]["sessions"][0]["type"], "Intervals");
        // min(0.85, 0.8, 0.9 - 0.1, 0.75)
        assert!((plan.confidence - 0.75).abs() < 1e-9);
        assert!(!plan.safety_validated);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let proposals = conflict();
        let constraints = constraints_for(&proposals);
        let a = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap();
        let b = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap();
        assert_eq!(a.trade_offs, b.trade_offs);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_substitution_disclosed() {
        let proposals = ValidatedProposals::from_proposals(vec![
            reasoned(Domain::Sleep, json!({}), 0.9),
            synthesize(Domain::Nutrition, 0.1, "timed out"),
            reasoned(Domain::Fitness, json!({}), 0.8),
            reasoned(Domain::MentalWellness, json!({}), 0.7),
        ]);
        let plan =
            deterministic_merge(Uuid::nil(), &proposals, &constraints_for(&proposals)).unwrap();

        assert!(plan.synthesized.contains_key(&Domain::Nutrition));
        assert_eq!(plan.trade_offs[0].constraint_violated, SUBSTITUTION);
        assert_eq!(plan.trade_offs[0].domains_affected, vec![Domain::Nutrition]);
    }

    #[test]
    fn test_stacked_limits_settle() {
        let proposals = conflict();
        let mut constraints = ConstraintSet::new();
        constraints.register(Constraint::new(
            "at_most_60",
            ConstraintKind::Hard,
            100,
            Rule::MaxWeeklyMinutes { minutes: 60.0 },
        ));
        constraints.register(Constraint::new(
            "at_most_30",
            ConstraintKind::Hard,
            100,
            Rule::MaxWeeklyMinutes { minutes: 30.0 },
        ));
        let plan = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap();
        let fitness = plan.content(Domain::Fitness).unwrap();
        assert!(content_weekly_minutes(fitness) <= 30.0);
    }

    #[test]
    fn test_contradictory_limits_report_non_termination() {
        let proposals = conflict();
        let mut constraints = ConstraintSet::new();
        // Each rewrite undoes the other
        constraints.register(Constraint::new(
            "floor_3000",
            ConstraintKind::Hard,
            100,
            Rule::CalorieRange {
                min: 3000,
                max: 3000,
            },
        ));
        constraints.register(Constraint::new(
            "ceiling_2000",
            ConstraintKind::Hard,
            100,
            Rule::CalorieRange {
                min: 2000,
                max: 2000,
            },
        ));
        let err = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::NonTerminating { passes: MAX_PASSES }
        ));
    }

    #[test]
    fn test_lower_priority_owner_is_waived() {
        let proposals = conflict();
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
        let plan = deterministic_merge(Uuid::nil(), &proposals, &constraints).unwrap();
        assert_eq!(plan.waived, vec!["mood_sleep_floor".to_string()]);
        assert_eq!(
            plan.content(Domain::Sleep).unwrap()["sleep_recommendations"]["target_hours"],
            8
        );
    }
}
