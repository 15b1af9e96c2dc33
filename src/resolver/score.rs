//! Violation scoring and plan-level confidence.
//!
//! Plan confidence is the weakest real contribution, scaled down by whatever
//! soft-constraint cost the merged plan still carries:
//!
//! ```text
//! base       = min over reasoned domains of c_d, where c_d is reduced by
//!              REWRITE_PENALTY (floor MIN_REWRITTEN) for a rewritten domain
//! soft       = mean over soft constraints of min(1, cost on merged content)
//! confidence = clamp(base * (1 - soft), 0, 1)
//! ```
//!
//! When every domain is synthesized the minimum runs over the fallbacks.

use crate::constraint::{ConstraintSet, Violation};
use crate::domain::Domain;
use crate::proposal::ValidatedProposals;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const REWRITE_PENALTY: f64 = 0.1;
pub const MIN_REWRITTEN: f64 = 0.1;

/// Violations of each admitted proposal before any merging
pub fn score(
    proposals: &ValidatedProposals,
    constraints: &ConstraintSet,
) -> BTreeMap<Domain, Vec<Violation>> {
    proposals
        .iter()
        .map(|p| (p.domain, constraints.violations(p)))
        .collect()
}

/// Cost of one constraint across every section of the merged content
fn content_cost(constraints: &ConstraintSet, name: &str, content: &BTreeMap<Domain, Value>) -> f64 {
    constraints
        .get(name)
        .map(|c| {
            content
                .iter()
                .map(|(d, v)| c.cost_on(*d, v))
                .sum::<f64>()
                .min(1.0)
        })
        .unwrap_or(0.0)
}

/// Mean cost of soft constraints left unresolved in the merged content
pub fn unresolved_soft_cost(
    constraints: &ConstraintSet,
    content: &BTreeMap<Domain, Value>,
) -> f64 {
    let soft: Vec<f64> = constraints
        .iter()
        .filter(|c| !c.is_hard())
        .map(|c| content_cost(constraints, &c.name, content))
        .collect();

    if soft.is_empty() {
        0.0
    } else {
        soft.iter().sum::<f64>() / soft.len() as f64
    }
}

/// Plan confidence, always within [0, 1]
pub fn aggregate_confidence(
    proposals: &ValidatedProposals,
    rewritten: &BTreeSet<Domain>,
    soft_cost: f64,
) -> f64 {
    let adjusted = |domain: Domain, c: f64| {
        if rewritten.contains(&domain) {
            (c - REWRITE_PENALTY).max(MIN_REWRITTEN.min(c))
        } else {
            c
        }
    };

    let real: Vec<f64> = proposals
        .iter()
        .filter(|p| !p.is_synthesized())
        .map(|p| adjusted(p.domain, p.confidence))
        .collect();

    let pool = if real.is_empty() {
        proposals
            .iter()
            .map(|p| adjusted(p.domain, p.confidence))
            .collect()
    } else {
        real
    };

    let base = pool.into_iter().fold(1.0_f64, f64::min);
    let confidence = base * (1.0 - soft_cost.clamp(0.0, 1.0));
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Each domain's share of the plan, proportional to its confidence
pub fn contributions(proposals: &ValidatedProposals) -> BTreeMap<Domain, f64> {
    let total: f64 = proposals.iter().map(|p| p.confidence).sum();
    proposals
        .iter()
        .map(|p| {
            let weight = if total > 0.0 {
                p.confidence / total
            } else {
                1.0 / Domain::ALL.len() as f64
            };
            (p.domain, weight)
        })
        .collect()
}
