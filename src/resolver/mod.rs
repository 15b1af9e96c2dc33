//! Conflict resolution: four admitted proposals in, exactly one plan out

mod merge;
mod reasoned;
mod score;

pub use merge::{deterministic_merge, MAX_PASSES, SUBSTITUTION};
pub use reasoned::ReasonedMerger;
pub use score::{aggregate_confidence, contributions, unresolved_soft_cost};

use crate::config::Config;
use crate::constraint::ConstraintSet;
use crate::error::ResolverError;
use crate::plan::UnifiedPlan;
use crate::proposal::ValidatedProposals;
use crate::provider::create_runner;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Resolver {
    reasoned: Option<ReasonedMerger>,
}

impl Resolver {
    /// Rule-based merging only
    pub fn deterministic() -> Self {
        Self { reasoned: None }
    }

    pub fn with_reasoned(merger: ReasonedMerger) -> Self {
        Self {
            reasoned: Some(merger),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        match (config.coordinator.reasoned_merge, config.coordinator.provider) {
            (true, Some(provider)) => Self::with_reasoned(ReasonedMerger::new(
                create_runner(config, provider),
                config.retry.clone(),
                std::time::Duration::from_secs(config.timeout_sec),
            )),
            _ => Self::deterministic(),
        }
    }

    /// Merge into one plan. A failed or rejected coordinator merge falls back
    /// to the deterministic merge, which settles or reports non-termination.
    pub async fn resolve(
        &self,
        session_id: Uuid,
        proposals: &ValidatedProposals,
        constraints: &ConstraintSet,
    ) -> Result<UnifiedPlan, ResolverError> {
        if let Some(merger) = &self.reasoned {
            match merger.merge(session_id, proposals, constraints).await {
                Ok(plan) => return Ok(plan),
                Err(e) => warn!(
                    "Coordinator merge unusable ({}), using deterministic merge: {}",
                    e.severity(),
                    e
                ),
            }
        }

        let plan = deterministic_merge(session_id, proposals, constraints)?;
        info!(
            "Deterministic merge produced {} trade-offs (confidence {:.2}, fingerprint {})",
            plan.trade_offs.len(),
            plan.confidence,
            plan.short_fingerprint()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::domain::Domain;
    use crate::plan::MergeStrategy;
    use crate::proposal::{baseline_content, AgentProposal};
    use crate::provider::{Script, ScriptedRunner};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_coordinator_falls_back_to_deterministic() {
        let runner = ScriptedRunner::new(None)
            .with_script("coordinator", Script::Reply("not json at all".to_string()));
        let resolver = Resolver::with_reasoned(ReasonedMerger::new(
            Arc::new(runner),
            RetryConfig {
                max_attempts: 1,
                backoff_base_ms: 1,
            },
            Duration::from_secs(1),
        ));

        let proposals = ValidatedProposals::from_proposals(
            Domain::ALL
                .iter()
                .map(|&d| {
                    let mut raw = baseline_content(d);
                    raw["confidence"] = json!(0.6);
                    raw["reasoning"] = json!("x");
                    AgentProposal::from_response(d, raw)
                })
                .collect(),
        );

        let plan = resolver
            .resolve(Uuid::nil(), &proposals, &ConstraintSet::new())
            .await
            .unwrap();
        assert_eq!(plan.strategy, MergeStrategy::Deterministic);
        assert_eq!(plan.per_domain_content.len(), 4);
    }
}
