use super::merge::{assemble, substitution_trade_offs};
use crate::config::RetryConfig;
use crate::constraint::ConstraintSet;
use crate::domain::Domain;
use crate::error::{ProviderError, ResolverError};
use crate::plan::{MergeStrategy, TradeOff, UnifiedPlan};
use crate::proposal::ValidatedProposals;
use crate::provider::{ReasoningTask, Runner};
use crate::reasoning::{merge_prompt, parse_response};
use crate::runner::retry::retry_with_backoff;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, info};
use uuid::Uuid;

/// Asks the coordinator provider to merge, then checks its answer
pub struct ReasonedMerger {
    runner: Arc<dyn Runner>,
    retry: RetryConfig,
    timeout: Duration,
}

impl ReasonedMerger {
    pub fn new(runner: Arc<dyn Runner>, retry: RetryConfig, timeout: Duration) -> Self {
        Self {
            runner,
            retry,
            timeout,
        }
    }

    pub async fn merge(
        &self,
        session_id: Uuid,
        proposals: &ValidatedProposals,
        constraints: &ConstraintSet,
    ) -> Result<UnifiedPlan, ResolverError> {
        let hard: Vec<_> = constraints.iter().filter(|c| c.is_hard()).collect();
        let task = ReasoningTask {
            label: "coordinator".to_string(),
            prompt: merge_prompt(proposals, &hard),
        };

        let call = retry_with_backoff(&self.retry, ProviderError::is_retryable, || async {
            let output = self.runner.execute(&task, self.timeout).await?;
            parse_response(&output.stdout)
        });
        let value = tokio_timeout(self.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let content = read_content(&value)?;

        // The coordinator may not bend a hard constraint
        for c in &hard {
            for (domain, section) in &content {
                if c.may_rewrite(*domain) && c.cost_on(*domain, section) > 0.0 {
                    return Err(ResolverError::ReasonedMergeRejected(format!(
                        "{} section violates hard constraint '{}'",
                        domain, c.name
                    )));
                }
            }
        }

        let mut trade_offs = substitution_trade_offs(proposals);
        trade_offs.extend(read_trade_offs(&value));

        let rewritten: BTreeSet<Domain> = proposals
            .iter()
            .filter(|p| p.content.as_ref() != content.get(&p.domain))
            .map(|p| p.domain)
            .collect();

        info!(
            "Coordinator merge accepted ({} trade-offs, {} domains rewritten)",
            trade_offs.len(),
            rewritten.len()
        );

        Ok(assemble(
            session_id,
            proposals,
            constraints,
            content,
            trade_offs,
            &rewritten,
            Vec::new(),
            MergeStrategy::Reasoned,
        ))
    }
}

fn read_content(value: &Value) -> Result<BTreeMap<Domain, Value>, ResolverError> {
    let Some(map) = value.get("per_domain_content").and_then(Value::as_object) else {
        return Err(ResolverError::ReasonedMergeRejected(
            "no per_domain_content object".to_string(),
        ));
    };

    let mut content = BTreeMap::new();
    for (key, section) in map {
        match key.parse::<Domain>() {
            Ok(domain) if section.is_object() => {
                content.insert(domain, section.clone());
            }
            Ok(domain) => {
                return Err(ResolverError::ReasonedMergeRejected(format!(
                    "{} section is not an object",
                    domain
                )))
            }
            Err(e) => debug!("Ignoring coordinator section: {}", e),
        }
    }

    match Domain::ALL.iter().find(|d| !content.contains_key(d)) {
        Some(missing) => Err(ResolverError::ReasonedMergeRejected(format!(
            "{} section missing",
            missing
        ))),
        None => Ok(content),
    }
}

fn read_trade_offs(value: &Value) -> Vec<TradeOff> {
    value
        .get("trade_offs")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| serde_json::from_value::<TradeOff>(t.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintKind, Rule};
    use crate::domain::Intensity;
    use crate::proposal::{baseline_content, AgentProposal};
    use crate::provider::{Script, ScriptedRunner};
    use serde_json::json;

    fn proposals() -> ValidatedProposals {
        ValidatedProposals::from_proposals(
            Domain::ALL
                .iter()
                .map(|&d| {
                    let mut raw = baseline_content(d);
                    raw["confidence"] = json!(0.8);
                    raw["reasoning"] = json!("x");
                    AgentProposal::from_response(d, raw)
                })
                .collect(),
        )
    }

    fn cap() -> ConstraintSet {
        let mut set = ConstraintSet::new();
        set.register(Constraint::new(
            "overtraining_safety",
            ConstraintKind::Hard,
            80,
            Rule::MaxIntensity {
                cap: Intensity::Moderate,
            },
        ));
        set
    }

    fn merger(reply: Value) -> ReasonedMerger {
        let runner = ScriptedRunner::new(None)
            .with_script("coordinator", Script::Reply(reply.to_string()));
        ReasonedMerger::new(
            Arc::new(runner),
            RetryConfig {
                max_attempts: 1,
                backoff_base_ms: 1,
            },
            Duration::from_secs(1),
        )
    }

    fn all_sections(fitness: Value) -> Value {
        json!({
            "per_domain_content": {
                "sleep": baseline_content(Domain::Sleep),
                "nutrition": baseline_content(Domain::Nutrition),
                "fitness": fitness,
                "mental_wellness": baseline_content(Domain::MentalWellness)
            },
            "trade_offs": [{
                "constraint_violated": "schedule",
                "domains_affected": ["fitness", "mental_wellness"],
                "resolution_rationale": "Moved sessions to mornings"
            }]
        })
    }

    #[tokio::test]
    async fn test_accepts_complete_compliant_merge() {
        let m = merger(all_sections(baseline_content(Domain::Fitness)));
        let plan = m.merge(Uuid::nil(), &proposals(), &cap()).await.unwrap();
        assert_eq!(plan.strategy, MergeStrategy::Reasoned);
        assert_eq!(plan.trade_offs.len(), 1);
        assert!(plan.confidence <= 0.8);
    }

    #[tokio::test]
    async fn test_rejects_missing_domain() {
        let mut reply = all_sections(baseline_content(Domain::Fitness));
        reply["per_domain_content"]
            .as_object_mut()
            .unwrap()
            .remove("sleep");
        let err = merger(reply)
            .merge(Uuid::nil(), &proposals(), &cap())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::ReasonedMergeRejected(_)));
    }

    #[tokio::test]
    async fn test_rejects_hard_violation() {
        let reply = all_sections(json!({
            "workout_plan": {"intensity": "high"},
            "energy_demand": "high"
        }));
        let err = merger(reply)
            .merge(Uuid::nil(), &proposals(), &cap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overtraining_safety"));
    }
}
