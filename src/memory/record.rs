use crate::domain::Domain;
use crate::plan::UnifiedPlan;
use crate::proposal::ValidatedProposals;
use crate::state::SharedState;
use crate::workflow::Transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a domain's own proposal fared in the committed plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningSignal {
    /// Committed as proposed
    Accepted,
    /// Committed after a constraint or safety rewrite
    Rewritten,
    /// Replaced by the static baseline
    Substituted,
}

/// Episodic memory entry, one per domain per committed session
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MemoryRecord {
    pub session_id: Uuid,
    pub domain: Domain,
    pub outcome: String,
    pub contribution_summary: String,
    pub learning_signal: LearningSignal,
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn from_plan(plan: &UnifiedPlan, proposals: &ValidatedProposals, domain: Domain) -> Self {
        let learning_signal = if plan.synthesized.contains_key(&domain) {
            LearningSignal::Substituted
        } else if proposals.get(domain).content.as_ref() != plan.content(domain) {
            LearningSignal::Rewritten
        } else {
            LearningSignal::Accepted
        };

        let weight = plan
            .agent_contributions
            .get(&domain)
            .copied()
            .unwrap_or_default();
        let trade_offs: Vec<&str> = plan
            .trade_offs
            .iter()
            .filter(|t| t.domains_affected.contains(&domain))
            .map(|t| t.constraint_violated.as_str())
            .collect();

        let contribution_summary = if trade_offs.is_empty() {
            format!("weight {:.2}, no trade-offs", weight)
        } else {
            format!("weight {:.2}, trade-offs: {}", weight, trade_offs.join(", "))
        };

        Self {
            session_id: plan.session_id,
            domain,
            outcome: format!(
                "committed at confidence {:.2} ({})",
                plan.confidence,
                plan.short_fingerprint()
            ),
            contribution_summary,
            learning_signal,
            timestamp: Utc::now(),
        }
    }
}

/// Everything the durable store keeps for a session, in append order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum StoredRecord {
    Snapshot(SharedState),
    Transition(Transition),
    Plan(UnifiedPlan),
    Memory(MemoryRecord),
}

impl StoredRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredRecord::Snapshot(_) => "snapshot",
            StoredRecord::Transition(_) => "transition",
            StoredRecord::Plan(_) => "plan",
            StoredRecord::Memory(_) => "memory",
        }
    }
}
