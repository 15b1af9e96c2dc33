use crate::domain::Domain;
use crate::proposal::baseline_content;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Audit record of one override made while merging
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TradeOff {
    pub constraint_violated: String,
    pub domains_affected: Vec<Domain>,
    pub resolution_rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Deterministic,
    Reasoned,
    /// Static pre-approved plan, nothing personalized
    FailSafe,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::Deterministic => write!(f, "deterministic"),
            MergeStrategy::Reasoned => write!(f, "reasoned"),
            MergeStrategy::FailSafe => write!(f, "fail-safe"),
        }
    }
}

/// The one plan a session produces
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnifiedPlan {
    pub session_id: Uuid,
    pub per_domain_content: BTreeMap<Domain, Value>,
    pub trade_offs: Vec<TradeOff>,
    pub confidence: f64,
    pub agent_contributions: BTreeMap<Domain, f64>,

    /// Domains whose content is a static substitute, with the reason
    #[serde(default)]
    pub synthesized: BTreeMap<Domain, String>,

    /// Hard constraints set aside because a higher-priority domain won
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waived: Vec<String>,

    pub safety_validated: bool,
    pub strategy: MergeStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl UnifiedPlan {
    /// Static pre-approved plan returned when personalization failed
    pub fn fail_safe(session_id: Uuid, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        let per_domain_content = Domain::ALL
            .iter()
            .map(|&d| (d, baseline_content(d)))
            .collect();
        let synthesized = Domain::ALL
            .iter()
            .map(|&d| (d, "pre-approved safe plan".to_string()))
            .collect();

        Self {
            session_id,
            per_domain_content,
            trade_offs: Vec::new(),
            confidence: 0.0,
            agent_contributions: Domain::ALL.iter().map(|&d| (d, 0.25)).collect(),
            synthesized,
            waived: Vec::new(),
            safety_validated: true,
            strategy: MergeStrategy::FailSafe,
            explanation: Some(format!(
                "We could not personalize your plan this time: {}. \
                 This is a general, conservative plan instead.",
                explanation
            )),
        }
    }

    pub fn content(&self, domain: Domain) -> Option<&Value> {
        self.per_domain_content.get(&domain)
    }

    /// SHA-256 over the canonical JSON of per-domain content and trade-offs
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "content": self.per_domain_content,
            "trade_offs": self.trade_offs,
        });
        let hash = Sha256::digest(canonical.to_string().as_bytes());
        format!("{:x}", hash)
    }

    /// Short fingerprint for log lines
    pub fn short_fingerprint(&self) -> String {
        self.fingerprint()[..12].to_string()
    }
}
