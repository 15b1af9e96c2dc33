use crate::domain::{Domain, Intensity, Level, RecoveryStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Keys lifted out of a raw response into typed proposal fields
const META_KEYS: [&str; 6] = [
    "confidence",
    "reasoning",
    "constraints_used",
    "dependencies",
    "domain",
    "error",
];

/// Where a proposal came from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalOrigin {
    /// Produced by the domain's reasoning capability
    Reasoned,
    /// Static stand-in produced by the validator
    Synthesized { reason: String },
}

/// A domain's structured recommendation plus confidence and reasoning.
///
/// A proposal with `error` set is a degraded marker: its content is `None` and its
/// confidence is 0. Proposals straight off the wire may carry a non-finite
/// confidence when the response had none or a non-numeric one; the validator
/// rejects those before anything downstream sees them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentProposal {
    pub domain: Domain,

    #[serde(default)]
    pub content: Option<Value>,

    pub confidence: f64,

    #[serde(default)]
    pub constraints_used: BTreeSet<String>,

    #[serde(default)]
    pub dependencies: BTreeSet<Domain>,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub origin: ProposalOrigin,
}

impl AgentProposal {
    /// Degraded proposal for a domain whose reasoning call failed
    pub fn failed(domain: Domain, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            domain,
            content: None,
            confidence: 0.0,
            constraints_used: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            reasoning: format!("{} reasoning failed: {}", domain.title(), error),
            error: Some(error),
            origin: ProposalOrigin::Reasoned,
        }
    }

    /// Build a proposal from a parsed response object.
    ///
    /// Meta fields are lifted out; everything else becomes `content`. Missing or
    /// non-numeric confidence is kept as NaN so the validator can reject it.
    pub fn from_response(domain: Domain, value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::failed(domain, "response is not a JSON object");
        };

        // An explicit error from the reasoning side is still a degraded marker
        if let Some(err) = map.get("error").and_then(Value::as_str) {
            if !err.is_empty() {
                return Self::failed(domain, err.to_string());
            }
        }

        let confidence = map
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(f64::NAN);

        let reasoning = map
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let constraints_used = map
            .get("constraints_used")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let dependencies = map
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse::<Domain>().ok())
                    .collect()
            })
            .unwrap_or_default();

        for key in META_KEYS {
            map.remove(key);
        }

        Self {
            domain,
            content: Some(Value::Object(map)),
            confidence,
            constraints_used,
            dependencies,
            reasoning,
            error: None,
            origin: ProposalOrigin::Reasoned,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self.origin, ProposalOrigin::Synthesized { .. })
    }

    /// Top-level content field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.content.as_ref()?.get(key)
    }

    /// Proposed workout intensity: explicit plan intensity, else the energy demand
    pub fn intensity(&self) -> Option<Intensity> {
        content_intensity(self.content.as_ref()?)
    }

    pub fn recovery_status(&self) -> Option<RecoveryStatus> {
        self.field("recovery_status")
            .and_then(Value::as_str)
            .and_then(RecoveryStatus::parse)
    }

    pub fn nutritional_adequacy(&self) -> Option<Level> {
        self.field("nutritional_adequacy")
            .and_then(Value::as_str)
            .and_then(Level::parse)
    }

    pub fn motivation_level(&self) -> Option<Level> {
        self.field("motivation_level")
            .and_then(Value::as_str)
            .and_then(Level::parse)
    }
}

/// Intensity read from a fitness content object
pub fn content_intensity(content: &Value) -> Option<Intensity> {
    content
        .get("workout_plan")
        .and_then(|plan| plan.get("intensity"))
        .and_then(Value::as_str)
        .and_then(Intensity::parse)
        .or_else(|| {
            content
                .get("energy_demand")
                .and_then(Value::as_str)
                .and_then(Intensity::parse)
        })
}

/// Workout sessions listed in a fitness content object
pub fn content_sessions(content: &Value) -> &[Value] {
    content
        .get("workout_plan")
        .and_then(|plan| plan.get("sessions"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Sum of session durations in minutes
pub fn content_weekly_minutes(content: &Value) -> f64 {
    content_sessions(content)
        .iter()
        .filter_map(|s| {
            s.get("duration_minutes")
                .or_else(|| s.get("duration"))
                .and_then(Value::as_f64)
        })
        .sum()
}

/// Mutable access to a nested object, creating it when absent
pub fn object_at<'a>(content: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
    let map = content.as_object_mut()?;
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    entry.as_object_mut()
}
