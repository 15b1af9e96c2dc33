use crate::constraint::{Constraint, ConstraintSet};
use crate::domain::Domain;
use crate::error::ConfigError;
use crate::memory::SemanticSummary;
use crate::plan::UnifiedPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(default)]
    pub goals: Vec<String>,

    #[serde(default)]
    pub dietary_restrictions: Vec<String>,

    /// Hard ceiling on training time per week
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_training_minutes: Option<u32>,

    /// Share of the food budget the plan may use, 0 to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_utilization_cap: Option<f64>,

    /// Anything else the caller sent, passed through to prompts untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RecentData {
    /// Nightly sleep durations, most recent last
    #[serde(default)]
    pub sleep_hours: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_debt_hours: Option<f64>,

    /// Self-reported stress on a 1 to 10 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecentData {
    pub fn average_sleep(&self) -> Option<f64> {
        if self.sleep_hours.is_empty() {
            None
        } else {
            Some(self.sleep_hours.iter().sum::<f64>() / self.sleep_hours.len() as f64)
        }
    }
}

/// Inbound request for one planning session
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserData {
    #[serde(default)]
    pub user_profile: UserProfile,

    #[serde(default)]
    pub recent_data: RecentData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_plan: Option<UnifiedPlan>,
}

impl UserData {
    /// Load user data from YAML or JSON
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadInput {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseInput(e.to_string()))
    }
}

/// Immutable per-session snapshot.
///
/// Never edited in place: `revise` hands back a new snapshot with the next
/// sequence number and the old one stays valid for replay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SharedState {
    pub session_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub user_profile: UserProfile,
    pub recent_data: RecentData,
    pub constraints: ConstraintSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_plan: Option<UnifiedPlan>,
    /// How each domain's earlier proposals fared
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<Domain, SemanticSummary>,
}

impl SharedState {
    /// First snapshot of a session
    pub fn open(session_id: Uuid, data: UserData, constraints: ConstraintSet) -> Self {
        Self {
            session_id,
            sequence: 0,
            timestamp: Utc::now(),
            user_profile: data.user_profile,
            recent_data: data.recent_data,
            constraints,
            prior_plan: data.prior_plan,
            history: BTreeMap::new(),
        }
    }

    /// Attach learning history while the first snapshot is still being built
    pub fn with_history(mut self, history: BTreeMap<Domain, SemanticSummary>) -> Self {
        self.history = history;
        self
    }

    /// New snapshot derived from this one
    pub fn revise(&self, change: impl FnOnce(&mut SharedState)) -> SharedState {
        let mut next = self.clone();
        change(&mut next);
        next.session_id = self.session_id;
        next.sequence = self.sequence + 1;
        next.timestamp = Utc::now();
        next
    }

    /// New snapshot with extra constraints registered
    pub fn with_constraints(&self, extra: Vec<Constraint>) -> SharedState {
        self.revise(|s| s.constraints.extend(extra))
    }

    /// Read-only view handed to one domain's reasoning call
    pub fn slice_for(&self, domain: Domain) -> DomainContext {
        DomainContext {
            session_id: self.session_id,
            sequence: self.sequence,
            domain,
            user_profile: self.user_profile.clone(),
            recent_data: self.recent_data.clone(),
            constraints: self.constraints.targeting(domain).cloned().collect(),
            prior_content: self
                .prior_plan
                .as_ref()
                .and_then(|p| p.per_domain_content.get(&domain))
                .cloned(),
            history: self
                .history
                .get(&domain)
                .filter(|h| h.sessions > 0)
                .cloned(),
        }
    }
}

/// What one domain's reasoning call gets to see
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainContext {
    pub session_id: Uuid,
    pub sequence: u64,
    pub domain: Domain,
    pub user_profile: UserProfile,
    pub recent_data: RecentData,
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<SemanticSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintKind, Rule};
    use crate::domain::Intensity;
    use std::io::Write;

    fn cap_fitness() -> Constraint {
        Constraint::new(
            "overtraining_safety",
            ConstraintKind::Hard,
            80,
            Rule::MaxIntensity {
                cap: Intensity::Moderate,
            },
        )
        .owned_by(Domain::Sleep)
    }

    #[test]
    fn test_revise_produces_new_snapshot() {
        let first = SharedState::open(Uuid::new_v4(), UserData::default(), ConstraintSet::new());
        let second = first.with_constraints(vec![cap_fitness()]);

        assert_eq!(first.sequence, 0);
        assert!(first.constraints.is_empty());
        assert_eq!(second.sequence, 1);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.constraints.len(), 1);
    }

    #[test]
    fn test_slice_only_carries_targeting_constraints() {
        let mut constraints = ConstraintSet::new();
        constraints.register(cap_fitness());
        let state = SharedState::open(Uuid::new_v4(), UserData::default(), constraints);

        assert_eq!(state.slice_for(Domain::Fitness).constraints.len(), 1);
        assert!(state.slice_for(Domain::Sleep).constraints.is_empty());
    }

    #[test]
    fn test_load_user_data_json_and_extra_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "user_profile": {{"user_id": "u1", "weekly_training_minutes": 150, "fitness_level": "intermediate"}},
                "recent_data": {{"sleep_hours": [6.0, 5.0, 7.0], "stress_level": 4}}
            }}"#
        )
        .unwrap();

        let data = UserData::load(file.path()).unwrap();
        assert_eq!(data.user_profile.weekly_training_minutes, Some(150));
        assert_eq!(data.user_profile.extra["fitness_level"], "intermediate");
        assert_eq!(data.recent_data.average_sleep(), Some(6.0));
    }
}
