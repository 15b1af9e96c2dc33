use crate::error::OutputError;
use crate::safety::CheckOutcome;
use crate::workflow::{SessionOutcome, SessionState, Transition};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Machine-readable record of how a session ended
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub timestamp: String,
    pub session_id: Uuid,
    pub state: SessionState,
    pub fingerprint: String,
    pub confidence: f64,
    pub trade_offs: usize,
    pub substituted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub safety: Vec<CheckOutcome>,
    pub transitions: Vec<Transition>,
    pub exit_code: i32,
    pub report_dir: PathBuf,
}

impl SessionSummary {
    pub fn from_outcome(outcome: &SessionOutcome, report_dir: PathBuf) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            session_id: outcome.session_id,
            state: outcome.state,
            fingerprint: outcome.plan.fingerprint(),
            confidence: outcome.plan.confidence,
            trade_offs: outcome.plan.trade_offs.len(),
            substituted: outcome
                .plan
                .synthesized
                .keys()
                .map(|d| d.to_string())
                .collect(),
            reason: outcome.reason.clone(),
            safety: outcome.safety.clone(),
            transitions: outcome.trail.clone(),
            exit_code: exit_code(outcome.state),
            report_dir,
        }
    }
}

/// 0 when committed, 2 when the safe fallback plan was emitted
pub fn exit_code(state: SessionState) -> i32 {
    match state {
        SessionState::Committed => 0,
        _ => 2,
    }
}

/// Write `summary.json` next to the plan report
pub fn write_summary(session_dir: &Path, outcome: &SessionOutcome) -> Result<(), OutputError> {
    fs::create_dir_all(session_dir).map_err(OutputError::CreateDir)?;

    let summary = SessionSummary::from_outcome(outcome, session_dir.to_path_buf());
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(session_dir.join("summary.json"), json).map_err(OutputError::WriteReport)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::UnifiedPlan;
    use tempfile::TempDir;

    #[test]
    fn test_summary_carries_exit_code() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let outcome = SessionOutcome {
            session_id: id,
            state: SessionState::FailedSafe,
            plan: UnifiedPlan::fail_safe(id, "non-terminating merge"),
            reason: Some("non-terminating merge".to_string()),
            safety: Vec::new(),
            trail: Vec::new(),
        };

        write_summary(dir.path(), &outcome).unwrap();
        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["exit_code"], 2);
        assert_eq!(json["state"], "FAILED_SAFE");
        assert_eq!(json["substituted"].as_array().unwrap().len(), 4);
    }
}
