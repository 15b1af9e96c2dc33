use super::fallback::synthesize;
use super::types::AgentProposal;
use crate::domain::{Domain, Intensity, Level, RecoveryStatus};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Why a proposal was refused
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    Errored(String),
    DomainMismatch { expected: Domain, found: Domain },
    MissingContent,
    ConfidenceNotNumeric,
    ConfidenceOutOfRange(f64),
    MissingReasoning,
    MissingField(&'static str),
    InvalidField { field: &'static str, reason: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::Errored(e) => write!(f, "reasoning error: {}", e),
            ValidationIssue::DomainMismatch { expected, found } => {
                write!(f, "proposal for {} arrived in the {} slot", found, expected)
            }
            ValidationIssue::MissingContent => write!(f, "no content"),
            ValidationIssue::ConfidenceNotNumeric => write!(f, "confidence missing or not numeric"),
            ValidationIssue::ConfidenceOutOfRange(c) => {
                write!(f, "confidence {} outside [0, 1]", c)
            }
            ValidationIssue::MissingReasoning => write!(f, "reasoning missing"),
            ValidationIssue::MissingField(field) => write!(f, "required field '{}' missing", field),
            ValidationIssue::InvalidField { field, reason } => {
                write!(f, "field '{}' invalid: {}", field, reason)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Object,
    Intensity,
    Level,
    Recovery,
}

/// Domain-specific required fields
fn required_fields(domain: Domain) -> [(&'static str, FieldKind); 2] {
    match domain {
        Domain::Fitness => [
            ("workout_plan", FieldKind::Object),
            ("energy_demand", FieldKind::Intensity),
        ],
        Domain::Nutrition => [
            ("meal_plan", FieldKind::Object),
            ("nutritional_adequacy", FieldKind::Level),
        ],
        Domain::Sleep => [
            ("sleep_recommendations", FieldKind::Object),
            ("recovery_status", FieldKind::Recovery),
        ],
        Domain::MentalWellness => [
            ("wellness_recommendations", FieldKind::Object),
            ("motivation_level", FieldKind::Level),
        ],
    }
}

fn check_field(content: &Value, field: &'static str, kind: FieldKind) -> Option<ValidationIssue> {
    let Some(value) = content.get(field) else {
        return Some(ValidationIssue::MissingField(field));
    };

    let ok = match kind {
        FieldKind::Object => value.is_object(),
        FieldKind::Intensity => value.as_str().and_then(Intensity::parse).is_some(),
        FieldKind::Level => value.as_str().and_then(Level::parse).is_some(),
        FieldKind::Recovery => value.as_str().and_then(RecoveryStatus::parse).is_some(),
    };

    if ok {
        None
    } else {
        let expected = match kind {
            FieldKind::Object => "an object",
            FieldKind::Intensity => "one of low/moderate/high",
            FieldKind::Level => "one of low/medium/high",
            FieldKind::Recovery => "one of poor/fair/good/excellent",
        };
        Some(ValidationIssue::InvalidField {
            field,
            reason: format!("expected {}, got {}", expected, value),
        })
    }
}

/// Outcome of admitting one proposal
#[derive(Debug, Clone)]
pub struct Admission {
    pub proposal: AgentProposal,
    pub issues: Vec<ValidationIssue>,
}

impl Admission {
    pub fn substituted(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Exactly one admitted proposal per domain, highest priority first
#[derive(Debug, Clone)]
pub struct ValidatedProposals {
    admissions: BTreeMap<Domain, Admission>,
}

impl ValidatedProposals {
    pub fn get(&self, domain: Domain) -> &AgentProposal {
        // Construction guarantees all four slots
        &self.admissions[&domain].proposal
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProposal> {
        self.admissions.values().map(|a| &a.proposal)
    }

    pub fn admissions(&self) -> impl Iterator<Item = &Admission> {
        self.admissions.values()
    }

    pub fn substituted_domains(&self) -> Vec<Domain> {
        self.admissions
            .iter()
            .filter(|(_, a)| a.substituted())
            .map(|(d, _)| *d)
            .collect()
    }

    /// Direct construction for already-validated input
    #[cfg(test)]
    pub fn from_proposals(proposals: Vec<AgentProposal>) -> Self {
        let validator = ProposalValidator::new(0.1);
        let mut slots: BTreeMap<Domain, AgentProposal> =
            proposals.into_iter().map(|p| (p.domain, p)).collect();
        validator.admit_all(|d| {
            slots
                .remove(&d)
                .unwrap_or_else(|| AgentProposal::failed(d, "missing in test input"))
        })
    }
}

/// Schema and completeness gate between the fan-out and the resolver
#[derive(Debug, Clone)]
pub struct ProposalValidator {
    fallback_confidence: f64,
}

impl ProposalValidator {
    pub fn new(fallback_confidence: f64) -> Self {
        Self {
            fallback_confidence,
        }
    }

    /// All issues with `proposal` as the proposal for `slot`
    pub fn validate(&self, slot: Domain, proposal: &AgentProposal) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(err) = &proposal.error {
            issues.push(ValidationIssue::Errored(err.clone()));
            return issues;
        }

        if proposal.domain != slot {
            issues.push(ValidationIssue::DomainMismatch {
                expected: slot,
                found: proposal.domain,
            });
        }

        if !proposal.confidence.is_finite() {
            issues.push(ValidationIssue::ConfidenceNotNumeric);
        } else if !(0.0..=1.0).contains(&proposal.confidence) {
            issues.push(ValidationIssue::ConfidenceOutOfRange(proposal.confidence));
        }

        if proposal.reasoning.trim().is_empty() {
            issues.push(ValidationIssue::MissingReasoning);
        }

        match &proposal.content {
            Some(content) if content.is_object() => {
                for (field, kind) in required_fields(slot) {
                    if let Some(issue) = check_field(content, field, kind) {
                        issues.push(issue);
                    }
                }
            }
            _ => issues.push(ValidationIssue::MissingContent),
        }

        issues
    }

    /// Pass a valid proposal through or substitute the static fallback
    pub fn admit(&self, slot: Domain, proposal: AgentProposal) -> Admission {
        let issues = self.validate(slot, &proposal);

        if issues.is_empty() {
            debug!("{} proposal accepted (confidence {:.2})", slot, proposal.confidence);
            return Admission { proposal, issues };
        }

        let reason = issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        warn!("{} proposal rejected, substituting fallback: {}", slot, reason);

        Admission {
            proposal: synthesize(slot, self.fallback_confidence, reason),
            issues,
        }
    }

    /// Admit one proposal per domain, pulling each from `take`
    pub fn admit_all(&self, mut take: impl FnMut(Domain) -> AgentProposal) -> ValidatedProposals {
        let admissions = Domain::ALL
            .iter()
            .map(|&domain| (domain, self.admit(domain, take(domain))))
            .collect();
        ValidatedProposals { admissions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::fallback::baseline_content;
    use crate::proposal::ProposalOrigin;
    use serde_json::json;

    fn valid(domain: Domain) -> AgentProposal {
        let mut raw = baseline_content(domain);
        raw["confidence"] = json!(0.8);
        raw["reasoning"] = json!("looks good");
        AgentProposal::from_response(domain, raw)
    }

    #[test]
    fn test_valid_proposal_passes_through() {
        let validator = ProposalValidator::new(0.1);
        for domain in Domain::ALL {
            let admission = validator.admit(domain, valid(domain));
            assert!(!admission.substituted(), "{} should pass", domain);
            assert_eq!(admission.proposal.origin, ProposalOrigin::Reasoned);
            assert_eq!(admission.proposal.confidence, 0.8);
        }
    }

    #[test]
    fn test_out_of_range_confidence_substitutes() {
        let validator = ProposalValidator::new(0.1);
        let mut proposal = valid(Domain::Sleep);
        proposal.confidence = 1.4;

        let admission = validator.admit(Domain::Sleep, proposal);
        assert!(admission.substituted());
        assert_eq!(
            admission.issues,
            vec![ValidationIssue::ConfidenceOutOfRange(1.4)]
        );
        assert!(admission.proposal.is_synthesized());
        assert_eq!(admission.proposal.confidence, 0.1);
    }

    #[test]
    fn test_non_numeric_confidence_substitutes() {
        let validator = ProposalValidator::new(0.1);
        let mut raw = baseline_content(Domain::Fitness);
        raw["confidence"] = json!("high");
        raw["reasoning"] = json!("x");
        let proposal = AgentProposal::from_response(Domain::Fitness, raw);

        let admission = validator.admit(Domain::Fitness, proposal);
        assert!(admission
            .issues
            .contains(&ValidationIssue::ConfidenceNotNumeric));
        assert!(admission.proposal.is_synthesized());
    }

    #[test]
    fn test_missing_domain_fields_reported() {
        let validator = ProposalValidator::new(0.1);
        let raw = json!({
            "meal_plan": "three meals",
            "confidence": 0.7,
            "reasoning": "x"
        });
        let proposal = AgentProposal::from_response(Domain::Nutrition, raw);
        let issues = validator.validate(Domain::Nutrition, &proposal);

        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::InvalidField { field: "meal_plan", .. })));
        assert!(issues.contains(&ValidationIssue::MissingField("nutritional_adequacy")));
    }

    #[test]
    fn test_error_proposal_substitutes() {
        let validator = ProposalValidator::new(0.1);
        let admission = validator.admit(
            Domain::MentalWellness,
            AgentProposal::failed(Domain::MentalWellness, "timed out"),
        );
        assert!(admission.proposal.is_synthesized());
        assert!(admission.proposal.reasoning.contains("timed out"));
    }

    #[test]
    fn test_admit_all_fills_every_slot() {
        let validator = ProposalValidator::new(0.1);
        let validated = validator.admit_all(|d| {
            if d == Domain::Fitness {
                AgentProposal::failed(d, "boom")
            } else {
                valid(d)
            }
        });

        assert_eq!(validated.iter().count(), 4);
        assert_eq!(validated.substituted_domains(), vec![Domain::Fitness]);
        let order: Vec<_> = validated.iter().map(|p| p.domain).collect();
        assert_eq!(order, Domain::ALL.to_vec());
    }
}
