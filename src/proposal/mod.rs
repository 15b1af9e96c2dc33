//! Proposal schema, validation and fallback synthesis

mod fallback;
mod types;
mod validator;

pub use fallback::{baseline_content, synthesize};
pub use types::{
    content_intensity, content_sessions, content_weekly_minutes, object_at, AgentProposal,
    ProposalOrigin,
};
pub use validator::{Admission, ProposalValidator, ValidatedProposals, ValidationIssue};
