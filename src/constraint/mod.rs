//! Typed constraints, violation scoring and session-scoped derivation

mod derive;
mod model;
mod rule;

pub use derive::{
    cross_domain_constraints, recent_data_constraints, safety_constraints, session_constraints,
    user_constraints,
};
pub use model::{priority, Binding, Constraint, ConstraintKind, ConstraintSet, Violation};
pub use rule::{crosses_medical_boundary, Rule, MEDICAL_REFERRAL};
