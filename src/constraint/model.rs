use super::rule::Rule;
use crate::domain::Domain;
use crate::proposal::AgentProposal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// Priority bands. Higher wins.
pub mod priority {
    /// Limits from the safety configuration
    pub const SAFETY: u32 = 100;
    /// Limits the user stated in their profile
    pub const USER: u32 = 90;
    /// Recovery and energy needs raised by a higher-priority domain
    pub const RECOVERY: u32 = 80;
    /// Preferences that only lower confidence when unmet
    pub const PREFERENCE: u32 = 40;
}

/// How a constraint binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    Hard,
    Soft,
    /// Derived for one session only; never persisted as a rule
    Dynamic { binding: Binding },
}

impl ConstraintKind {
    pub fn is_hard(self) -> bool {
        matches!(
            self,
            ConstraintKind::Hard
                | ConstraintKind::Dynamic {
                    binding: Binding::Hard
                }
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ConstraintKind::Hard => "hard",
            ConstraintKind::Soft => "soft",
            ConstraintKind::Dynamic {
                binding: Binding::Hard,
            } => "dynamic/hard",
            ConstraintKind::Dynamic {
                binding: Binding::Soft,
            } => "dynamic/soft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub priority: u32,
    /// Domain whose need this expresses; `None` for user and system limits
    #[serde(default)]
    pub owner: Option<Domain>,
    pub rule: Rule,
    #[serde(default)]
    pub rationale: String,
}

impl Constraint {
    pub fn new(name: impl Into<String>, kind: ConstraintKind, priority: u32, rule: Rule) -> Self {
        Self {
            name: name.into(),
            kind,
            priority,
            owner: None,
            rule,
            rationale: String::new(),
        }
    }

    pub fn owned_by(mut self, domain: Domain) -> Self {
        self.owner = Some(domain);
        self
    }

    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn is_hard(&self) -> bool {
        self.kind.is_hard()
    }

    pub fn target(&self) -> Option<Domain> {
        self.rule.target()
    }

    pub fn applies_to(&self, domain: Domain) -> bool {
        self.rule.applies_to(domain)
    }

    /// Violation cost of a proposal; content-less proposals cost nothing
    pub fn violation_cost(&self, proposal: &AgentProposal) -> f64 {
        proposal
            .content
            .as_ref()
            .map(|c| self.rule.cost(proposal.domain, c))
            .unwrap_or(0.0)
    }

    pub fn cost_on(&self, domain: Domain, content: &Value) -> f64 {
        self.rule.cost(domain, content)
    }

    /// Whether this constraint may force a rewrite of `target`'s content.
    /// A domain-owned constraint never overrides a higher-priority domain.
    pub fn may_rewrite(&self, target: Domain) -> bool {
        self.owner.map(|owner| !target.outranks(owner)).unwrap_or(true)
    }

    /// Rank of the owner with user and system limits ahead of every domain
    fn owner_rank(&self) -> usize {
        self.owner.map(|d| d.rank() + 1).unwrap_or(0)
    }

    /// Total precedence order: priority, then owner in fixed domain order, then name
    pub fn precedence(&self, other: &Constraint) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.owner_rank().cmp(&other.owner_rank()))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// One constraint's cost against one proposal
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub constraint: String,
    pub hard: bool,
    pub cost: f64,
}

/// Session constraints kept in precedence order, unique by name
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, replacing any existing one with the same name
    pub fn register(&mut self, constraint: Constraint) -> Option<Constraint> {
        debug!(
            "Registering {} constraint '{}' (priority {})",
            constraint.kind.label(),
            constraint.name,
            constraint.priority
        );

        let replaced = self
            .constraints
            .iter()
            .position(|c| c.name == constraint.name)
            .map(|i| self.constraints.remove(i));

        let at = self
            .constraints
            .partition_point(|c| c.precedence(&constraint) == Ordering::Less);
        self.constraints.insert(at, constraint);
        replaced
    }

    pub fn extend(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        for c in constraints {
            self.register(c);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Constraints that measure `domain`, in precedence order
    pub fn targeting(&self, domain: Domain) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.applies_to(domain))
    }

    /// Total violation cost of a proposal
    pub fn evaluate(&self, proposal: &AgentProposal) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation_cost(proposal))
            .sum()
    }

    /// Every nonzero violation of a proposal, in precedence order
    pub fn violations(&self, proposal: &AgentProposal) -> Vec<Violation> {
        self.constraints
            .iter()
            .filter_map(|c| {
                let cost = c.violation_cost(proposal);
                (cost > 0.0).then(|| Violation {
                    constraint: c.name.clone(),
                    hard: c.is_hard(),
                    cost,
                })
            })
            .collect()
    }

    pub fn is_hard_satisfied(&self, proposal: &AgentProposal) -> bool {
        self.constraints
            .iter()
            .filter(|c| c.is_hard())
            .all(|c| c.violation_cost(proposal) == 0.0)
    }
}
