use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One of the four independent recommendation areas.
///
/// Variants are declared in resolution priority order, so the derived `Ord`
/// puts the highest-priority domain first: sleep > nutrition > fitness > mental-wellness.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Sleep,
    Nutrition,
    Fitness,
    #[serde(alias = "mental-wellness")]
    MentalWellness,
}

impl Domain {
    /// All domains, highest priority first
    pub const ALL: [Domain; 4] = [
        Domain::Sleep,
        Domain::Nutrition,
        Domain::Fitness,
        Domain::MentalWellness,
    ];

    /// Position in the fixed priority order (0 = highest)
    pub fn rank(self) -> usize {
        match self {
            Domain::Sleep => 0,
            Domain::Nutrition => 1,
            Domain::Fitness => 2,
            Domain::MentalWellness => 3,
        }
    }

    /// True when this domain wins a mutually exclusive conflict against `other`
    pub fn outranks(self, other: Domain) -> bool {
        self.rank() < other.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Sleep => "sleep",
            Domain::Nutrition => "nutrition",
            Domain::Fitness => "fitness",
            Domain::MentalWellness => "mental_wellness",
        }
    }

    /// Human-readable label used in prompts and reports
    pub fn title(self) -> &'static str {
        match self {
            Domain::Sleep => "Sleep",
            Domain::Nutrition => "Nutrition",
            Domain::Fitness => "Fitness",
            Domain::MentalWellness => "Mental Wellness",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sleep" => Ok(Domain::Sleep),
            "nutrition" => Ok(Domain::Nutrition),
            "fitness" => Ok(Domain::Fitness),
            "mental_wellness" | "mental" => Ok(Domain::MentalWellness),
            _ => Err(format!("Unknown domain: {}", s)),
        }
    }
}

/// Workout intensity ladder. Ordered so that `Low < Moderate < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    #[serde(alias = "medium")]
    Moderate,
    High,
}

impl Intensity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "light" | "rest" => Some(Intensity::Low),
            "moderate" | "medium" => Some(Intensity::Moderate),
            "high" | "vigorous" | "intense" => Some(Intensity::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::High => "high",
        }
    }

    /// Distance between two rungs of the ladder
    pub fn steps_above(self, cap: Intensity) -> usize {
        (self as usize).saturating_sub(cap as usize)
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery status reported by the sleep domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl RecoveryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "poor" => Some(RecoveryStatus::Poor),
            "fair" => Some(RecoveryStatus::Fair),
            "good" => Some(RecoveryStatus::Good),
            "excellent" => Some(RecoveryStatus::Excellent),
            _ => None,
        }
    }
}

/// Three-step level used for nutritional adequacy and motivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Level::Low),
            "medium" | "moderate" => Some(Level::Medium),
            "high" => Some(Level::High),
            _ => None,
        }
    }
}
