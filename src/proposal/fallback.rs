//! Static baseline recommendations used when a domain has no usable proposal.
//!
//! Every baseline is deliberately conservative (low intensity, adequate intake,
//! full sleep window) so a synthesized domain never drives a conflict against a
//! real one.

use super::types::{AgentProposal, ProposalOrigin};
use crate::domain::Domain;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Conservative static content for a domain
pub fn baseline_content(domain: Domain) -> Value {
    match domain {
        Domain::Fitness => json!({
            "workout_plan": {
                "focus": "general_movement",
                "intensity": "low",
                "sessions": [
                    {"day": "Monday", "type": "Brisk walk", "duration_minutes": 30},
                    {"day": "Wednesday", "type": "Mobility and stretching", "duration_minutes": 25},
                    {"day": "Friday", "type": "Bodyweight circuit", "duration_minutes": 30}
                ],
                "progression": "Hold volume steady until the next review"
            },
            "energy_demand": "low"
        }),
        Domain::Nutrition => json!({
            "meal_plan": {
                "focus": "balanced_nutrition",
                "daily_calories": 2000,
                "meals": [
                    {"meal": "Breakfast", "items": ["Oatmeal with berries", "Greek yogurt"], "calories": 450},
                    {"meal": "Lunch", "items": ["Grilled chicken salad", "Whole grain bread"], "calories": 650},
                    {"meal": "Snack", "items": ["Apple", "Handful of nuts"], "calories": 250},
                    {"meal": "Dinner", "items": ["Baked salmon", "Quinoa", "Steamed vegetables"], "calories": 650}
                ],
                "hydration": "8-10 glasses of water"
            },
            "nutritional_adequacy": "medium"
        }),
        Domain::Sleep => json!({
            "sleep_recommendations": {
                "target_hours": 8,
                "bedtime": "22:30",
                "wake_time": "06:30",
                "sleep_hygiene": [
                    "No screens 1 hour before bed",
                    "Avoid caffeine after 2 PM"
                ]
            },
            "recovery_status": "fair"
        }),
        Domain::MentalWellness => json!({
            "wellness_recommendations": {
                "focus": "stress_management",
                "daily_practices": [
                    {"activity": "Breathing exercise", "duration": "5 min"},
                    {"activity": "Gratitude journaling", "duration": "5 min"}
                ]
            },
            "motivation_level": "medium"
        }),
    }
}

/// Synthesize a stand-in proposal for `domain`
pub fn synthesize(domain: Domain, confidence: f64, reason: impl Into<String>) -> AgentProposal {
    let reason = reason.into();
    AgentProposal {
        domain,
        content: Some(baseline_content(domain)),
        confidence,
        constraints_used: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        reasoning: format!(
            "Static {} baseline substituted: {}",
            domain.title().to_lowercase(),
            reason
        ),
        error: None,
        origin: ProposalOrigin::Synthesized { reason },
    }
}
