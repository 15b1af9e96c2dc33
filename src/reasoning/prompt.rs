use crate::constraint::Constraint;
use crate::domain::Domain;
use crate::memory::SemanticSummary;
use crate::proposal::ValidatedProposals;
use crate::state::DomainContext;
use serde_json::json;

fn role(domain: Domain) -> &'static str {
    match domain {
        Domain::Sleep => {
            "You are the sleep and recovery specialist. Protect recovery, assess sleep debt \
             and report a recovery status the other domains must respect."
        }
        Domain::Nutrition => {
            "You are the nutrition specialist. Build a meal plan that meets nutritional needs \
             within the user's budget, restrictions and schedule."
        }
        Domain::Fitness => {
            "You are the fitness specialist. Build a sustainable workout plan that prevents \
             overtraining and fits the user's available time."
        }
        Domain::MentalWellness => {
            "You are the mental wellness specialist. Keep motivation up and cognitive load \
             manageable so the other recommendations are actually followed."
        }
    }
}

/// Fields the response must carry for `domain`, as a JSON skeleton
fn output_contract(domain: Domain) -> serde_json::Value {
    let mut contract = match domain {
        Domain::Sleep => json!({
            "sleep_recommendations": {"target_hours": 8, "bedtime": "HH:MM", "wake_time": "HH:MM"},
            "recovery_status": "poor | fair | good | excellent"
        }),
        Domain::Nutrition => json!({
            "meal_plan": {"daily_calories": 2000, "meals": []},
            "nutritional_adequacy": "low | medium | high",
            "budget_utilization": 0.0
        }),
        Domain::Fitness => json!({
            "workout_plan": {"intensity": "low | moderate | high", "sessions": [{"day": "Monday", "type": "", "duration_minutes": 30}]},
            "energy_demand": "low | moderate | high"
        }),
        Domain::MentalWellness => json!({
            "wellness_recommendations": {"daily_practices": []},
            "motivation_level": "low | medium | high"
        }),
    };
    contract["confidence"] = json!("number between 0 and 1");
    contract["reasoning"] = json!("short explanation");
    contract["constraints_used"] = json!(["names of constraints you applied"]);
    contract["dependencies"] = json!(["domains your plan depends on"]);
    contract
}

fn constraint_line(c: &Constraint) -> String {
    let rule = serde_json::to_string(&c.rule).unwrap_or_default();
    format!(
        "- `{}` ({}, priority {}): {} {}\n",
        c.name,
        c.kind.label(),
        c.priority,
        c.rationale,
        rule
    )
}

fn history_section(history: &SemanticSummary) -> String {
    let mut section = format!(
        "## Past Sessions\n\n{} earlier plans; {:.0}% of your proposals were committed as proposed.\n",
        history.sessions,
        history.acceptance_rate * 100.0
    );
    for (signal, count) in &history.signals {
        section.push_str(&format!("- {}: {}\n", signal, count));
    }
    if history.signals.get("rewritten").copied().unwrap_or(0) > 0 {
        section.push_str(
            "Rewritten proposals broke a constraint above; stay inside them from the start.\n",
        );
    }
    section.push('\n');
    section
}

/// Prompt for one domain's reasoning call
pub fn domain_prompt(ctx: &DomainContext) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# {} Proposal\n\n", ctx.domain.title()));
    prompt.push_str(role(ctx.domain));
    prompt.push_str("\nNever diagnose, prescribe medication or give dosages.\n\n");

    prompt.push_str("## User Profile\n\n```json\n");
    prompt.push_str(&serde_json::to_string_pretty(&ctx.user_profile).unwrap_or_default());
    prompt.push_str("\n```\n\n");

    prompt.push_str("## Recent Data\n\n```json\n");
    prompt.push_str(&serde_json::to_string_pretty(&ctx.recent_data).unwrap_or_default());
    prompt.push_str("\n```\n\n");

    if !ctx.constraints.is_empty() {
        prompt.push_str("## Constraints\n\n");
        for c in &ctx.constraints {
            prompt.push_str(&constraint_line(c));
        }
        prompt.push('\n');
    }

    if let Some(prior) = &ctx.prior_content {
        prompt.push_str("## Previous Plan\n\n```json\n");
        prompt.push_str(&serde_json::to_string_pretty(prior).unwrap_or_default());
        prompt.push_str("\n```\n\n");
    }

    if let Some(history) = &ctx.history {
        prompt.push_str(&history_section(history));
    }

    prompt.push_str("## Output\n\nRespond with a single JSON object of this shape and nothing else:\n\n```json\n");
    prompt.push_str(&serde_json::to_string_pretty(&output_contract(ctx.domain)).unwrap_or_default());
    prompt.push_str("\n```\n");

    prompt
}

/// Prompt asking the coordinator to merge admitted proposals
pub fn merge_prompt(proposals: &ValidatedProposals, constraints: &[&Constraint]) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Coordinate Wellness Plan\n\n");
    prompt.push_str(
        "You merge four domain proposals into one plan. When two domains conflict the \
         higher-priority domain wins: sleep > nutrition > fitness > mental_wellness. \
         Rewrite the lower-priority domain to comply instead of dropping it. \
         Hard constraints may never be violated.\n\n",
    );

    prompt.push_str("## Proposals\n\n");
    for p in proposals.iter() {
        let body = json!({
            "content": p.content,
            "confidence": p.confidence,
            "reasoning": p.reasoning,
            "synthesized": p.is_synthesized(),
        });
        prompt.push_str(&format!(
            "### {}\n\n```json\n{}\n```\n\n",
            p.domain,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        ));
    }

    prompt.push_str("## Hard Constraints\n\n");
    for c in constraints {
        prompt.push_str(&constraint_line(c));
    }

    prompt.push_str(
        "\n## Output\n\nRespond with one JSON object:\n\n```json\n\
         {\n  \"per_domain_content\": {\"sleep\": {}, \"nutrition\": {}, \"fitness\": {}, \"mental_wellness\": {}},\n  \
         \"trade_offs\": [{\"constraint_violated\": \"\", \"domains_affected\": [\"sleep\", \"fitness\"], \"resolution_rationale\": \"\"}]\n}\n```\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintKind, ConstraintSet, Rule};
    use crate::domain::Intensity;
    use crate::state::{SharedState, UserData};
    use uuid::Uuid;

    #[test]
    fn test_domain_prompt_carries_targeting_constraints_and_contract() {
        let mut constraints = ConstraintSet::new();
        constraints.register(
            Constraint::new(
                "sleep_debt_cap",
                ConstraintKind::Hard,
                80,
                Rule::MaxIntensity {
                    cap: Intensity::Moderate,
                },
            )
            .because("Sleep debt caps intensity"),
        );
        let state = SharedState::open(Uuid::new_v4(), UserData::default(), constraints);

        let fitness = domain_prompt(&state.slice_for(Domain::Fitness));
        assert!(fitness.contains("sleep_debt_cap"));
        assert!(fitness.contains("energy_demand"));
        assert!(fitness.contains("\"confidence\""));

        let sleep = domain_prompt(&state.slice_for(Domain::Sleep));
        assert!(!sleep.contains("sleep_debt_cap"));
        assert!(sleep.contains("recovery_status"));
    }

    #[test]
    fn test_domain_prompt_reports_past_sessions() {
        let mut signals = std::collections::BTreeMap::new();
        signals.insert("accepted".to_string(), 1);
        signals.insert("rewritten".to_string(), 3);
        let history = SemanticSummary {
            domain: Domain::Fitness,
            sessions: 4,
            signals,
            acceptance_rate: 0.25,
        };
        let state = SharedState::open(Uuid::new_v4(), UserData::default(), ConstraintSet::new())
            .with_history([(Domain::Fitness, history)].into_iter().collect());

        let fitness = domain_prompt(&state.slice_for(Domain::Fitness));
        assert!(fitness.contains("## Past Sessions"));
        assert!(fitness.contains("25% of your proposals"));
        assert!(fitness.contains("- rewritten: 3"));

        let sleep = domain_prompt(&state.slice_for(Domain::Sleep));
        assert!(!sleep.contains("## Past Sessions"));
    }
}
