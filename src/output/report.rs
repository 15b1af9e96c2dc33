use crate::domain::Domain;
use crate::error::OutputError;
use crate::plan::{MergeStrategy, UnifiedPlan};
use crate::workflow::{SessionOutcome, SessionState};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `plan.md` and `plan.json` for a finished session.
/// Returns the session's report directory.
pub fn write_plan_report(
    report_dir: &Path,
    outcome: &SessionOutcome,
) -> Result<PathBuf, OutputError> {
    let dir = report_dir.join(outcome.session_id.to_string());
    fs::create_dir_all(&dir).map_err(OutputError::CreateDir)?;

    let markdown = render_markdown(outcome);
    fs::write(dir.join("plan.md"), markdown).map_err(OutputError::WriteReport)?;

    let json = serde_json::to_string_pretty(&outcome.plan)?;
    fs::write(dir.join("plan.json"), json).map_err(OutputError::WriteReport)?;

    Ok(dir)
}

pub fn render_markdown(outcome: &SessionOutcome) -> String {
    let plan = &outcome.plan;
    let mut content = String::new();

    content.push_str("# Wellness Plan\n\n");

    if let Some(explanation) = &plan.explanation {
        content.push_str(&format!("> {}\n\n", explanation));
    }

    content.push_str("| Metric | Value |\n");
    content.push_str("|--------|-------|\n");
    content.push_str(&format!("| Session | `{}` |\n", outcome.session_id));
    content.push_str(&format!("| Status | {} |\n", format_state(outcome.state)));
    content.push_str(&format!("| Merge | {} |\n", plan.strategy));
    content.push_str(&format!("| Confidence | {:.2} |\n", plan.confidence));
    content.push_str(&format!(
        "| Safety validated | {} |\n",
        if plan.safety_validated { "yes" } else { "no" }
    ));
    content.push_str(&format!("| Fingerprint | `{}` |\n", plan.short_fingerprint()));
    content.push_str("\n---\n\n");

    for domain in Domain::ALL {
        content.push_str(&format!("## {}\n\n", domain.title()));

        if let Some(reason) = plan.synthesized.get(&domain) {
            content.push_str(&format!(
                "*General recommendation, not personalized ({}).*\n\n",
                reason
            ));
        }
        if let Some(weight) = plan.agent_contributions.get(&domain) {
            content.push_str(&format!("- **Contribution:** {:.0}%\n", weight * 100.0));
        }

        match plan.content(domain) {
            Some(section) => render_value(&mut content, section, 0),
            None => content.push_str("*No content*\n"),
        }
        content.push('\n');
    }

    if plan.trade_offs.is_empty() {
        content.push_str("## Trade-offs\n\n*None*\n");
    } else {
        content.push_str("## Trade-offs\n\n");
        for (i, t) in plan.trade_offs.iter().enumerate() {
            let domains: Vec<&str> = t.domains_affected.iter().map(|d| d.title()).collect();
            content.push_str(&format!(
                "{}. **{}** ({}): {}\n",
                i + 1,
                t.constraint_violated,
                domains.join(", "),
                t.resolution_rationale
            ));
        }
    }

    if !plan.waived.is_empty() {
        content.push_str("\n**Waived constraints:** ");
        content.push_str(&plan.waived.join(", "));
        content.push('\n');
    }

    if !outcome.safety.is_empty() {
        content.push_str("\n## Safety Checks\n\n");
        for check in &outcome.safety {
            let status = match (check.passed, check.corrected) {
                (true, _) => "passed".to_string(),
                (false, true) => "corrected".to_string(),
                (false, false) => "failed".to_string(),
            };
            match &check.message {
                Some(msg) => content.push_str(&format!("- `{}`: {} ({})\n", check.check, status, msg)),
                None => content.push_str(&format!("- `{}`: {}\n", check.check, status)),
            }
        }
    }

    content
}

fn render_value(content: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let label = key.replace('_', " ");
                if v.is_object() || v.is_array() {
                    content.push_str(&format!("{}- **{}:**\n", indent, label));
                    render_value(content, v, depth + 1);
                } else {
                    content.push_str(&format!("{}- **{}:** {}\n", indent, label, scalar(v)));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(map) => {
                        let line: Vec<String> =
                            map.iter().map(|(k, v)| format!("{}: {}", k, scalar(v))).collect();
                        content.push_str(&format!("{}- {}\n", indent, line.join(", ")));
                    }
                    other => content.push_str(&format!("{}- {}\n", indent, scalar(other))),
                }
            }
        }
        other => content.push_str(&format!("{}{}\n", indent, scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_state(state: SessionState) -> String {
    match state {
        SessionState::Committed => "✅ Committed".to_string(),
        SessionState::FailedSafe => "⚠️ Failed safe".to_string(),
        other => format!("⏳ {}", other),
    }
}

/// One-line console summary
pub fn headline(plan: &UnifiedPlan) -> String {
    let synthesized = if plan.synthesized.is_empty() || plan.strategy == MergeStrategy::FailSafe {
        String::new()
    } else {
        let names: Vec<&str> = plan.synthesized.keys().map(|d| d.as_str()).collect();
        format!(", substituted: {}", names.join(", "))
    };
    format!(
        "confidence {:.2}, {} trade-offs{}",
        plan.confidence,
        plan.trade_offs.len(),
        synthesized
    )
}
