use crate::cli::ReplayArgs;
use crate::domain::Domain;
use crate::memory::{semantic, DurableStore, JsonlStore, StoredRecord};
use tracing::info;

pub async fn execute(args: ReplayArgs) -> anyhow::Result<()> {
    let store = JsonlStore::new(args.store.clone());
    info!("Replaying {} from {:?}", args.session_id, store.dir());

    let records = store.read_session(args.session_id).await?;
    if records.is_empty() {
        anyhow::bail!(
            "No records for session {} in {}",
            args.session_id,
            store.dir().display()
        );
    }

    for (i, record) in records.iter().enumerate() {
        println!("{:>3} {:<10} {}", i + 1, record.kind(), describe(record));
    }

    println!("\nDomain memory:");
    for domain in Domain::ALL {
        let summary = semantic(&store, domain).await?;
        println!(
            "  - {}: {} sessions, {:.0}% accepted {:?}",
            domain,
            summary.sessions,
            summary.acceptance_rate * 100.0,
            summary.signals
        );
    }

    Ok(())
}

fn describe(record: &StoredRecord) -> String {
    match record {
        StoredRecord::Snapshot(s) => format!(
            "seq {} at {} with {} constraints",
            s.sequence,
            s.timestamp.to_rfc3339(),
            s.constraints.len()
        ),
        StoredRecord::Transition(t) => format!(
            "{} {} -> {} ({})",
            t.timestamp.to_rfc3339(),
            t.from,
            t.to,
            t.trigger
        ),
        StoredRecord::Plan(p) => format!(
            "{} merge, confidence {:.2}, {} trade-offs, fingerprint {}",
            p.strategy,
            p.confidence,
            p.trade_offs.len(),
            p.fingerprint()
        ),
        StoredRecord::Memory(m) => {
            let signal = serde_json::to_value(m.learning_signal)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("{} {}: {}", m.domain, signal, m.contribution_summary)
        }
    }
}
