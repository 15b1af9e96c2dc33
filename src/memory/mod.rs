//! Typed memory: episodic records in the durable store, semantic summaries
//! derived from them at read time, and a working snapshot cache.

mod cache;
mod record;
mod store;

pub use cache::SnapshotCache;
pub use record::{LearningSignal, MemoryRecord, StoredRecord};
pub use store::{DurableStore, InMemoryStore, JsonlStore};

use crate::domain::Domain;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every episodic record a domain has received, oldest session first
pub async fn episodic(
    store: &dyn DurableStore,
    domain: Domain,
) -> Result<Vec<MemoryRecord>, StoreError> {
    let mut records = Vec::new();
    for session_id in store.sessions().await? {
        records.extend(
            store
                .read_session(session_id)
                .await?
                .into_iter()
                .filter_map(|r| match r {
                    StoredRecord::Memory(m) if m.domain == domain => Some(m),
                    _ => None,
                }),
        );
    }
    records.sort_by_key(|m| m.timestamp);
    Ok(records)
}

/// Aggregated learning signals for one domain
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SemanticSummary {
    pub domain: Domain,
    pub sessions: usize,
    pub signals: BTreeMap<String, usize>,
    /// Share of sessions whose proposal was committed as proposed
    pub acceptance_rate: f64,
}

impl SemanticSummary {
    pub fn from_records(domain: Domain, records: &[MemoryRecord]) -> Self {
        let mut signals = BTreeMap::new();
        for r in records {
            let key = serde_json::to_value(r.learning_signal)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            *signals.entry(key).or_insert(0) += 1;
        }

        let accepted = records
            .iter()
            .filter(|r| r.learning_signal == LearningSignal::Accepted)
            .count();

        Self {
            domain,
            sessions: records.len(),
            signals,
            acceptance_rate: if records.is_empty() {
                0.0
            } else {
                accepted as f64 / records.len() as f64
            },
        }
    }
}

pub async fn semantic(
    store: &dyn DurableStore,
    domain: Domain,
) -> Result<SemanticSummary, StoreError> {
    let records = episodic(store, domain).await?;
    Ok(SemanticSummary::from_records(domain, &records))
}

/// Semantic summaries for every domain with history, read in one pass
pub async fn semantic_all(
    store: &dyn DurableStore,
) -> Result<BTreeMap<Domain, SemanticSummary>, StoreError> {
    let mut by_domain: BTreeMap<Domain, Vec<MemoryRecord>> = BTreeMap::new();
    for session_id in store.sessions().await? {
        for record in store.read_session(session_id).await? {
            if let StoredRecord::Memory(m) = record {
                by_domain.entry(m.domain).or_default().push(m);
            }
        }
    }

    Ok(by_domain
        .into_iter()
        .map(|(domain, records)| (domain, SemanticSummary::from_records(domain, &records)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(domain: Domain, signal: LearningSignal) -> MemoryRecord {
        MemoryRecord {
            session_id: Uuid::new_v4(),
            domain,
            outcome: "committed".to_string(),
            contribution_summary: String::new(),
            learning_signal: signal,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_semantic_summary_spans_sessions() {
        let store = InMemoryStore::new();
        for signal in [
            LearningSignal::Accepted,
            LearningSignal::Rewritten,
            LearningSignal::Accepted,
        ] {
            let r = record(Domain::Fitness, signal);
            store
                .append(r.session_id, &StoredRecord::Memory(r.clone()))
                .await
                .unwrap();
        }
        let other = record(Domain::Sleep, LearningSignal::Substituted);
        store
            .append(other.session_id, &StoredRecord::Memory(other.clone()))
            .await
            .unwrap();

        let summary = semantic(&store, Domain::Fitness).await.unwrap();
        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.signals["accepted"], 2);
        assert_eq!(summary.signals["rewritten"], 1);
        assert!((summary.acceptance_rate - 2.0 / 3.0).abs() < 1e-9);

        assert_eq!(episodic(&store, Domain::Sleep).await.unwrap().len(), 1);
    }
}
