use crate::config::Config;
use crate::domain::Domain;
use crate::proposal::AgentProposal;
use crate::reasoning::ReasoningAdapter;
use crate::state::SharedState;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Barrier output: one proposal per domain, keyed by domain not arrival order
#[derive(Debug)]
pub struct FanOutReport {
    pub proposals: BTreeMap<Domain, AgentProposal>,
    /// Domains still outstanding when the session deadline hit
    pub cancelled: Vec<Domain>,
    pub duration: Duration,
}

impl FanOutReport {
    /// Hand over the proposal for a slot; the barrier filled every slot
    pub fn take(&mut self, domain: Domain) -> AgentProposal {
        self.proposals
            .remove(&domain)
            .unwrap_or_else(|| AgentProposal::failed(domain, "no proposal reached the barrier"))
    }
}

/// Runs the four domain adapters concurrently and waits at one barrier
pub struct FanOut {
    adapters: BTreeMap<Domain, Arc<ReasoningAdapter>>,
    timeouts: BTreeMap<Domain, Duration>,
    session_deadline: Duration,
}

impl FanOut {
    pub fn new(config: &Config, adapters: BTreeMap<Domain, Arc<ReasoningAdapter>>) -> Self {
        let timeouts = Domain::ALL
            .iter()
            .map(|&d| (d, config.timeout_for(d)))
            .collect();
        Self {
            adapters,
            timeouts,
            session_deadline: config.session_deadline(),
        }
    }

    pub fn timeout_for(&self, domain: Domain) -> Duration {
        self.timeouts
            .get(&domain)
            .copied()
            .unwrap_or(self.session_deadline)
    }

    /// Launch every enabled domain and return once all four slots are filled
    pub async fn run(&self, state: &SharedState) -> FanOutReport {
        let start = std::time::Instant::now();
        let mut proposals = BTreeMap::new();
        let mut futures = FuturesUnordered::new();
        let mut handles = Vec::new();

        for domain in Domain::ALL {
            let Some(adapter) = self.adapters.get(&domain).cloned() else {
                debug!("{} disabled, leaving slot to the fallback", domain);
                proposals.insert(domain, AgentProposal::failed(domain, "domain disabled"));
                continue;
            };

            // Each task owns its own read-only slice
            let ctx = state.slice_for(domain);
            let timeout = self.timeout_for(domain);

            let handle = tokio::spawn(async move {
                let proposal = adapter.propose(&ctx, timeout).await;
                (domain, proposal)
            });
            handles.push((domain, handle.abort_handle()));
            futures.push(handle);
        }

        info!(
            "Fanned out {} reasoning calls for session {}",
            futures.len(),
            state.session_id
        );

        let deadline = sleep(self.session_deadline);
        tokio::pin!(deadline);

        let mut cancelled = Vec::new();
        loop {
            tokio::select! {
                next = futures.next() => match next {
                    Some(Ok((domain, proposal))) => {
                        debug!(
                            "{} slot filled (error: {})",
                            domain,
                            proposal.is_error()
                        );
                        proposals.insert(domain, proposal);
                    }
                    Some(Err(e)) => {
                        warn!("Reasoning task failed to complete: {}", e);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    for (domain, handle) in &handles {
                        if !proposals.contains_key(domain) {
                            handle.abort();
                            cancelled.push(*domain);
                        }
                    }
                    warn!(
                        "Session deadline {:?} reached; cancelled {:?}",
                        self.session_deadline, cancelled
                    );
                    break;
                }
            }
        }

        // Aborted tasks are dropped before their handles resolve, which
        // settles any circuit permit they still held
        while futures.next().await.is_some() {}

        for domain in Domain::ALL {
            proposals.entry(domain).or_insert_with(|| {
                let reason = if cancelled.contains(&domain) {
                    "cancelled at session deadline"
                } else {
                    "reasoning task aborted"
                };
                AgentProposal::failed(domain, reason)
            });
        }

        FanOutReport {
            proposals,
            cancelled,
            duration: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RetryConfig};
    use crate::error::ProviderError;
    use crate::provider::{ProviderOutput, ReasoningTask, Runner, Script, ScriptedRunner};
    use crate::reasoning::CircuitState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::state::UserData;
    use uuid::Uuid;

    fn fan_out(runner: ScriptedRunner, timeout_sec: u64, deadline_sec: u64) -> FanOut {
        let mut config = Config::default();
        config.timeout_sec = timeout_sec;
        config.session_deadline_sec = deadline_sec;
        let runner = Arc::new(runner);
        let adapters = Domain::ALL
            .iter()
            .map(|&d| {
                let adapter = ReasoningAdapter::new(
                    d,
                    runner.clone(),
                    RetryConfig {
                        max_attempts: 1,
                        backoff_base_ms: 1,
                    },
                    &CircuitBreakerConfig::default(),
                );
                (d, Arc::new(adapter))
            })
            .collect();
        FanOut::new(&config, adapters)
    }

    fn state() -> SharedState {
        SharedState::open(Uuid::new_v4(), UserData::default(), Default::default())
    }

    #[tokio::test]
    async fn test_all_slots_filled() {
        let report = fan_out(ScriptedRunner::new(None), 5, 10)
            .run(&state())
            .await;
        assert_eq!(report.proposals.len(), 4);
        assert!(report.proposals.values().all(|p| !p.is_error()));
        assert!(report.cancelled.is_empty());
    }

    #[tokio::test]
    async fn test_one_timeout_leaves_others_intact() {
        let runner = ScriptedRunner::new(None).with_script(
            "nutrition",
            Script::Delay(Duration::from_secs(30), "{}".to_string()),
        );
        let report = fan_out(runner, 1, 10).run(&state()).await;

        assert!(report.proposals[&Domain::Nutrition].is_error());
        for d in [Domain::Sleep, Domain::Fitness, Domain::MentalWellness] {
            assert!(!report.proposals[&d].is_error(), "{} affected", d);
        }
    }

    #[tokio::test]
    async fn test_session_deadline_cancels_outstanding() {
        let runner = ScriptedRunner::new(None).with_script(
            "sleep",
            Script::Delay(Duration::from_secs(30), "{}".to_string()),
        );
        // Per-call timeout longer than the session deadline
        let report = fan_out(runner, 60, 1).run(&state()).await;

        assert_eq!(report.cancelled, vec![Domain::Sleep]);
        let sleep = &report.proposals[&Domain::Sleep];
        assert!(sleep
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("session deadline"));
        assert!(!report.proposals[&Domain::Fitness].is_error());
    }

    /// Sleep fails, then hangs past the deadline, then recovers
    struct Recovering {
        phase: AtomicUsize,
        phases: [ScriptedRunner; 3],
    }

    #[async_trait]
    impl Runner for Recovering {
        fn name(&self) -> &'static str {
            "recovering"
        }

        async fn execute(
            &self,
            task: &ReasoningTask,
            timeout: Duration,
        ) -> Result<ProviderOutput, ProviderError> {
            let phase = self.phase.load(Ordering::SeqCst).min(2);
            self.phases[phase].execute(task, timeout).await
        }
    }

    #[tokio::test]
    async fn test_circuit_recovers_after_trial_cancelled_at_deadline() {
        let runner = Arc::new(Recovering {
            phase: AtomicUsize::new(0),
            phases: [
                ScriptedRunner::new(None).with_script("sleep", Script::Fail("crash".to_string())),
                ScriptedRunner::new(None).with_script(
                    "sleep",
                    Script::Delay(Duration::from_secs(30), "{}".to_string()),
                ),
                ScriptedRunner::new(None),
            ],
        });

        let mut config = Config::default();
        config.timeout_sec = 60;
        config.session_deadline_sec = 1;
        let adapters = Domain::ALL
            .iter()
            .map(|&d| {
                let adapter = ReasoningAdapter::new(
                    d,
                    runner.clone(),
                    RetryConfig {
                        max_attempts: 1,
                        backoff_base_ms: 1,
                    },
                    &CircuitBreakerConfig {
                        failure_threshold: 1,
                        cooldown_sec: 0,
                    },
                );
                (d, Arc::new(adapter))
            })
            .collect();
        let f = FanOut::new(&config, adapters);
        let breaker_state = || f.adapters[&Domain::Sleep].breaker().state();

        let report = f.run(&state()).await;
        assert!(report.proposals[&Domain::Sleep].is_error());
        assert_eq!(breaker_state(), CircuitState::Open);

        runner.phase.store(1, Ordering::SeqCst);
        let report = f.run(&state()).await;
        assert_eq!(report.cancelled, vec![Domain::Sleep]);
        assert_eq!(breaker_state(), CircuitState::Open);

        runner.phase.store(2, Ordering::SeqCst);
        for _ in 0..3 {
            let report = f.run(&state()).await;
            let sleep = &report.proposals[&Domain::Sleep];
            assert!(!sleep.is_error(), "{:?}", sleep.error);
        }
        assert_eq!(breaker_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_disabled_domain_gets_error_slot() {
        let mut f = fan_out(ScriptedRunner::new(None), 5, 10);
        f.adapters.remove(&Domain::MentalWellness);
        let report = f.run(&state()).await;
        assert!(report.proposals[&Domain::MentalWellness].is_error());
        assert_eq!(report.proposals.len(), 4);
    }
}
