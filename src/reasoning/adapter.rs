use super::breaker::CircuitBreaker;
use super::parse::parse_response;
use super::prompt::domain_prompt;
use crate::config::{CircuitBreakerConfig, Config, RetryConfig};
use crate::domain::Domain;
use crate::error::ProviderError;
use crate::proposal::AgentProposal;
use crate::provider::{create_runner, ReasoningTask, Runner};
use crate::runner::retry::retry_with_backoff;
use crate::state::DomainContext;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout as tokio_timeout, Instant};
use tracing::{debug, warn};

/// Longest slice of raw output written to debug logs
const RAW_LOG_LIMIT: usize = 400;

/// Fault-absorbing boundary around one domain's reasoning capability
pub struct ReasoningAdapter {
    domain: Domain,
    runner: Arc<dyn Runner>,
    retry: RetryConfig,
    breaker: CircuitBreaker,
}

impl ReasoningAdapter {
    pub fn new(
        domain: Domain,
        runner: Arc<dyn Runner>,
        retry: RetryConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Self {
        Self {
            domain,
            runner,
            retry,
            breaker: CircuitBreaker::new(domain.as_str(), breaker),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Ask for a proposal within `timeout`.
    ///
    /// Never fails: timeouts, process errors, unparseable output and an open
    /// circuit all come back as an error proposal with confidence 0.
    pub async fn propose(&self, ctx: &DomainContext, timeout: Duration) -> AgentProposal {
        if ctx.domain != self.domain {
            return AgentProposal::failed(
                self.domain,
                format!("context for {} routed to {} adapter", ctx.domain, self.domain),
            );
        }

        let permit = match self.breaker.acquire() {
            Ok(permit) => permit,
            Err(remaining) => {
                let err = ProviderError::CircuitOpen {
                    domain: self.domain,
                    remaining_sec: remaining.as_secs(),
                };
                warn!("{}", err);
                return AgentProposal::failed(self.domain, err.to_string());
            }
        };

        match self.call(ctx, timeout).await {
            Ok(proposal) => {
                permit.succeed();
                proposal
            }
            Err(e) => {
                permit.fail();
                warn!("{} reasoning failed ({}): {}", self.domain, e.severity(), e);
                AgentProposal::failed(self.domain, e.to_string())
            }
        }
    }

    async fn call(
        &self,
        ctx: &DomainContext,
        timeout: Duration,
    ) -> Result<AgentProposal, ProviderError> {
        let task = ReasoningTask {
            label: self.domain.as_str().to_string(),
            prompt: domain_prompt(ctx),
        };
        let deadline = Instant::now() + timeout;

        let attempts = retry_with_backoff(&self.retry, ProviderError::is_retryable, || async {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let output = self.runner.execute(&task, remaining).await?;

            let preview: String = output.stdout.chars().take(RAW_LOG_LIMIT).collect();
            debug!(
                "{} via {} answered in {:?}: {}",
                self.domain,
                self.runner.name(),
                output.duration,
                preview
            );

            parse_response(&output.stdout)
        });

        // Retries share the caller's budget
        let value = tokio_timeout(timeout, attempts)
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        Ok(AgentProposal::from_response(self.domain, value))
    }
}

/// One adapter per enabled domain, built from config
pub fn build_adapters(config: &Config) -> BTreeMap<Domain, Arc<ReasoningAdapter>> {
    Domain::ALL
        .iter()
        .filter(|&&d| config.domain(d).enabled)
        .map(|&d| {
            let runner = create_runner(config, config.domain(d).provider);
            let adapter =
                ReasoningAdapter::new(d, runner, config.retry.clone(), &config.circuit_breaker);
            (d, Arc::new(adapter))
        })
        .collect()
}
