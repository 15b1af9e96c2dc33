mod defaults;
mod types;

pub use types::*;

use crate::domain::Domain;
use crate::error::ConfigError;
use defaults::*;
use std::path::Path;
use std::time::Duration;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timeout_sec: default_timeout_sec(),
            session_deadline_sec: default_session_deadline_sec(),
            report_dir: default_report_dir(),
            dry_run: false,
            fallback_confidence: default_fallback_confidence(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            providers: ProvidersConfig::default(),
            domains: default_domains(),
            coordinator: CoordinatorConfig::default(),
            safety: SafetyConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fallback_confidence > 0.0 && self.fallback_confidence <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "fallback_confidence",
                reason: format!("{} is outside (0, 1]", self.fallback_confidence),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }

        if self.retry.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_base_ms",
                reason: "must be positive".to_string(),
            });
        }

        if self.safety.min_daily_calories > self.safety.max_daily_calories {
            return Err(ConfigError::Invalid {
                field: "safety.min_daily_calories",
                reason: format!(
                    "{} exceeds max_daily_calories {}",
                    self.safety.min_daily_calories, self.safety.max_daily_calories
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.safety.max_budget_utilization) {
            return Err(ConfigError::Invalid {
                field: "safety.max_budget_utilization",
                reason: "must be within [0, 1]".to_string(),
            });
        }

        if self.coordinator.reasoned_merge && self.coordinator.provider.is_none() {
            return Err(ConfigError::Invalid {
                field: "coordinator.provider",
                reason: "reasoned_merge requires a provider".to_string(),
            });
        }

        Ok(())
    }

    /// Settings for a domain; domains missing from the map use defaults
    pub fn domain(&self, domain: Domain) -> DomainConfig {
        self.domains.get(&domain).cloned().unwrap_or_default()
    }

    pub fn timeout_for(&self, domain: Domain) -> Duration {
        Duration::from_secs(self.domain(domain).timeout_sec.unwrap_or(self.timeout_sec))
    }

    pub fn session_deadline(&self) -> Duration {
        Duration::from_secs(self.session_deadline_sec)
    }
}
