use crate::domain::Domain;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Per reasoning call timeout
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    /// Hard deadline for the whole fan-out of one session
    #[serde(default = "default_session_deadline_sec")]
    pub session_deadline_sec: u64,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default = "default_domains")]
    pub domains: BTreeMap<Domain, DomainConfig>,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed sessions before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_sec: default_cooldown_sec(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub claude_cli: ClaudeCliConfig,

    #[serde(default)]
    pub codex_cli: CodexCliConfig,

    #[serde(default)]
    pub scripted: ScriptedConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ClaudeCliConfig {
    #[serde(default = "default_claude_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_claude_model")]
    pub model: String,

    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            binary: default_claude_binary(),
            model: default_claude_model(),
            tools: Vec::new(),
            permission_mode: default_permission_mode(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CodexCliConfig {
    #[serde(default = "default_codex_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_codex_model")]
    pub model: String,
}

impl Default for CodexCliConfig {
    fn default() -> Self {
        Self {
            binary: default_codex_binary(),
            model: default_codex_model(),
        }
    }
}

/// Canned responses read from `<responses_dir>/<domain>.json`.
/// Domains without a file answer with their baseline recommendation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ScriptedConfig {
    #[serde(default)]
    pub responses_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct DomainConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            enabled: true,
            timeout_sec: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CoordinatorConfig {
    /// Provider used for the reasoning-backed merge
    #[serde(default)]
    pub provider: Option<Provider>,

    #[serde(default)]
    pub reasoned_merge: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SafetyConfig {
    #[serde(default = "default_min_sleep_hours")]
    pub min_sleep_hours: f64,

    #[serde(default = "default_min_daily_calories")]
    pub min_daily_calories: u32,

    #[serde(default = "default_max_daily_calories")]
    pub max_daily_calories: u32,

    #[serde(default = "default_max_weekly_training_minutes")]
    pub max_weekly_training_minutes: u32,

    #[serde(default = "default_max_budget_utilization")]
    pub max_budget_utilization: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_sleep_hours: default_min_sleep_hours(),
            min_daily_calories: default_min_daily_calories(),
            max_daily_calories: default_max_daily_calories(),
            max_weekly_training_minutes: default_max_weekly_training_minutes(),
            max_budget_utilization: default_max_budget_utilization(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    ClaudeCli,
    CodexCli,
    Scripted,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::ClaudeCli => write!(f, "claude_cli"),
            Provider::CodexCli => write!(f, "codex_cli"),
            Provider::Scripted => write!(f, "scripted"),
        }
    }
}
