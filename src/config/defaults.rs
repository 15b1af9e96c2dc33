use super::types::{DomainConfig, Provider};
use crate::domain::Domain;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_timeout_sec() -> u64 {
    120
}

pub fn default_session_deadline_sec() -> u64 {
    300
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

pub fn default_fallback_confidence() -> f64 {
    0.1
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    500
}

pub fn default_failure_threshold() -> u32 {
    3
}

pub fn default_cooldown_sec() -> u64 {
    60
}

pub fn default_claude_binary() -> PathBuf {
    // Check common install location first
    if let Some(home) = std::env::var_os("HOME") {
        let local_path = PathBuf::from(home).join(".claude/local/claude");
        if local_path.exists() {
            return local_path;
        }
    }
    PathBuf::from("claude")
}

pub fn default_claude_model() -> String {
    "sonnet".to_string()
}

pub fn default_permission_mode() -> String {
    "default".to_string()
}

pub fn default_codex_binary() -> PathBuf {
    PathBuf::from("codex")
}

pub fn default_codex_model() -> String {
    "gpt-4.1".to_string()
}

pub fn default_provider() -> Provider {
    Provider::ClaudeCli
}

pub fn default_domains() -> BTreeMap<Domain, DomainConfig> {
    Domain::ALL
        .iter()
        .map(|d| (*d, DomainConfig::default()))
        .collect()
}

pub fn default_min_sleep_hours() -> f64 {
    6.0
}

pub fn default_min_daily_calories() -> u32 {
    1200
}

pub fn default_max_daily_calories() -> u32 {
    4000
}

pub fn default_max_weekly_training_minutes() -> u32 {
    600
}

pub fn default_max_budget_utilization() -> f64 {
    0.9
}

pub fn default_store_dir() -> PathBuf {
    PathBuf::from(".wellsync/store")
}

pub fn default_true() -> bool {
    true
}
