use crate::domain::Domain;
use std::path::PathBuf;
use thiserror::Error;

/// Three-tier failure taxonomy used to decide how far a fault may travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Transient; retried at the adapter or store boundary
    Recoverable,
    /// Absorbed into a fallback proposal or a correction
    Degraded,
    /// Ends the session in the fail-safe state
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Recoverable => write!(f, "recoverable"),
            ErrorSeverity::Degraded => write!(f, "degraded"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum WellsyncError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read user data '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse user data: {0}")]
    ParseInput(String),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("No response available for {0}")]
    NoResponse(String),

    #[error("Circuit open for {domain}; retry after {remaining_sec}s")]
    CircuitOpen { domain: Domain, remaining_sec: u64 },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ProviderError::Timeout(_) | ProviderError::Io(_) | ProviderError::NonZeroExit { .. } => {
                ErrorSeverity::Recoverable
            }
            ProviderError::NoResponse(_)
            | ProviderError::CircuitOpen { .. }
            | ProviderError::Malformed(_) => ErrorSeverity::Degraded,
        }
    }

    /// Whether another attempt can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Recoverable
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt record in '{path}' at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StoreError::Io(_) | StoreError::Unavailable(_) => ErrorSeverity::Recoverable,
            StoreError::Serialize(_) | StoreError::Corrupt { .. } => ErrorSeverity::Critical,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Deterministic merge did not settle after {passes} passes")]
    NonTerminating { passes: usize },

    #[error("Expected one proposal per domain, missing {0}")]
    MissingDomain(Domain),

    #[error("Reasoned merge rejected: {0}")]
    ReasonedMergeRejected(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ResolverError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ResolverError::NonTerminating { .. } | ResolverError::MissingDomain(_) => {
                ErrorSeverity::Critical
            }
            ResolverError::ReasonedMergeRejected(_) | ResolverError::Provider(_) => {
                ErrorSeverity::Degraded
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Hard constraint '{0}' cannot be satisfied by any correction")]
    Unsatisfiable(String),

    #[error("Safety check '{0}' still failing after correction")]
    UnresolvedSafety(String),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown session {0}")]
    UnknownSession(String),
}

impl WorkflowError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WorkflowError::Resolver(e) => e.severity(),
            WorkflowError::UnknownSession(_) => ErrorSeverity::Degraded,
            _ => ErrorSeverity::Critical,
        }
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write report: {0}")]
    WriteReport(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
