mod claude;
mod codex;
mod scripted;

pub use claude::ClaudeRunner;
pub use codex::CodexRunner;
pub use scripted::{Script, ScriptedRunner};

use crate::config::{Config, Provider};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug)]
pub struct ProviderOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub exit_code: i32,
}

/// One prompt for one reasoning role
#[derive(Debug, Clone)]
pub struct ReasoningTask {
    /// Domain name or "coordinator"; scripted responses are keyed by it
    pub label: String,
    pub prompt: String,
}

#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        task: &ReasoningTask,
        timeout: Duration,
    ) -> Result<ProviderOutput, ProviderError>;
}

/// Create the runner for a provider
pub fn create_runner(config: &Config, provider: Provider) -> Arc<dyn Runner> {
    match provider {
        Provider::ClaudeCli => Arc::new(ClaudeRunner {
            binary: config.providers.claude_cli.binary.clone(),
            model: config.providers.claude_cli.model.clone(),
            tools: config.providers.claude_cli.tools.clone(),
            permission_mode: config.providers.claude_cli.permission_mode.clone(),
        }),
        Provider::CodexCli => Arc::new(CodexRunner {
            binary: config.providers.codex_cli.binary.clone(),
            model: config.providers.codex_cli.model.clone(),
        }),
        Provider::Scripted => Arc::new(ScriptedRunner::new(
            config.providers.scripted.responses_dir.clone(),
        )),
    }
}

/// Plain command names go through PATH lookup
fn command_for(binary: &Path) -> Command {
    let binary_str = binary.to_string_lossy();
    let mut cmd = if binary_str.contains('/') || binary_str.contains('\\') {
        Command::new(binary)
    } else {
        Command::new(binary_str.as_ref())
    };
    // A cancelled session must not leave reasoning processes behind
    cmd.kill_on_drop(true);
    cmd
}
