//! Offline runner answering from canned responses.
//!
//! A response file `<responses_dir>/<label>.json` is returned verbatim as the
//! runner's stdout. An optional top-level `"scripted"` object in that file
//! controls the call itself and is stripped before returning:
//! `{"scripted": {"delay_ms": 5000}}` delays the answer, `{"scripted": {"fail": "msg"}}`
//! fails it. Domains without a file answer with their baseline content.

use super::{ProviderOutput, ReasoningTask, Runner};
use crate::domain::Domain;
use crate::error::ProviderError;
use crate::proposal::baseline_content;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Delay(Duration, String),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses_dir: Option<PathBuf>,
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(responses_dir: Option<PathBuf>) -> Self {
        Self {
            responses_dir,
            ..Default::default()
        }
    }

    /// Fixed behaviour for one label, taking precedence over files
    pub fn with_script(mut self, label: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(label.into(), script);
        self
    }

    /// Number of `execute` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn script_for(&self, label: &str) -> Result<Script, ProviderError> {
        if let Some(script) = self.scripts.get(label) {
            return Ok(script.clone());
        }

        if let Some(dir) = &self.responses_dir {
            let path = dir.join(format!("{}.json", label));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                let text = tokio::fs::read_to_string(&path).await?;
                return Ok(parse_script(text));
            }
        }

        match label.parse::<Domain>() {
            Ok(domain) => {
                let mut content = baseline_content(domain);
                content["confidence"] = json!(0.7);
                content["reasoning"] = json!(format!(
                    "Scripted baseline for {}",
                    domain.title().to_lowercase()
                ));
                Ok(Script::Reply(content.to_string()))
            }
            Err(_) => Err(ProviderError::NoResponse(label.to_string())),
        }
    }
}

fn parse_script(text: String) -> Script {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(&text) else {
        return Script::Reply(text);
    };
    let Some(directive) = map.remove("scripted") else {
        return Script::Reply(text);
    };

    if let Some(msg) = directive.get("fail").and_then(Value::as_str) {
        return Script::Fail(msg.to_string());
    }

    let body = Value::Object(map).to_string();
    match directive.get("delay_ms").and_then(Value::as_u64) {
        Some(ms) => Script::Delay(Duration::from_millis(ms), body),
        None => Script::Reply(body),
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(
        &self,
        task: &ReasoningTask,
        timeout: Duration,
    ) -> Result<ProviderOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = std::time::Instant::now();

        let stdout = match self.script_for(&task.label).await? {
            Script::Reply(text) => text,
            Script::Delay(delay, text) => {
                tokio_timeout(timeout, tokio::time::sleep(delay))
                    .await
                    .map_err(|_| ProviderError::Timeout(timeout))?;
                text
            }
            Script::Fail(msg) => {
                return Err(ProviderError::NonZeroExit {
                    code: 1,
                    stderr: msg,
                })
            }
        };

        debug!("Scripted reply for {} ({} bytes)", task.label, stdout.len());

        Ok(ProviderOutput {
            stdout,
            stderr: String::new(),
            duration: start.elapsed(),
            exit_code: 0,
        })
    }
}
