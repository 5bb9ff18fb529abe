//! Reconnect policies.
//!
//! After a connectivity failure the connection manager asks its
//! `RetryPolicy` whether to try again: `LoopRetry` waits and always says
//! yes, `PromptRetry` asks the operator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::prompt::OperatorPrompt;
use crate::debug::DebugSink;
use crate::error::{HandlerError, Result};

/// Default wait between attempts in loop mode.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

const RETRY_QUESTION: &str = "Do you want to reconnect to the server? [y/N]";

/// Decides whether a failed connection attempt is retried.
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Called after failed attempt number `attempt` (1-based).
    async fn should_retry(&self, attempt: u32, sink: &dyn DebugSink) -> Result<bool>;
}

/// Retries forever after a fixed wait.
#[derive(Debug, Clone, Copy)]
pub struct LoopRetry {
    interval: Duration,
}

impl LoopRetry {
    /// Creates a policy waiting `interval` between attempts.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Wait between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for LoopRetry {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL)
    }
}

#[async_trait]
impl RetryPolicy for LoopRetry {
    async fn should_retry(&self, attempt: u32, sink: &dyn DebugSink) -> Result<bool> {
        debug!("Connection attempt {} failed, retrying in {:?}", attempt, self.interval);
        sink.emit(&format!(
            "Reconnect after {} seconds.",
            self.interval.as_secs()
        ));
        tokio::time::sleep(self.interval).await;
        Ok(true)
    }
}

/// Asks the operator after every failure; empty answer means no.
#[derive(Clone)]
pub struct PromptRetry {
    prompt: Arc<dyn OperatorPrompt>,
}

impl PromptRetry {
    /// Creates a policy asking through `prompt`.
    pub fn new(prompt: Arc<dyn OperatorPrompt>) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl RetryPolicy for PromptRetry {
    async fn should_retry(&self, attempt: u32, _sink: &dyn DebugSink) -> Result<bool> {
        loop {
            let prompt = Arc::clone(&self.prompt);
            let answer = tokio::task::spawn_blocking(move || prompt.ask(RETRY_QUESTION))
                .await
                .map_err(|e| HandlerError::prompt(format!("Reconnect prompt failed: {e}")))??;
            match parse_retry_answer(&answer) {
                Some(retry) => {
                    debug!("Operator answered {:?} after attempt {}", retry, attempt);
                    return Ok(retry);
                }
                None => self.prompt.notice("Type 'y' or 'n'."),
            }
        }
    }
}

/// Parses a yes/no answer; empty means no, anything unrecognised is `None`.
pub fn parse_retry_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Returns the policy for the `loop_mode` setting.
pub fn policy_for(
    loop_mode: bool,
    interval: Duration,
    prompt: Arc<dyn OperatorPrompt>,
) -> Box<dyn RetryPolicy> {
    if loop_mode {
        Box::new(LoopRetry::new(interval))
    } else {
        Box::new(PromptRetry::new(prompt))
    }
}
