use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::classify::classify;
use crate::core::{ModelClient, ModelInput};
use crate::error::{ErrorKind, PipelineError, RemoteError};
use crate::normalize::normalize;
use crate::prompts::json_prompt;
use crate::retry::{self, RetryError, RetryPolicy};
use crate::telemetry::{RequestEvent, RunMonitor};
use crate::utils::preview;

/// Per-request state: the caller's cancellation signal and the telemetry
/// collector for this unit of work.
#[derive(Clone, Default)]
pub struct RequestScope {
    pub cancel: CancellationToken,
    pub monitor: RunMonitor,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives `work` unless the scope is cancelled first, in which case the
    /// work is dropped mid-flight and `None` comes back.
    pub async fn run_until_cancelled<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = work => Some(output),
        }
    }
}

pub struct ModelInvoker<C: ModelClient> {
    client: Arc<C>,
    generation_retry: RetryPolicy,
    embedding_retry: RetryPolicy,
}

impl<C: ModelClient> ModelInvoker<C> {
    pub fn new(client: Arc<C>, generation_retry: RetryPolicy, embedding_retry: RetryPolicy) -> Self {
        Self {
            client,
            generation_retry,
            embedding_retry,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn embed(&self, text: &str, scope: &RequestScope) -> Result<Vec<f32>, PipelineError> {
        if !self.client.has_credential() {
            return Err(PipelineError::missing_credential());
        }
        let model = self.client.embedding_model();
        let started_at = OffsetDateTime::now_utc();
        let mut attempts = 0u32;
        let result = retry::execute_observed(
            &self.embedding_retry,
            &scope.cancel,
            || {
                attempts += 1;
                self.client.embed_content(text)
            },
            |attempt, delay, err: &RemoteError| note_retry(scope, "embedContent", model, attempt, delay, err),
        )
        .await;

        match result {
            Ok(embedding) => {
                scope.monitor.record(RequestEvent {
                    model: model.to_string(),
                    operation: "embedContent".into(),
                    started_at,
                    finished_at: OffsetDateTime::now_utc(),
                    attempts,
                    input_tokens: None,
                    output_tokens: None,
                    total_tokens: None,
                });
                Ok(embedding.values)
            }
            Err(failure) => Err(terminal_failure("embedContent", model, failure, scope)),
        }
    }

    pub async fn generate(
        &self,
        input: impl Into<ModelInput>,
        scope: &RequestScope,
    ) -> Result<String, PipelineError> {
        if !self.client.has_credential() {
            return Err(PipelineError::missing_credential());
        }
        let input = input.into();
        let model = self.client.generation_model();
        let started_at = OffsetDateTime::now_utc();
        let mut attempts = 0u32;
        let result = retry::execute_observed(
            &self.generation_retry,
            &scope.cancel,
            || {
                attempts += 1;
                self.client.generate_content(&input)
            },
            |attempt, delay, err: &RemoteError| note_retry(scope, "generateContent", model, attempt, delay, err),
        )
        .await;

        match result {
            Ok(generation) => {
                debug!(
                    "generateContent returned {} chars after {} attempt(s)",
                    generation.text.len(),
                    attempts
                );
                scope.monitor.record(RequestEvent {
                    model: model.to_string(),
                    operation: "generateContent".into(),
                    started_at,
                    finished_at: OffsetDateTime::now_utc(),
                    attempts,
                    input_tokens: generation.usage.input_tokens,
                    output_tokens: generation.usage.output_tokens,
                    total_tokens: generation.usage.total_tokens,
                });
                Ok(generation.text)
            }
            Err(failure) => Err(terminal_failure("generateContent", model, failure, scope)),
        }
    }

    /// Free-form prompt in, parsed JSON out. Malformed output is reported,
    /// never regenerated.
    pub async fn generate_json(&self, prompt: &str, scope: &RequestScope) -> Result<Value, PipelineError> {
        let text = self.generate(json_prompt(prompt).as_str(), scope).await?;
        parse_model_json(&text, scope)
    }
}

pub(crate) fn parse_model_json(text: &str, scope: &RequestScope) -> Result<Value, PipelineError> {
    normalize(text).map_err(|failure| {
        error!("failed to parse JSON from model output");
        error!("model raw output: {}", failure.raw_text);
        if let Some(attempted) = &failure.attempted {
            error!("attempted substring: {attempted}");
        }
        scope.monitor.note_event(
            "failure.malformed_output",
            json!({
                "reason": failure.reason,
                "raw_preview": preview(&failure.raw_text, 200),
            }),
        );
        PipelineError::MalformedOutput(failure)
    })
}

fn note_retry(scope: &RequestScope, operation: &str, model: &str, attempt: u32, delay: Duration, err: &RemoteError) {
    scope.monitor.note_event(
        &format!("retry.{operation}"),
        json!({
            "model": model,
            "attempt": attempt,
            "delay_ms": delay.as_millis() as u64,
            "status": err.status,
            "message": preview(&err.message, 200),
        }),
    );
}

fn terminal_failure(
    operation: &str,
    model: &str,
    failure: RetryError<RemoteError>,
    scope: &RequestScope,
) -> PipelineError {
    let attempts = failure.attempts();
    let cancelled = failure.is_cancelled();
    let remote = failure.into_error();
    error!("{operation} on {model} failed after {attempts} attempt(s): {}", remote.message);

    let (kind, message) = if cancelled {
        (
            ErrorKind::TransportError,
            format!("{operation} cancelled by caller while waiting to retry"),
        )
    } else {
        let classified = classify(&remote.message);
        (classified.kind, classified.message)
    };
    scope.monitor.note_event(
        &format!("failure.{operation}"),
        json!({
            "model": model,
            "kind": kind.as_str(),
            "attempts": attempts,
            "status": remote.status,
            "cancelled": cancelled,
        }),
    );
    PipelineError::Model {
        kind,
        message,
        raw: remote.message,
        attempts,
    }
}
