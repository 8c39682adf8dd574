use crate::utils::ensure_dir;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    pub model: String,
    pub operation: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub attempts: u32,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl RequestEvent {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at)
            .as_seconds_f64()
            .max(0.0)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub total_requests: usize,
    pub total_attempts: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_seconds: f64,
    pub by_model: HashMap<String, SummaryBucket>,
    pub by_operation: HashMap<String, SummaryBucket>,
}

#[derive(Debug, Default, Serialize)]
pub struct SummaryBucket {
    pub requests: usize,
    pub attempts: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_duration_seconds: f64,
}

/// Collects request events and notes for a single request scope.
#[derive(Clone, Default)]
pub struct RunMonitor {
    inner: Arc<Mutex<RunState>>,
}

#[derive(Default)]
struct RunState {
    events: Vec<RequestEvent>,
    notes: Vec<Note>,
    first_started: Option<OffsetDateTime>,
    last_finished: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub name: String,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RunMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RunState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, event: RequestEvent) {
        let mut state = self.state();
        if state
            .first_started
            .map_or(true, |first| event.started_at < first)
        {
            state.first_started = Some(event.started_at);
        }
        if state
            .last_finished
            .map_or(true, |last| event.finished_at > last)
        {
            state.last_finished = Some(event.finished_at);
        }
        state.events.push(event);
    }

    pub fn note_event(&self, name: &str, payload: serde_json::Value) {
        self.state().notes.push(Note {
            name: name.to_string(),
            payload,
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.state().events.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state().notes.clone()
    }

    pub fn summarize(&self) -> RunSummary {
        let state = self.state();
        let mut summary = RunSummary {
            total_requests: state.events.len(),
            ..RunSummary::default()
        };
        for event in &state.events {
            let input = event.input_tokens.unwrap_or_else(|| {
                event
                    .total_tokens
                    .and_then(|total| event.output_tokens.map(|out| total.saturating_sub(out)))
                    .unwrap_or(0)
            }) as u64;
            let output = event.output_tokens.unwrap_or(0) as u64;
            let duration = event.duration_seconds();

            summary.total_attempts += event.attempts as u64;
            summary.total_input_tokens += input;
            summary.total_output_tokens += output;
            summary.total_duration_seconds += duration;

            update_bucket(
                summary.by_model.entry(event.model.clone()).or_default(),
                event.attempts,
                input,
                output,
                duration,
            );
            update_bucket(
                summary
                    .by_operation
                    .entry(event.operation.clone())
                    .or_default(),
                event.attempts,
                input,
                output,
                duration,
            );
        }
        summary
    }

    pub fn flush_summary(&self, to: &Path) -> anyhow::Result<()> {
        if let Some(parent) = to.parent() {
            ensure_dir(parent)?;
        }
        let summary = self.summarize();
        let state = self.state();
        let start = state.first_started.and_then(|t| t.format(&Rfc3339).ok());
        let end = state.last_finished.and_then(|t| t.format(&Rfc3339).ok());
        let elapsed = match (state.first_started, state.last_finished) {
            (Some(s), Some(f)) => (f - s).max(Duration::ZERO).as_seconds_f64(),
            _ => 0.0,
        };

        let payload = json!({
            "totals": {
                "requests": summary.total_requests,
                "attempts": summary.total_attempts,
                "input_tokens": summary.total_input_tokens,
                "output_tokens": summary.total_output_tokens,
            },
            "time": {
                "start": start,
                "end": end,
                "elapsed_sec": elapsed,
            },
            "by_model": summary.by_model,
            "by_operation": summary.by_operation,
            "events": state.events,
            "notes": state.notes,
        });

        let mut file = File::create(to)?;
        file.write_all(serde_json::to_string_pretty(&payload)?.as_bytes())?;
        Ok(())
    }
}

fn update_bucket(bucket: &mut SummaryBucket, attempts: u32, input: u64, output: u64, duration: f64) {
    bucket.requests += 1;
    bucket.attempts += attempts as u64;
    bucket.input_tokens += input;
    bucket.output_tokens += output;
    bucket.total_duration_seconds += duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(model: &str, operation: &str, attempts: u32, seconds: i64) -> RequestEvent {
        let started_at = OffsetDateTime::UNIX_EPOCH;
        RequestEvent {
            model: model.into(),
            operation: operation.into(),
            started_at,
            finished_at: started_at + Duration::seconds(seconds),
            attempts,
            input_tokens: Some(100),
            output_tokens: Some(20),
            total_tokens: Some(120),
        }
    }

    #[test]
    fn summary_groups_by_model_and_operation() {
        let monitor = RunMonitor::new();
        monitor.record(event("gemini-2.5-flash", "generateContent", 3, 2));
        monitor.record(event("embedding-001", "embedContent", 1, 1));

        let summary = monitor.summarize();
        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.total_attempts, 4);
        assert_eq!(summary.total_input_tokens, 200);
        assert_eq!(summary.by_operation["generateContent"].attempts, 3);
        assert_eq!(summary.by_model["embedding-001"].requests, 1);
        assert!((summary.total_duration_seconds - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flush_writes_events_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("telemetry.json");
        let monitor = RunMonitor::new();
        monitor.record(event("gemini-2.5-flash", "generateContent", 1, 1));
        monitor.note_event("retry.generateContent", json!({"attempt": 1}));
        monitor.flush_summary(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["totals"]["requests"], 1);
        assert_eq!(written["notes"][0]["name"], "retry.generateContent");
        assert_eq!(written["events"][0]["operation"], "generateContent");
    }
}
