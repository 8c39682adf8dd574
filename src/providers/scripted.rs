//! In-memory [`ModelClient`] that replays canned results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{Embedding, Generation, ModelClient, ModelInput, TokenUsage};
use crate::error::RemoteError;

pub struct ScriptedClient {
    credential: bool,
    generations: Mutex<VecDeque<Result<String, RemoteError>>>,
    embeddings: Mutex<VecDeque<Result<Vec<f32>, RemoteError>>>,
    seen_inputs: Mutex<Vec<ModelInput>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            credential: true,
            generations: Mutex::new(VecDeque::new()),
            embeddings: Mutex::new(VecDeque::new()),
            seen_inputs: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn without_credential(mut self) -> Self {
        self.credential = false;
        self
    }

    pub fn generation(self, result: Result<&str, &str>) -> Self {
        self.generations.lock().unwrap().push_back(
            result
                .map(str::to_string)
                .map_err(RemoteError::new),
        );
        self
    }

    pub fn embedding(self, result: Result<Vec<f32>, &str>) -> Self {
        self.embeddings
            .lock()
            .unwrap()
            .push_back(result.map_err(RemoteError::new));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_inputs(&self) -> Vec<ModelInput> {
        self.seen_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn has_credential(&self) -> bool {
        self.credential
    }

    fn generation_model(&self) -> &str {
        "scripted-generation"
    }

    fn embedding_model(&self) -> &str {
        "scripted-embedding"
    }

    async fn generate_content(&self, input: &ModelInput) -> Result<Generation, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_inputs.lock().unwrap().push(input.clone());
        let next = self
            .generations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::new("script exhausted")));
        next.map(|text| Generation {
            text,
            usage: TokenUsage::default(),
        })
    }

    async fn embed_content(&self, _text: &str) -> Result<Embedding, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .embeddings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::new("script exhausted")));
        next.map(|values| Embedding { values })
    }
}
