use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RemoteError;

/// One segment of a multi-part model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// Raw bytes; encoding for the wire is the client's job.
    Binary { data: Bytes, mime_type: String },
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Part::Text(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelInput {
    Prompt(String),
    Parts(Vec<Part>),
}

impl ModelInput {
    pub fn parts(&self) -> Vec<Part> {
        match self {
            ModelInput::Prompt(prompt) => vec![Part::Text(prompt.clone())],
            ModelInput::Parts(parts) => parts.clone(),
        }
    }
}

impl From<&str> for ModelInput {
    fn from(value: &str) -> Self {
        ModelInput::Prompt(value.to_string())
    }
}

impl From<Vec<Part>> for ModelInput {
    fn from(value: Vec<Part>) -> Self {
        ModelInput::Parts(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// Study material as handed over by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Text(String),
    /// Text already extracted from a PDF or DOCX file.
    Document { format: DocumentFormat, text: String },
    Binary { data: Bytes, mime_type: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Remote model handle. One call is one network request; retries are the
/// caller's business.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn has_credential(&self) -> bool;

    fn generation_model(&self) -> &str;

    fn embedding_model(&self) -> &str;

    async fn generate_content(&self, input: &ModelInput) -> Result<Generation, RemoteError>;

    async fn embed_content(&self, text: &str) -> Result<Embedding, RemoteError>;
}

pub trait Ingestor: Send + Sync {
    fn load(&self, path: &Path, mime_override: Option<&str>) -> anyhow::Result<ContentSource>;
}
