pub mod artifact;
pub mod assemble;
pub mod classify;
pub mod config;
pub mod constants;
pub mod core;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod invoker;
pub mod normalize;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod telemetry;
pub mod utils;

pub use crate::assemble::ContentAssembler;
pub use crate::core::{ContentSource, DocumentFormat, ModelClient, ModelInput, Part};
pub use crate::engine::StudyEngine;
pub use crate::error::{ErrorKind, PipelineError};
pub use crate::invoker::{ModelInvoker, RequestScope};
pub use crate::normalize::{normalize, ExtractionFailed};
pub use crate::retry::RetryPolicy;
