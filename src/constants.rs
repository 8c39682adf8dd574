//! Shared constants for the studyforge pipeline.

pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
pub const GEMINI_2_5_FLASH_LITE: &str = "gemini-2.5-flash-lite";
pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
pub const EMBEDDING_001: &str = "embedding-001";
pub const TEXT_EMBEDDING_004: &str = "text-embedding-004";

pub const GENERATION_MODELS: &[&str] = &[GEMINI_2_5_FLASH, GEMINI_2_5_FLASH_LITE, GEMINI_2_5_PRO];
pub const EMBEDDING_MODELS: &[&str] = &[EMBEDDING_001, TEXT_EMBEDDING_004];

pub const DEFAULT_GENERATION_MODEL: &str = GEMINI_2_5_FLASH;
pub const DEFAULT_EMBEDDING_MODEL: &str = EMBEDDING_001;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const API_VERSION: &str = "v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

pub const CONFIG_FILE_NAMES: &[&str] = &["studyforge.yaml", "studyforge.yml"];

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
