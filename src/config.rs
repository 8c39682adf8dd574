use anyhow::Context;
use serde::Deserialize;
use std::{
    env,
    fs::File,
    path::{Path, PathBuf},
};
use tracing::warn;
use url::Url;

use crate::constants::{
    CONFIG_FILE_NAMES, DEFAULT_EMBEDDING_MODEL, DEFAULT_ENDPOINT, DEFAULT_GENERATION_MODEL,
    DEFAULT_REQUEST_TIMEOUT_SECS, EMBEDDING_MODELS, GENERATION_MODELS,
};
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Defaults {
    pub api_key: Option<String>,
    pub generation_model: Option<String>,
    pub embedding_model: Option<String>,
    pub endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetryCfg {
    pub generation: Option<RetryPolicy>,
    pub embedding: Option<RetryPolicy>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptCfg {
    pub system_instruction_file: Option<PathBuf>,
    pub strict_json_suffix: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Root {
    pub defaults: Option<Defaults>,
    pub retry: Option<RetryCfg>,
    pub prompt: Option<PromptCfg>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` is allowed here; the invoker refuses to call out without it.
    pub api_key: Option<String>,
    pub generation_model: String,
    pub embedding_model: String,
    pub endpoint: Url,
    pub request_timeout_secs: u64,
    pub generation_retry: RetryPolicy,
    pub embedding_retry: RetryPolicy,
    pub system_instruction_file: Option<PathBuf>,
    pub strict_json_suffix: bool,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let root = match path {
            Some(p) => Some(Self::read_yaml(Path::new(p))?),
            None => match Self::discover() {
                Some(found) => Some(Self::read_yaml(&found)?),
                None => None,
            },
        };
        Self::from_root(root)
    }

    fn discover() -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists())
            .or_else(|| {
                dirs::config_dir()
                    .map(|dir| dir.join("studyforge").join("config.yaml"))
                    .filter(|candidate| candidate.exists())
            })
    }

    fn read_yaml(path: &Path) -> anyhow::Result<Root> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_yaml::from_reader(file).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_root(root: Option<Root>) -> anyhow::Result<Self> {
        let r = root.unwrap_or_default();
        let defaults = r.defaults.unwrap_or_default();
        let retry = r.retry.unwrap_or_default();
        let prompt = r.prompt.unwrap_or_default();

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .or(defaults.api_key)
            .filter(|key| !key.trim().is_empty());

        let generation_model = env::var("STUDYFORGE_GENERATION_MODEL")
            .ok()
            .or(defaults.generation_model)
            .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string());
        if !GENERATION_MODELS.contains(&generation_model.as_str()) {
            warn!("generation model {generation_model} is not in the known model list");
        }

        let embedding_model = env::var("STUDYFORGE_EMBEDDING_MODEL")
            .ok()
            .or(defaults.embedding_model)
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        if !EMBEDDING_MODELS.contains(&embedding_model.as_str()) {
            warn!("embedding model {embedding_model} is not in the known model list");
        }

        let endpoint_raw = env::var("STUDYFORGE_ENDPOINT")
            .ok()
            .or(defaults.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint_raw)
            .with_context(|| format!("invalid endpoint '{endpoint_raw}'"))?;

        let generation_retry = retry.generation.unwrap_or_else(RetryPolicy::generation);
        let embedding_retry = retry.embedding.unwrap_or_else(RetryPolicy::embedding);
        for (name, policy) in [("generation", &generation_retry), ("embedding", &embedding_retry)] {
            if policy.max_attempts == 0 {
                anyhow::bail!("retry.{name}.max_attempts must be at least 1");
            }
        }

        Ok(Self {
            api_key,
            generation_model,
            embedding_model,
            endpoint,
            request_timeout_secs: defaults
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            generation_retry,
            embedding_retry,
            system_instruction_file: prompt.system_instruction_file,
            strict_json_suffix: prompt.strict_json_suffix.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Env overrides are process-global; these tests only assert on fields
    // whose env vars the suite never sets.

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = AppConfig::from_root(None).unwrap();
        assert_eq!(cfg.generation_retry.max_attempts, 5);
        assert_eq!(cfg.generation_retry.base_delay_ms, 500);
        assert_eq!(cfg.embedding_retry.max_attempts, 6);
        assert_eq!(cfg.embedding_retry.base_delay_ms, 400);
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(!cfg.strict_json_suffix);
    }

    #[test]
    fn yaml_overrides_retry_and_prompt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
defaults:
  request_timeout_secs: 30
retry:
  generation:
    max_attempts: 2
    base_delay_ms: 50
prompt:
  system_instruction_file: /tmp/instruction.txt
  strict_json_suffix: true
"#
        )
        .unwrap();
        let cfg = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.generation_retry.max_attempts, 2);
        assert_eq!(cfg.generation_retry.base_delay_ms, 50);
        assert!((cfg.generation_retry.retry_if)("429 Too Many Requests"));
        assert_eq!(cfg.embedding_retry.max_attempts, 6);
        assert_eq!(
            cfg.system_instruction_file.as_deref(),
            Some(Path::new("/tmp/instruction.txt"))
        );
        assert!(cfg.strict_json_suffix);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let root: Root =
            serde_yaml::from_str("retry:\n  embedding:\n    max_attempts: 0\n    base_delay_ms: 1\n")
                .unwrap();
        assert!(AppConfig::from_root(Some(root)).is_err());
    }
}
