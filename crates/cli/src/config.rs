use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use medrag_rag::{LlmProvider, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_TOKENS, DEFAULT_TOP_K};
use serde::Deserialize;

use crate::cli::AskArgs;

pub const DEFAULT_CONFIG: &str = "medrag.toml";
pub const DEFAULT_DB: &str = "medrag.sqlite";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ask: AskDefaults,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskDefaults {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    /// `0` disables the round limit.
    pub max_iterations: Option<usize>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: Option<usize>,
    pub top_k: usize,
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))
}

pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("MEDRAG_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

/// Flags win over the config file; `env_provider` is consulted only when
/// neither names a provider.
pub fn resolve_ask(
    args: &AskArgs,
    defaults: &AskDefaults,
    env_provider: Option<String>,
) -> Result<AskSettings> {
    let provider_name = args
        .provider
        .clone()
        .or_else(|| defaults.provider.clone())
        .or(env_provider)
        .unwrap_or_else(|| "openai".to_string());
    let provider = LlmProvider::from_str(&provider_name)
        .ok_or_else(|| anyhow!("unsupported provider {provider_name}"))?;
    let model = args
        .model
        .clone()
        .or_else(|| defaults.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());
    let max_iterations = if args.unbounded {
        None
    } else {
        match args.max_iterations.or(defaults.max_iterations) {
            Some(0) if args.max_iterations.is_none() => None,
            Some(limit) => Some(limit),
            None => Some(DEFAULT_MAX_ITERATIONS),
        }
    };
    Ok(AskSettings {
        provider,
        model,
        max_tokens: args
            .max_tokens
            .or(defaults.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        max_iterations,
        top_k: args.top_k.or(defaults.top_k).unwrap_or(DEFAULT_TOP_K),
    })
}
