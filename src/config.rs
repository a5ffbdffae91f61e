//! Configuration: TOML file plus provider credentials from the environment.
//!
//! Every section of the file is optional; missing keys fall back to the
//! defaults below. Credentials are never read from the file.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3003"
//!
//! [knowledge_base]
//! dir = "knowledge_base"
//! include_globs = ["**/*.pdf"]
//! top_k = 3
//!
//! [templates]
//! notebooks_dir = ".ai/notebooks"
//! prompts_dir = ".ai/prompts"
//!
//! [llm]
//! deployment = "gpt-4-32k"
//! api_version = "2024-02-15-preview"
//! max_tokens = 2048
//! creative_temperature = 0.9
//! timeout_secs = 120
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3003".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_kb_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            dir: default_kb_dir(),
            include_globs: default_include_globs(),
            top_k: default_top_k(),
        }
    }
}

fn default_kb_dir() -> PathBuf {
    PathBuf::from("knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}
fn default_top_k() -> usize {
    kb_chat_core::rank::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplatesConfig {
    #[serde(default = "default_notebooks_dir")]
    pub notebooks_dir: PathBuf,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            notebooks_dir: default_notebooks_dir(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

fn default_notebooks_dir() -> PathBuf {
    PathBuf::from(".ai/notebooks")
}
fn default_prompts_dir() -> PathBuf {
    PathBuf::from(".ai/prompts")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_creative_temperature")]
    pub creative_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            deployment: default_deployment(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            creative_temperature: default_creative_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_deployment() -> String {
    "gpt-4-32k".to_string()
}
fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_creative_temperature() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    120
}

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_PORT: &str = "PORT";

/// Provider endpoint and key, resolved from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Loads `.env` and `.env.local` into the process environment.
///
/// Variables that are already set are left alone. Missing files are fine;
/// a file that cannot be read or parsed is logged and skipped.
pub fn load_dotenv() {
    for (file, result) in [
        (".env", dotenvy::dotenv().map(|_| ())),
        (".env.local", dotenvy::from_filename(".env.local").map(|_| ())),
    ] {
        if let Some(e) = env_file_problem(result) {
            tracing::warn!(file, error = %e, "failed to load env file");
        }
    }
}

/// The error worth reporting from a dotenv load, if any.
fn env_file_problem(result: Result<(), dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves credentials through `lookup`; empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        match (get(ENV_ENDPOINT), get(ENV_API_KEY)) {
            (Some(endpoint), Some(api_key)) => Ok(Self { endpoint, api_key }),
            (endpoint, key) => {
                let mut missing = Vec::new();
                if endpoint.is_none() {
                    missing.push(ENV_ENDPOINT);
                }
                if key.is_none() {
                    missing.push(ENV_API_KEY);
                }
                bail!(
                    "provider credentials not configured: set {}",
                    missing.join(" and ")
                )
            }
        }
    }
}

impl Config {
    /// Applies environment overrides for the deployment, API version, and port.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(deployment) = lookup(ENV_DEPLOYMENT).filter(|v| !v.is_empty()) {
            self.llm.deployment = deployment;
        }
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.is_empty()) {
            self.llm.api_version = version;
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.is_empty()) {
            let port: u16 = port
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", ENV_PORT, port))?;
            self.server.bind = with_port(&self.server.bind, port)?;
        }
        Ok(())
    }
}

fn with_port(bind: &str, port: u16) -> Result<String> {
    let mut addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("server.bind is not a socket address: {}", bind))?;
    addr.set_port(port);
    Ok(addr.to_string())
}

/// Reads and validates the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.knowledge_base.top_k == 0 {
        bail!("knowledge_base.top_k must be >= 1");
    }

    for pattern in &config.knowledge_base.include_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("knowledge_base.include_globs: invalid glob '{}'", pattern))?;
    }

    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be >= 1");
    }

    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.llm.creative_temperature) {
        bail!("llm.creative_temperature must be in [0.0, 2.0]");
    }

    if config.llm.deployment.trim().is_empty() {
        bail!("llm.deployment must not be empty");
    }

    Ok(())
}
