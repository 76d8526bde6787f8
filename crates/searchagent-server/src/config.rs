//! Server configuration: clap flags with environment fallbacks, plus the
//! optional env-file loader that runs before argument parsing.

use std::path::PathBuf;

use axum::http::{HeaderValue, Method};
use clap::builder::BoolishValueParser;
use searchagent::{ContextSize, OrchestratorConfig};
use searchagent_openai::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_MS};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

pub const ENV_FILE_VAR: &str = "SEARCHAGENT_ENV_FILE";
pub const DOTENV_SWITCH_VAR: &str = "SEARCHAGENT_DOTENV";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing OpenAI API key: set OPENAI_API_KEY or pass --api-key")]
    MissingApiKey,
    #[error("invalid allowed origin {0:?}")]
    InvalidOrigin(String),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// OpenAI API key (required).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Debug logging: true|false. `RUST_LOG` still wins when set.
    #[arg(
        long,
        env = "DEBUG",
        action = clap::ArgAction::Set,
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Comma-separated CORS origins; `*` allows any origin.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGINS)]
    pub allowed_origins: String,

    #[arg(long, env = "SEARCHAGENT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Search context size used when a request names none: low|medium|high
    #[arg(long, env = "SEARCHAGENT_DEFAULT_CONTEXT_SIZE", default_value = "medium")]
    pub default_context_size: ContextSize,

    /// API origin, without `/v1`.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout for provider calls (ms).
    #[arg(long, env = "SEARCHAGENT_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

impl ServeArgs {
    pub fn api_key_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    pub fn openai_config(&self) -> Result<OpenAiConfig, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(OpenAiConfig {
            api_key: api_key.to_string(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout_ms: self.timeout_ms,
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_context_size: self.default_context_size,
        }
    }

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        Ok(cors_layer(parse_origins(&self.allowed_origins)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

pub fn parse_origins(raw: &str) -> Result<AllowedOrigins, ConfigError> {
    let items: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if items.contains(&"*") {
        return Ok(AllowedOrigins::Any);
    }
    items
        .into_iter()
        .map(|o| {
            HeaderValue::from_str(o.trim_end_matches('/'))
                .map_err(|_| ConfigError::InvalidOrigin(o.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(AllowedOrigins::List)
}

/// Credentials are only allowed with an explicit origin list; CORS forbids
/// them together with a wildcard origin.
pub fn cors_layer(origins: AllowedOrigins) -> CorsLayer {
    match origins {
        AllowedOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        AllowedOrigins::List(list) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(AllowMethods::list([
                Method::GET,
                Method::POST,
                Method::OPTIONS,
            ]))
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
    }
}

/// Loads `KEY=VALUE` lines from `SEARCHAGENT_ENV_FILE`, or `.env` in the working
/// directory, unless `SEARCHAGENT_DOTENV=0`.
///
/// Variables already present in the process environment are never overridden,
/// and values are never logged. Returns the file that was read, if any.
pub fn load_env_file() -> Option<PathBuf> {
    if std::env::var(DOTENV_SWITCH_VAR).is_ok_and(|v| v.trim() == "0") {
        return None;
    }
    let path = std::env::var(ENV_FILE_VAR)
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"));
    let txt = std::fs::read_to_string(&path).ok()?;
    apply_env_text(&txt);
    Some(path)
}

/// Applies env-file text to the process environment. Returns the number of
/// variables that were set.
pub fn apply_env_text(txt: &str) -> usize {
    let mut set = 0;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        // Don't override explicit process env.
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, unquote(v.trim()));
            set += 1;
        }
    }
    set
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    v
}
