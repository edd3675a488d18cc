//! Process-wide configuration for the health agent.
//!
//! Settings are supplied at startup from the environment (optionally seeded
//! from a `.env` file by the binary) and an optional JSON overrides file:
//!
//! - [`AppConfig`] — Complete configuration, built once and shared read-only
//! - [`Limits`] — Step and timeout bounds for agent runs
//! - [`DispatchMode`] — Whether two specialists run concurrently or in sequence
//! - [`Tunables`] — Overrides loadable from the file named by `HEALTH_AGENT_CONFIG`
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use health_config::{AppConfig, DispatchMode};
//!
//! let env: HashMap<&str, &str> = HashMap::from([
//!     ("GOOGLE_API_KEY", "g-key"),
//!     ("TAVILY_API_KEY", "t-key"),
//!     ("HEALTH_AGENT_DISPATCH", "sequential"),
//! ]);
//!
//! let config = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
//! assert_eq!(config.model.model, "gemini-2.0-flash");
//! assert_eq!(config.dispatch, DispatchMode::Sequential);
//! assert_eq!(config.server.port, 8000);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use health_core::ModelConfig;
use serde::{Deserialize, Serialize};

/// Default model, served through Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_TAVILY_BASE: &str = "https://api.tavily.com";

/// Errors that can occur when loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A variable is present but unusable.
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    /// Failed to read the overrides file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the overrides file.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Creates an invalid-value error.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { key: key.into(), message: message.into() }
    }
}

/// How the coordinator dispatches when both specialists are needed.
///
/// | Mode | Behavior |
/// |------|----------|
/// | `Parallel` | Both run concurrently; the coordinator joins on both |
/// | `Sequential` | Doctor first, then coach with the medical findings in its briefing |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Parallel,
    Sequential,
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            other => Err(ConfigError::invalid(
                "HEALTH_AGENT_DISPATCH",
                format!("expected 'parallel' or 'sequential', got '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        };
        write!(f, "{}", s)
    }
}

/// Bounds applied to every agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum model calls a specialist may make before it must answer.
    pub max_steps: usize,
    /// Bound on a single model call.
    pub step_timeout: Duration,
    /// Bound on a single search call.
    pub search_timeout: Duration,
    /// Bound on a whole request, end to end.
    pub request_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 12,
            step_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Search service settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: String,
    pub api_base: String,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Returns the `host:port` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Overrides read from the JSON file named by `HEALTH_AGENT_CONFIG`.
///
/// Credentials are not accepted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub max_steps: Option<usize>,
    pub step_timeout_secs: Option<u64>,
    pub search_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub dispatch: Option<DispatchMode>,
    pub synthesize: Option<bool>,
    pub audit_dir: Option<PathBuf>,
    pub batch_concurrency: Option<usize>,
}

impl Tunables {
    /// Loads overrides from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses overrides from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub limits: Limits,
    pub dispatch: DispatchMode,
    /// Rewrite the assembled answer with the coordinator model.
    pub synthesize: bool,
    /// Root directory for per-request audit artifacts.
    pub audit_dir: PathBuf,
    /// Maximum batch items processed at once.
    pub batch_concurrency: usize,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // A Google key implies the Gemini endpoint unless a base is given.
        let (api_key, implied_base) = match (get("GOOGLE_API_KEY"), get("OPENAI_API_KEY")) {
            (Some(key), _) => (key, Some(GEMINI_OPENAI_BASE.to_string())),
            (None, Some(key)) => (key, None),
            (None, None) => return Err(ConfigError::Missing("GOOGLE_API_KEY or OPENAI_API_KEY".into())),
        };

        let model = ModelConfig {
            model: get("HEALTH_AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("HEALTH_AGENT_API_BASE").or(implied_base),
            api_key,
        };

        let search = SearchConfig {
            api_key: get("TAVILY_API_KEY").ok_or_else(|| ConfigError::Missing("TAVILY_API_KEY".into()))?,
            api_base: get("TAVILY_API_BASE").unwrap_or_else(|| DEFAULT_TAVILY_BASE.to_string()),
        };

        let server = ServerConfig {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8000)?,
        };

        let defaults = Limits::default();
        let limits = Limits {
            max_steps: parse_or("HEALTH_AGENT_MAX_STEPS", get("HEALTH_AGENT_MAX_STEPS"), defaults.max_steps)?,
            step_timeout: secs_or(
                "HEALTH_AGENT_STEP_TIMEOUT_SECS",
                get("HEALTH_AGENT_STEP_TIMEOUT_SECS"),
                defaults.step_timeout,
            )?,
            search_timeout: secs_or(
                "HEALTH_AGENT_SEARCH_TIMEOUT_SECS",
                get("HEALTH_AGENT_SEARCH_TIMEOUT_SECS"),
                defaults.search_timeout,
            )?,
            request_timeout: secs_or(
                "HEALTH_AGENT_REQUEST_TIMEOUT_SECS",
                get("HEALTH_AGENT_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout,
            )?,
        };

        let dispatch = match get("HEALTH_AGENT_DISPATCH") {
            Some(v) => v.parse()?,
            None => DispatchMode::default(),
        };

        let mut config = Self {
            model,
            search,
            server,
            limits,
            dispatch,
            synthesize: parse_or("HEALTH_AGENT_SYNTHESIZE", get("HEALTH_AGENT_SYNTHESIZE"), false)?,
            audit_dir: get("HEALTH_AGENT_AUDIT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/audit")),
            batch_concurrency: parse_or(
                "HEALTH_AGENT_BATCH_CONCURRENCY",
                get("HEALTH_AGENT_BATCH_CONCURRENCY"),
                4,
            )?,
        };

        if let Some(path) = get("HEALTH_AGENT_CONFIG") {
            config.apply(Tunables::from_file(&path)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies file overrides on top of environment values.
    pub fn apply(&mut self, t: Tunables) {
        if let Some(model) = t.model {
            self.model.model = model;
        }
        if t.api_base.is_some() {
            self.model.api_base = t.api_base;
        }
        if let Some(v) = t.max_steps {
            self.limits.max_steps = v;
        }
        if let Some(v) = t.step_timeout_secs {
            self.limits.step_timeout = Duration::from_secs(v);
        }
        if let Some(v) = t.search_timeout_secs {
            self.limits.search_timeout = Duration::from_secs(v);
        }
        if let Some(v) = t.request_timeout_secs {
            self.limits.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = t.dispatch {
            self.dispatch = v;
        }
        if let Some(v) = t.synthesize {
            self.synthesize = v;
        }
        if let Some(v) = t.audit_dir {
            self.audit_dir = v;
        }
        if let Some(v) = t.batch_concurrency {
            self.batch_concurrency = v;
        }
    }

    /// Checks that every bound is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_steps == 0 {
            return Err(ConfigError::invalid("max_steps", "must be at least 1"));
        }
        let durations = [
            ("step_timeout", self.limits.step_timeout),
            ("search_timeout", self.limits.search_timeout),
            ("request_timeout", self.limits.request_timeout),
        ];
        for (key, d) in durations {
            if d.is_zero() {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::invalid("batch_concurrency", "must be at least 1"));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn secs_or(key: &str, raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(key, raw, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn google_key_implies_gemini_endpoint() {
        let config = config_from(&[("GOOGLE_API_KEY", "g"), ("TAVILY_API_KEY", "t")]).unwrap();
        assert_eq!(config.model.api_key, "g");
        assert_eq!(config.model.api_base.as_deref(), Some(GEMINI_OPENAI_BASE));
        assert_eq!(config.search.api_base, DEFAULT_TAVILY_BASE);
        assert_eq!(config.limits, Limits::default());
        assert!(!config.synthesize);
    }

    #[test]
    fn openai_key_uses_default_base() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "o"),
            ("TAVILY_API_KEY", "t"),
            ("HEALTH_AGENT_MODEL", "gpt-4o"),
        ])
        .unwrap();
        assert_eq!(config.model.api_base, None);
        assert_eq!(config.model.model, "gpt-4o");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = config_from(&[("TAVILY_API_KEY", "t")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));

        let err = config_from(&[("GOOGLE_API_KEY", "g"), ("TAVILY_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "TAVILY_API_KEY"));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = config_from(&[("GOOGLE_API_KEY", "g"), ("TAVILY_API_KEY", "t"), ("PORT", "eighty")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "PORT"));

        let err = config_from(&[
            ("GOOGLE_API_KEY", "g"),
            ("TAVILY_API_KEY", "t"),
            ("HEALTH_AGENT_MAX_STEPS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn overrides_file_applies_tunables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_steps": 3, "dispatch": "sequential", "synthesize": true, "step_timeout_secs": 5}}"#
        )
        .unwrap();
        let path = file.path().display().to_string();

        let config = config_from(&[
            ("GOOGLE_API_KEY", "g"),
            ("TAVILY_API_KEY", "t"),
            ("HEALTH_AGENT_CONFIG", path.as_str()),
        ])
        .unwrap();

        assert_eq!(config.limits.max_steps, 3);
        assert_eq!(config.limits.step_timeout, Duration::from_secs(5));
        assert_eq!(config.dispatch, DispatchMode::Sequential);
        assert!(config.synthesize);
    }

    #[test]
    fn overrides_file_rejects_credentials() {
        let err = Tunables::from_json(r#"{"api_key": "nope"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn dispatch_mode_parses_case_insensitively() {
        assert_eq!("Sequential".parse::<DispatchMode>().unwrap(), DispatchMode::Sequential);
        assert!("round-robin".parse::<DispatchMode>().is_err());
    }
}
