//! Configuration model for the forwarding service
//!
//! Configuration is resolved in order of precedence:
//! 1. Process environment (highest priority, documented keys only)
//! 2. Config file (~/.config/fwdctl/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! The model is constructed once per invocation and is immutable after
//! projection; the forwarder only ever sees the flat environment form.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ControlError;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod api_key;
mod cache;
mod env;
mod forward;
mod rate_limit;
mod serialization;

#[cfg(test)]
mod tests;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (maintain public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use api_key::{ApiKeyPolicy, AuthLevels};
pub use cache::CachePolicy;
pub use env::keys;
pub use forward::{default_rules, ForwardRule, RuleKind};
pub use rate_limit::{IterChunkMode, LimitEntry, LimitStrategy, RateLimitPolicy, RateLimitRule};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate root
// ─────────────────────────────────────────────────────────────────────────────

/// Settings aggregate consumed by the environment projection
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Config {
    /// Timezone the forwarder stamps its logs with
    pub timezone: String,

    /// Upstream request timeout in seconds
    pub timeout: u64,

    /// Benchmark mode (forwarder skips upstream calls, replays canned data)
    pub benchmark_mode: bool,

    /// Outbound HTTP proxy; None means direct connection. An unset proxy
    /// is omitted from projection rather than emitted as an empty string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Stream responses by default when the client does not specify
    pub default_stream_response: bool,

    /// Forwarding rules, in routing precedence order (first match wins)
    pub forward: Vec<ForwardRule>,

    /// API-key authorization mapping
    pub api_key: ApiKeyPolicy,

    /// Response cache policy
    pub cache: CachePolicy,

    /// Rate-limit policy
    pub rate_limit: RateLimitPolicy,

    /// Chat log capture flags for the forwarder
    pub log: LoggingPolicy,
}

/// Chat log capture flags
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingPolicy {
    pub general: bool,
    pub openai: bool,
}

impl Default for LoggingPolicy {
    fn default() -> Self {
        Self {
            general: true,
            openai: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
            timeout: 6,
            benchmark_mode: false,
            proxy: None,
            default_stream_response: true,
            forward: default_rules(),
            api_key: ApiKeyPolicy::default(),
            cache: CachePolicy::default(),
            rate_limit: RateLimitPolicy::default(),
            log: LoggingPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure: every section optional, strict within sections
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub forward: Option<Vec<ForwardRule>>,
    pub api_key: Option<ApiKeyPolicy>,
    pub cache: Option<CachePolicy>,
    pub rate_limit: Option<RateLimitPolicy>,
    pub log: Option<LoggingPolicy>,
    pub timezone: Option<String>,
    pub timeout: Option<u64>,
    pub benchmark_mode: Option<bool>,
    pub proxy: Option<String>,
    pub default_stream_response: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/fwdctl/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("fwdctl").join("config.toml"))
    }

    /// Load the file config if present.
    ///
    /// A file that exists but does not parse is a fatal configuration
    /// error: failing fast beats silently running on defaults while the
    /// user debugs the wrong thing.
    fn load_file_config() -> Result<FileConfig, ControlError> {
        let Some(path) = Self::config_path() else {
            return Ok(FileConfig::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| {
                ControlError::config(format!("failed to parse {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(ControlError::config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Apply a file config over the current values
    pub(crate) fn apply_file(&mut self, file: FileConfig) {
        if let Some(forward) = file.forward {
            self.forward = forward;
        }
        if let Some(api_key) = file.api_key {
            self.api_key = api_key;
        }
        if let Some(cache) = file.cache {
            self.cache = cache;
        }
        if let Some(rate_limit) = file.rate_limit {
            self.rate_limit = rate_limit;
        }
        if let Some(log) = file.log {
            self.log = log;
        }
        if let Some(timezone) = file.timezone {
            self.timezone = timezone;
        }
        if let Some(timeout) = file.timeout {
            self.timeout = timeout;
        }
        if let Some(benchmark_mode) = file.benchmark_mode {
            self.benchmark_mode = benchmark_mode;
        }
        if let Some(proxy) = file.proxy {
            self.proxy = (!proxy.is_empty()).then_some(proxy);
        }
        if let Some(stream) = file.default_stream_response {
            self.default_stream_response = stream;
        }
    }

    /// Resolve configuration: defaults -> file -> process environment
    pub fn load() -> Result<Self, ControlError> {
        let mut config = Self::default();
        config.apply_file(Self::load_file_config()?);

        let env: std::collections::HashMap<String, String> = std::env::vars().collect();
        config.hydrate(&env)?;
        Ok(config)
    }

    /// Validation warnings for known configuration smells.
    ///
    /// All three checks resolve documented gaps permissively: duplicate
    /// forward routes, dangling authorization levels, and repeated
    /// priority levels within a rule are reported, never rejected,
    /// because the forwarder accepts all of them.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.forward {
            if !seen.insert(rule.route.as_str()) {
                warnings.push(format!(
                    "duplicate forward route {:?}; only the first rule will match",
                    rule.route
                ));
            }
        }

        let dangling = self.api_key.dangling_levels();
        if !dangling.is_empty() {
            warnings.push(format!(
                "authorization levels {dangling:?} are referenced but no provider key serves them"
            ));
        }

        for rule in self
            .rate_limit
            .token_rate_limit
            .iter()
            .chain(self.rate_limit.req_rate_limit.iter())
        {
            let mut levels = std::collections::BTreeSet::new();
            for entry in &rule.limits {
                if !levels.insert(entry.level) {
                    warnings.push(format!(
                        "rate-limit rule for {:?} repeats priority level {}",
                        rule.route, entry.level
                    ));
                }
            }
        }

        warnings
    }
}
