//! Rate-limit policy: per-route limit expressions by priority level

use serde::{Deserialize, Serialize};

/// One (priority level, limit expression) pair within a rule
///
/// Limit expressions are strings like "60/second" or "100/2minutes",
/// interpreted by the rate-limit engine, not here.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LimitEntry {
    pub level: i64,
    pub limit: String,
}

impl LimitEntry {
    pub fn new(level: i64, limit: &str) -> Self {
        Self {
            level,
            limit: limit.to_string(),
        }
    }
}

/// Per-route rate-limit rule
///
/// A rule with an empty route or no entries stays in the model but is
/// filtered out of the environment projection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitRule {
    pub route: String,
    pub limits: Vec<LimitEntry>,
}

impl RateLimitRule {
    pub fn new(route: &str, limits: Vec<LimitEntry>) -> Self {
        Self {
            route: route.to_string(),
            limits,
        }
    }

    /// Whether this rule survives projection
    pub fn is_projectable(&self) -> bool {
        !self.route.is_empty() && !self.limits.is_empty()
    }
}

/// Chunk iteration mode for streamed responses under rate limiting
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum IterChunkMode {
    #[default]
    #[serde(rename = "one-by-one")]
    OneByOne,
    #[serde(rename = "efficiency")]
    Efficiency,
}

impl IterChunkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneByOne => "one-by-one",
            Self::Efficiency => "efficiency",
        }
    }
}

/// Rate-limit window strategy
///
/// The wire strings mix separators ("fixed_window" vs "moving-window");
/// those are the exact literals the rate-limit engine accepts, kept as-is.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum LimitStrategy {
    #[serde(rename = "fixed_window")]
    FixedWindow,
    #[default]
    #[serde(rename = "moving-window")]
    MovingWindow,
    #[serde(rename = "fixed-window-elastic-expiry")]
    FixedWindowElasticExpiry,
}

impl LimitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedWindow => "fixed_window",
            Self::MovingWindow => "moving-window",
            Self::FixedWindowElasticExpiry => "fixed-window-elastic-expiry",
        }
    }
}

/// Rate-limit policy handed to the forwarder
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitPolicy {
    /// Rate-limit backend identifier (empty = engine default)
    pub backend: String,

    /// Global request limit expression; "inf" means unbounded
    pub global_rate_limit: String,

    /// Streamed chunk iteration mode
    pub iter_chunk: IterChunkMode,

    /// Window strategy
    pub strategy: LimitStrategy,

    /// Per-route token throughput limits
    pub token_rate_limit: Vec<RateLimitRule>,

    /// Per-route request throughput limits
    pub req_rate_limit: Vec<RateLimitRule>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            backend: String::new(),
            global_rate_limit: "inf".to_string(),
            token_rate_limit: vec![
                RateLimitRule::new(
                    "/v1/chat/completions",
                    vec![LimitEntry::new(0, "60/second")],
                ),
                RateLimitRule::new("/v1/completions", vec![LimitEntry::new(0, "60/second")]),
            ],
            req_rate_limit: vec![
                RateLimitRule::new(
                    "/v1/chat/completions",
                    vec![LimitEntry::new(0, "100/2minutes")],
                ),
                RateLimitRule::new("/v1/completions", vec![LimitEntry::new(0, "60/minute")]),
                RateLimitRule::new(
                    "/v1/embeddings",
                    vec![LimitEntry::new(0, "100/2minutes")],
                ),
            ],
            iter_chunk: IterChunkMode::default(),
            strategy: LimitStrategy::default(),
        }
    }
}
