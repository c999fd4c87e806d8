//! Environment projection and hydration
//!
//! The forwarder consumes configuration as a flat set of environment
//! variables. `Config::to_env` projects the nested model into that form
//! (deterministic: same input, byte-identical output) and
//! `Config::hydrate` reads it back, tolerating any subset of keys.
//!
//! The projection is a boundary artifact: it is generated once and
//! handed to the child process's startup environment, never written
//! into the parent's own environment.

use serde::de::DeserializeOwned;
use std::collections::HashMap;

use super::{Config, RateLimitRule};
use crate::error::ControlError;

/// Documented environment keys, the complete enumeration.
///
/// The projector emits every key listed here except `PROXY`, which is
/// omitted entirely when no proxy is configured.
pub mod keys {
    pub const FORWARD_CONFIG: &str = "FORWARD_CONFIG";
    pub const OPENAI_API_KEY_CONFIG: &str = "OPENAI_API_KEY_CONFIG";
    pub const FORWARD_KEY_CONFIG: &str = "FORWARD_KEY_CONFIG";
    pub const LEVEL_MODELS: &str = "LEVEL_MODELS";
    pub const CACHE_OPENAI: &str = "CACHE_OPENAI";
    pub const CACHE_GENERAL: &str = "CACHE_GENERAL";
    pub const CACHE_BACKEND: &str = "CACHE_BACKEND";
    pub const CACHE_ROOT_PATH_OR_URL: &str = "CACHE_ROOT_PATH_OR_URL";
    pub const DEFAULT_REQUEST_CACHING_VALUE: &str = "DEFAULT_REQUEST_CACHING_VALUE";
    pub const CACHE_ROUTES: &str = "CACHE_ROUTES";
    pub const GLOBAL_RATE_LIMIT: &str = "GLOBAL_RATE_LIMIT";
    pub const RATE_LIMIT_STRATEGY: &str = "RATE_LIMIT_STRATEGY";
    pub const TOKEN_RATE_LIMIT: &str = "TOKEN_RATE_LIMIT";
    pub const REQ_RATE_LIMIT: &str = "REQ_RATE_LIMIT";
    pub const ITER_CHUNK_TYPE: &str = "ITER_CHUNK_TYPE";
    pub const LOG_GENERAL: &str = "LOG_GENERAL";
    pub const LOG_OPENAI: &str = "LOG_OPENAI";
    pub const TZ: &str = "TZ";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const BENCHMARK_MODE: &str = "BENCHMARK_MODE";
    pub const DEFAULT_STREAM_RESPONSE: &str = "DEFAULT_STREAM_RESPONSE";
    pub const PROXY: &str = "PROXY";

    /// Unconditional keys, in projection order
    pub const ALWAYS_EMITTED: &[&str] = &[
        FORWARD_CONFIG,
        OPENAI_API_KEY_CONFIG,
        FORWARD_KEY_CONFIG,
        LEVEL_MODELS,
        CACHE_OPENAI,
        CACHE_GENERAL,
        CACHE_BACKEND,
        CACHE_ROOT_PATH_OR_URL,
        DEFAULT_REQUEST_CACHING_VALUE,
        CACHE_ROUTES,
        GLOBAL_RATE_LIMIT,
        RATE_LIMIT_STRATEGY,
        TOKEN_RATE_LIMIT,
        REQ_RATE_LIMIT,
        ITER_CHUNK_TYPE,
        LOG_GENERAL,
        LOG_OPENAI,
        TZ,
        TIMEOUT,
        BENCHMARK_MODE,
        DEFAULT_STREAM_RESPONSE,
    ];
}

/// Encode the projectable subset of rate-limit rules as a JSON object
/// keyed by route, preserving rule insertion order.
fn rate_limit_map(rules: &[RateLimitRule]) -> Result<String, ControlError> {
    let mut map = serde_json::Map::new();
    for rule in rules.iter().filter(|r| r.is_projectable()) {
        map.insert(rule.route.clone(), encode(&rule.limits)?);
    }
    serde_json::to_string(&map).map_err(|e| ControlError::config(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ControlError> {
    serde_json::to_value(value).map_err(|e| ControlError::config(e.to_string()))
}

fn encode_str<T: serde::Serialize>(value: &T) -> Result<String, ControlError> {
    serde_json::to_string(value).map_err(|e| ControlError::config(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Project the model into its flat environment form.
    ///
    /// Output is ordered by the documented key enumeration and is
    /// deterministic for a fixed model value. Rate-limit rules with an
    /// empty route or no limit entries are excluded from the output but
    /// not from the model.
    pub fn to_env(&self) -> Result<Vec<(String, String)>, ControlError> {
        let mut env: Vec<(String, String)> = Vec::with_capacity(22);
        let mut push = |key: &str, value: String| env.push((key.to_string(), value));

        push(keys::FORWARD_CONFIG, encode_str(&self.forward)?);

        push(keys::OPENAI_API_KEY_CONFIG, encode_str(&self.api_key.openai_key)?);
        push(
            keys::FORWARD_KEY_CONFIG,
            encode_str(&string_key_map(&self.api_key.forward_key))?,
        );
        push(
            keys::LEVEL_MODELS,
            encode_str(&string_key_map(&self.api_key.level))?,
        );

        push(keys::CACHE_OPENAI, self.cache.openai.to_string());
        push(keys::CACHE_GENERAL, self.cache.general.to_string());
        push(keys::CACHE_BACKEND, self.cache.backend.clone());
        push(
            keys::CACHE_ROOT_PATH_OR_URL,
            self.cache.root_path_or_url.clone(),
        );
        push(
            keys::DEFAULT_REQUEST_CACHING_VALUE,
            self.cache.default_request_caching_value.to_string(),
        );
        push(keys::CACHE_ROUTES, encode_str(&self.cache.routes)?);

        push(
            keys::GLOBAL_RATE_LIMIT,
            self.rate_limit.global_rate_limit.clone(),
        );
        push(
            keys::RATE_LIMIT_STRATEGY,
            self.rate_limit.strategy.as_str().to_string(),
        );
        push(
            keys::TOKEN_RATE_LIMIT,
            rate_limit_map(&self.rate_limit.token_rate_limit)?,
        );
        push(
            keys::REQ_RATE_LIMIT,
            rate_limit_map(&self.rate_limit.req_rate_limit)?,
        );
        push(
            keys::ITER_CHUNK_TYPE,
            self.rate_limit.iter_chunk.as_str().to_string(),
        );

        push(keys::LOG_GENERAL, self.log.general.to_string());
        push(keys::LOG_OPENAI, self.log.openai.to_string());

        push(keys::TZ, self.timezone.clone());
        push(keys::TIMEOUT, self.timeout.to_string());
        push(keys::BENCHMARK_MODE, self.benchmark_mode.to_string());
        push(
            keys::DEFAULT_STREAM_RESPONSE,
            self.default_stream_response.to_string(),
        );

        // Unset proxy is omitted, not emitted as an empty string
        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.is_empty()) {
            push(keys::PROXY, proxy.to_string());
        }

        Ok(env)
    }
}

/// Integer-keyed maps serialize with decimal-string keys on the wire
fn string_key_map<V: Clone>(
    map: &std::collections::BTreeMap<i64, V>,
) -> std::collections::BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Hydration
// ─────────────────────────────────────────────────────────────────────────────

/// Present, non-empty value for a key
fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn parse_json<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, ControlError> {
    serde_json::from_str(raw).map_err(|e| ControlError::config(format!("bad {key}: {e}")))
}

/// Enums hydrate through their serde wire strings
fn parse_enum<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, ControlError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ControlError::config(format!("bad {key}: unrecognized value {raw:?}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ControlError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ControlError::config(format!(
            "bad {key}: expected a boolean, got {raw:?}"
        ))),
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ControlError> {
    raw.trim()
        .parse()
        .map_err(|_| ControlError::config(format!("bad {key}: expected an integer, got {raw:?}")))
}

/// Decode a rate-limit map back into rules, preserving document order
fn parse_rate_limit_map(key: &str, raw: &str) -> Result<Vec<RateLimitRule>, ControlError> {
    let map: serde_json::Map<String, serde_json::Value> = parse_json(key, raw)?;
    map.into_iter()
        .map(|(route, value)| {
            let limits = serde_json::from_value(value)
                .map_err(|e| ControlError::config(format!("bad {key} entry {route:?}: {e}")))?;
            Ok(RateLimitRule { route, limits })
        })
        .collect()
}

impl Config {
    /// Override fields from an environment mapping.
    ///
    /// Each documented key that is present and non-empty replaces the
    /// corresponding field; absent or empty keys keep the current value,
    /// so any subset of keys is valid. Decoded-but-empty collections also
    /// keep the current value, matching the forwarder's own fallback.
    pub fn hydrate(&mut self, env: &HashMap<String, String>) -> Result<(), ControlError> {
        if let Some(raw) = non_empty(env, keys::FORWARD_CONFIG) {
            let rules: Vec<super::ForwardRule> = parse_json(keys::FORWARD_CONFIG, raw)?;
            if !rules.is_empty() {
                self.forward = rules;
            }
        }

        if let Some(raw) = non_empty(env, keys::OPENAI_API_KEY_CONFIG) {
            let map: std::collections::BTreeMap<String, super::AuthLevels> =
                parse_json(keys::OPENAI_API_KEY_CONFIG, raw)?;
            if !map.is_empty() {
                self.api_key.openai_key = map;
            }
        }
        if let Some(raw) = non_empty(env, keys::FORWARD_KEY_CONFIG) {
            let map = parse_level_map(keys::FORWARD_KEY_CONFIG, raw)?;
            if !map.is_empty() {
                self.api_key.forward_key = map;
            }
        }
        if let Some(raw) = non_empty(env, keys::LEVEL_MODELS) {
            let map = parse_level_map(keys::LEVEL_MODELS, raw)?;
            if !map.is_empty() {
                self.api_key.level = map;
            }
        }

        if let Some(raw) = non_empty(env, keys::CACHE_OPENAI) {
            self.cache.openai = parse_bool(keys::CACHE_OPENAI, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::CACHE_GENERAL) {
            self.cache.general = parse_bool(keys::CACHE_GENERAL, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::CACHE_BACKEND) {
            self.cache.backend = raw.to_string();
        }
        if let Some(raw) = non_empty(env, keys::CACHE_ROOT_PATH_OR_URL) {
            self.cache.root_path_or_url = raw.to_string();
        }
        if let Some(raw) = non_empty(env, keys::DEFAULT_REQUEST_CACHING_VALUE) {
            self.cache.default_request_caching_value =
                parse_bool(keys::DEFAULT_REQUEST_CACHING_VALUE, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::CACHE_ROUTES) {
            let routes: std::collections::BTreeSet<String> = parse_json(keys::CACHE_ROUTES, raw)?;
            if !routes.is_empty() {
                self.cache.routes = routes;
            }
        }

        if let Some(raw) = non_empty(env, keys::GLOBAL_RATE_LIMIT) {
            self.rate_limit.global_rate_limit = raw.to_string();
        }
        if let Some(raw) = non_empty(env, keys::RATE_LIMIT_STRATEGY) {
            self.rate_limit.strategy = parse_enum(keys::RATE_LIMIT_STRATEGY, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::TOKEN_RATE_LIMIT) {
            let rules = parse_rate_limit_map(keys::TOKEN_RATE_LIMIT, raw)?;
            if !rules.is_empty() {
                self.rate_limit.token_rate_limit = rules;
            }
        }
        if let Some(raw) = non_empty(env, keys::REQ_RATE_LIMIT) {
            let rules = parse_rate_limit_map(keys::REQ_RATE_LIMIT, raw)?;
            if !rules.is_empty() {
                self.rate_limit.req_rate_limit = rules;
            }
        }
        if let Some(raw) = non_empty(env, keys::ITER_CHUNK_TYPE) {
            self.rate_limit.iter_chunk = parse_enum(keys::ITER_CHUNK_TYPE, raw)?;
        }

        if let Some(raw) = non_empty(env, keys::LOG_GENERAL) {
            self.log.general = parse_bool(keys::LOG_GENERAL, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::LOG_OPENAI) {
            self.log.openai = parse_bool(keys::LOG_OPENAI, raw)?;
        }

        if let Some(raw) = non_empty(env, keys::TZ) {
            self.timezone = raw.to_string();
        }
        if let Some(raw) = non_empty(env, keys::TIMEOUT) {
            self.timeout = parse_u64(keys::TIMEOUT, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::BENCHMARK_MODE) {
            self.benchmark_mode = parse_bool(keys::BENCHMARK_MODE, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::DEFAULT_STREAM_RESPONSE) {
            self.default_stream_response = parse_bool(keys::DEFAULT_STREAM_RESPONSE, raw)?;
        }
        if let Some(raw) = non_empty(env, keys::PROXY) {
            self.proxy = Some(raw.to_string());
        }

        Ok(())
    }
}

fn parse_level_map(
    key: &str,
    raw: &str,
) -> Result<std::collections::BTreeMap<i64, Vec<String>>, ControlError> {
    let map: std::collections::BTreeMap<String, Vec<String>> = parse_json(key, raw)?;
    map.into_iter()
        .map(|(k, v)| {
            k.trim()
                .parse::<i64>()
                .map(|level| (level, v))
                .map_err(|_| {
                    ControlError::config(format!("bad {key}: non-numeric level key {k:?}"))
                })
        })
        .collect()
}
