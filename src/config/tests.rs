//! Configuration tests
//!
//! Cover the projection contract (determinism, fixed key set, defensive
//! filtering), hydration (round-trip, partial environments, strict
//! decoding), and the on-disk formats.

use super::*;
use std::collections::HashMap;

fn env_map(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    pairs.into_iter().collect()
}

fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_projection_is_deterministic() {
    let config = Config::default();
    let first = config.to_env().unwrap();
    let second = config.to_env().unwrap();
    assert_eq!(first, second, "same model must project byte-identically");
}

#[test]
fn test_projection_emits_exactly_the_documented_keys() {
    let config = Config::default();
    let env = config.to_env().unwrap();

    let emitted: Vec<&str> = env.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        emitted,
        keys::ALWAYS_EMITTED.to_vec(),
        "default config (no proxy) emits the unconditional keys in order"
    );
}

#[test]
fn test_proxy_key_is_conditional() {
    let mut config = Config::default();
    assert!(lookup(&config.to_env().unwrap(), keys::PROXY).is_none());

    config.proxy = Some("http://localhost:7890".to_string());
    assert_eq!(
        lookup(&config.to_env().unwrap(), keys::PROXY),
        Some("http://localhost:7890")
    );

    // Empty string behaves like unset
    config.proxy = Some(String::new());
    assert!(lookup(&config.to_env().unwrap(), keys::PROXY).is_none());
}

#[test]
fn test_forward_config_preserves_insertion_order() {
    let mut config = Config::default();
    config.forward = vec![
        ForwardRule::new("https://b.example.com", "/b", RuleKind::General),
        ForwardRule::new("https://a.example.com", "/a", RuleKind::Openai),
    ];

    let env = config.to_env().unwrap();
    let encoded = lookup(&env, keys::FORWARD_CONFIG).unwrap();
    let decoded: Vec<ForwardRule> = serde_json::from_str(encoded).unwrap();
    assert_eq!(decoded, config.forward);
    assert!(encoded.contains(r#""type":"general""#));
}

#[test]
fn test_full_width_comma_normalization() {
    let mut config = Config::default();
    config.api_key.openai_key =
        [("sk-a".to_string(), AuthLevels::parse("1, 2，3").unwrap())].into();

    let env = config.to_env().unwrap();
    assert_eq!(
        lookup(&env, keys::OPENAI_API_KEY_CONFIG),
        Some(r#"{"sk-a":[1,2,3]}"#)
    );
}

#[test]
fn test_non_numeric_auth_levels_are_a_hard_error() {
    let err = AuthLevels::parse("1, banana").unwrap_err();
    assert!(matches!(err, crate::error::ControlError::Config(_)));
    assert!(err.to_string().contains("banana"));
}

#[test]
fn test_empty_rate_limit_rules_are_filtered_from_projection_only() {
    let mut config = Config::default();
    config.rate_limit.token_rate_limit = vec![
        RateLimitRule::new("", vec![LimitEntry::new(0, "60/second")]),
        RateLimitRule::new("/v1/chat/completions", vec![]),
        RateLimitRule::new("/v1/completions", vec![LimitEntry::new(0, "10/minute")]),
    ];

    let env = config.to_env().unwrap();
    let encoded = lookup(&env, keys::TOKEN_RATE_LIMIT).unwrap();
    let decoded: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(encoded).unwrap();

    assert_eq!(decoded.len(), 1, "only the projectable rule survives");
    assert!(decoded.contains_key("/v1/completions"));
    // The model itself keeps all three
    assert_eq!(config.rate_limit.token_rate_limit.len(), 3);
}

#[test]
fn test_rate_limit_map_preserves_rule_order() {
    let mut config = Config::default();
    config.rate_limit.req_rate_limit = vec![
        RateLimitRule::new("/z", vec![LimitEntry::new(0, "1/second")]),
        RateLimitRule::new("/a", vec![LimitEntry::new(0, "2/second")]),
    ];

    let env = config.to_env().unwrap();
    let encoded = lookup(&env, keys::REQ_RATE_LIMIT).unwrap();
    let z = encoded.find(r#""/z""#).unwrap();
    let a = encoded.find(r#""/a""#).unwrap();
    assert!(z < a, "insertion order must survive encoding: {encoded}");
}

#[test]
fn test_level_keyed_maps_encode_with_string_keys() {
    let env = Config::default().to_env().unwrap();
    assert_eq!(
        lookup(&env, keys::FORWARD_KEY_CONFIG),
        Some(r#"{"0":["fk-1"]}"#)
    );
    assert_eq!(
        lookup(&env, keys::LEVEL_MODELS),
        Some(r#"{"1":["gpt-3.5-turbo"]}"#)
    );
}

#[test]
fn test_cached_routes_collapse_duplicates() {
    let mut config = Config::default();
    config.cache.routes.insert("/v1/chat/completions".to_string());
    config.cache.routes.insert("/v1/embeddings".to_string());

    let env = config.to_env().unwrap();
    let decoded: Vec<String> =
        serde_json::from_str(lookup(&env, keys::CACHE_ROUTES).unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Hydration
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_hydration_round_trips_the_projection() {
    let mut original = Config::default();
    original.proxy = Some("http://proxy.internal:3128".to_string());
    original.timeout = 30;
    original.benchmark_mode = true;
    original.rate_limit.strategy = LimitStrategy::FixedWindow;
    original.rate_limit.iter_chunk = IterChunkMode::Efficiency;
    original.cache.openai = true;
    original.log.general = false;
    original.forward = vec![ForwardRule::new(
        "https://api.example.com",
        "/v1",
        RuleKind::Openai,
    )];

    let env = env_map(original.to_env().unwrap());
    let mut hydrated = Config::default();
    hydrated.hydrate(&env).unwrap();

    assert_eq!(hydrated, original);
}

#[test]
fn test_unset_proxy_does_not_round_trip_as_empty() {
    let original = Config::default();
    let env = env_map(original.to_env().unwrap());

    let mut hydrated = Config::default();
    hydrated.proxy = Some("http://stale.example.com".to_string());
    hydrated.hydrate(&env).unwrap();

    // No PROXY key in the projection, so the existing value stands;
    // it is never overwritten with an empty string.
    assert_eq!(hydrated.proxy.as_deref(), Some("http://stale.example.com"));
}

#[test]
fn test_hydration_tolerates_partial_environments() {
    let env = env_map(vec![
        (keys::TIMEOUT.to_string(), "42".to_string()),
        (keys::CACHE_BACKEND.to_string(), "LMDB".to_string()),
    ]);

    let mut config = Config::default();
    config.hydrate(&env).unwrap();

    assert_eq!(config.timeout, 42);
    assert_eq!(config.cache.backend, "LMDB");
    // Everything else keeps its default
    assert_eq!(config.timezone, "Asia/Shanghai");
    assert_eq!(config.forward, default_rules());
}

#[test]
fn test_hydration_ignores_empty_values() {
    let env = env_map(vec![
        (keys::TZ.to_string(), String::new()),
        (keys::GLOBAL_RATE_LIMIT.to_string(), String::new()),
    ]);

    let mut config = Config::default();
    config.hydrate(&env).unwrap();

    assert_eq!(config.timezone, "Asia/Shanghai");
    assert_eq!(config.rate_limit.global_rate_limit, "inf");
}

#[test]
fn test_hydration_accepts_comma_string_auth_levels() {
    let env = env_map(vec![(
        keys::OPENAI_API_KEY_CONFIG.to_string(),
        r#"{"sk-b": "0，2"}"#.to_string(),
    )]);

    let mut config = Config::default();
    config.hydrate(&env).unwrap();

    assert_eq!(
        config.api_key.openai_key.get("sk-b"),
        Some(&AuthLevels(vec![0, 2]))
    );
}

#[test]
fn test_hydration_rejects_malformed_json() {
    let env = env_map(vec![(
        keys::FORWARD_CONFIG.to_string(),
        "not json".to_string(),
    )]);

    let mut config = Config::default();
    let err = config.hydrate(&env).unwrap_err();
    assert!(err.to_string().contains(keys::FORWARD_CONFIG));
}

#[test]
fn test_hydration_rejects_unknown_enum_strings() {
    let env = env_map(vec![(
        keys::RATE_LIMIT_STRATEGY.to_string(),
        "sliding-window".to_string(),
    )]);

    let mut config = Config::default();
    let err = config.hydrate(&env).unwrap_err();
    assert!(err.to_string().contains("sliding-window"));
}

#[test]
fn test_hydration_rejects_unknown_record_fields() {
    // Strict decode: extra fields on the wire are an error, not ignored
    let env = env_map(vec![(
        keys::FORWARD_CONFIG.to_string(),
        r#"[{"base_url":"https://x","route":"/","type":"openai","extra":1}]"#.to_string(),
    )]);

    let mut config = Config::default();
    assert!(config.hydrate(&env).is_err());
}

#[test]
fn test_hydration_preserves_rate_limit_document_order() {
    let env = env_map(vec![(
        keys::TOKEN_RATE_LIMIT.to_string(),
        r#"{"/z":[{"level":0,"limit":"1/second"}],"/a":[{"level":1,"limit":"2/second"}]}"#
            .to_string(),
    )]);

    let mut config = Config::default();
    config.hydrate(&env).unwrap();

    let routes: Vec<&str> = config
        .rate_limit
        .token_rate_limit
        .iter()
        .map(|r| r.route.as_str())
        .collect();
    assert_eq!(routes, vec!["/z", "/a"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_validate_flags_duplicate_forward_routes() {
    let mut config = Config::default();
    config.forward.push(ForwardRule::new(
        "https://other.example.com",
        "/",
        RuleKind::General,
    ));

    let warnings = config.validate();
    assert!(warnings.iter().any(|w| w.contains("duplicate forward route")));
}

#[test]
fn test_validate_flags_dangling_authorization_levels() {
    // The default config references level 1 in the model map while the
    // provider key only serves level 0, mirroring the upstream defaults.
    let warnings = Config::default().validate();
    assert!(warnings.iter().any(|w| w.contains("[1]")));
}

#[test]
fn test_validate_flags_repeated_priority_levels() {
    let mut config = Config::default();
    config.rate_limit.req_rate_limit = vec![RateLimitRule::new(
        "/v1/chat/completions",
        vec![
            LimitEntry::new(0, "10/second"),
            LimitEntry::new(0, "20/second"),
        ],
    )];

    let warnings = config.validate();
    assert!(warnings.iter().any(|w| w.contains("repeats priority level")));
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk formats
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_toml_round_trip_default() {
    let config = Config::default();
    let toml_str = config.to_toml();

    let parsed: Result<FileConfig, _> = toml::from_str(&toml_str);
    assert!(
        parsed.is_ok(),
        "default config should round-trip.\nTOML:\n{}\nError: {:?}",
        toml_str,
        parsed.err()
    );

    let mut rebuilt = Config::default();
    rebuilt.apply_file(parsed.unwrap());
    assert_eq!(rebuilt, config);
}

#[test]
fn test_file_config_sections_are_strict() {
    let toml_str = r#"
        [cache]
        backend = "LevelDB"
        typo_field = true
    "#;
    let parsed: Result<FileConfig, _> = toml::from_str(toml_str);
    assert!(parsed.is_err(), "unknown section fields must be rejected");
}

#[test]
fn test_env_file_lists_every_projected_key() {
    let config = Config::default();
    let rendered = config.render_env_file().unwrap();

    for key in keys::ALWAYS_EMITTED {
        assert!(
            rendered.lines().any(|line| line.starts_with(&format!("{key}="))),
            "missing {key} in generated .env"
        );
    }
    assert!(!rendered.contains("PROXY="));
}

#[test]
fn test_env_file_is_written_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = Config::default().write_env_file(dir.path()).unwrap();

    assert_eq!(path, dir.path().join(".env"));
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains("FORWARD_CONFIG="));
}
