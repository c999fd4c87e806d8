//! Response cache policy

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cache policy handed to the forwarder
///
/// The backend name is opaque here: it is validated by the cache engine
/// at use time, not at construction time.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct CachePolicy {
    /// Cache backend identifier (e.g. "LevelDB", "LMDB")
    pub backend: String,

    /// Filesystem path or URL for cache storage
    pub root_path_or_url: String,

    /// Whether requests are cached when the client does not say otherwise
    pub default_request_caching_value: bool,

    /// Cache responses on openai-kind routes
    pub openai: bool,

    /// Cache responses on general routes
    pub general: bool,

    /// Routes eligible for caching; a set, so duplicates collapse
    pub routes: BTreeSet<String>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            backend: "LevelDB".to_string(),
            root_path_or_url: "./FLAXKV_DB".to_string(),
            default_request_caching_value: true,
            openai: false,
            general: false,
            routes: BTreeSet::from(["/v1/chat/completions".to_string()]),
        }
    }
}
