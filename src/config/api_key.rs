//! API-key authorization: provider keys, forward keys, and level-to-model
//! mapping
//!
//! Authorization levels are integer tiers. A caller presents a forward
//! key, the forwarder maps it to a level, and the level selects both the
//! permitted models and the pool of provider keys used upstream.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ControlError;

/// Authorization levels attached to a provider key
///
/// Accepts two input forms: a JSON array of integers, or a
/// delimiter-separated string like "1, 2，3" (full-width commas included,
/// as pasted from CJK input methods). The string form is parsed eagerly
/// so the in-memory model is always well-typed and projection cannot
/// fail on it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthLevels(pub Vec<i64>);

impl AuthLevels {
    /// Parse a delimiter-separated level list, normalizing full-width
    /// commas. Non-numeric parts are a hard configuration error, not
    /// silently dropped.
    pub fn parse(raw: &str) -> Result<Self, ControlError> {
        let normalized = raw.trim().replace('，', ",");
        let mut levels = Vec::new();
        for part in normalized.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let level = part.parse::<i64>().map_err(|_| {
                ControlError::config(format!("invalid authorization level {part:?} in {raw:?}"))
            })?;
            levels.push(level);
        }
        Ok(Self(levels))
    }
}

impl<'de> Deserialize<'de> for AuthLevels {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Form {
            Levels(Vec<i64>),
            Raw(String),
        }

        match Form::deserialize(deserializer)? {
            Form::Levels(levels) => Ok(AuthLevels(levels)),
            Form::Raw(raw) => AuthLevels::parse(&raw).map_err(de::Error::custom),
        }
    }
}

/// API-key authorization policy
///
/// Referential integrity between the three maps is not enforced here:
/// levels in `forward_key` / `level` that no provider key carries are
/// surfaced as validation warnings by `Config::validate`, never rejected.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ApiKeyPolicy {
    /// Provider key -> authorization levels it serves
    pub openai_key: BTreeMap<String, AuthLevels>,

    /// Authorization level -> caller-facing forward keys
    #[serde(with = "level_key_map")]
    pub forward_key: BTreeMap<i64, Vec<String>>,

    /// Authorization level -> permitted model names
    #[serde(with = "level_key_map")]
    pub level: BTreeMap<i64, Vec<String>>,
}

/// Level-keyed maps cross two wire formats that only allow string keys
/// (JSON objects, TOML tables), so the keys are written as decimal
/// strings and parsed back to integers on the way in.
mod level_key_map {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<i64, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<i64, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<i64>()
                    .map(|level| (level, v))
                    .map_err(|_| D::Error::custom(format!("invalid authorization level key {k:?}")))
            })
            .collect()
    }
}

impl Default for ApiKeyPolicy {
    fn default() -> Self {
        Self {
            openai_key: BTreeMap::from([("sk-xx1".to_string(), AuthLevels(vec![0]))]),
            forward_key: BTreeMap::from([(0, vec!["fk-1".to_string()])]),
            level: BTreeMap::from([(1, vec!["gpt-3.5-turbo".to_string()])]),
        }
    }
}

impl ApiKeyPolicy {
    /// Levels referenced by forward_key or level but absent from every
    /// provider key's level list
    pub fn dangling_levels(&self) -> Vec<i64> {
        let known: Vec<i64> = self
            .openai_key
            .values()
            .flat_map(|levels| levels.0.iter().copied())
            .collect();

        let mut dangling: Vec<i64> = self
            .forward_key
            .keys()
            .chain(self.level.keys())
            .copied()
            .filter(|level| !known.contains(level))
            .collect();
        dangling.sort_unstable();
        dangling.dedup();
        dangling
    }
}
