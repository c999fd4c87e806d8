//! Forwarding rules: inbound route prefix -> upstream base URL

use serde::{Deserialize, Serialize};

/// Provider kind for a forwarding rule
///
/// The forwarder treats openai-kind routes specially (key rewriting,
/// model gating, chat log capture); general routes are plain passthrough.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Openai,
    #[default]
    General,
}

/// A single forwarding rule
///
/// Insertion order across rules is significant: the forwarder routes on
/// first match, so the model must never reorder them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ForwardRule {
    /// Upstream base URL, e.g. "https://api.openai.com"
    pub base_url: String,

    /// Inbound route prefix, e.g. "/" or "/gemini"
    pub route: String,

    /// Provider kind (serialized as "type" on the wire, matching the
    /// forwarder's expected field name)
    #[serde(rename = "type", default)]
    pub kind: RuleKind,
}

impl ForwardRule {
    pub fn new(base_url: &str, route: &str, kind: RuleKind) -> Self {
        Self {
            base_url: base_url.to_string(),
            route: route.to_string(),
            kind,
        }
    }
}

/// Default rule set: OpenAI at the root, Gemini as a general passthrough
pub fn default_rules() -> Vec<ForwardRule> {
    vec![
        ForwardRule::new("https://api.openai.com", "/", RuleKind::Openai),
        ForwardRule::new(
            "https://generativelanguage.googleapis.com",
            "/gemini",
            RuleKind::General,
        ),
    ]
}
