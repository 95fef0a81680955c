//! Shared data model: virtual models, route entries, provider descriptors,
//! and pipeline identity.
//!
//! See spec.md §3 DATA MODEL.

use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// An abstract workload tag a client's requested model is mapped onto
/// (`default`, `longContext`, `reasoning`, …). A thin newtype over `String`
/// rather than a closed enum: operators add virtual models purely via
/// configuration, with no code change required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualModel(pub String);

impl VirtualModel {
    /// Borrow the underlying name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VirtualModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VirtualModel {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for VirtualModel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One `(provider, target-model)` pair within a route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// Provider name (key into the provider table)
    pub provider: String,
    /// Model name to send to that provider
    pub model: String,
}

/// The ordered provider preference list bound to a single virtual model
///
/// Parsed from strings of the form `"p1,m1;p2,m2;…"` — order expresses
/// provider preference, not priority across virtual models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteEntry {
    /// Targets in preference order
    pub targets: Vec<RouteTarget>,
}

impl RouteEntry {
    /// Parse a route entry string: semicolon-separated pairs,
    /// comma-separated within a pair.
    ///
    /// Malformed segments (missing the comma, or an empty side) are
    /// skipped rather than failing the whole parse — the table builder is
    /// responsible for warning about entries that end up referencing
    /// unknown providers (spec.md §4.3 step 5).
    pub fn parse(raw: &str) -> Self {
        let targets = raw
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|pair| {
                let (provider, model) = pair.split_once(',')?;
                let provider = provider.trim();
                let model = model.trim();
                if provider.is_empty() || model.is_empty() {
                    return None;
                }
                Some(RouteTarget {
                    provider: provider.to_owned(),
                    model: model.to_owned(),
                })
            })
            .collect();

        Self { targets }
    }
}

/// Wire protocol a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// OpenAI chat-completions dialect
    Openai,
    /// Anthropic messages dialect
    Anthropic,
}

/// Recognized server-compatibility tags (spec.md §4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityTag {
    /// LM Studio local inference server
    Lmstudio,
    /// Ollama local inference server
    Ollama,
    /// vLLM inference server
    Vllm,
    /// Anthropic's own API
    Anthropic,
    /// Alibaba ModelScope
    Modelscope,
    /// Alibaba Qwen cloud API
    Qwen,
    /// iFlow cloud API
    Iflow,
    /// No adjustment — forward the OpenAI-shaped body as-is
    Passthrough,
}

impl std::fmt::Display for CompatibilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lmstudio => "lmstudio",
            Self::Ollama => "ollama",
            Self::Vllm => "vllm",
            Self::Anthropic => "anthropic",
            Self::Modelscope => "modelscope",
            Self::Qwen => "qwen",
            Self::Iflow => "iflow",
            Self::Passthrough => "passthrough",
        };
        f.write_str(s)
    }
}

/// One configured upstream API key, scalar or list (spec.md §3)
#[derive(Debug, Clone)]
pub enum ApiKeys {
    /// A single key
    One(SecretString),
    /// Multiple keys, each producing its own pipeline (spec.md §4.3 step 2)
    Many(Vec<SecretString>),
}

impl ApiKeys {
    /// Number of keys this configuration expands into
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(keys) => keys.len(),
        }
    }

    /// Whether this expands into zero pipelines
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(keys) if keys.is_empty())
    }

    /// Borrow the key at `index`, if present
    pub fn get(&self, index: usize) -> Option<&SecretString> {
        match self {
            Self::One(key) if index == 0 => Some(key),
            Self::One(_) => None,
            Self::Many(keys) => keys.get(index),
        }
    }
}

/// A configured upstream provider (spec.md §3 Provider descriptor)
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Provider name (key in config)
    pub name: String,
    /// Base URL for the provider's API
    pub api_base_url: String,
    /// Credential(s) for this provider
    pub api_keys: ApiKeys,
    /// Wire protocol this provider speaks
    pub protocol: Protocol,
    /// Explicit transformer hint, if the protocol mapping needs overriding
    pub transformer_hint: Option<String>,
    /// Explicit server-compatibility tag, if configured
    pub server_compatibility: Option<CompatibilityTag>,
    /// Extra headers to send on every request to this provider
    pub custom_headers: Vec<(String, String)>,
    /// Per-request timeout override
    pub timeout_seconds: Option<u64>,
    /// Max retry attempts at the Server layer
    pub max_retries: Option<u32>,
}

/// Per-request priority dimension for the priority-based selection
/// algorithm (spec.md §4.6 "`priority=high` requests take the first, `low`
/// the last, otherwise the median"), independent of a pipeline's own
/// configured priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Lifecycle state of a `Pipeline` (spec.md §3 Invariants)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Constructed but not yet handshaken
    Initializing,
    /// Handshake succeeded; eligible for scheduling
    Runtime,
    /// Handshake or a later operation failed
    Error,
    /// `stop()` has been called
    Stopped,
}

/// Unix-epoch seconds, used throughout for timestamps that must survive
/// serialization to the persisted pipeline-table artifacts (spec.md §6)
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Compute a stable, canonical pipeline id: `<provider>-<model>-key<index>`
///
/// Lowercases provider and model, and collapses `/` and whitespace in the
/// model name to `-` (spec.md §4.3 step 3).
pub fn pipeline_id(provider: &str, model: &str, key_index: usize) -> String {
    let provider = provider.to_lowercase();
    let model = model
        .to_lowercase()
        .chars()
        .map(|c| if c == '/' || c.is_whitespace() { '-' } else { c })
        .collect::<String>();
    format!("{provider}-{model}-key{key_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_entry_parses_ordered_pairs() {
        let entry = RouteEntry::parse("p1,m1;p2,m2");
        assert_eq!(
            entry.targets,
            vec![
                RouteTarget { provider: "p1".into(), model: "m1".into() },
                RouteTarget { provider: "p2".into(), model: "m2".into() },
            ]
        );
    }

    #[test]
    fn route_entry_skips_malformed_segments() {
        let entry = RouteEntry::parse("p1,m1; garbage ;p2,m2");
        assert_eq!(entry.targets.len(), 2);
    }

    #[test]
    fn pipeline_id_collapses_slash_and_whitespace() {
        assert_eq!(pipeline_id("P1", "Local Model/v2", 3), "p1-local-model-v2-key3");
    }

    #[test]
    fn pipeline_id_stable_regardless_of_case() {
        assert_eq!(pipeline_id("OpenAI", "gpt-4", 0), pipeline_id("openai", "GPT-4", 0));
    }

    #[test]
    fn request_priority_defaults_to_medium() {
        assert_eq!(RequestPriority::default(), RequestPriority::Medium);
    }
}
