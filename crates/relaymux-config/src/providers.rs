//! Provider table and router map configuration (spec.md §3, §4.3).

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

use relaymux_core::{ApiKeys, CompatibilityTag, Protocol, ProviderDescriptor};

/// One configured upstream API key: a bare string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiKeyConfig {
    /// A single key
    One(SecretString),
    /// Multiple keys, each producing its own pipeline
    Many(Vec<SecretString>),
}

impl From<ApiKeyConfig> for ApiKeys {
    fn from(value: ApiKeyConfig) -> Self {
        match value {
            ApiKeyConfig::One(key) => Self::One(key),
            ApiKeyConfig::Many(keys) => Self::Many(keys),
        }
    }
}

/// Protocol a provider speaks, as written in config
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolConfigValue {
    /// OpenAI chat-completions dialect
    Openai,
    /// Anthropic messages dialect
    Anthropic,
}

impl From<ProtocolConfigValue> for Protocol {
    fn from(value: ProtocolConfigValue) -> Self {
        match value {
            ProtocolConfigValue::Openai => Self::Openai,
            ProtocolConfigValue::Anthropic => Self::Anthropic,
        }
    }
}

/// Explicit `serverCompatibility.use` block on a provider (spec.md §4.1)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerCompatibilityConfig {
    /// The compatibility tag to force for this provider
    #[serde(rename = "use")]
    pub tag: CompatibilityTagConfigValue,
    /// Adapter-specific options, passed through opaquely
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Mirrors `relaymux_core::CompatibilityTag`, kept separate so config
/// deserialization failures are distinct from internal model errors
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityTagConfigValue {
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
    /// No adjustment
    Passthrough,
}

impl From<CompatibilityTagConfigValue> for CompatibilityTag {
    fn from(value: CompatibilityTagConfigValue) -> Self {
        match value {
            CompatibilityTagConfigValue::Lmstudio => Self::Lmstudio,
            CompatibilityTagConfigValue::Ollama => Self::Ollama,
            CompatibilityTagConfigValue::Vllm => Self::Vllm,
            CompatibilityTagConfigValue::Anthropic => Self::Anthropic,
            CompatibilityTagConfigValue::Modelscope => Self::Modelscope,
            CompatibilityTagConfigValue::Qwen => Self::Qwen,
            CompatibilityTagConfigValue::Iflow => Self::Iflow,
            CompatibilityTagConfigValue::Passthrough => Self::Passthrough,
        }
    }
}

/// One `{name, value}` custom header entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderEntry {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Model include/exclude filtering for a provider, same shape as the
/// teacher's `ModelConfig` but without per-model rate-limit overrides,
/// which are out of scope here
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFilterConfig {
    /// Include models matching these regex patterns
    #[serde(default)]
    pub include: Vec<String>,
    /// Exclude models matching these regex patterns
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// One entry in the `providers` table (spec.md §3 "Provider descriptor",
/// §6 schema)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    /// Base URL for this provider's API
    pub api_base_url: String,
    /// Credential(s) for this provider
    pub api_key: ApiKeyConfig,
    /// Wire protocol this provider speaks
    pub protocol: ProtocolConfigValue,
    /// Explicit transformer override, bypassing protocol-based selection
    #[serde(default)]
    pub transformer: Option<String>,
    /// Explicit server-compatibility tag
    #[serde(default, rename = "serverCompatibility")]
    pub server_compatibility: Option<ServerCompatibilityConfig>,
    /// Extra headers sent on every request to this provider
    #[serde(default, rename = "customHeaders")]
    pub custom_headers: Vec<HeaderEntry>,
    /// Per-request timeout override, seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Max retry attempts at the Server layer
    #[serde(default, rename = "maxRetries")]
    pub max_retries: Option<u32>,
    /// Model include/exclude filtering
    #[serde(default)]
    pub models: ModelFilterConfig,
}

impl ProviderEntry {
    /// Turn this config entry into the internal provider descriptor
    pub fn into_descriptor(self, name: String) -> ProviderDescriptor {
        ProviderDescriptor {
            name,
            api_base_url: self.api_base_url,
            api_keys: self.api_key.into(),
            protocol: self.protocol.into(),
            transformer_hint: self.transformer,
            server_compatibility: self.server_compatibility.map(|c| c.tag.into()),
            custom_headers: self.custom_headers.into_iter().map(|h| (h.name, h.value)).collect(),
            timeout_seconds: self.timeout,
            max_retries: self.max_retries,
        }
    }
}

/// `providers` table, keyed by provider name, preserving config order
pub type ProviderTable = IndexMap<String, ProviderEntry>;

/// One provider in the `expandedRouting` form (spec.md §4.3 step 6)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpandedRoutingTarget {
    /// Provider name
    pub provider: String,
    /// Target model name at that provider
    pub model: String,
    /// Selection priority; lower numbers are preferred
    pub priority: u32,
    /// Whether this target is a security-enhanced variant of the primary
    #[serde(default)]
    pub security_enhanced: bool,
}

/// A virtual model's entry in the `expandedRouting` form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpandedRoutingEntry {
    /// Ordered candidate targets with explicit priority
    #[serde(default)]
    pub targets: Vec<ExpandedRoutingTarget>,
}

/// Optional `expandedRouting` table, keyed by virtual model name
pub type ExpandedRoutingTable = IndexMap<String, ExpandedRoutingEntry>;
