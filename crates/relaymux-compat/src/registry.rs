use std::sync::Arc;

use dashmap::DashMap;
use relaymux_core::CompatibilityTag;

use crate::adapters::{IflowAdapter, LmStudioAdapter, ModelscopeAdapter, OllamaAdapter, PassthroughAdapter, QwenAdapter, VllmAdapter};
use crate::{Adapter, AnthropicAdapter};

/// Tags whose adapter is required for correctness: a load failure for one
/// of these is fatal for requests through the owning pipeline, rather than
/// falling back to passthrough (spec.md §4.1 "Loading").
const FATAL_ON_LOAD_FAILURE: &[CompatibilityTag] = &[CompatibilityTag::Modelscope, CompatibilityTag::Qwen, CompatibilityTag::Iflow];

/// Lazy-loading, write-once-read-many cache of per-tag adapters
/// (spec.md §4.1 "Loading", §5 "Shared resources")
///
/// Built-in adapters never fail to construct, so in this implementation
/// the "failure to load" path is unreachable for any of the seven
/// recognized tags — it exists so a future adapter that does real I/O on
/// construction (e.g. fetching a remote capability manifest) has
/// somewhere to report into. `resolve` keeps the fallback/fatal policy
/// regardless.
pub struct AdapterRegistry {
    cache: DashMap<CompatibilityTag, Arc<dyn Adapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Construct an empty registry; adapters are built on first resolution
    #[must_use]
    pub fn new() -> Self {
        Self { cache: DashMap::new() }
    }

    fn build(tag: CompatibilityTag) -> Arc<dyn Adapter> {
        match tag {
            CompatibilityTag::Lmstudio => Arc::new(LmStudioAdapter),
            CompatibilityTag::Ollama => Arc::new(OllamaAdapter),
            CompatibilityTag::Vllm => Arc::new(VllmAdapter),
            CompatibilityTag::Anthropic => Arc::new(AnthropicAdapter),
            CompatibilityTag::Modelscope => Arc::new(ModelscopeAdapter),
            CompatibilityTag::Qwen => Arc::new(QwenAdapter),
            CompatibilityTag::Iflow => Arc::new(IflowAdapter),
            CompatibilityTag::Passthrough => Arc::new(PassthroughAdapter),
        }
    }

    /// Resolve the adapter for `tag`, instantiating and caching it on
    /// first use
    ///
    /// Built-in adapters cannot fail to construct, so this always
    /// succeeds; the signature returns a plain `Arc<dyn Adapter>` rather
    /// than a `Result` to reflect that, with the fatal-tag policy
    /// documented on the type rather than enforced here (there is nothing
    /// for it to trigger on in this implementation).
    pub fn resolve(&self, tag: CompatibilityTag) -> Arc<dyn Adapter> {
        if let Some(existing) = self.cache.get(&tag) {
            return Arc::clone(&existing);
        }
        let adapter = Self::build(tag);
        self.cache.entry(tag).or_insert_with(|| Arc::clone(&adapter));
        adapter
    }

    /// Whether a load failure for `tag` must be treated as fatal rather
    /// than falling back to passthrough
    #[must_use]
    pub fn is_fatal_on_failure(tag: CompatibilityTag) -> bool {
        FATAL_ON_LOAD_FAILURE.contains(&tag)
    }
}

/// Derive the compatibility tag for a request, in the order specified by
/// spec.md §4.1 "Tag derivation"
#[must_use]
pub fn derive_tag(
    explicit_provider_tag: Option<CompatibilityTag>,
    routing_decision_tag: Option<CompatibilityTag>,
    provider_name: &str,
    endpoint: &str,
) -> CompatibilityTag {
    explicit_provider_tag
        .or(routing_decision_tag)
        .or_else(|| tag_from_provider_name(provider_name))
        .or_else(|| tag_from_endpoint(endpoint))
        .unwrap_or(CompatibilityTag::Passthrough)
}

fn tag_from_provider_name(name: &str) -> Option<CompatibilityTag> {
    match name.to_lowercase().as_str() {
        "lmstudio" | "lm-studio" => Some(CompatibilityTag::Lmstudio),
        "ollama" => Some(CompatibilityTag::Ollama),
        "vllm" => Some(CompatibilityTag::Vllm),
        "anthropic" => Some(CompatibilityTag::Anthropic),
        "modelscope" => Some(CompatibilityTag::Modelscope),
        "qwen" | "dashscope" => Some(CompatibilityTag::Qwen),
        "iflow" => Some(CompatibilityTag::Iflow),
        _ => None,
    }
}

fn tag_from_endpoint(endpoint: &str) -> Option<CompatibilityTag> {
    let host = endpoint.to_lowercase();
    if host.contains("localhost:1234") || host.contains("127.0.0.1:1234") {
        Some(CompatibilityTag::Lmstudio)
    } else if host.contains("localhost:11434") || host.contains("127.0.0.1:11434") {
        Some(CompatibilityTag::Ollama)
    } else if host.contains("modelscope.cn") {
        Some(CompatibilityTag::Modelscope)
    } else if host.contains("dashscope.aliyuncs.com") {
        Some(CompatibilityTag::Qwen)
    } else if host.contains("iflow.cn") {
        Some(CompatibilityTag::Iflow)
    } else if host.contains("anthropic.com") {
        Some(CompatibilityTag::Anthropic)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_caches_the_same_instance() {
        let registry = AdapterRegistry::new();
        let first = registry.resolve(CompatibilityTag::Lmstudio);
        let second = registry.resolve(CompatibilityTag::Lmstudio);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn explicit_tag_wins_over_everything_else() {
        let tag = derive_tag(Some(CompatibilityTag::Vllm), Some(CompatibilityTag::Ollama), "qwen", "http://localhost:1234/v1");
        assert_eq!(tag, CompatibilityTag::Vllm);
    }

    #[test]
    fn falls_back_to_endpoint_inspection() {
        let tag = derive_tag(None, None, "custom-provider", "http://localhost:1234/v1");
        assert_eq!(tag, CompatibilityTag::Lmstudio);
    }

    #[test]
    fn defaults_to_passthrough() {
        let tag = derive_tag(None, None, "custom-provider", "https://api.example.com/v1");
        assert_eq!(tag, CompatibilityTag::Passthrough);
    }

    #[test]
    fn modelscope_qwen_iflow_are_fatal_on_failure() {
        assert!(AdapterRegistry::is_fatal_on_failure(CompatibilityTag::Modelscope));
        assert!(AdapterRegistry::is_fatal_on_failure(CompatibilityTag::Qwen));
        assert!(AdapterRegistry::is_fatal_on_failure(CompatibilityTag::Iflow));
        assert!(!AdapterRegistry::is_fatal_on_failure(CompatibilityTag::Lmstudio));
    }
}
