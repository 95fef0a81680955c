//! Pipeline-table persistence (spec.md §4.3 "Persistence", §6 "Persisted state")

use std::path::Path;

use relaymux_core::now_unix_secs;
use serde::Serialize;

use crate::table::PipelineTable;

/// One pipeline's entry in the persisted artifact (spec.md §6)
#[derive(Debug, Serialize)]
struct PersistedPipeline<'a> {
    id: &'a str,
    #[serde(rename = "virtualModel")]
    virtual_model: &'a str,
    provider: &'a str,
    #[serde(rename = "targetModel")]
    target_model: &'a str,
    endpoint: &'a str,
    protocol: String,
}

#[derive(Debug, Serialize)]
struct PersistedTable<'a> {
    #[serde(rename = "configName")]
    config_name: &'a str,
    #[serde(rename = "configFile")]
    config_file: &'a str,
    #[serde(rename = "generatedAt")]
    generated_at: u64,
    #[serde(rename = "totalPipelines")]
    total_pipelines: usize,
    #[serde(rename = "pipelinesGroupedByVirtualModel")]
    pipelines_grouped_by_virtual_model: &'a indexmap::IndexMap<String, Vec<String>>,
    #[serde(rename = "allPipelines")]
    all_pipelines: Vec<PersistedPipeline<'a>>,
}

fn build_artifact<'a>(table: &'a PipelineTable, config_name: &'a str, config_file: &'a str) -> PersistedTable<'a> {
    let all_pipelines = table
        .descriptors
        .iter()
        .map(|d| PersistedPipeline {
            id: &d.pipeline_id,
            virtual_model: &d.virtual_model,
            provider: &d.provider,
            target_model: &d.target_model,
            endpoint: &d.server_endpoint,
            protocol: d.protocol.to_string().to_lowercase(),
        })
        .collect();

    PersistedTable {
        config_name,
        config_file,
        generated_at: now_unix_secs(),
        total_pipelines: table.descriptors.len(),
        pipelines_grouped_by_virtual_model: &table.by_virtual_model,
        all_pipelines,
    }
}

/// Write the stable inspection file and a timestamped per-port debug copy.
/// Per spec.md §4.3 "Persistence", write failures do not abort
/// initialization — callers should log and continue, not propagate.
pub fn persist_pipeline_table(
    table: &PipelineTable,
    config_name: &str,
    config_file: &str,
    output_dir: &Path,
    debug_log_dir: &Path,
    listening_port: u16,
) {
    let artifact = build_artifact(table, config_name, config_file);

    let Ok(json) = serde_json::to_string_pretty(&artifact) else {
        tracing::warn!("failed to serialize pipeline table for persistence");
        return;
    };

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        tracing::warn!(dir = %output_dir.display(), error = %e, "failed to create pipeline-table output directory");
    } else {
        let stable_path = output_dir.join(format!("{config_name}-pipeline-table.json"));
        if let Err(e) = std::fs::write(&stable_path, &json) {
            tracing::warn!(path = %stable_path.display(), error = %e, "failed to write stable pipeline-table file");
        }
    }

    if let Err(e) = std::fs::create_dir_all(debug_log_dir) {
        tracing::warn!(dir = %debug_log_dir.display(), error = %e, "failed to create debug log directory");
        return;
    }

    let debug_path = debug_log_dir.join(format!("pipeline-table-port{listening_port}-{}.json", artifact.generated_at));
    if let Err(e) = std::fs::write(&debug_path, &json) {
        tracing::warn!(path = %debug_path.display(), error = %e, "failed to write debug pipeline-table file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{PipelineDescriptor, SelectionHint};
    use relaymux_core::Protocol;

    fn sample_table() -> PipelineTable {
        let mut by_virtual_model = indexmap::IndexMap::new();
        by_virtual_model.insert("default".to_owned(), vec!["openai-gpt-4o-key0".to_owned()]);

        PipelineTable {
            descriptors: vec![PipelineDescriptor {
                pipeline_id: "openai-gpt-4o-key0".to_owned(),
                virtual_model: "default".to_owned(),
                provider: "openai".to_owned(),
                target_model: "gpt-4o".to_owned(),
                api_key_index: 0,
                protocol: Protocol::Openai,
                transformer_name: None,
                server_compatibility: None,
                server_endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
                selection_hint: SelectionHint::default(),
            }],
            by_virtual_model,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn persists_stable_and_debug_files() {
        let base = std::env::temp_dir().join(format!("relaymux-pipeline-test-{}-{:?}", std::process::id(), std::thread::current().id()));
        let output_dir = base.join("out");
        let debug_dir = base.join("debug");
        let table = sample_table();

        persist_pipeline_table(&table, "test-config", "test-config.toml", &output_dir, &debug_dir, 8787);

        let stable = output_dir.join("test-config-pipeline-table.json");
        assert!(stable.exists());
        let contents = std::fs::read_to_string(&stable).unwrap();
        assert!(contents.contains("openai-gpt-4o-key0"));

        let mut entries = std::fs::read_dir(&debug_dir).unwrap();
        assert!(entries.next().is_some());

        let _ = std::fs::remove_dir_all(&base);
    }
}
