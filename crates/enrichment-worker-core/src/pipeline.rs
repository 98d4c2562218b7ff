//! Per-task pipeline: tier-2 extraction, conditional tier-3 aggregation,
//! and the single `submit` call that ends the task.

use std::sync::Arc;

use anyhow::Context as _;
use enrichment_llm_adapters::ExtractorAdapter;
use enrichment_types::{Entity, Relationship, Task};

use crate::control_client::{ControlClient, SubmitResult};

/// Run the full pipeline over one claimed task: tier-2, conditional tier-3,
/// then exactly one `submit` call.
///
/// Any error — a panicked blocking NLP task or a non-2xx submit response —
/// propagates to the caller, which reports `fail` instead.
pub(crate) async fn process_task(
    control: &dyn ControlClient,
    adapter: &Arc<dyn ExtractorAdapter>,
    task: &Task,
) -> anyhow::Result<()> {
    let text = task.text.clone();
    let tier2 = tokio::task::spawn_blocking(move || enrichment_nlp::process_text(&text))
        .await
        .context("tier-2 extraction task panicked")?;

    let (tier3, entities, relationships, summary) = if task.is_last_chunk() {
        run_tier3(adapter, task).await
    } else {
        (None, Vec::new(), Vec::new(), None)
    };

    let result = SubmitResult {
        chunk_id: task.chunk_id(),
        collection: &task.collection,
        tier2: &tier2,
        tier3: tier3.as_ref(),
        entities: task.is_last_chunk().then_some(&entities),
        relationships: task.is_last_chunk().then_some(&relationships),
        summary: summary.as_deref(),
    };

    control.submit(&task.task_id, &result).await
}

/// Document-level tier-3 extraction: resolve the schema/prompt pair for the
/// task's `docType`, call the adapter's two extraction operations, and
/// shape the results into submit-ready fields.
async fn run_tier3(
    adapter: &Arc<dyn ExtractorAdapter>,
    task: &Task,
) -> (
    Option<serde_json::Value>,
    Vec<Entity>,
    Vec<Relationship>,
    Option<String>,
) {
    let full_text = aggregate_chunks(task);
    let (schema, prompt_template) = enrichment_doc_schemas::schema_for_doctype(task.doc_type);

    let tier3_meta = adapter
        .extract_metadata(&full_text, task.doc_type.as_str(), &schema, prompt_template)
        .await;
    let entity_result = adapter.extract_entities(&full_text).await;

    let entities = entity_result["entities"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|raw| serde_json::from_value::<Entity>(raw.clone()).ok())
        .filter(|entity| !entity.name.is_empty())
        .collect();

    let relationships = entity_result["relationships"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|raw| serde_json::from_value::<Relationship>(raw.clone()).ok())
        .filter(|rel| !rel.source.is_empty() && !rel.target.is_empty())
        .collect();

    let summary = tier3_meta
        .get("summary")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    (Some(tier3_meta), entities, relationships, summary)
}

/// Join every claimed chunk's text, ascending by `chunkIndex`, with `"\n\n"`.
///
/// The claim response always carries every chunk of the document, so unlike
/// the store-backed aggregation this spec also allows, there is no "missing
/// chunk" case to preserve position for — every ordinal from the response is
/// present, empty text included.
fn aggregate_chunks(task: &Task) -> String {
    let mut chunks = task.chunks.clone();
    chunks.sort_by_key(|chunk| chunk.chunk_index);
    chunks
        .into_iter()
        .map(|chunk| chunk.text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrichment_types::{ClaimedChunk, DocType};

    fn task_with_chunks(chunks: Vec<ClaimedChunk>) -> Task {
        Task {
            task_id: "T1".to_string(),
            attempt: 1,
            base_id: "D".to_string(),
            chunk_index: 0,
            total_chunks: chunks.len() as u32,
            doc_type: DocType::Text,
            collection: "default".to_string(),
            text: String::new(),
            source: String::new(),
            chunks,
            retry_after: None,
        }
    }

    #[test]
    fn aggregate_chunks_joins_ascending_by_index() {
        let task = task_with_chunks(vec![
            ClaimedChunk { chunk_index: 1, text: "second".to_string() },
            ClaimedChunk { chunk_index: 0, text: "first".to_string() },
        ]);
        assert_eq!(aggregate_chunks(&task), "first\n\nsecond");
    }

    #[test]
    fn aggregate_chunks_single_chunk_document() {
        let task = task_with_chunks(vec![ClaimedChunk { chunk_index: 0, text: "only".to_string() }]);
        assert_eq!(aggregate_chunks(&task), "only");
    }
}
