#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Shared wire types for the enrichment worker: tasks claimed from the
//! control API, and the tier-2/tier-3 results submitted back to it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Document-type tag carried on a task, drawn from a fixed set.
///
/// Unknown tags deserialize to [`DocType::Text`] rather than failing, since
/// producers may introduce new tags the worker doesn't yet recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// Source code.
    Code,
    /// Slack conversation export.
    Slack,
    /// Email message.
    Email,
    /// Meeting notes/transcript.
    Meeting,
    /// Image requiring vision-model description.
    Image,
    /// PDF document.
    Pdf,
    /// Article or blog post.
    Article,
    /// Generic text, and the fallback for unrecognized tags.
    Text,
}

impl DocType {
    /// The wire tag for this doc type, as used in `docType` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Code => "code",
            DocType::Slack => "slack",
            DocType::Email => "email",
            DocType::Meeting => "meeting",
            DocType::Image => "image",
            DocType::Pdf => "pdf",
            DocType::Article => "article",
            DocType::Text => "text",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DocType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "code" => DocType::Code,
            "slack" => DocType::Slack,
            "email" => DocType::Email,
            "meeting" => DocType::Meeting,
            "image" => DocType::Image,
            "pdf" => DocType::Pdf,
            "article" => DocType::Article,
            _ => DocType::Text,
        })
    }
}

/// A single chunk body as returned alongside a claimed task.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimedChunk {
    /// 0-based ordinal of this chunk within its document.
    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,
    /// Chunk body text; may be empty.
    pub text: String,
}

/// A task claimed from the control API, ready for pipeline processing.
#[derive(Debug, Clone)]
pub struct Task {
    /// Opaque server-generated task identifier.
    pub task_id: String,
    /// 1 on first delivery, monotonically increasing on retry.
    pub attempt: u32,
    /// Opaque document identifier shared by all chunks of one document.
    pub base_id: String,
    /// 0-based ordinal of this task's chunk within its document.
    pub chunk_index: u32,
    /// Total number of chunks in the document; `chunk_index < total_chunks`.
    pub total_chunks: u32,
    /// Document-type tag, used to route tier-3 schema/prompt selection.
    pub doc_type: DocType,
    /// Opaque routing string, echoed back on submission.
    pub collection: String,
    /// This chunk's body text; may be empty.
    pub text: String,
    /// Free-form provenance string.
    pub source: String,
    /// All chunk bodies returned with the claim response, ascending by
    /// `chunk_index`; used to build tier-3's aggregated document text.
    pub chunks: Vec<ClaimedChunk>,
    /// Wall-clock time to wait before processing, from legacy retry-after
    /// producers. `None` when the task should be processed immediately.
    pub retry_after: Option<chrono::DateTime<chrono::Utc>>,
}

impl Task {
    /// `true` when this task's chunk is the last chunk of its document —
    /// the trigger condition for tier-3 document-level extraction.
    pub fn is_last_chunk(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks
    }

    /// The `"{baseId}:{chunkIndex}"` identifier used in submit payloads.
    pub fn chunk_id(&self) -> String {
        format!("{}:{}", self.base_id, self.chunk_index)
    }
}

/// A named entity recognized in a chunk of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// The entity's surface text.
    pub text: String,
    /// The entity's label (e.g. `PERSON`, `ORG`, `DATE`).
    pub label: String,
}

/// Per-chunk tier-2 extraction result. Always well-formed: every field is
/// present even when the underlying NLP call failed or the input was empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier2Result {
    /// Named entities found in the chunk.
    pub entities: Vec<ExtractedEntity>,
    /// Top keyphrases found in the chunk.
    pub keywords: Vec<String>,
    /// ISO-639-3 language code (e.g. `"eng"`), or `"unknown"`.
    pub language: String,
}

impl Tier2Result {
    /// The empty tier-2 result returned for empty/whitespace-only input or
    /// when the underlying NLP pipeline fails.
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            keywords: Vec::new(),
            language: "unknown".to_string(),
        }
    }
}

/// A document-level entity extracted during tier-3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity name, as a string (canonicalization happens upstream).
    #[serde(default)]
    pub name: String,
    /// Entity type (e.g. `person`, `class`, `concept`, `org`).
    #[serde(rename = "type", default)]
    pub entity_type: String,
    /// Brief description of the entity.
    #[serde(default)]
    pub description: String,
}

/// A document-level relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source entity name.
    #[serde(default)]
    pub source: String,
    /// Target entity name.
    #[serde(default)]
    pub target: String,
    /// Relationship type (e.g. `uses`, `depends-on`, `implements`).
    #[serde(rename = "type", default)]
    pub relationship_type: String,
    /// Brief description of the relationship.
    #[serde(default)]
    pub description: String,
}

/// Document-level tier-3 extraction result, produced only on the last
/// chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier3Result {
    /// Schema-shaped metadata object; shape depends on `docType`.
    pub tier3: serde_json::Value,
    /// Entities with non-empty names (filtered per spec.md §4.5).
    pub entities: Vec<Entity>,
    /// Relationships with non-empty source and target.
    pub relationships: Vec<Relationship>,
    /// Summary string, if the schema defines one.
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_doc_type_falls_back_to_text() {
        let json = "\"carrier-pigeon\"";
        let dt: DocType = serde_json::from_str(json).unwrap();
        assert_eq!(dt, DocType::Text);
    }

    #[test]
    fn known_doc_types_round_trip_through_as_str() {
        for dt in [
            DocType::Code,
            DocType::Slack,
            DocType::Email,
            DocType::Meeting,
            DocType::Image,
            DocType::Pdf,
            DocType::Article,
            DocType::Text,
        ] {
            let json = format!("\"{}\"", dt.as_str());
            let parsed: DocType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, dt);
        }
    }

    #[test]
    fn is_last_chunk_single_chunk_document() {
        let task = sample_task(0, 1);
        assert!(task.is_last_chunk());
    }

    #[test]
    fn is_last_chunk_multi_chunk_document() {
        assert!(!sample_task(0, 2).is_last_chunk());
        assert!(sample_task(1, 2).is_last_chunk());
    }

    #[test]
    fn chunk_id_format() {
        let task = sample_task(3, 5);
        assert_eq!(task.chunk_id(), "D:3");
    }

    fn sample_task(chunk_index: u32, total_chunks: u32) -> Task {
        Task {
            task_id: "T1".to_string(),
            attempt: 1,
            base_id: "D".to_string(),
            chunk_index,
            total_chunks,
            doc_type: DocType::Text,
            collection: "default".to_string(),
            text: String::new(),
            source: String::new(),
            chunks: Vec::new(),
            retry_after: None,
        }
    }
}
