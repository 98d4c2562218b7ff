#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Tier-2 per-chunk NLP extraction: language detection, lightweight named
//! entity recognition, and keyphrase ranking.
//!
//! No single crate in the reference corpus provides a full NER/TextRank
//! pipeline, so entity and keyphrase extraction here are a deterministic,
//! dependency-free stand-in for the capability `en_core_web_sm` + TextRank
//! played in the original implementation. Language detection uses
//! [`whatlang`], a real crate, since it covers that need directly.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use enrichment_types::{ExtractedEntity, Tier2Result};

/// Lazily-initialized, process-wide NLP pipeline.
///
/// Mirrors the double-checked lazy singleton the Python tier-2 module uses
/// to load its spaCy model exactly once across all worker tasks: expensive
/// setup (here, the stopword table) happens on first use and is reused
/// after.
struct Pipeline {
    stopwords: std::collections::HashSet<&'static str>,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }
}

static PIPELINE: OnceLock<Mutex<Pipeline>> = OnceLock::new();

fn pipeline() -> &'static Mutex<Pipeline> {
    PIPELINE.get_or_init(|| Mutex::new(Pipeline::new()))
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "is", "are", "was", "were", "be", "been", "being",
    "to", "of", "in", "on", "for", "with", "as", "by", "at", "from", "this", "that", "these",
    "those", "it", "its", "not", "no", "do", "does", "did", "has", "have", "had", "will", "would",
    "can", "could", "should", "i", "you", "he", "she", "we", "they", "them", "his", "her", "our",
];

/// Run the full tier-2 pipeline over one chunk of text.
///
/// Returns [`Tier2Result::empty`] for empty/whitespace-only input, matching
/// the short-circuit every tier-2 extraction function takes in the
/// original implementation.
pub fn process_text(text: &str) -> Tier2Result {
    if text.trim().is_empty() {
        return Tier2Result::empty();
    }

    Tier2Result {
        entities: extract_entities(text),
        keywords: extract_keywords(text, 10),
        language: detect_language(text),
    }
}

/// Extract capitalized-phrase entities from `text`.
///
/// Empty/whitespace-only input yields an empty vector; this is deliberately
/// total rather than fallible, since a NER miss is not an error condition.
pub fn extract_entities(text: &str) -> Vec<ExtractedEntity> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let _guard = pipeline().lock().expect("nlp pipeline lock poisoned");

    let mut entities = Vec::new();
    let mut current = Vec::new();
    for word in text.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
        if starts_with_uppercase(trimmed) {
            current.push(trimmed.to_string());
        } else if !current.is_empty() {
            entities.push(flush_entity(&mut current));
        }
    }
    if !current.is_empty() {
        entities.push(flush_entity(&mut current));
    }
    entities
}

fn starts_with_uppercase(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

fn flush_entity(current: &mut Vec<String>) -> ExtractedEntity {
    let text = current.join(" ");
    current.clear();
    ExtractedEntity {
        text,
        label: "ENTITY".to_string(),
    }
}

/// Rank the top `top_n` keyphrases (single non-stopword tokens, by
/// frequency) in `text`.
pub fn extract_keywords(text: &str, top_n: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let pipeline = pipeline().lock().expect("nlp pipeline lock poisoned");

    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split_whitespace() {
        let lower = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if lower.len() < 3 || pipeline.stopwords.contains(lower.as_str()) {
            continue;
        }
        *counts.entry(lower).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(top_n).map(|(word, _)| word).collect()
}

/// Detect the dominant language of `text` as an ISO-639-3 code, or
/// `"unknown"` when detection fails or confidence is too low.
pub fn detect_language(text: &str) -> String {
    let normalized = text.replace('\n', " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return "unknown".to_string();
    }

    match whatlang::detect(normalized) {
        Some(info) if info.is_reliable() => info.lang().code().to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_result() {
        assert_eq!(process_text(""), Tier2Result::empty());
        assert_eq!(process_text("   \n\t  "), Tier2Result::empty());
    }

    #[test]
    fn process_text_is_idempotent() {
        let text = "Marie Curie won the Nobel Prize in Physics in 1903.";
        assert_eq!(process_text(text), process_text(text));
    }

    #[test]
    fn extract_entities_groups_consecutive_capitalized_words() {
        let entities = extract_entities("Marie Curie travelled to Paris last year.");
        let texts: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert!(texts.contains(&"Marie Curie"));
        assert!(texts.contains(&"Paris"));
    }

    #[test]
    fn extract_keywords_drops_stopwords_and_short_tokens() {
        let keywords = extract_keywords("the quick brown fox and the lazy dog", 10);
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"and".to_string()));
        assert!(keywords.contains(&"quick".to_string()));
    }

    #[test]
    fn extract_keywords_respects_top_n() {
        let keywords = extract_keywords("alpha beta gamma delta epsilon zeta eta theta", 3);
        assert_eq!(keywords.len(), 3);
    }

    #[test]
    fn detect_language_identifies_english() {
        let lang = detect_language(
            "The quick brown fox jumps over the lazy dog near the riverbank every single morning.",
        );
        assert_eq!(lang, "eng");
    }

    #[test]
    fn detect_language_empty_input_is_unknown() {
        assert_eq!(detect_language(""), "unknown");
        assert_eq!(detect_language("\n  \n"), "unknown");
    }
}
