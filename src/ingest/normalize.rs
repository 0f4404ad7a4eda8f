//! Shaping of the untyped X-Ray payload into [`AnalysisResult`].
//!
//! GroundX returns a loosely structured JSON document whose optional fields vary
//! by file type and pipeline version. Normalization maps it into the fixed
//! analysis shape the UI and the chat context builder consume, defaulting every
//! missing field instead of propagating absence.

use crate::ingest::types::AnalysisResult;
use serde_json::Value;

/// Normalize a raw X-Ray payload into the fixed analysis shape.
///
/// Narrative passages, suggested text, and extracted text are gathered from
/// `documentPages[].chunks[]` in document order; `fileKeywords` is a
/// comma-separated string on the wire and is split preserving order.
pub fn normalize_xray(payload: Value) -> AnalysisResult {
    let mut narratives: Vec<String> = Vec::new();
    let mut suggested: Vec<String> = Vec::new();
    let mut extracted: Vec<String> = Vec::new();

    let pages = payload.get("documentPages").and_then(Value::as_array);
    let page_count = pages.map_or(0, Vec::len);

    for page in pages.into_iter().flatten() {
        let Some(chunks) = page.get("chunks").and_then(Value::as_array) else {
            continue;
        };
        for chunk in chunks {
            if let Some(items) = chunk.get("narrative").and_then(Value::as_array) {
                narratives.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|text| !text.is_empty())
                        .map(str::to_string),
                );
            }
            if let Some(text) = chunk.get("suggestedText").and_then(Value::as_str)
                && !text.is_empty()
            {
                suggested.push(text.to_string());
            }
            if let Some(text) = chunk.get("text").and_then(Value::as_str)
                && !text.is_empty()
            {
                extracted.push(text.to_string());
            }
        }
    }

    let keywords = payload
        .get("fileKeywords")
        .and_then(Value::as_str)
        .map(split_keywords)
        .unwrap_or_default();

    AnalysisResult {
        narrative_summary: narratives.join("\n\n"),
        file_summary: string_field(&payload, "fileSummary"),
        suggested_text: suggested.join("\n\n"),
        extracted_text: extracted.join("\n\n"),
        keywords,
        file_type: string_field(&payload, "fileType"),
        language: string_field(&payload, "language"),
        page_count,
        raw_payload: payload,
    }
}

fn string_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}
