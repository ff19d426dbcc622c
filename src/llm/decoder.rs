use serde_json::Value;
use tracing::debug;

pub const RAW_FALLBACK_LIMIT: usize = 1000;

/// Broad grouping of hosted models by the response shape they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Summarization,
    TextGeneration,
}

impl ModelFamily {
    pub fn of(model: &str, summarization_model: Option<&str>) -> Self {
        if summarization_model.is_some_and(|m| m == model) {
            return ModelFamily::Summarization;
        }
        let lower = model.to_lowercase();
        if ["bart", "pegasus", "summar"].iter().any(|hint| lower.contains(hint)) {
            ModelFamily::Summarization
        } else {
            ModelFamily::TextGeneration
        }
    }
}

/// Response extraction strategies, tried in the order returned by [`chain_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// `summary_text` on the first list element or on the root object.
    SummaryText,
    /// `generated_text` on the first list element.
    GeneratedTextList,
    /// `generated_text` on the root object.
    GeneratedTextObject,
    /// Compact JSON rendering, truncated. Never fails.
    RawFallback,
}

impl Decoder {
    pub fn decode(&self, body: &Value) -> Option<String> {
        match self {
            Decoder::SummaryText => first_or_root(body, "summary_text"),
            Decoder::GeneratedTextList => body
                .as_array()
                .and_then(|items| items.first())
                .and_then(|item| text_field(item, "generated_text")),
            Decoder::GeneratedTextObject => text_field(body, "generated_text"),
            Decoder::RawFallback => Some(truncate(&body.to_string())),
        }
    }
}

fn first_or_root(body: &Value, field: &str) -> Option<String> {
    match body {
        Value::Array(items) => items.first().and_then(|item| text_field(item, field)),
        other => text_field(other, field),
    }
}

fn text_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn truncate(text: &str) -> String {
    text.chars().take(RAW_FALLBACK_LIMIT).collect()
}

pub fn chain_for(family: ModelFamily) -> &'static [Decoder] {
    match family {
        ModelFamily::Summarization => &[
            Decoder::SummaryText,
            Decoder::GeneratedTextList,
            Decoder::GeneratedTextObject,
            Decoder::RawFallback,
        ],
        ModelFamily::TextGeneration => &[
            Decoder::GeneratedTextList,
            Decoder::GeneratedTextObject,
            Decoder::RawFallback,
        ],
    }
}

/// Extracts generated text from a raw response body. Bodies that are not
/// JSON are returned truncated as-is.
pub fn extract_text(raw: &str, family: ModelFamily) -> String {
    let body: Value = match serde_json::from_str(raw) {
        Ok(body) => body,
        Err(e) => {
            debug!("Response body is not JSON ({}), returning raw text", e);
            return truncate(raw);
        }
    };

    for decoder in chain_for(family) {
        if let Some(text) = decoder.decode(&body) {
            debug!("Decoded response with {:?}", decoder);
            return text;
        }
    }
    // RawFallback always yields.
    truncate(&body.to_string())
}
