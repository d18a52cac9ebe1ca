use crate::domain::contract::LlmPredictionEnvelope;
use crate::domain::stock::AiPrediction;
use anyhow::Context;
use std::collections::BTreeMap;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_predictions(text: &str) -> anyhow::Result<BTreeMap<String, AiPrediction>> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmPredictionEnvelope>(&json_str)
        .with_context(|| format!("model output is not valid JSON for prediction schema: {json_str}"))?;
    parsed.validate_and_into_predictions()
}
