pub mod error;
pub mod gemini;
pub mod json;
pub mod offline;

use crate::config::Settings;
use crate::domain::stock::AiPrediction;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Offline,
}

#[async_trait::async_trait]
pub trait PredictionModel: Send + Sync {
    fn provider(&self) -> Provider;

    /// Predictions keyed by upper-cased symbol. Symbols the model skipped are absent.
    async fn predict(&self, symbols: &[String]) -> anyhow::Result<BTreeMap<String, AiPrediction>>;
}

/// Gemini when an API key is configured, otherwise the deterministic offline model.
pub fn from_settings(settings: &Settings) -> anyhow::Result<Box<dyn PredictionModel>> {
    if settings.gemini_api_key.is_some() {
        Ok(Box::new(gemini::GeminiClient::from_settings(settings)?))
    } else {
        tracing::warn!("GEMINI_API_KEY not set; using offline predictions");
        Ok(Box::new(offline::OfflineModel))
    }
}

/// Trims, upper-cases and de-duplicates symbols, keeping first-seen order.
pub fn clean_symbols(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for s in symbols {
        let s = s.trim().to_ascii_uppercase();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}
