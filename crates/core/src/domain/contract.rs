use crate::domain::stock::{AiPrediction, Sentiment};
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw JSON emitted by the AI model, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPredictionEnvelope {
    pub predictions: Vec<LlmPredictionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPredictionItem {
    pub symbol: String,
    pub predicted_high: f64,
    pub predicted_low: f64,
    pub confidence: f64,
    pub sentiment: Sentiment,
    pub analysis: String,
}

impl LlmPredictionEnvelope {
    /// Validates every item and keys the result by upper-cased symbol. A later duplicate
    /// symbol overwrites an earlier one.
    pub fn validate_and_into_predictions(self) -> anyhow::Result<BTreeMap<String, AiPrediction>> {
        let mut out = BTreeMap::new();
        for item in self.predictions {
            let (symbol, prediction) = item.validate_and_into_prediction()?;
            out.insert(symbol, prediction);
        }
        Ok(out)
    }
}

impl LlmPredictionItem {
    fn validate_and_into_prediction(self) -> anyhow::Result<(String, AiPrediction)> {
        let symbol = self.symbol.trim().to_ascii_uppercase();
        ensure!(!symbol.is_empty(), "symbol must be non-empty");

        ensure!(
            self.predicted_high.is_finite() && self.predicted_low.is_finite(),
            "predicted prices must be finite for {symbol}"
        );
        ensure!(
            (0.0..=100.0).contains(&self.confidence),
            "confidence must be between 0 and 100 for {symbol} (got {})",
            self.confidence
        );

        // Models occasionally swap the bounds.
        let (low, high) = if self.predicted_low <= self.predicted_high {
            (self.predicted_low, self.predicted_high)
        } else {
            (self.predicted_high, self.predicted_low)
        };

        Ok((
            symbol,
            AiPrediction {
                predicted_high: high,
                predicted_low: low,
                confidence: self.confidence,
                sentiment: self.sentiment,
                analysis: self.analysis.trim().to_string(),
            },
        ))
    }
}
