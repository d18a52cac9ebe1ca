use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Body of `GET /get-predictions/mtf-best/public`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicPredictionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<PredictionBundle>,
    #[serde(default)]
    pub count: u64,
}

/// Per-symbol payload: the chosen model plus its time-chunked series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionBundle {
    #[serde(default)]
    pub best: BestModel,
    /// The backend sends `null` for symbols without validation chunks.
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub max_deviation_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BestModel {
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub timesfm_version: Option<String>,
    /// Model-variant key selecting the series inside each chunk's `predictions`.
    #[serde(default)]
    pub best_prediction_item: String,
    /// Usually a JSON document serialized into a string; some backends inline the object.
    #[serde(default)]
    pub best_metrics: Option<Value>,
    #[serde(default)]
    pub is_public: Option<i64>,
    #[serde(default)]
    pub context_len: Option<u64>,
    #[serde(default)]
    pub horizon_len: Option<u64>,
}

/// A contiguous window of actual and predicted values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dates: Vec<String>,
    /// May be shorter than `dates` when part of the window is unrealized.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actual_values: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub predictions: BTreeMap<String, Vec<f64>>,
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backend_shape() {
        let v = json!({
            "count": 1,
            "items": [{
                "best": {
                    "unique_key": "AAPL_2.5",
                    "symbol": "AAPL",
                    "timesfm_version": "2.5",
                    "best_prediction_item": "mtf_h5",
                    "best_metrics": "{\"composite_score\": 12.5}",
                    "is_public": 1,
                    "short_name": "Apple",
                    "context_len": 2048,
                    "horizon_len": 5
                },
                "chunks": [{
                    "unique_key": "AAPL_c0",
                    "chunk_index": 0,
                    "start_date": "2025-01-02",
                    "end_date": "2025-01-03",
                    "symbol": "AAPL",
                    "predictions": {"mtf_h5": [1.0, 2.0]},
                    "actual_values": [1.5, 2.5],
                    "dates": ["2025-01-02", "2025-01-03"]
                }],
                "max_deviation_percent": 3.2
            }]
        });

        let parsed: PublicPredictionResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.count, 1);
        let bundle = &parsed.items[0];
        assert_eq!(bundle.best.context_len, Some(2048));
        assert_eq!(bundle.chunks[0].predictions["mtf_h5"], vec![1.0, 2.0]);
        assert_eq!(bundle.max_deviation_percent, Some(3.2));
    }

    #[test]
    fn tolerates_missing_fields() {
        let v = json!({"items": [{"best": {"symbol": "MSFT"}}]});
        let parsed: PublicPredictionResponse = serde_json::from_value(v).unwrap();
        let bundle = &parsed.items[0];
        assert!(bundle.chunks.is_empty());
        assert!(bundle.best.best_metrics.is_none());
        assert_eq!(bundle.best.best_prediction_item, "");
    }

    #[test]
    fn null_series_decode_as_empty() {
        let v = json!({
            "count": 1,
            "items": [{
                "best": {"symbol": "NOCHUNKS", "best_prediction_item": "m1"},
                "chunks": null,
                "max_deviation_percent": 0
            }, {
                "best": {"symbol": "HALF", "best_prediction_item": "m1"},
                "chunks": [{"start_date": "2025-01-02", "dates": null, "actual_values": null, "predictions": null}]
            }]
        });

        let parsed: PublicPredictionResponse = serde_json::from_value(v).unwrap();
        assert!(parsed.items[0].chunks.is_empty());
        assert_eq!(parsed.items[0].max_deviation_percent, Some(0.0));
        let chunk = &parsed.items[1].chunks[0];
        assert!(chunk.dates.is_empty());
        assert!(chunk.actual_values.is_empty());
        assert!(chunk.predictions.is_empty());
    }
}
