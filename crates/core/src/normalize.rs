//! Reduces backend prediction bundles into display-ready records.
//!
//! Every anomaly in a bundle degrades to a default value. The only non-default outcome is
//! `None` for a bundle that carries no dated series, which callers drop from the list.

use crate::domain::prediction::{Chunk, PredictionBundle, PublicPredictionResponse};
use crate::domain::stock::{ChartData, Locale, NormalizedStock, Sentiment, StockPrediction};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const DEFAULT_CONFIDENCE: f64 = 85.0;

/// Normalizes every bundle in the response, keeping input order and dropping symbols
/// without a time series.
pub fn normalize_response(res: &PublicPredictionResponse, locale: Locale) -> Vec<NormalizedStock> {
    let out: Vec<NormalizedStock> = res
        .items
        .iter()
        .filter_map(|bundle| normalize_bundle(bundle, locale))
        .collect();

    if out.len() < res.items.len() {
        tracing::debug!(
            received = res.items.len(),
            normalized = out.len(),
            "skipped prediction bundles without a time series"
        );
    }
    out
}

pub fn normalize_bundle(bundle: &PredictionBundle, locale: Locale) -> Option<NormalizedStock> {
    let best = &bundle.best;
    let model_key = best.best_prediction_item.as_str();

    let mut chart = ChartData::default();
    for chunk in sorted_chunks(&bundle.chunks) {
        if chunk.dates.is_empty() {
            continue;
        }
        chart.dates.extend(chunk.dates.iter().cloned());
        chart.actuals.extend_from_slice(&chunk.actual_values);
        if let Some(preds) = chunk.predictions.get(model_key) {
            chart.predictions.extend_from_slice(preds);
        }
    }

    if chart.dates.is_empty() {
        return None;
    }

    let last_actual = chart.actuals.last().copied().unwrap_or(0.0);
    let last_pred = chart.predictions.last().copied().unwrap_or(0.0);
    let current_price = if last_actual != 0.0 { last_actual } else { last_pred };

    let change_percent = percent_change(&chart.actuals);
    let predicted_change_percent = percent_change(&chart.predictions);

    let sentiment = if change_percent > 0.0 {
        Sentiment::Bullish
    } else {
        Sentiment::Bearish
    };

    let context_len = best.context_len.filter(|&n| n > 0);
    let horizon_len = best.horizon_len.filter(|&n| n > 0);

    let company_name = best
        .short_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&best.symbol)
        .to_string();

    Some(NormalizedStock {
        symbol: best.symbol.clone(),
        company_name,
        current_price,
        change_percent,
        predicted_change_percent,
        prediction: StockPrediction {
            predicted_high: last_pred,
            predicted_low: last_pred,
            confidence: confidence_from_metrics(best.best_metrics.as_ref()),
            sentiment,
            analysis: analysis_text(locale, model_key, context_len, horizon_len),
            model_name: model_key.to_string(),
            context_len,
            horizon_len,
            max_deviation_percent: bundle.max_deviation_percent,
            chart_data: chart,
        },
    })
}

/// `(last - first) / first * 100`, or 0 when the series is empty or starts at a
/// non-positive value.
pub fn percent_change(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first * 100.0,
        _ => 0.0,
    }
}

/// `100 - composite_score` rounded to 4 decimals, or [`DEFAULT_CONFIDENCE`] when the
/// metrics blob is missing, malformed, or has no numeric score.
pub fn confidence_from_metrics(metrics: Option<&Value>) -> f64 {
    let parsed;
    let doc = match metrics {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return DEFAULT_CONFIDENCE,
        },
        Some(v @ Value::Object(_)) => v,
        _ => return DEFAULT_CONFIDENCE,
    };

    let score = doc
        .get("composite_score")
        .or_else(|| doc.get("compositeScore"))
        .and_then(Value::as_f64);

    match score {
        Some(score) => round_to(100.0 - score, 4),
        None => DEFAULT_CONFIDENCE,
    }
}

pub fn analysis_text(
    locale: Locale,
    model_key: &str,
    context_len: Option<u64>,
    horizon_len: Option<u64>,
) -> String {
    let ctx = format_context_len(context_len);
    let hor = horizon_len.map_or_else(|| "?".to_string(), |h| h.to_string());
    match locale {
        Locale::En => format!("Best: {model_key} Ctx: {ctx} Hor: {hor}d"),
        Locale::Zh => format!("最佳模型: {model_key} 上下文: {ctx} 预测: {hor}天"),
    }
}

/// `512` stays `512`; `2048` becomes `2K`; rounding is half-up.
fn format_context_len(context_len: Option<u64>) -> String {
    match context_len {
        None | Some(0) => "?".to_string(),
        Some(n) if n < 1024 => n.to_string(),
        Some(n) => format!("{}K", (n as f64 / 1024.0).round() as u64),
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

/// Chunks ordered by `start_date`, leaving the input untouched. Unparsable dates go
/// last, in input order.
fn sorted_chunks(chunks: &[Chunk]) -> Vec<&Chunk> {
    let mut out: Vec<&Chunk> = chunks.iter().collect();
    out.sort_by_cached_key(|c| {
        let ts = parse_start(&c.start_date);
        (ts.is_none(), ts)
    });
    out
}

fn parse_start(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(v: Value) -> PredictionBundle {
        serde_json::from_value(v).unwrap()
    }

    fn single_chunk(actuals: Value, preds: Value) -> PredictionBundle {
        bundle(json!({
            "best": {"symbol": "AAPL", "best_prediction_item": "m1"},
            "chunks": [{
                "start_date": "2025-01-01",
                "end_date": "2025-01-03",
                "dates": ["d1", "d2", "d3"],
                "actual_values": actuals,
                "predictions": {"m1": preds}
            }]
        }))
    }

    #[test]
    fn computes_realized_and_predicted_change() {
        let b = single_chunk(json!([100, 105, 110]), json!([100, 108, 115]));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.change_percent, 10.0);
        assert_eq!(s.predicted_change_percent, 15.0);
        assert_eq!(s.current_price, 110.0);
        assert_eq!(s.prediction.sentiment, Sentiment::Bullish);
        assert_eq!(s.prediction.predicted_high, 115.0);
        assert_eq!(s.prediction.predicted_low, 115.0);
        assert_eq!(s.prediction.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(s.company_name, "AAPL");
    }

    #[test]
    fn falls_back_to_last_prediction_without_actuals() {
        let b = single_chunk(json!([]), json!([50, 52]));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.current_price, 52.0);
        assert_eq!(s.change_percent, 0.0);
        assert_eq!(s.prediction.sentiment, Sentiment::Bearish);
        assert_eq!(s.prediction.chart_data.dates.len(), 3);
        assert!(s.prediction.chart_data.actuals.is_empty());
    }

    #[test]
    fn zero_first_actual_yields_zero_change() {
        let b = single_chunk(json!([0, 5, 10]), json!([0, 1, 2]));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.change_percent, 0.0);
        assert_eq!(s.predicted_change_percent, 0.0);
        assert_eq!(s.prediction.sentiment, Sentiment::Bearish);
    }

    #[test]
    fn flat_series_is_bearish() {
        let b = single_chunk(json!([100, 100, 100]), json!([100, 100, 100]));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.change_percent, 0.0);
        assert_eq!(s.prediction.sentiment, Sentiment::Bearish);
    }

    #[test]
    fn sorts_chunks_chronologically_before_concatenation() {
        let b = bundle(json!({
            "best": {"symbol": "TSLA", "best_prediction_item": "m1"},
            "chunks": [
                {"start_date": "2025-02-01", "dates": ["2025-02-01", "2025-02-02"],
                 "actual_values": [3.0, 4.0], "predictions": {"m1": [3.5, 4.5]}},
                {"start_date": "2025-01-01", "dates": ["2025-01-01", "2025-01-02"],
                 "actual_values": [1.0, 2.0], "predictions": {"m1": [1.5, 2.5]}}
            ]
        }));
        let input_first = b.chunks[0].start_date.clone();

        let s = normalize_bundle(&b, Locale::En).unwrap();
        let chart = &s.prediction.chart_data;
        assert_eq!(
            chart.dates,
            vec!["2025-01-01", "2025-01-02", "2025-02-01", "2025-02-02"]
        );
        assert_eq!(chart.actuals, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(chart.predictions, vec![1.5, 2.5, 3.5, 4.5]);
        assert_eq!(s.change_percent, 300.0);
        // Input is not reordered.
        assert_eq!(b.chunks[0].start_date, input_first);
    }

    #[test]
    fn mixed_date_formats_sort_together() {
        let b = bundle(json!({
            "best": {"symbol": "X", "best_prediction_item": "m1"},
            "chunks": [
                {"start_date": "2025-03-01T00:00:00Z", "dates": ["c"], "actual_values": [3.0]},
                {"start_date": "garbage", "dates": ["z"], "actual_values": [9.0]},
                {"start_date": "2025-01-01 00:00:00", "dates": ["a"], "actual_values": [1.0]},
                {"start_date": "2025-02-01", "dates": ["b"], "actual_values": [2.0]}
            ]
        }));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.prediction.chart_data.dates, vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn missing_model_key_contributes_nothing() {
        let b = bundle(json!({
            "best": {"symbol": "X", "best_prediction_item": "m2"},
            "chunks": [
                {"start_date": "2025-01-01", "dates": ["a", "b"], "actual_values": [1.0, 2.0],
                 "predictions": {"m1": [1.0, 2.0]}},
                {"start_date": "2025-01-03", "dates": ["c"], "actual_values": [3.0],
                 "predictions": {"m2": [3.3]}}
            ]
        }));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.prediction.chart_data.predictions, vec![3.3]);
        assert_eq!(s.prediction.predicted_high, 3.3);
    }

    #[test]
    fn chunks_without_dates_are_skipped_whole() {
        let b = bundle(json!({
            "best": {"symbol": "X", "best_prediction_item": "m1"},
            "chunks": [
                {"start_date": "2025-01-01", "dates": [], "actual_values": [99.0],
                 "predictions": {"m1": [99.0]}},
                {"start_date": "2025-01-02", "dates": ["b"], "actual_values": [2.0],
                 "predictions": {"m1": [2.5]}}
            ]
        }));
        let s = normalize_bundle(&b, Locale::En).unwrap();
        assert_eq!(s.prediction.chart_data.actuals, vec![2.0]);
        assert_eq!(s.prediction.chart_data.predictions, vec![2.5]);
    }

    #[test]
    fn bundles_without_series_are_dropped() {
        let res: PublicPredictionResponse = serde_json::from_value(json!({
            "count": 3,
            "items": [
                {"best": {"symbol": "EMPTY", "best_prediction_item": "m1"}, "chunks": []},
                {"best": {"symbol": "KEEP", "best_prediction_item": "m1"},
                 "chunks": [{"start_date": "2025-01-01", "dates": ["a"], "actual_values": [1.0]}]},
                {"best": {"symbol": "BLANK", "best_prediction_item": "m1"},
                 "chunks": [{"start_date": "2025-01-01", "dates": []}]}
            ]
        }))
        .unwrap();

        let out = normalize_response(&res, Locale::En);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "KEEP");
    }

    #[test]
    fn null_chunks_drop_only_that_symbol() {
        let res: PublicPredictionResponse = serde_json::from_value(json!({
            "count": 2,
            "items": [
                {"best": {"symbol": "NOCHUNKS", "best_prediction_item": "m1"}, "chunks": null},
                {"best": {"symbol": "KEEP", "best_prediction_item": "m1"},
                 "chunks": [{"start_date": "2025-01-01", "dates": ["a"], "actual_values": [1.0],
                             "predictions": {"m1": [1.5]}}]}
            ]
        }))
        .unwrap();

        let out = normalize_response(&res, Locale::En);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "KEEP");
    }

    #[test]
    fn normalizes_public_endpoint_payload() {
        // Shape of the public best-predictions handler: best row as stored, chunks with
        // `::text` dates, and a zero deviation plus null chunks for untested symbols.
        let res: PublicPredictionResponse = serde_json::from_value(json!({
            "count": 2,
            "items": [
                {
                    "best": {
                        "id": 7,
                        "unique_key": "AAPL_2.5_5",
                        "symbol": "AAPL",
                        "timesfm_version": "2.5",
                        "best_prediction_item": "mtf_h5",
                        "best_metrics": "{\"composite_score\": 12.5, \"mae\": 1.2}",
                        "is_public": 1,
                        "train_start_date": "2020-01-02T00:00:00Z",
                        "val_end_date": "2025-01-06T00:00:00Z",
                        "context_len": 2048,
                        "horizon_len": 5,
                        "created_at": "2025-01-07T08:00:00Z",
                        "short_name": ""
                    },
                    "chunks": [
                        {"unique_key": "AAPL_2.5_5", "chunk_index": 0, "start_date": "2025-01-02",
                         "end_date": "2025-01-03", "symbol": "AAPL", "user_id": null,
                         "predictions": {"mtf_h5": [100.0, 108.0], "mtf_h10": [99.0, 98.0]},
                         "actual_values": [100.0, 105.0], "dates": ["2025-01-02", "2025-01-03"]},
                        {"unique_key": "AAPL_2.5_5", "chunk_index": 1, "start_date": "2025-01-06",
                         "end_date": "2025-01-06", "symbol": "AAPL", "user_id": null,
                         "predictions": {"mtf_h5": [115.0]},
                         "actual_values": [110.0], "dates": ["2025-01-06"]}
                    ],
                    "max_deviation_percent": 4.5
                },
                {
                    "best": {"id": 8, "unique_key": "MSFT_2.5_5", "symbol": "MSFT",
                             "best_prediction_item": "mtf_h5", "best_metrics": "{}",
                             "is_public": 1, "context_len": 512, "horizon_len": 5, "short_name": ""},
                    "chunks": null,
                    "max_deviation_percent": 0
                }
            ]
        }))
        .unwrap();

        let out = normalize_response(&res, Locale::En);
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.symbol, "AAPL");
        assert_eq!(s.company_name, "AAPL");
        assert_eq!(s.current_price, 110.0);
        assert_eq!(s.change_percent, 10.0);
        assert_eq!(s.predicted_change_percent, 15.0);
        assert_eq!(s.prediction.predicted_high, 115.0);
        assert_eq!(s.prediction.confidence, 87.5);
        assert_eq!(s.prediction.sentiment, Sentiment::Bullish);
        assert_eq!(s.prediction.analysis, "Best: mtf_h5 Ctx: 2K Hor: 5d");
        assert_eq!(s.prediction.max_deviation_percent, Some(4.5));
        assert_eq!(
            s.prediction.chart_data.dates,
            vec!["2025-01-02", "2025-01-03", "2025-01-06"]
        );
        assert_eq!(s.prediction.chart_data.actuals, vec![100.0, 105.0, 110.0]);
        assert_eq!(s.prediction.chart_data.predictions, vec![100.0, 108.0, 115.0]);
    }

    #[test]
    fn preserves_input_order() {
        let res: PublicPredictionResponse = serde_json::from_value(json!({
            "items": [
                {"best": {"symbol": "B"}, "chunks": [{"start_date": "2025-01-01", "dates": ["a"]}]},
                {"best": {"symbol": "A"}, "chunks": [{"start_date": "2025-01-01", "dates": ["a"]}]}
            ]
        }))
        .unwrap();
        let symbols: Vec<_> = normalize_response(&res, Locale::En)
            .into_iter()
            .map(|s| s.symbol)
            .collect();
        assert_eq!(symbols, vec!["B", "A"]);
    }

    #[test]
    fn confidence_from_composite_score() {
        assert_eq!(
            confidence_from_metrics(Some(&json!("{\"composite_score\": 12.34567}"))),
            87.6543
        );
        assert_eq!(
            confidence_from_metrics(Some(&json!({"compositeScore": 40}))),
            60.0
        );
    }

    #[test]
    fn confidence_defaults_on_bad_metrics() {
        assert_eq!(confidence_from_metrics(None), DEFAULT_CONFIDENCE);
        assert_eq!(confidence_from_metrics(Some(&json!(""))), DEFAULT_CONFIDENCE);
        assert_eq!(confidence_from_metrics(Some(&json!("{not json"))), DEFAULT_CONFIDENCE);
        assert_eq!(
            confidence_from_metrics(Some(&json!("{\"composite_score\": \"12\"}"))),
            DEFAULT_CONFIDENCE
        );
        assert_eq!(
            confidence_from_metrics(Some(&json!("{\"mape\": 1.2}"))),
            DEFAULT_CONFIDENCE
        );
        assert_eq!(confidence_from_metrics(Some(&json!("42"))), DEFAULT_CONFIDENCE);
        assert_eq!(confidence_from_metrics(Some(&Value::Null)), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn analysis_text_scales_context_length() {
        assert_eq!(
            analysis_text(Locale::En, "m1", Some(2048), Some(5)),
            "Best: m1 Ctx: 2K Hor: 5d"
        );
        assert_eq!(
            analysis_text(Locale::En, "m1", Some(512), None),
            "Best: m1 Ctx: 512 Hor: ?d"
        );
        assert_eq!(
            analysis_text(Locale::En, "m1", Some(1536), Some(1)),
            "Best: m1 Ctx: 2K Hor: 1d"
        );
        assert_eq!(
            analysis_text(Locale::Zh, "m1", None, Some(10)),
            "最佳模型: m1 上下文: ? 预测: 10天"
        );
    }

    #[test]
    fn metadata_flows_into_prediction() {
        let b = bundle(json!({
            "best": {
                "symbol": "NVDA", "short_name": "Nvidia", "best_prediction_item": "m1",
                "best_metrics": "{\"composite_score\": 5}", "context_len": 0, "horizon_len": 7
            },
            "chunks": [{"start_date": "2025-01-01", "dates": ["a"], "actual_values": [1.0],
                        "predictions": {"m1": [1.1]}}],
            "max_deviation_percent": 2.5
        }));
        let s = normalize_bundle(&b, Locale::Zh).unwrap();
        assert_eq!(s.company_name, "Nvidia");
        assert_eq!(s.prediction.confidence, 95.0);
        assert_eq!(s.prediction.model_name, "m1");
        assert_eq!(s.prediction.context_len, None);
        assert_eq!(s.prediction.horizon_len, Some(7));
        assert_eq!(s.prediction.max_deviation_percent, Some(2.5));
        assert_eq!(s.prediction.analysis, "最佳模型: m1 上下文: ? 预测: 7天");
    }
}
