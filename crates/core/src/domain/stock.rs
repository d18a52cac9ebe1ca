use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display language for human-readable summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            other => anyhow::bail!("unsupported locale: {other} (expected en or zh)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
    /// Only produced by the AI prediction path.
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Neutral => "Neutral",
        };
        f.pad(s)
    }
}

/// Display-ready record for one tracked symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStock {
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub change_percent: f64,
    pub predicted_change_percent: f64,
    pub prediction: StockPrediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPrediction {
    pub predicted_high: f64,
    pub predicted_low: f64,
    /// 0..=100.
    pub confidence: f64,
    pub sentiment: Sentiment,
    pub analysis: String,
    pub model_name: String,
    pub context_len: Option<u64>,
    pub horizon_len: Option<u64>,
    pub max_deviation_percent: Option<f64>,
    pub chart_data: ChartData,
}

/// Index-aligned series: `dates[i]`, `actuals[i]` and `predictions[i]` describe the same day.
/// `actuals` may be shorter than `dates` for unrealized windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub dates: Vec<String>,
    pub actuals: Vec<f64>,
    pub predictions: Vec<f64>,
}

/// Prediction returned by the generative-AI path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPrediction {
    pub predicted_high: f64,
    pub predicted_low: f64,
    pub confidence: f64,
    pub sentiment: Sentiment,
    pub analysis: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_from_str_is_strict() {
        assert_eq!("zh".parse::<Locale>().unwrap(), Locale::Zh);
        assert_eq!(" EN ".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn normalized_stock_serializes_camel_case() {
        let stock = NormalizedStock {
            symbol: "AAPL".to_string(),
            company_name: "Apple".to_string(),
            current_price: 1.0,
            change_percent: 0.0,
            predicted_change_percent: 0.0,
            prediction: StockPrediction {
                predicted_high: 1.0,
                predicted_low: 1.0,
                confidence: 85.0,
                sentiment: Sentiment::Bearish,
                analysis: String::new(),
                model_name: "m1".to_string(),
                context_len: None,
                horizon_len: Some(5),
                max_deviation_percent: None,
                chart_data: ChartData::default(),
            },
        };

        let v = serde_json::to_value(&stock).unwrap();
        assert_eq!(v["companyName"], "Apple");
        assert_eq!(v["prediction"]["chartData"]["dates"], serde_json::json!([]));
        assert_eq!(v["prediction"]["sentiment"], "Bearish");
        assert_eq!(v["prediction"]["horizonLen"], 5);
    }
}
