use crate::domain::stock::{NormalizedStock, Sentiment};
use crate::normalize::DEFAULT_CONFIDENCE;
use std::str::FromStr;

const POTENTIAL_GROWTH_PCT: f64 = 5.0;

/// Dashboard list filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DashboardFilter {
    #[default]
    All,
    HighestConfidence,
    PotentialGrowth,
    Bullish,
    Bearish,
}

impl DashboardFilter {
    pub fn matches(self, stock: &NormalizedStock) -> bool {
        let p = &stock.prediction;
        match self {
            DashboardFilter::All => true,
            DashboardFilter::HighestConfidence => p.confidence > DEFAULT_CONFIDENCE,
            DashboardFilter::PotentialGrowth => {
                stock.current_price > 0.0
                    && (p.predicted_high / stock.current_price - 1.0) * 100.0 > POTENTIAL_GROWTH_PCT
            }
            DashboardFilter::Bullish => p.sentiment == Sentiment::Bullish,
            DashboardFilter::Bearish => p.sentiment == Sentiment::Bearish,
        }
    }
}

impl FromStr for DashboardFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match key.as_str() {
            "" | "all" => DashboardFilter::All,
            "highestconfidence" | "confidence" => DashboardFilter::HighestConfidence,
            "potentialgrowth" | "growth" => DashboardFilter::PotentialGrowth,
            "bullish" => DashboardFilter::Bullish,
            "bearish" => DashboardFilter::Bearish,
            _ => anyhow::bail!("unknown dashboard filter: {s}"),
        })
    }
}

/// Keeps the stocks matching `filter`, preserving order.
pub fn apply_filter(stocks: Vec<NormalizedStock>, filter: DashboardFilter) -> Vec<NormalizedStock> {
    stocks.into_iter().filter(|s| filter.matches(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::{ChartData, StockPrediction};

    fn stock(symbol: &str, price: f64, high: f64, confidence: f64, sentiment: Sentiment) -> NormalizedStock {
        NormalizedStock {
            symbol: symbol.to_string(),
            company_name: symbol.to_string(),
            current_price: price,
            change_percent: 0.0,
            predicted_change_percent: 0.0,
            prediction: StockPrediction {
                predicted_high: high,
                predicted_low: high,
                confidence,
                sentiment,
                analysis: String::new(),
                model_name: "m1".to_string(),
                context_len: None,
                horizon_len: None,
                max_deviation_percent: None,
                chart_data: ChartData::default(),
            },
        }
    }

    fn symbols(v: &[NormalizedStock]) -> Vec<&str> {
        v.iter().map(|s| s.symbol.as_str()).collect()
    }

    #[test]
    fn parses_filter_names() {
        assert_eq!("Highest Confidence".parse::<DashboardFilter>().unwrap(), DashboardFilter::HighestConfidence);
        assert_eq!("potential-growth".parse::<DashboardFilter>().unwrap(), DashboardFilter::PotentialGrowth);
        assert_eq!("".parse::<DashboardFilter>().unwrap(), DashboardFilter::All);
        assert!("sideways".parse::<DashboardFilter>().is_err());
    }

    #[test]
    fn filters_by_confidence_and_sentiment() {
        let list = vec![
            stock("A", 100.0, 100.0, 85.0, Sentiment::Bullish),
            stock("B", 100.0, 100.0, 90.0, Sentiment::Bearish),
        ];
        assert_eq!(symbols(&apply_filter(list.clone(), DashboardFilter::HighestConfidence)), vec!["B"]);
        assert_eq!(symbols(&apply_filter(list.clone(), DashboardFilter::Bullish)), vec!["A"]);
        assert_eq!(symbols(&apply_filter(list.clone(), DashboardFilter::Bearish)), vec!["B"]);
        assert_eq!(symbols(&apply_filter(list, DashboardFilter::All)), vec!["A", "B"]);
    }

    #[test]
    fn potential_growth_compares_high_to_price() {
        let list = vec![
            stock("UP", 100.0, 106.0, 85.0, Sentiment::Bullish),
            stock("SMALL", 100.0, 104.0, 85.0, Sentiment::Bullish),
            stock("ZERO", 0.0, 10.0, 85.0, Sentiment::Bearish),
        ];
        assert_eq!(symbols(&apply_filter(list, DashboardFilter::PotentialGrowth)), vec!["UP"]);
    }
}
