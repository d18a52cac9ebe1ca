use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInfo {
    #[serde(default)]
    pub id: i64,
    pub symbol: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub recorded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: i64,
    pub stock: StockInfo,
    #[serde(default)]
    pub current_price: Option<PriceSnapshot>,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub stock_type: Option<i32>,
    #[serde(default)]
    pub strategy_unique_key: Option<String>,
    #[serde(default)]
    pub strategy_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchlistResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub watchlist: Vec<WatchlistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToWatchlistRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_type: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedResponse {
    #[serde(default)]
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BindStrategyRequest<'a> {
    pub symbol: &'a str,
    pub strategy_unique_key: &'a str,
}

/// Parameters of a threshold/rebalance trading strategy. Missing fields take the
/// strategy form's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub unique_key: String,
    pub name: String,
    pub buy_threshold_pct: f64,
    pub sell_threshold_pct: f64,
    pub initial_cash: f64,
    pub enable_rebalance: bool,
    pub max_position_pct: f64,
    pub min_position_pct: f64,
    pub slope_position_per_pct: f64,
    pub rebalance_tolerance_pct: f64,
    pub trade_fee_rate: f64,
    pub take_profit_threshold_pct: f64,
    pub take_profit_sell_frac: f64,
    /// Backend-owned fields (ids, timestamps) kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            unique_key: String::new(),
            name: String::new(),
            buy_threshold_pct: 1.5,
            sell_threshold_pct: -1.0,
            initial_cash: 100_000.0,
            enable_rebalance: true,
            max_position_pct: 0.95,
            min_position_pct: 0.1,
            slope_position_per_pct: 0.2,
            rebalance_tolerance_pct: 0.05,
            trade_fee_rate: 0.001,
            take_profit_threshold_pct: 15.0,
            take_profit_sell_frac: 0.5,
            extra: BTreeMap::new(),
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.name.trim().is_empty(), "strategy name must be non-empty");
        anyhow::ensure!(self.initial_cash > 0.0, "initial_cash must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.min_position_pct)
                && (0.0..=1.0).contains(&self.max_position_pct),
            "position fractions must be within 0..=1"
        );
        anyhow::ensure!(
            self.min_position_pct <= self.max_position_pct,
            "min_position_pct ({}) exceeds max_position_pct ({})",
            self.min_position_pct,
            self.max_position_pct
        );
        anyhow::ensure!(
            (0.0..1.0).contains(&self.trade_fee_rate),
            "trade_fee_rate must be within 0..1"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.take_profit_sell_frac),
            "take_profit_sell_frac must be within 0..=1"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStrategy {
    #[serde(default)]
    pub message: String,
    pub unique_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyList {
    #[serde(default)]
    pub strategies: Vec<StrategyParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    #[serde(default)]
    pub latest_price: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub trading_date: Option<String>,
    #[serde(default)]
    pub turnover_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotesResponse {
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLookup {
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketIndex {
    pub name: String,
    pub value: f64,
    pub change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatus {
    pub indices: Vec<MarketIndex>,
}

impl MarketStatus {
    /// The backend has no market-status endpoint; this is the fixed snapshot shown on the
    /// dashboard header.
    pub fn snapshot() -> Self {
        let idx = |name: &str, value: f64, change: f64| MarketIndex {
            name: name.to_string(),
            value,
            change,
        };
        Self {
            indices: vec![
                idx("S&P 500", 4783.45, 1.2),
                idx("NASDAQ", 15055.65, 1.5),
                idx("DOW", 37695.73, 0.8),
                idx("VIX", 12.45, -5.2),
            ],
        }
    }
}
