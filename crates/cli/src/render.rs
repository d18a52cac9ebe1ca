use fintrack_core::backend::types::{MarketStatus, Quote, StrategyParams, WatchlistItem};
use fintrack_core::domain::stock::{AiPrediction, NormalizedStock};
use serde::Serialize;
use std::collections::BTreeMap;

pub fn print_json<T: Serialize + ?Sized>(v: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

pub fn print_stocks(stocks: &[NormalizedStock]) {
    if stocks.is_empty() {
        println!("no predictions available");
        return;
    }
    println!(
        "{:<10} {:<24} {:>10} {:>9} {:>9} {:>10} {:>8}  {}",
        "SYMBOL", "NAME", "PRICE", "CHG%", "PRED%", "TARGET", "CONF", "SIGNAL"
    );
    for s in stocks {
        let p = &s.prediction;
        println!(
            "{:<10} {:<24} {:>10.2} {:>+9.2} {:>+9.2} {:>10.2} {:>8.2}  {}",
            s.symbol,
            truncate(&s.company_name, 24),
            s.current_price,
            s.change_percent,
            s.predicted_change_percent,
            p.predicted_high,
            p.confidence,
            p.sentiment
        );
        println!("{:<10} {}", "", p.analysis);
    }
}

pub fn print_watchlist(items: &[WatchlistItem]) {
    if items.is_empty() {
        println!("watchlist is empty");
        return;
    }
    println!("{:>6} {:<10} {:<24} {:>10} {:>8}  {}", "ID", "SYMBOL", "NAME", "PRICE", "CHG%", "STRATEGY");
    for item in items {
        let (price, change) = item
            .current_price
            .as_ref()
            .map_or((f64::NAN, f64::NAN), |p| (p.price, p.change_percent));
        println!(
            "{:>6} {:<10} {:<24} {:>10.2} {:>+8.2}  {}",
            item.id,
            item.stock.symbol,
            truncate(&item.stock.company_name, 24),
            price,
            change,
            item.strategy_name
                .as_deref()
                .or(item.strategy_unique_key.as_deref())
                .unwrap_or("-")
        );
    }
}

pub fn print_strategies(strategies: &[StrategyParams]) {
    if strategies.is_empty() {
        println!("no strategies saved");
        return;
    }
    for s in strategies {
        println!(
            "{:<24} {:<20} buy>{:+.2}% sell<{:+.2}% cash={:.0} rebalance={}",
            s.unique_key,
            truncate(&s.name, 20),
            s.buy_threshold_pct,
            s.sell_threshold_pct,
            s.initial_cash,
            s.enable_rebalance
        );
    }
}

pub fn print_quotes(quotes: &[Quote]) {
    for q in quotes {
        let price = q.latest_price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"));
        let change = q.change_percent.map_or_else(|| "-".to_string(), |c| format!("{c:+.2}%"));
        println!(
            "{:<10} {:>10} {:>9}  {}",
            q.symbol,
            price,
            change,
            q.trading_date.as_deref().unwrap_or("")
        );
    }
}

pub fn print_market_status(status: &MarketStatus) {
    for idx in &status.indices {
        println!("{:<10} {:>12.2} {:>+7.2}%", idx.name, idx.value, idx.change);
    }
}

pub fn print_ai_predictions(predictions: &BTreeMap<String, AiPrediction>) {
    for (symbol, p) in predictions {
        println!(
            "{:<10} {:>10.2} - {:<10.2} {:>6.1}  {:<8} {}",
            symbol, p.predicted_low, p.predicted_high, p.confidence, p.sentiment, p.analysis
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
