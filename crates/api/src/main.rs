use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fintrack_core::backend::client::FintrackClient;
use fintrack_core::backend::session::Session;
use fintrack_core::backend::types::MarketStatus;
use fintrack_core::backend::PredictionSource;
use fintrack_core::domain::stock::{Locale, NormalizedStock};
use fintrack_core::filter::{apply_filter, DashboardFilter};
use fintrack_core::normalize::normalize_response;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = fintrack_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let client = FintrackClient::from_settings(&settings)?;
    tracing::info!(base_url = %client.base_url(), "using FinTrack backend");

    let state = AppState {
        source: Arc::new(client),
        session: Session::from_settings(&settings),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/predictions", get(list_predictions))
        .route("/predictions/:symbol", get(get_prediction))
        .route("/market-status", get(market_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    source: Arc<dyn PredictionSource>,
    session: Session,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionQuery {
    lang: Option<String>,
    filter: Option<String>,
}

impl PredictionQuery {
    fn locale(&self) -> Result<Locale, StatusCode> {
        match self.lang.as_deref() {
            Some(lang) => lang.parse().map_err(|_| StatusCode::BAD_REQUEST),
            None => Ok(Locale::default()),
        }
    }

    fn filter(&self) -> Result<DashboardFilter, StatusCode> {
        match self.filter.as_deref() {
            Some(f) => f.parse().map_err(|_| StatusCode::BAD_REQUEST),
            None => Ok(DashboardFilter::All),
        }
    }
}

async fn fetch_normalized(state: &AppState, locale: Locale) -> Result<Vec<NormalizedStock>, StatusCode> {
    let res = state
        .source
        .public_predictions(&state.session)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(source = state.source.source_name(), error = %e, "prediction fetch failed");
            StatusCode::BAD_GATEWAY
        })?;
    Ok(normalize_response(&res, locale))
}

async fn list_predictions(
    State(state): State<AppState>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<Vec<NormalizedStock>>, StatusCode> {
    let filter = query.filter()?;
    let stocks = fetch_normalized(&state, query.locale()?).await?;
    Ok(Json(apply_filter(stocks, filter)))
}

async fn get_prediction(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<NormalizedStock>, StatusCode> {
    let stocks = fetch_normalized(&state, query.locale()?).await?;
    stocks
        .into_iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(symbol.trim()))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn market_status() -> Json<MarketStatus> {
    Json(MarketStatus::snapshot())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &fintrack_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_core::domain::prediction::PublicPredictionResponse;
    use fintrack_core::domain::stock::Sentiment;
    use serde_json::json;

    struct StaticSource(Option<PublicPredictionResponse>);

    #[async_trait::async_trait]
    impl PredictionSource for StaticSource {
        fn source_name(&self) -> &'static str {
            "static"
        }

        async fn public_predictions(&self, _session: &Session) -> anyhow::Result<PublicPredictionResponse> {
            self.0.clone().ok_or_else(|| anyhow::anyhow!("backend down"))
        }
    }

    fn state(res: Option<PublicPredictionResponse>) -> AppState {
        AppState {
            source: Arc::new(StaticSource(res)),
            session: Session::anonymous(),
        }
    }

    fn sample() -> PublicPredictionResponse {
        serde_json::from_value(json!({
            "count": 3,
            "items": [
                {"best": {"symbol": "UP", "best_prediction_item": "m1"},
                 "chunks": [{"start_date": "2025-01-01", "dates": ["a", "b"],
                             "actual_values": [100.0, 110.0], "predictions": {"m1": [100.0, 120.0]}}]},
                {"best": {"symbol": "DOWN", "best_prediction_item": "m1"},
                 "chunks": [{"start_date": "2025-01-01", "dates": ["a", "b"],
                             "actual_values": [100.0, 90.0], "predictions": {"m1": [100.0, 95.0]}}]},
                {"best": {"symbol": "EMPTY", "best_prediction_item": "m1"}, "chunks": []}
            ]
        }))
        .unwrap()
    }

    fn query(lang: Option<&str>, filter: Option<&str>) -> Query<PredictionQuery> {
        Query(PredictionQuery {
            lang: lang.map(str::to_string),
            filter: filter.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn lists_normalized_predictions() {
        let Json(stocks) = list_predictions(State(state(Some(sample()))), query(None, None))
            .await
            .unwrap();
        let symbols: Vec<_> = stocks.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["UP", "DOWN"]);
    }

    #[tokio::test]
    async fn applies_filter_and_locale() {
        let Json(stocks) = list_predictions(State(state(Some(sample()))), query(Some("zh"), Some("bullish")))
            .await
            .unwrap();
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0].prediction.sentiment, Sentiment::Bullish);
        assert!(stocks[0].prediction.analysis.starts_with("最佳模型"));
    }

    #[tokio::test]
    async fn rejects_unknown_filter() {
        let err = list_predictions(State(state(Some(sample()))), query(None, Some("sideways")))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_unknown_locale() {
        let err = list_predictions(State(state(Some(sample()))), query(Some("fr"), None))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);

        let err = get_prediction(State(state(Some(sample()))), Path("UP".to_string()), query(Some("fr"), None))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn backend_failure_is_bad_gateway() {
        let err = list_predictions(State(state(None)), query(None, None))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn finds_single_symbol_case_insensitively() {
        let Json(stock) = get_prediction(
            State(state(Some(sample()))),
            Path("down".to_string()),
            query(None, None),
        )
        .await
        .unwrap();
        assert_eq!(stock.symbol, "DOWN");

        let err = get_prediction(State(state(Some(sample()))), Path("EMPTY".to_string()), query(None, None))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }
}
