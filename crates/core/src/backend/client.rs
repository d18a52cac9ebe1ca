use crate::backend::error::BackendError;
use crate::backend::session::Session;
use crate::backend::types::{
    AddToWatchlistRequest, AddedResponse, AuthResponse, BindStrategyRequest, MarketStatus,
    MessageResponse, QuotesResponse, SavedStrategy, StockLookup, StrategyList, StrategyParams,
    User, WatchlistResponse,
};
use crate::backend::PredictionSource;
use crate::config::{env_or, Settings};
use crate::domain::prediction::PublicPredictionResponse;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_EXP: u32 = 5;
const PUBLIC_PREDICTIONS_PATH: &str = "/get-predictions/mtf-best/public";

/// Typed client for the FinTrack REST API.
#[derive(Debug, Clone)]
pub struct FintrackClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl FintrackClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = env_or("FINTRACK_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let retries = env_or("FINTRACK_API_RETRIES", DEFAULT_RETRIES);
        Self::new(&settings.api_base_url, Duration::from_secs(timeout_secs), retries)
    }

    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        anyhow::ensure!(!base_url.is_empty(), "backend base URL must be non-empty");

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url,
            retries: retries.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn headers(session: &Session) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = session.token() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .context("session token is not a valid header value")?,
            );
        }
        Ok(headers)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        session: &Session,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .headers(Self::headers(session)?);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("backend request failed: {method} {path}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read backend response body")?;

        if !status.is_success() {
            return Err(BackendError::from_response(status, &text).into());
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("backend response is not valid JSON: {text}"))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: &Session,
        body: Option<Value>,
    ) -> Result<T> {
        let raw = self.send_once(method, path, session, &[], body.as_ref()).await?;
        decode(path, raw)
    }

    /// GET with exponential backoff on transport errors, 429 and 5xx.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.send_once(Method::GET, path, session, query, None).await {
                Ok(raw) => return decode(path, raw),
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(attempt, ?backoff, path, error = %err, "backend GET failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<AuthResponse> {
        let body = json!({ "email": email, "username": username, "password": password });
        let res: AuthResponse = self
            .call(Method::POST, "/auth/register", &Session::anonymous(), Some(body))
            .await?;
        tracing::info!(user_id = res.user.id, username = %res.user.username, "registered");
        Ok(res)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = json!({ "email": email, "password": password });
        let res: AuthResponse = self
            .call(Method::POST, "/auth/login", &Session::anonymous(), Some(body))
            .await?;
        tracing::info!(user_id = res.user.id, "logged in");
        Ok(res)
    }

    pub async fn profile(&self, session: &Session) -> Result<User> {
        self.get("/auth/profile", session, &[]).await
    }

    /// Ends the session server-side and clears the local token.
    pub async fn logout(&self, session: &mut Session) -> Result<()> {
        let _: MessageResponse = self
            .call(Method::POST, "/auth/logout", session, None)
            .await?;
        session.clear();
        Ok(())
    }

    pub async fn watchlist(&self, session: &Session) -> Result<WatchlistResponse> {
        self.get("/watchlist", session, &[]).await
    }

    pub async fn add_to_watchlist(
        &self,
        session: &Session,
        req: &AddToWatchlistRequest,
    ) -> Result<AddedResponse> {
        let symbol = req.symbol.trim().to_ascii_uppercase();
        anyhow::ensure!(!symbol.is_empty(), "symbol must be non-empty");
        let body = to_body(&AddToWatchlistRequest {
            symbol,
            stock_type: req.stock_type,
        })?;
        self.call(Method::POST, "/watchlist", session, Some(body)).await
    }

    pub async fn remove_from_watchlist(&self, session: &Session, id: i64) -> Result<MessageResponse> {
        self.call(Method::DELETE, &format!("/watchlist/{id}"), session, None)
            .await
    }

    pub async fn bind_strategy(
        &self,
        session: &Session,
        symbol: &str,
        strategy_unique_key: &str,
    ) -> Result<MessageResponse> {
        let body = to_body(&BindStrategyRequest {
            symbol,
            strategy_unique_key,
        })?;
        self.call(Method::POST, "/watchlist/bind", session, Some(body))
            .await
    }

    pub async fn public_predictions(&self, session: &Session) -> Result<PublicPredictionResponse> {
        let res: PublicPredictionResponse = self.get(PUBLIC_PREDICTIONS_PATH, session, &[]).await?;
        tracing::debug!(items = res.items.len(), count = res.count, "fetched public predictions");
        Ok(res)
    }

    pub async fn save_strategy(&self, session: &Session, params: &StrategyParams) -> Result<SavedStrategy> {
        params.validate()?;
        let body = to_body(params)?;
        self.call(Method::POST, "/strategy/params", session, Some(body))
            .await
    }

    pub async fn strategy(&self, session: &Session, unique_key: &str) -> Result<StrategyParams> {
        self.get(
            "/strategy/params/by-unique",
            session,
            &[("unique_key", unique_key.to_string())],
        )
        .await
    }

    pub async fn strategies(&self, session: &Session) -> Result<StrategyList> {
        self.get("/strategy/list", session, &[]).await
    }

    pub async fn batch_latest_quotes(&self, session: &Session, symbols: &[String]) -> Result<QuotesResponse> {
        anyhow::ensure!(!symbols.is_empty(), "at least one symbol is required");
        let body = json!({ "symbols": symbols });
        self.call(Method::POST, "/quotes/batch-latest", session, Some(body))
            .await
    }

    pub async fn lookup_stock(&self, session: &Session, symbol: &str, stock_type: i32) -> Result<StockLookup> {
        self.get(
            "/stocks/lookup",
            session,
            &[
                ("symbol", symbol.to_string()),
                ("stock_type", stock_type.to_string()),
            ],
        )
        .await
    }

    pub fn market_status(&self) -> MarketStatus {
        MarketStatus::snapshot()
    }
}

#[async_trait::async_trait]
impl PredictionSource for FintrackClient {
    fn source_name(&self) -> &'static str {
        "fintrack_http"
    }

    async fn public_predictions(&self, session: &Session) -> Result<PublicPredictionResponse> {
        FintrackClient::public_predictions(self, session).await
    }
}

fn to_body<T: Serialize>(v: &T) -> Result<Value> {
    serde_json::to_value(v).context("failed to serialize request body")
}

fn decode<T: DeserializeOwned>(path: &str, raw: Value) -> Result<T> {
    serde_json::from_value::<T>(raw)
        .with_context(|| format!("failed to decode backend response for {path}"))
}

/// 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_EXP))
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(backend) = err.downcast_ref::<BackendError>() {
        return backend.is_retryable();
    }
    err.chain().any(|cause| cause.is::<reqwest::Error>())
}
