pub mod client;
pub mod error;
pub mod session;
pub mod types;

use crate::domain::prediction::PublicPredictionResponse;
use session::Session;

/// Source of prediction bundles. The HTTP client is the production implementation.
#[async_trait::async_trait]
pub trait PredictionSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn public_predictions(&self, session: &Session)
        -> anyhow::Result<PublicPredictionResponse>;
}
