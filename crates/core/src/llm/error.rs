use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Failure that keeps the model's raw output around for debugging.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    /// Why the model stopped generating (`STOP`, `MAX_TOKENS`, `SAFETY`, ...), when known.
    pub finish_reason: Option<String>,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AI prediction error (provider={:?}, stage={}",
            self.provider, self.stage
        )?;
        if let Some(reason) = &self.finish_reason {
            write!(f, ", finish_reason={reason}")?;
        }
        write!(f, "): {}", self.detail)
    }
}

impl std::error::Error for LlmDiagnosticsError {}
