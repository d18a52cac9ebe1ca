use crate::config::{env_or, Settings};
use crate::domain::stock::AiPrediction;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{clean_symbols, PredictionModel, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const REPAIR_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = env_or("GEMINI_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS);
        let timeout_secs = env_or("GEMINI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }

    async fn generate_content(
        &self,
        req: GenerateContentRequest,
    ) -> anyhow::Result<(serde_json::Value, GenerateContentResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}"),
                finish_reason: None,
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "predictions": {
                    "type": "ARRAY",
                    "description": "An array of stock predictions.",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "symbol": {"type": "STRING", "description": "The stock ticker symbol."},
                            "predicted_high": {
                                "type": "NUMBER",
                                "description": "The predicted high price for the next trading period."
                            },
                            "predicted_low": {
                                "type": "NUMBER",
                                "description": "The predicted low price for the next trading period."
                            },
                            "confidence": {
                                "type": "NUMBER",
                                "description": "A confidence score for the prediction, from 0 to 100."
                            },
                            "sentiment": {
                                "type": "STRING",
                                "description": "The overall market sentiment for the stock.",
                                "enum": ["Bullish", "Bearish", "Neutral"]
                            },
                            "analysis": {
                                "type": "STRING",
                                "description": "A brief, one-sentence analysis supporting the prediction."
                            }
                        },
                        "required": ["symbol", "predicted_high", "predicted_low", "confidence", "sentiment", "analysis"]
                    }
                }
            },
            "required": ["predictions"]
        })
    }

    fn user_prompt(symbols: &[String]) -> String {
        format!(
            "Analyze the following stock symbols: {}.\n\
For each stock, provide a financial prediction for the next trading period.\n\
Include a predicted high price, predicted low price, a confidence score (0-100), \
market sentiment (Bullish, Bearish, or Neutral), and a brief one-sentence analysis.\n\
Do not use markdown.",
            symbols.join(", ")
        )
    }

    fn repair_prompt(symbols: &[String], previous_output: &str) -> String {
        format!(
            "Your previous message did NOT match the required JSON schema.\n\n\
TASK: Output ONLY a single JSON object of the form {{\"predictions\": [...]}}.\n\
- One entry per symbol: {}.\n\
- Each entry MUST include keys: symbol, predicted_high, predicted_low, confidence, sentiment, analysis.\n\
- confidence MUST be a number between 0 and 100.\n\
- sentiment MUST be one of Bullish, Bearish, Neutral.\n\
- No markdown, prose, or code fences.\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}",
            symbols.join(", ")
        )
    }

    fn request(&self, prompt: String, max_output_tokens: u32) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: Self::response_schema(),
                max_output_tokens,
            },
        }
    }

    fn response_text(res: &GenerateContentResponse) -> anyhow::Result<String> {
        let candidate = res
            .candidates
            .first()
            .context("Gemini response has no candidates")?;
        let text = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "empty_candidate",
                detail: "Gemini candidate has no text".to_string(),
                finish_reason: candidate.finish_reason.clone(),
                raw_output: None,
                raw_response_json: None,
            }
            .into());
        }
        Ok(text)
    }

    fn finish_reason(res: &GenerateContentResponse) -> Option<String> {
        res.candidates.first().and_then(|c| c.finish_reason.clone())
    }

    fn hit_token_limit(res: &GenerateContentResponse) -> bool {
        Self::finish_reason(res).as_deref() == Some("MAX_TOKENS")
    }

    async fn parse_with_repairs(
        &self,
        symbols: &[String],
        initial_text: String,
        initial_raw_json: serde_json::Value,
        initial_finish_reason: Option<String>,
    ) -> anyhow::Result<BTreeMap<String, AiPrediction>> {
        let first_err = match json::parse_predictions(&initial_text) {
            Ok(out) => return Ok(out),
            Err(err) => err,
        };

        let mut last_err = first_err;
        let mut last_text = initial_text;
        let mut last_raw_json = initial_raw_json;
        let mut last_finish_reason = initial_finish_reason;

        for attempt in 1..=REPAIR_ATTEMPTS {
            let req = self.request(
                Self::repair_prompt(symbols, &last_text),
                self.max_output_tokens,
            );
            let (raw_json, res) = self.generate_content(req).await?;
            let text = Self::response_text(&res).unwrap_or_default();
            match json::parse_predictions(&text) {
                Ok(out) => return Ok(out),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Gemini output still invalid after repair attempt");
                    last_err = err;
                    last_text = text;
                    last_raw_json = raw_json;
                    last_finish_reason = Self::finish_reason(&res);
                }
            }
        }

        Err(LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage: "parse_after_repair",
            detail: format!("final_error={last_err}"),
            finish_reason: last_finish_reason,
            raw_output: Some(last_text),
            raw_response_json: Some(last_raw_json),
        }
        .into())
    }
}

#[async_trait::async_trait]
impl PredictionModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn predict(&self, symbols: &[String]) -> anyhow::Result<BTreeMap<String, AiPrediction>> {
        let symbols = clean_symbols(symbols);
        if symbols.is_empty() {
            return Ok(BTreeMap::new());
        }

        let prompt = Self::user_prompt(&symbols);
        let (mut raw_json, mut res) = self
            .generate_content(self.request(prompt.clone(), self.max_output_tokens))
            .await?;

        if Self::hit_token_limit(&res) {
            let bumped = self.max_output_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                from = self.max_output_tokens,
                to = bumped,
                "Gemini finish_reason=MAX_TOKENS; retrying once with higher limit"
            );
            let (rj, r) = self.generate_content(self.request(prompt, bumped)).await?;
            raw_json = rj;
            res = r;
        }

        let text = Self::response_text(&res)?;
        let out = self
            .parse_with_repairs(&symbols, text, raw_json, Self::finish_reason(&res))
            .await?;

        let missing: Vec<&str> = symbols
            .iter()
            .filter(|s| !out.contains_key(*s))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "Gemini skipped some symbols");
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
