use std::time::{Duration, Instant};

use searchagent_core::{Error, GatewayCall, GatewayReply, ModelGateway, Result, Tool};
use tracing::debug;

pub mod responses;

use responses::{ApiErrorBody, ResponsesRequest, ResponsesResponse, ToolSpec};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Origin of the API, without the `/v1` suffix.
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// [`ModelGateway`] backed by `POST /v1/responses` with the hosted
/// `web_search_preview` tool.
#[derive(Debug, Clone)]
pub struct OpenAiResponsesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiResponsesClient {
    pub fn new(client: reqwest::Client, cfg: OpenAiConfig) -> Result<Self> {
        let api_key = cfg.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(Error::NotConfigured("missing OPENAI_API_KEY".to_string()));
        }
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| Error::NotConfigured(format!("invalid base url {base_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::NotConfigured(format!(
                "base url must be http(s): {base_url}"
            )));
        }
        if cfg.model.trim().is_empty() {
            return Err(Error::NotConfigured("missing model".to_string()));
        }
        Ok(Self {
            client,
            api_key,
            base_url,
            model: cfg.model.trim().to_string(),
            timeout: Duration::from_millis(cfg.timeout_ms.max(1)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_responses(&self) -> String {
        format!("{}/v1/responses", self.base_url)
    }

    fn request_for(&self, call: &GatewayCall) -> ResponsesRequest {
        ResponsesRequest {
            model: self.model.clone(),
            instructions: Some(call.agent.instructions.to_string()),
            input: call.input.clone(),
            tools: call
                .tools
                .iter()
                .map(|t| match t {
                    Tool::WebSearch { context_size } => ToolSpec::WebSearchPreview {
                        search_context_size: *context_size,
                    },
                })
                .collect(),
        }
    }

    pub async fn create_response(&self, req: &ResponsesRequest) -> Result<ResponsesResponse> {
        let t0 = Instant::now();
        let resp = self
            .client
            .post(self.endpoint_responses())
            .timeout(self.timeout)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            // Best-effort: surface the provider's own message when the body has one.
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let parsed: ResponsesResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(e.to_string())
            } else {
                Error::Json(e.to_string())
            }
        })?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            id = parsed.id.as_deref().unwrap_or("-"),
            model = parsed.model.as_deref().unwrap_or("-"),
            status = parsed.status.as_deref().unwrap_or("-"),
            "openai responses ok"
        );
        if let Some(err) = &parsed.error {
            return Err(Error::Provider(err.message.clone()));
        }
        Ok(parsed)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Transport(e.to_string())
    }
}

/// Maps a non-2xx status to an error variant; the variant decides `ErrorKind`.
pub(crate) fn status_error(status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("openai responses HTTP {status}"));
    match status {
        408 | 504 => Error::Timeout(detail),
        400 | 404 | 422 => Error::InvalidArgument(detail),
        400..=499 => Error::Rejected {
            status,
            message: detail,
        },
        _ => Error::Provider(format!("HTTP {status}: {detail}")),
    }
}

#[async_trait::async_trait]
impl ModelGateway for OpenAiResponsesClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(&self, call: &GatewayCall) -> Result<GatewayReply> {
        let req = self.request_for(call);
        let parsed = self.create_response(&req).await?;
        Ok(GatewayReply {
            text: parsed.output_text(),
            tokens_used: parsed.usage.and_then(|u| u.total_tokens),
        })
    }
}
