use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod orchestrator;
pub mod prompts;

pub use orchestrator::{Orchestrator, OrchestratorConfig};

/// Name reported in response metadata for the hosted search tool.
pub const WEB_SEARCH_TOOL: &str = "web_search";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("provider timed out: {0}")]
    Timeout(String),
    #[error("provider rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("json error: {0}")]
    Json(String),
    #[error("provider failed: {0}")]
    Provider(String),
}

impl Error {
    /// Coarse classification used in response envelopes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::ProviderTimeout,
            Self::Rejected { .. } => ErrorKind::ProviderRejected,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotConfigured(_) | Self::Transport(_) | Self::Json(_) | Self::Provider(_) => {
                ErrorKind::Unknown
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of failure kinds surfaced to API clients as `error_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ProviderTimeout,
    ProviderRejected,
    InvalidArgument,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderTimeout => "ProviderTimeout",
            Self::ProviderRejected => "ProviderRejected",
            Self::InvalidArgument => "InvalidArgument",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much retrieved evidence the hosted search tool folds into one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSize {
    Low,
    #[default]
    Medium,
    High,
}

impl ContextSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ContextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::InvalidArgument(format!(
                "unknown context size {other:?} (allowed: low, medium, high)"
            ))),
        }
    }
}

/// Research breadth: how many sub-queries to generate and at which context tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Basic,
    #[default]
    Detailed,
    Comprehensive,
}

impl ResearchDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }

    pub fn query_count(self) -> usize {
        match self {
            Self::Basic => 3,
            Self::Detailed => 5,
            Self::Comprehensive => 7,
        }
    }

    pub fn context_size(self) -> ContextSize {
        match self {
            Self::Basic => ContextSize::Low,
            Self::Detailed => ContextSize::Medium,
            Self::Comprehensive => ContextSize::High,
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single search request: the query and an optional tier override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub context_size: Option<ContextSize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_size: None,
        }
    }
}

fn default_role() -> String {
    "user".to_string()
}

/// One prior message in a chat. Roles are free-form labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A tool declared on a single gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    WebSearch { context_size: ContextSize },
}

/// Instructions and a display name sent along with a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: &'static str,
    pub instructions: &'static str,
}

/// Everything one gateway invocation needs, including its tool settings.
/// Gateways hold no per-call state of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub agent: AgentProfile,
    pub input: String,
    pub tools: Vec<Tool>,
}

impl GatewayCall {
    pub fn new(agent: AgentProfile, input: impl Into<String>) -> Self {
        Self {
            agent,
            input: input.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_web_search(mut self, context_size: ContextSize) -> Self {
        self.tools.push(Tool::WebSearch { context_size });
        self
    }

    /// Context tier of the declared web search tool, if any.
    pub fn web_search_context(&self) -> Option<ContextSize> {
        self.tools.iter().find_map(|t| match t {
            Tool::WebSearch { context_size } => Some(*context_size),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
    pub tokens_used: Option<u64>,
}

/// The remote model with its hosted tools. Implementations must be safe to share
/// across concurrent requests.
#[async_trait::async_trait]
pub trait ModelGateway: Send + Sync {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn respond(&self, call: &GatewayCall) -> Result<GatewayReply>;
}

/// An operation failure, carried as data rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub error: String,
    pub error_type: ErrorKind,
}

impl Failure {
    pub fn new(error_type: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_type,
        }
    }
}

impl From<&Error> for Failure {
    fn from(e: &Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}

/// Result of one orchestrator operation: exactly one of success or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, Failure> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(f) => Err(f),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(r: Result<T>) -> Self {
        match r {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMetadata {
    pub model: String,
    pub search_context_size: ContextSize,
    pub tokens_used: Option<u64>,
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchAnswer {
    pub query: String,
    pub response: String,
    pub metadata: SearchMetadata,
}

pub type SearchResult = Outcome<SearchAnswer>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMetadata {
    pub model: String,
    pub search_enabled: bool,
    pub tokens_used: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub response: String,
    /// Always `None`: no conversation state is kept between requests.
    pub conversation_id: Option<String>,
    pub metadata: ChatMetadata,
}

/// Evidence item fed into a multi-query synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFinding {
    pub query: String,
    pub response: String,
}

/// Evidence item fed into a research report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFinding {
    pub query: String,
    pub findings: String,
}

/// A sub-query that could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub query: String,
    pub error: String,
    pub error_type: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiQueryMetadata {
    pub model: String,
    pub num_queries: usize,
    pub num_succeeded: usize,
    pub num_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiQueryReport {
    pub queries: Vec<String>,
    pub individual_results: Vec<QueryFinding>,
    pub failed_queries: Vec<QueryFailure>,
    /// True when at least one sub-query failed and was left out of the synthesis.
    pub partial: bool,
    pub synthesis: String,
    pub metadata: MultiQueryMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchMetadata {
    pub model: String,
    pub context_size: ContextSize,
    pub num_queries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchReport {
    pub topic: String,
    pub depth: ResearchDepth,
    pub research_queries: Vec<String>,
    pub findings: Vec<ResearchFinding>,
    pub failed_queries: Vec<QueryFailure>,
    pub partial: bool,
    pub report: String,
    pub metadata: ResearchMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_classified_not_stringly_typed() {
        assert_eq!(
            Error::Timeout("deadline".into()).kind(),
            ErrorKind::ProviderTimeout
        );
        assert_eq!(
            Error::Rejected {
                status: 429,
                message: "slow down".into()
            }
            .kind(),
            ErrorKind::ProviderRejected
        );
        assert_eq!(
            Error::InvalidArgument("bad".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::Json("eof".into()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn failure_from_error_keeps_message_and_kind() {
        let f = Failure::from(Error::Timeout("after 10ms".into()));
        assert_eq!(f.error_type, ErrorKind::ProviderTimeout);
        assert!(f.error.contains("after 10ms"), "error={}", f.error);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["error_type"].as_str(), Some("ProviderTimeout"));
    }

    #[test]
    fn depth_maps_to_query_count_and_tier() {
        assert_eq!(ResearchDepth::Basic.query_count(), 3);
        assert_eq!(ResearchDepth::Basic.context_size(), ContextSize::Low);
        assert_eq!(ResearchDepth::Detailed.query_count(), 5);
        assert_eq!(ResearchDepth::Detailed.context_size(), ContextSize::Medium);
        assert_eq!(ResearchDepth::Comprehensive.query_count(), 7);
        assert_eq!(ResearchDepth::Comprehensive.context_size(), ContextSize::High);
        assert_eq!(ResearchDepth::default(), ResearchDepth::Detailed);
    }

    #[test]
    fn context_size_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!("HIGH".parse::<ContextSize>().unwrap(), ContextSize::High);
        assert_eq!(" low ".parse::<ContextSize>().unwrap(), ContextSize::Low);
        let e = "huge".parse::<ContextSize>().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn search_query_tier_is_optional() {
        let q: SearchQuery = serde_json::from_str(r#"{"query":"rust"}"#).unwrap();
        assert_eq!(q, SearchQuery::new("rust"));
        let q: SearchQuery =
            serde_json::from_str(r#"{"query":"rust","context_size":"high"}"#).unwrap();
        assert_eq!(q.context_size, Some(ContextSize::High));
        assert!(serde_json::from_str::<SearchQuery>(r#"{"query":"q","context_size":"huge"}"#).is_err());
    }

    #[test]
    fn conversation_turn_defaults_missing_fields() {
        let t: ConversationTurn = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(t.role, "user");
        let t: ConversationTurn = serde_json::from_str(r#"{"role":"assistant"}"#).unwrap();
        assert_eq!(t.content, "");
    }

    #[test]
    fn gateway_call_reports_declared_search_tier() {
        let agent = AgentProfile {
            name: "t",
            instructions: "",
        };
        assert_eq!(GatewayCall::new(agent, "q").web_search_context(), None);
        assert_eq!(
            GatewayCall::new(agent, "q")
                .with_web_search(ContextSize::High)
                .web_search_context(),
            Some(ContextSize::High)
        );
    }
}
