//! Turns structured requests into one or more gateway calls.
//!
//! Every gateway error is caught here and returned as [`Outcome::Failure`].
//! Multi-step operations run their steps sequentially.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::prompts::{self, CHAT_ASSISTANT, QUERY_GENERATOR, WEB_SEARCH_ASSISTANT};
use crate::{
    ChatMetadata, ChatReply, ContextSize, ConversationTurn, Error, Failure, GatewayCall,
    GatewayReply, ModelGateway, MultiQueryMetadata, MultiQueryReport, Outcome, QueryFailure,
    QueryFinding, ResearchDepth, ResearchFinding, ResearchMetadata, ResearchReport, Result,
    SearchAnswer, SearchMetadata, SearchResult, WEB_SEARCH_TOOL,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    /// Tier used when a request does not name one.
    pub default_context_size: ContextSize,
}

#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: OrchestratorConfig) -> Self {
        Self { gateway, config }
    }

    pub fn model(&self) -> &str {
        self.gateway.model()
    }

    pub fn provider(&self) -> &'static str {
        self.gateway.name()
    }

    pub fn default_context_size(&self) -> ContextSize {
        self.config.default_context_size
    }

    async fn call(&self, call: GatewayCall) -> Result<GatewayReply> {
        let t0 = Instant::now();
        debug!(
            agent = call.agent.name,
            web_search = ?call.web_search_context(),
            input_chars = call.input.len(),
            "gateway call"
        );
        let r = self.gateway.respond(&call).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &r {
            Ok(reply) => debug!(
                agent = call.agent.name,
                elapsed_ms,
                output_chars = reply.text.len(),
                tokens_used = ?reply.tokens_used,
                "gateway call done"
            ),
            Err(e) => warn!(
                agent = call.agent.name,
                elapsed_ms,
                kind = %e.kind(),
                error = %e,
                "gateway call failed"
            ),
        }
        r
    }

    pub async fn search(&self, query: &str, context_size: Option<ContextSize>) -> SearchResult {
        let ctx = context_size.unwrap_or(self.config.default_context_size);
        let call = GatewayCall::new(WEB_SEARCH_ASSISTANT, query).with_web_search(ctx);
        self.call(call)
            .await
            .map(|reply| SearchAnswer {
                query: query.to_string(),
                response: reply.text,
                metadata: SearchMetadata {
                    model: self.model().to_string(),
                    search_context_size: ctx,
                    tokens_used: reply.tokens_used,
                    tool: WEB_SEARCH_TOOL.to_string(),
                },
            })
            .into()
    }

    pub async fn chat(
        &self,
        message: &str,
        history: &[ConversationTurn],
        enable_search: bool,
    ) -> Outcome<ChatReply> {
        let input = prompts::chat_prompt(message, history);
        let call = if enable_search {
            GatewayCall::new(WEB_SEARCH_ASSISTANT, input)
                .with_web_search(self.config.default_context_size)
        } else {
            GatewayCall::new(CHAT_ASSISTANT, input)
        };
        self.call(call)
            .await
            .map(|reply| ChatReply {
                message: message.to_string(),
                response: reply.text,
                conversation_id: None,
                metadata: ChatMetadata {
                    model: self.model().to_string(),
                    search_enabled: enable_search,
                    tokens_used: reply.tokens_used,
                },
            })
            .into()
    }

    /// Runs `search` for each query in order. Failures are kept apart from the answers.
    async fn gather(
        &self,
        queries: &[String],
        context_size: Option<ContextSize>,
    ) -> (Vec<(String, String)>, Vec<QueryFailure>) {
        let mut answered = Vec::new();
        let mut failed = Vec::new();
        for query in queries {
            match self.search(query, context_size).await {
                Outcome::Success(a) => answered.push((a.query, a.response)),
                Outcome::Failure(f) => failed.push(QueryFailure {
                    query: query.clone(),
                    error: f.error,
                    error_type: f.error_type,
                }),
            }
        }
        if !failed.is_empty() {
            warn!(
                failed = failed.len(),
                total = queries.len(),
                "continuing with partial evidence"
            );
        }
        (answered, failed)
    }

    pub async fn multi_query_search(&self, queries: &[String]) -> Outcome<MultiQueryReport> {
        if queries.is_empty() {
            return Outcome::Failure(Failure::from(Error::InvalidArgument(
                "queries must not be empty".to_string(),
            )));
        }
        self.multi_query_inner(queries).await.into()
    }

    async fn multi_query_inner(&self, queries: &[String]) -> Result<MultiQueryReport> {
        let (answered, failed) = self.gather(queries, None).await;
        let findings: Vec<QueryFinding> = answered
            .into_iter()
            .map(|(query, response)| QueryFinding { query, response })
            .collect();

        let prompt = prompts::synthesis_prompt(&findings, &failed)?;
        let call = GatewayCall::new(WEB_SEARCH_ASSISTANT, prompt)
            .with_web_search(self.config.default_context_size);
        let synthesis = self.call(call).await?.text;

        info!(
            num_queries = queries.len(),
            num_succeeded = findings.len(),
            "multi-query synthesis done"
        );
        Ok(MultiQueryReport {
            queries: queries.to_vec(),
            metadata: MultiQueryMetadata {
                model: self.model().to_string(),
                num_queries: queries.len(),
                num_succeeded: findings.len(),
                num_failed: failed.len(),
            },
            partial: !failed.is_empty(),
            individual_results: findings,
            failed_queries: failed,
            synthesis,
        })
    }

    pub async fn research_topic(
        &self,
        topic: &str,
        depth: ResearchDepth,
    ) -> Outcome<ResearchReport> {
        self.research_inner(topic, depth).await.into()
    }

    async fn research_inner(&self, topic: &str, depth: ResearchDepth) -> Result<ResearchReport> {
        let ctx = depth.context_size();
        let wanted = depth.query_count();

        let generate = GatewayCall::new(
            QUERY_GENERATOR,
            prompts::query_generation_prompt(topic, wanted),
        );
        let queries = prompts::parse_generated_queries(&self.call(generate).await?.text);
        if queries.len() != wanted {
            debug!(wanted, got = queries.len(), "query count differs from request");
        }

        let (answered, failed) = self.gather(&queries, Some(ctx)).await;
        let findings: Vec<ResearchFinding> = answered
            .into_iter()
            .map(|(query, findings)| ResearchFinding { query, findings })
            .collect();

        let prompt = prompts::report_prompt(topic, &findings, &failed)?;
        let call = GatewayCall::new(WEB_SEARCH_ASSISTANT, prompt).with_web_search(ctx);
        let report = self.call(call).await?.text;

        info!(
            %depth,
            num_queries = queries.len(),
            num_succeeded = findings.len(),
            "research report done"
        );
        Ok(ResearchReport {
            topic: topic.to_string(),
            depth,
            metadata: ResearchMetadata {
                model: self.model().to_string(),
                context_size: ctx,
                num_queries: queries.len(),
            },
            research_queries: queries,
            findings,
            partial: !failed.is_empty(),
            failed_queries: failed,
            report,
        })
    }
}
