//! Agent profiles and prompt builders.
//!
//! Intermediate results stay typed until they are rendered here; JSON only
//! appears inside the text handed to the gateway.

use crate::{
    AgentProfile, ConversationTurn, Error, QueryFailure, QueryFinding, ResearchFinding, Result,
};

pub const WEB_SEARCH_ASSISTANT: AgentProfile = AgentProfile {
    name: "WebSearchAssistant",
    instructions: "You are an advanced search assistant powered by web search capabilities.
You can help users find accurate, up-to-date information from the web.

When searching:
- Be thorough and provide comprehensive answers
- Always cite your sources with URLs when available
- Provide context and explanations for your findings
- If information is uncertain or conflicting, mention multiple perspectives
- Focus on recent and authoritative sources when possible

Your goal is to provide helpful, accurate, and well-sourced information.",
};

pub const CHAT_ASSISTANT: AgentProfile = AgentProfile {
    name: "ChatAssistant",
    instructions: "You are a helpful assistant. Provide clear, accurate, \
and helpful responses based on your knowledge.",
};

pub const QUERY_GENERATOR: AgentProfile = AgentProfile {
    name: "QueryGenerator",
    instructions: "Generate focused search queries for research.",
};

/// Folds prior turns into a single prompt. An empty history yields `message` as is.
pub fn chat_prompt(message: &str, history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return message.to_string();
    }
    let context = history
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Conversation history:\n{context}\n\nCurrent message: {message}")
}

fn evidence_json<T: serde::Serialize>(items: &[T]) -> Result<String> {
    serde_json::to_string_pretty(items).map_err(|e| Error::Json(e.to_string()))
}

fn unanswered_block(failed: &[QueryFailure]) -> String {
    if failed.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "\nThe following queries could not be answered and have no findings above. \
Say so explicitly where they matter:\n",
    );
    for f in failed {
        out.push_str("- ");
        out.push_str(&f.query);
        out.push('\n');
    }
    out
}

pub fn synthesis_prompt(findings: &[QueryFinding], failed: &[QueryFailure]) -> Result<String> {
    let evidence = evidence_json(findings)?;
    let unanswered = unanswered_block(failed);
    Ok(format!(
        "Based on the following search results for multiple queries,
provide a comprehensive synthesis that addresses all queries:

{evidence}
{unanswered}
Provide a well-organized response that:
1. Addresses each query
2. Identifies common themes and connections
3. Highlights any contradictions or different perspectives
4. Provides a cohesive summary"
    ))
}

pub fn query_generation_prompt(topic: &str, count: usize) -> String {
    format!(
        "Generate {count} specific search queries to thoroughly research the topic: \"{topic}\".

The queries should cover:
- Overview and definition
- Current state and recent developments
- Key applications or implications
- Expert opinions or authoritative sources
- Future trends or predictions (if applicable)

Return only the queries, one per line."
    )
}

/// One query per non-blank line, trimmed. Duplicates and count mismatches are kept.
pub fn parse_generated_queries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn report_prompt(
    topic: &str,
    findings: &[ResearchFinding],
    failed: &[QueryFailure],
) -> Result<String> {
    let evidence = evidence_json(findings)?;
    let unanswered = unanswered_block(failed);
    Ok(format!(
        "Based on the following research findings about \"{topic}\",
create a comprehensive research report:

{evidence}
{unanswered}
Structure your report with:
1. Executive Summary
2. Detailed Findings (organized by theme)
3. Key Insights and Implications
4. Sources and References
5. Conclusion

Make it thorough, well-organized, and properly cited."
    ))
}
