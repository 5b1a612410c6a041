//! A deterministic, keyword-driven `Reasoner`. Stands in for an LLM-backed
//! implementation: same trait boundary, no network dependency, fully
//! testable. Grounds the direct-routing tier an LLM-backed reasoner would
//! fall back past when its own confidence is low.

use std::pin::Pin;

use async_trait::async_trait;
use conflux_common::Result;
use conflux_connector::{Provider, ToolDescriptor};
use tokio_stream::Stream;

use crate::{
    model::{HistoryTurn, ProviderRelevance, ToolCall, ToolUseStep},
    traits::Reasoner,
};

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_string).collect()
}

fn overlap_score(query_tokens: &[String], candidate: &str) -> f64 {
    let candidate_tokens = tokenize(candidate);
    if candidate_tokens.is_empty() {
        return 0.0;
    }
    let matches = query_tokens.iter().filter(|t| candidate_tokens.contains(t)).count();
    matches as f64 / candidate_tokens.len().max(query_tokens.len()) as f64
}

#[derive(Debug, Default)]
pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Best-matching property name in `input_schema.properties` to hold the
    /// query text, preferring common names and otherwise the first string
    /// property declared.
    fn query_argument_key(schema: &serde_json::Value) -> Option<String> {
        let properties = schema.get("properties")?.as_object()?;
        for candidate in ["query", "q", "search", "text"] {
            if properties.contains_key(candidate) {
                return Some(candidate.to_string());
            }
        }
        properties.keys().next().cloned()
    }
}

#[async_trait]
impl Reasoner for RuleBasedReasoner {
    async fn rank(&self, query: &str, known_providers: &[Provider]) -> Result<Vec<ProviderRelevance>> {
        let query_tokens = tokenize(query);
        let mut ranked: Vec<ProviderRelevance> = known_providers
            .iter()
            .map(|provider| {
                let score = overlap_score(&query_tokens, &format!("{} {}", provider.id, provider.display_name));
                let confidence = (0.3 + score).min(0.9);
                ProviderRelevance {
                    provider_id: provider.id.clone(),
                    confidence,
                    reasoning: if score > 0.0 {
                        format!("query terms overlap with provider '{}'", provider.id)
                    } else {
                        format!("no direct term overlap with provider '{}'", provider.id)
                    },
                    suggested_approach: "direct tool lookup".to_string(),
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    async fn select_tools(&self, query: &str, tools: &[ToolDescriptor], history: &[HistoryTurn]) -> Result<ToolUseStep> {
        if let Some(HistoryTurn::ToolResults(results)) = history.last() {
            let succeeded: Vec<_> = results.iter().filter(|r| r.succeeded).collect();
            if !succeeded.is_empty() {
                let summary = succeeded.iter().map(|r| r.output.to_string()).collect::<Vec<_>>().join("; ");
                return Ok(ToolUseStep::FinalAnswer(summary));
            }
            // Every tool call this turn failed — retry rather than finalize on an
            // error; the caller's loop-fault guard is responsible for giving up.
        }

        let Some(best) = tools.iter().max_by(|a, b| {
            let query_tokens = tokenize(query);
            overlap_score(&query_tokens, &a.description)
                .partial_cmp(&overlap_score(&query_tokens, &b.description))
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            tracing::warn!("select_tools called with no tools on offer");
            return Ok(ToolUseStep::FinalAnswer("no tools available for this provider".to_string()));
        };

        let arguments = match Self::query_argument_key(&best.input_schema) {
            Some(key) => serde_json::json!({ key: query }),
            None => serde_json::json!({}),
        };

        Ok(ToolUseStep::ToolCalls(vec![ToolCall { id: uuid::Uuid::new_v4().to_string(), name: best.name.clone(), arguments }]))
    }

    fn synthesize(&self, instruction: &str) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + '_>> {
        let words: Vec<String> = instruction.split_whitespace().map(str::to_string).collect();
        Box::pin(async_stream::stream! {
            for chunk in words.chunks(8) {
                yield Ok(format!("{} ", chunk.join(" ")));
            }
        })
    }
}
