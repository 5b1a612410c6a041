use std::pin::Pin;

use async_trait::async_trait;
use conflux_common::Result;
use conflux_connector::{Provider, ToolDescriptor};
use tokio_stream::Stream;

use crate::model::{HistoryTurn, ProviderRelevance, ToolUseStep};

/// Abstract LLM client behind the three capability modes the core depends
/// on. Side-effect-free with respect to core state — callers log
/// tokens-in/tokens-out and latency per call themselves.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Score each of `known_providers` against `query`. Used by the source
    /// detector as a refinement step when fast-path keyword scoring is
    /// inconclusive.
    async fn rank(&self, query: &str, known_providers: &[Provider]) -> Result<Vec<ProviderRelevance>>;

    /// One turn of the tool-use loop: given the tools exposed by a single
    /// provider and the history so far, decide whether to call more tools
    /// or produce the terminal answer. The caller (the fan-out executor)
    /// owns the iteration bound and loop-fault guard.
    async fn select_tools(&self, query: &str, tools: &[ToolDescriptor], history: &[HistoryTurn]) -> Result<ToolUseStep>;

    /// Stream the synthesised answer built from `instruction` (which already
    /// embeds the per-source summaries). Each stream item is a text chunk.
    fn synthesize(&self, instruction: &str) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + '_>>;
}
