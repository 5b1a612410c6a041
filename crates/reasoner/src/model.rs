use serde::Serialize;
use serde_json::Value;

/// A tool invocation the reasoner wants executed, mirroring the shape of a
/// provider-native function call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One already-executed tool call and its outcome, fed back to the reasoner
/// on the next turn of the tool-use loop.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub output: Value,
    pub succeeded: bool,
    /// `true` when `output` came from the gateway's results cache rather
    /// than a live connector call (P3).
    pub cached: bool,
}

/// A single turn in the bounded history window passed to `select_tools`.
#[derive(Debug, Clone)]
pub enum HistoryTurn {
    ToolCalls(Vec<ToolCall>),
    ToolResults(Vec<ToolResult>),
}

/// What the reasoner decided to do this turn of the tool-use loop.
#[derive(Debug, Clone)]
pub enum ToolUseStep {
    /// Execute these tool calls and feed the results back on the next turn.
    ToolCalls(Vec<ToolCall>),
    /// The reasoner is done; this is the leg's final summary.
    FinalAnswer(String),
}

/// A provider's scored relevance to a query, produced by `Reasoner::rank`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRelevance {
    pub provider_id: String,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_approach: String,
}
