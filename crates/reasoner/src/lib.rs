//! Abstract LLM client behind the `Reasoner` trait (C6), plus one concrete,
//! dependency-free implementation used until a provider-backed reasoner is
//! wired in.

pub mod model;
pub mod rule_based;
pub mod traits;

pub use model::{HistoryTurn, ProviderRelevance, ToolCall, ToolResult, ToolUseStep};
pub use rule_based::RuleBasedReasoner;
pub use traits::Reasoner;
