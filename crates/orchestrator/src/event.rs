use chrono::Utc;
use conflux_common::Error;
use serde::Serialize;
use serde_json::Value;

/// Closed event-type set emitted by [`crate::Orchestrator::stream`] (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    Planning,
    PlanComplete,
    SourceStart,
    SourceComplete,
    Synthesizing,
    SynthesisChunk,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub at: chrono::DateTime<Utc>,
    pub message: Option<String>,
    pub data: Value,
}

impl Event {
    pub(crate) fn new(event_type: EventType, message: Option<String>, data: Value) -> Self {
        Self { event_type, at: Utc::now(), message, data }
    }

    pub(crate) fn plain(event_type: EventType) -> Self {
        Self::new(event_type, None, Value::Null)
    }

    pub(crate) fn error(error: &Error) -> Self {
        Self::new(EventType::Error, Some(error.to_string()), serde_json::json!({ "code": error.code().as_str(), "message": error.to_string() }))
    }

    /// Transport-initiated cancellation, surfaced as a generic internal error
    /// per §4.11 ("if the caller's transport closes... `error` is emitted").
    pub(crate) fn cancelled() -> Self {
        Self::new(
            EventType::Error,
            Some("cancelled".to_string()),
            serde_json::json!({ "code": "INTERNAL_ERROR", "message": "cancelled" }),
        )
    }
}
