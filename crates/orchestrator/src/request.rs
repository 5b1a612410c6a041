use conflux_common::{Error, Result};

const MAX_QUERY_CHARS: usize = 100_000;

/// Input to [`crate::Orchestrator::process`] / [`crate::Orchestrator::stream`] (§3).
#[derive(Debug, Clone)]
pub struct MultiSourceRequest {
    pub query: String,
    pub sources: Option<Vec<String>>,
    pub session_id: Option<String>,
    pub confidence_threshold: f64,
    pub max_sources: usize,
    pub include_plan: bool,
}

impl Default for MultiSourceRequest {
    fn default() -> Self {
        Self { query: String::new(), sources: None, session_id: None, confidence_threshold: 0.5, max_sources: 3, include_plan: false }
    }
}

impl MultiSourceRequest {
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation_field("query must not be empty", "query"));
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::validation_field(format!("query exceeds {MAX_QUERY_CHARS} characters"), "query"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::validation_field("confidence_threshold must be in [0, 1]", "confidence_threshold"));
        }
        if !(1..=5).contains(&self.max_sources) {
            return Err(Error::validation_field("max_sources must be in [1, 5]", "max_sources"));
        }
        if let Some(sources) = &self.sources {
            if sources.is_empty() {
                return Err(Error::validation_field("sources must be non-empty when provided", "sources"));
            }
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_with_a_query_is_valid() {
        let request = MultiSourceRequest { query: "status of my tickets".to_string(), ..Default::default() };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_query_is_rejected() {
        let request = MultiSourceRequest { query: "   ".to_string(), ..Default::default() };
        assert_eq!(request.validate().unwrap_err().code(), conflux_common::ErrorCode::ValidationError);
    }

    #[test]
    fn max_sources_out_of_range_is_rejected() {
        let request = MultiSourceRequest { query: "q".to_string(), max_sources: 6, ..Default::default() };
        assert_eq!(request.validate().unwrap_err().code(), conflux_common::ErrorCode::ValidationError);
    }

    #[test]
    fn confidence_threshold_out_of_range_is_rejected() {
        let request = MultiSourceRequest { query: "q".to_string(), confidence_threshold: 1.5, ..Default::default() };
        assert_eq!(request.validate().unwrap_err().code(), conflux_common::ErrorCode::ValidationError);
    }
}
