//! Planner (C8): turns a request plus the detector's ranking into a `Plan`
//! naming which providers to query and how.

use std::{collections::HashMap, sync::Arc};

use conflux_common::{Error, Result};
use conflux_connector::Provider;
use conflux_detector::Detector;
use conflux_reasoner::ProviderRelevance;
use serde::Serialize;

/// Fallback per-provider duration estimate when C12 has no recent median yet.
const DEFAULT_ESTIMATE_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub query: String,
    pub ranked: Vec<ProviderRelevance>,
    pub chosen: Vec<String>,
    pub mode: ExecutionMode,
    pub reasoning: String,
    pub estimated_ms: u64,
}

/// The subset of a `Multi-Source Request` the planner needs.
pub struct PlanInput<'a> {
    pub query: &'a str,
    pub sources: Option<&'a [String]>,
    pub confidence_threshold: f64,
    pub max_sources: usize,
}

pub struct Planner {
    detector: Arc<Detector>,
}

impl Planner {
    #[must_use]
    pub fn new(detector: Arc<Detector>) -> Self {
        Self { detector }
    }

    /// Build a `Plan`. `configured_providers` is the principal's set of
    /// providers with credentials on file; `recent_medians_ms` feeds the
    /// estimate and is normally sourced from C12's per-provider histograms.
    pub async fn plan(&self, input: PlanInput<'_>, configured_providers: &[Provider], recent_medians_ms: &HashMap<String, u64>) -> Result<Plan> {
        let ranked = self.detector.detect(input.query, configured_providers).await?;

        let (chosen, reasoning) = match input.sources {
            Some(requested) => {
                let known: std::collections::HashSet<&str> = configured_providers.iter().map(|p| p.id.as_str()).collect();
                let mut chosen = Vec::with_capacity(requested.len());
                for provider_id in requested {
                    if !known.contains(provider_id.as_str()) {
                        return Err(Error::invalid_provider(provider_id.clone()));
                    }
                    chosen.push(provider_id.clone());
                }
                (chosen, "explicit sources requested by caller".to_string())
            },
            None => {
                let chosen: Vec<String> = ranked
                    .iter()
                    .filter(|r| r.confidence >= input.confidence_threshold)
                    .take(input.max_sources)
                    .map(|r| r.provider_id.clone())
                    .collect();
                let reasoning =
                    format!("selected {} provider(s) scoring at or above confidence {:.2}", chosen.len(), input.confidence_threshold);
                (chosen, reasoning)
            },
        };

        if chosen.is_empty() {
            return Err(Error::validation("no providers matched this query above the confidence threshold"));
        }

        let estimated_ms =
            chosen.iter().map(|id| recent_medians_ms.get(id.as_str()).copied().unwrap_or(DEFAULT_ESTIMATE_MS)).max().unwrap_or(0);

        Ok(Plan { query: input.query.to_string(), ranked, chosen, mode: ExecutionMode::Parallel, reasoning, estimated_ms })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use conflux_reasoner::RuleBasedReasoner;

    use super::*;

    fn provider(id: &str) -> Provider {
        Provider { id: id.to_string(), display_name: id.to_string(), enabled: true, priority: 0 }
    }

    fn planner() -> Planner {
        Planner::new(Arc::new(Detector::with_default_keywords(Arc::new(RuleBasedReasoner::new()))))
    }

    #[tokio::test]
    async fn explicit_sources_are_used_verbatim_in_order() {
        let providers = vec![provider("mail"), provider("tickets")];
        let input = PlanInput { query: "anything", sources: Some(&["mail".to_string(), "tickets".to_string()]), confidence_threshold: 0.5, max_sources: 3 };
        let plan = planner().plan(input, &providers, &HashMap::new()).await.unwrap();
        assert_eq!(plan.chosen, vec!["mail".to_string(), "tickets".to_string()]);
    }

    #[tokio::test]
    async fn unknown_explicit_source_is_invalid_provider_error() {
        let providers = vec![provider("mail")];
        let input = PlanInput { query: "anything", sources: Some(&["ghost".to_string()]), confidence_threshold: 0.5, max_sources: 3 };
        let err = planner().plan(input, &providers, &HashMap::new()).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::InvalidProvider);
    }

    #[tokio::test]
    async fn empty_chosen_set_is_validation_error() {
        let providers = vec![provider("mail")];
        let input = PlanInput { query: "completely unrelated text", sources: None, confidence_threshold: 0.99, max_sources: 3 };
        let err = planner().plan(input, &providers, &HashMap::new()).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn estimated_ms_takes_the_max_of_known_medians() {
        let providers = vec![provider("tickets"), provider("mail")];
        let mut medians = HashMap::new();
        medians.insert("tickets".to_string(), 800u64);
        medians.insert("mail".to_string(), 200u64);
        let input = PlanInput { query: "anything", sources: Some(&["tickets".to_string(), "mail".to_string()]), confidence_threshold: 0.5, max_sources: 3 };
        let plan = planner().plan(input, &providers, &medians).await.unwrap();
        assert_eq!(plan.estimated_ms, 800);
    }
}
