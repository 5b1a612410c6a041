//! Source Detector (C7): scores provider relevance for a query via a fast
//! keyword path, refined by the `Reasoner` when that path is inconclusive.

use std::{collections::HashMap, sync::Arc};

use conflux_common::Result;
use conflux_connector::Provider;
use conflux_reasoner::{ProviderRelevance, Reasoner};

const CONFIDENCE_THRESHOLD: f64 = 0.5;
const MIN_CONFIDENT_CANDIDATES: usize = 2;

/// A provider's weighted keyword set: matching a keyword contributes its
/// weight to the provider's fast-path confidence, capped at 1.0.
pub type KeywordTable = HashMap<String, Vec<(String, f64)>>;

/// Default keyword sets for the closed provider-id set named in the data
/// model (tickets, chat, object-store, mail, db, code-host, shop).
#[must_use]
pub fn default_keyword_table() -> KeywordTable {
    let sets: [(&str, &[(&str, f64)]); 7] = [
        ("tickets", &[("ticket", 0.5), ("issue", 0.4), ("bug", 0.3), ("project", 0.2)]),
        ("chat", &[("message", 0.5), ("chat", 0.5), ("channel", 0.3), ("thread", 0.2)]),
        ("object-store", &[("file", 0.4), ("upload", 0.4), ("bucket", 0.4), ("document", 0.3)]),
        ("mail", &[("email", 0.5), ("mail", 0.5), ("inbox", 0.4), ("send", 0.2)]),
        ("db", &[("database", 0.5), ("query", 0.3), ("table", 0.4), ("row", 0.2)]),
        ("code-host", &[("repo", 0.5), ("commit", 0.4), ("pull request", 0.5), ("branch", 0.3)]),
        ("shop", &[("order", 0.5), ("product", 0.4), ("cart", 0.4), ("purchase", 0.3)]),
    ];
    sets.into_iter().map(|(id, kws)| (id.to_string(), kws.iter().map(|(k, w)| (k.to_string(), *w)).collect())).collect()
}

/// Scores provider relevance for a natural-language query.
pub struct Detector {
    reasoner: Arc<dyn Reasoner>,
    keyword_table: KeywordTable,
}

impl Detector {
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>, keyword_table: KeywordTable) -> Self {
        Self { reasoner, keyword_table }
    }

    #[must_use]
    pub fn with_default_keywords(reasoner: Arc<dyn Reasoner>) -> Self {
        Self::new(reasoner, default_keyword_table())
    }

    fn fast_path(&self, query: &str, providers: &[Provider]) -> Vec<ProviderRelevance> {
        let lowercase_query = query.to_lowercase();
        providers
            .iter()
            .filter_map(|provider| {
                let keywords = self.keyword_table.get(&provider.id)?;
                let matched: Vec<&str> = keywords
                    .iter()
                    .filter(|(term, _)| lowercase_query.contains(term.as_str()))
                    .map(|(term, _)| term.as_str())
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                let confidence: f64 =
                    keywords.iter().filter(|(term, _)| matched.contains(&term.as_str())).map(|(_, w)| w).sum::<f64>().min(1.0);
                Some(ProviderRelevance {
                    provider_id: provider.id.clone(),
                    confidence,
                    reasoning: format!("matched terms {{{}}}", matched.join(", ")),
                    suggested_approach: "direct tool lookup".to_string(),
                })
            })
            .collect()
    }

    /// Score every provider in `providers`, ordered by descending confidence.
    pub async fn detect(&self, query: &str, providers: &[Provider]) -> Result<Vec<ProviderRelevance>> {
        let mut scored = self.fast_path(query, providers);
        let confident_candidates = scored.iter().filter(|r| r.confidence >= CONFIDENCE_THRESHOLD).count();

        if confident_candidates < MIN_CONFIDENT_CANDIDATES {
            tracing::debug!(confident_candidates, "fast path inconclusive, invoking reasoner.rank");
            let refined = self.reasoner.rank(query, providers).await?;
            let mut by_provider: HashMap<String, ProviderRelevance> = HashMap::new();
            for relevance in scored.into_iter().chain(refined) {
                by_provider
                    .entry(relevance.provider_id.clone())
                    .and_modify(|existing| {
                        if relevance.confidence > existing.confidence {
                            *existing = relevance.clone();
                        }
                    })
                    .or_insert(relevance);
            }
            scored = by_provider.into_values().collect();
        }

        let priority_of: HashMap<&str, i32> = providers.iter().map(|p| (p.id.as_str(), p.priority)).collect();
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| priority_of.get(b.provider_id.as_str()).cmp(&priority_of.get(a.provider_id.as_str())))
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        Ok(scored)
    }

    /// True when at least two providers score at or above the confidence
    /// threshold.
    pub async fn detect_if_multi_source(&self, query: &str, providers: &[Provider]) -> Result<bool> {
        let ranked = self.detect(query, providers).await?;
        Ok(ranked.iter().filter(|r| r.confidence >= CONFIDENCE_THRESHOLD).count() >= MIN_CONFIDENT_CANDIDATES)
    }
}
