//! Result Synthesizer (C10): merges per-source summaries into one answer,
//! streaming tokens from the reasoner with a deterministic fallback.

use std::sync::Arc;

use conflux_executor::SourceQueryResult;
use conflux_reasoner::Reasoner;
use tokio_stream::StreamExt;

/// Per-source block size cap (spec default: 2000 chars).
const SOURCE_BLOCK_CAP: usize = 2000;

/// Fixed message used when no leg produced a usable summary.
pub const NO_RESULTS_FALLBACK: &str = "No results from configured sources for that query.";

pub struct Synthesis {
    pub text: String,
    pub used_fallback: bool,
}

pub struct Synthesizer {
    reasoner: Arc<dyn Reasoner>,
}

impl Synthesizer {
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    fn truncate_block(summary: &str) -> String {
        if summary.chars().count() <= SOURCE_BLOCK_CAP {
            return summary.to_string();
        }
        let truncated: String = summary.chars().take(SOURCE_BLOCK_CAP).collect();
        format!("{truncated}…")
    }

    fn usable_results(results: &[SourceQueryResult]) -> Vec<&SourceQueryResult> {
        results.iter().filter(|r| r.succeeded && !r.summary.trim().is_empty()).collect()
    }

    fn build_instruction(query: &str, usable: &[&SourceQueryResult]) -> String {
        let mut instruction = format!(
            "Query: {query}\n\
             Using only the source summaries below, write a single answer in structured \
             sections with bullet points for itemized data. Do not use emoji.\n\n"
        );
        for result in usable {
            instruction.push_str(&format!("[{}] {}\n", result.provider_id.to_uppercase(), Self::truncate_block(&result.summary)));
        }
        instruction
    }

    fn deterministic_fallback(usable: &[&SourceQueryResult]) -> String {
        usable
            .iter()
            .map(|r| format!("[{}]\n{}", r.provider_id.to_uppercase(), Self::truncate_block(&r.summary)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Synthesize an answer from `results`, forwarding each streamed chunk to
    /// `on_chunk`. Returns `None` when no leg produced a usable summary — the
    /// caller should report `status = failed` with [`NO_RESULTS_FALLBACK`].
    pub async fn synthesize(&self, query: &str, results: &[SourceQueryResult], mut on_chunk: impl FnMut(&str)) -> Option<Synthesis> {
        let usable = Self::usable_results(results);
        if usable.is_empty() {
            return None;
        }

        let instruction = Self::build_instruction(query, &usable);
        let mut stream = self.reasoner.synthesize(&instruction);
        let mut text = String::new();
        let mut reasoner_failed = false;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(piece) => {
                    on_chunk(&piece);
                    text.push_str(&piece);
                },
                Err(error) => {
                    tracing::warn!(%error, "reasoner synthesis failed, falling back to deterministic concatenation");
                    reasoner_failed = true;
                    break;
                },
            }
        }

        if reasoner_failed || text.trim().is_empty() {
            let fallback = Self::deterministic_fallback(&usable);
            on_chunk(&fallback);
            return Some(Synthesis { text: fallback, used_fallback: true });
        }

        Some(Synthesis { text, used_fallback: false })
    }
}
