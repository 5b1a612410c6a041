use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;

/// Recent per-provider leg durations, feeding the planner's `estimated_ms`
/// (§4.8). Bounded to the last [`LatencyTracker::WINDOW`] samples so one slow
/// burst doesn't permanently skew the estimate.
pub struct LatencyTracker {
    samples: DashMap<String, VecDeque<u64>>,
}

impl LatencyTracker {
    const WINDOW: usize = 20;

    pub fn new() -> Self {
        Self { samples: DashMap::new() }
    }

    pub fn record(&self, provider_id: &str, duration_ms: u64) {
        let mut entry = self.samples.entry(provider_id.to_string()).or_default();
        entry.push_back(duration_ms);
        if entry.len() > Self::WINDOW {
            entry.pop_front();
        }
    }

    pub fn medians(&self) -> HashMap<String, u64> {
        self.samples
            .iter()
            .filter_map(|entry| {
                let mut sorted: Vec<u64> = entry.value().iter().copied().collect();
                if sorted.is_empty() {
                    return None;
                }
                sorted.sort_unstable();
                Some((entry.key().clone(), sorted[sorted.len() / 2]))
            })
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_reflects_recorded_samples() {
        let tracker = LatencyTracker::new();
        for duration in [100, 200, 300] {
            tracker.record("tickets", duration);
        }
        assert_eq!(tracker.medians().get("tickets"), Some(&200));
    }

    #[test]
    fn window_drops_oldest_samples() {
        let tracker = LatencyTracker::new();
        for duration in 0..(LatencyTracker::WINDOW as u64 + 5) {
            tracker.record("tickets", duration);
        }
        let median = *tracker.medians().get("tickets").unwrap();
        assert!(median >= 5, "oldest samples should have been evicted, got median {median}");
    }
}
