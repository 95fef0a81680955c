//! Weighted random by recent latency and error rate (spec.md §4.6):
//! `weight = 1000 / max(lastResponseTime, 1) * max(0.1, 1 - 2 * errorRate)`

use std::collections::HashMap;

use rand::Rng;

use super::{Candidate, SelectionStrategy};
use crate::counters::CounterSnapshot;
use relaymux_core::RequestPriority;

pub struct Weighted;

fn weight_of(snapshot: Option<&CounterSnapshot>) -> f64 {
    let Some(snapshot) = snapshot else {
        return 1000.0;
    };
    let last_response_time = snapshot.last_response_time_ms.max(1);
    #[allow(clippy::cast_precision_loss)]
    let latency_term = 1000.0 / last_response_time as f64;
    let error_term = (1.0 - 2.0 * snapshot.error_rate).max(0.1);
    latency_term * error_term
}

impl SelectionStrategy for Weighted {
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        counters: &HashMap<String, CounterSnapshot>,
        _round: u64,
        _request_priority: RequestPriority,
    ) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<f64> = candidates.iter().map(|c| weight_of(counters.get(c.pipeline_id))).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return candidates.first().map(|c| c.pipeline_id);
        }

        let mut pick = rand::rng().random_range(0.0..total);
        for (candidate, weight) in candidates.iter().zip(weights.iter()) {
            if pick < *weight {
                return Some(candidate.pipeline_id);
            }
            pick -= weight;
        }
        candidates.last().map(|c| c.pipeline_id)
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_candidate_is_always_selected() {
        let strategy = Weighted;
        let candidates = vec![Candidate { pipeline_id: "only", priority: 0, security_enhanced: false }];
        let counters = HashMap::new();
        for _ in 0..20 {
            assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::Medium), Some("only"));
        }
    }

    #[test]
    fn high_error_rate_lowers_weight_but_never_excludes() {
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("fast".to_owned(), CounterSnapshot { last_response_time_ms: 50, error_rate: 0.0, ..Default::default() });
        counters.insert("flaky".to_owned(), CounterSnapshot { last_response_time_ms: 50, error_rate: 1.0, ..Default::default() });

        let candidates = vec![Candidate { pipeline_id: "fast", priority: 0, security_enhanced: false }, Candidate { pipeline_id: "flaky", priority: 0, security_enhanced: false }];
        let mut picks: HashMap<&str, u32> = HashMap::new();
        for round in 0..200 {
            let pick = strategy_pick(&candidates, &counters, round);
            *picks.entry(pick).or_insert(0) += 1;
        }
        assert!(picks.get("flaky").copied().unwrap_or(0) > 0, "flaky pipeline should still occasionally be picked");
        assert!(picks.get("fast").copied().unwrap_or(0) > picks.get("flaky").copied().unwrap_or(0));
    }

    fn strategy_pick<'a>(candidates: &[Candidate<'a>], counters: &HashMap<String, CounterSnapshot>, round: u64) -> &'a str {
        Weighted.select(candidates, counters, round, RequestPriority::Medium).unwrap()
    }
}
