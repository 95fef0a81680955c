//! Lowest windowed mean response time, ties broken by pipeline id
//! (spec.md §4.6)

use std::collections::HashMap;

use super::{Candidate, SelectionStrategy};
use crate::counters::CounterSnapshot;
use relaymux_core::RequestPriority;

pub struct ResponseTime;

impl SelectionStrategy for ResponseTime {
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        counters: &HashMap<String, CounterSnapshot>,
        _round: u64,
        _request_priority: RequestPriority,
    ) -> Option<&'a str> {
        candidates
            .iter()
            .min_by(|a, b| {
                let mean_a = counters.get(a.pipeline_id).map_or(0.0, |c| c.windowed_mean_response_time_ms);
                let mean_b = counters.get(b.pipeline_id).map_or(0.0, |c| c.windowed_mean_response_time_ms);
                mean_a.total_cmp(&mean_b).then_with(|| a.pipeline_id.cmp(b.pipeline_id))
            })
            .map(|c| c.pipeline_id)
    }

    fn name(&self) -> &'static str {
        "response_time"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_lowest_mean_response_time() {
        let strategy = ResponseTime;
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("slow".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 500.0, ..Default::default() });
        counters.insert("fast".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 50.0, ..Default::default() });

        let candidates = vec![Candidate { pipeline_id: "slow", priority: 0, security_enhanced: false }, Candidate { pipeline_id: "fast", priority: 0, security_enhanced: false }];
        assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::Medium), Some("fast"));
    }

    #[test]
    fn ties_break_by_pipeline_id() {
        let strategy = ResponseTime;
        let candidates = vec![Candidate { pipeline_id: "b", priority: 0, security_enhanced: false }, Candidate { pipeline_id: "a", priority: 0, security_enhanced: false }];
        assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, RequestPriority::Medium), Some("a"));
    }
}
