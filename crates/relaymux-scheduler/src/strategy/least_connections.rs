//! Fewest in-flight executions, ties broken by pipeline id (spec.md §4.6)

use std::collections::HashMap;

use super::{Candidate, SelectionStrategy};
use crate::counters::CounterSnapshot;
use relaymux_core::RequestPriority;

pub struct LeastConnections;

impl SelectionStrategy for LeastConnections {
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        counters: &HashMap<String, CounterSnapshot>,
        _round: u64,
        _request_priority: RequestPriority,
    ) -> Option<&'a str> {
        candidates
            .iter()
            .min_by_key(|c| {
                let in_flight = counters.get(c.pipeline_id).map_or(0, |snapshot| snapshot.in_flight);
                (in_flight, c.pipeline_id)
            })
            .map(|c| c.pipeline_id)
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_pipeline_with_fewest_in_flight() {
        let strategy = LeastConnections;
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("busy".to_owned(), CounterSnapshot { in_flight: 2, ..Default::default() });
        counters.insert("idle".to_owned(), CounterSnapshot { in_flight: 1, ..Default::default() });

        let candidates = vec![Candidate { pipeline_id: "busy", priority: 0, security_enhanced: false }, Candidate { pipeline_id: "idle", priority: 0, security_enhanced: false }];
        assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::Medium), Some("idle"));
    }

    #[test]
    fn untracked_pipeline_counts_as_zero_in_flight() {
        let strategy = LeastConnections;
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("busy".to_owned(), CounterSnapshot { in_flight: 1, ..Default::default() });

        let candidates = vec![Candidate { pipeline_id: "busy", priority: 0, security_enhanced: false }, Candidate { pipeline_id: "fresh", priority: 0, security_enhanced: false }];
        assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::Medium), Some("fresh"));
    }
}
