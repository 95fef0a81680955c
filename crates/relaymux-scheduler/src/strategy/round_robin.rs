//! Round-robin: sort candidates by pipeline id, advance a per-call cursor
//! (spec.md §4.6 default algorithm, §8 fairness property)

use std::collections::HashMap;

use super::{Candidate, SelectionStrategy};
use crate::counters::CounterSnapshot;
use relaymux_core::RequestPriority;

pub struct RoundRobin;

impl SelectionStrategy for RoundRobin {
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        _counters: &HashMap<String, CounterSnapshot>,
        round: u64,
        _request_priority: RequestPriority,
    ) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let mut sorted: Vec<&Candidate<'a>> = candidates.iter().collect();
        sorted.sort_by_key(|c| c.pipeline_id);
        #[allow(clippy::cast_possible_truncation)]
        let index = (round % sorted.len() as u64) as usize;
        Some(sorted[index].pipeline_id)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_sorted_candidates() {
        let strategy = RoundRobin;
        let candidates = vec![
            Candidate { pipeline_id: "b", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "a", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "c", priority: 0, security_enhanced: false },
        ];
        let counters = HashMap::new();
        let picks: Vec<&str> = (0..6).map(|round| strategy.select(&candidates, &counters, round, RequestPriority::Medium).unwrap()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn each_pipeline_chosen_equally_over_k_n_window() {
        let strategy = RoundRobin;
        let candidates = vec![
            Candidate { pipeline_id: "p1", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "p2", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "p3", priority: 0, security_enhanced: false },
        ];
        let counters = HashMap::new();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for round in 0..(3 * 7) {
            let pick = strategy.select(&candidates, &counters, round, RequestPriority::Medium).unwrap();
            *counts.entry(pick).or_insert(0) += 1;
        }
        for count in counts.values() {
            assert_eq!(*count, 7);
        }
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let strategy = RoundRobin;
        assert!(strategy.select(&[], &HashMap::new(), 0, RequestPriority::Medium).is_none());
    }
}
