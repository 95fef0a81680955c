//! Ordered by pipeline priority (descending), then security-enhanced
//! variants (preferred at equal priority, spec.md §9), then windowed mean
//! response time (ascending); the per-request priority then picks a
//! position out of that ordered pool rather than always taking the best
//! candidate (spec.md §4.6 "`priority=high` requests take the first, `low`
//! the last, otherwise the median").

use std::collections::HashMap;

use relaymux_core::RequestPriority;

use super::{Candidate, SelectionStrategy};
use crate::counters::CounterSnapshot;

pub struct PriorityBased;

impl SelectionStrategy for PriorityBased {
    fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        counters: &HashMap<String, CounterSnapshot>,
        _round: u64,
        request_priority: RequestPriority,
    ) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }

        let mut ordered: Vec<&Candidate<'a>> = candidates.iter().collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.security_enhanced.cmp(&a.security_enhanced))
                .then_with(|| {
                    let mean_a = counters.get(a.pipeline_id).map_or(0.0, |c| c.windowed_mean_response_time_ms);
                    let mean_b = counters.get(b.pipeline_id).map_or(0.0, |c| c.windowed_mean_response_time_ms);
                    mean_a.total_cmp(&mean_b)
                })
        });

        let index = match request_priority {
            RequestPriority::High => 0,
            RequestPriority::Low => ordered.len() - 1,
            RequestPriority::Medium => ordered.len() / 2,
        };

        ordered.get(index).map(|c| c.pipeline_id)
    }

    fn name(&self) -> &'static str {
        "priority_based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_request_takes_the_best_candidate() {
        let strategy = PriorityBased;
        let candidates = vec![
            Candidate { pipeline_id: "low-priority-fast", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "high-priority", priority: 10, security_enhanced: false },
        ];
        assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, RequestPriority::High), Some("high-priority"));
    }

    #[test]
    fn low_priority_request_takes_the_worst_candidate() {
        let strategy = PriorityBased;
        let candidates = vec![
            Candidate { pipeline_id: "low-priority-fast", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "high-priority", priority: 10, security_enhanced: false },
        ];
        assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, RequestPriority::Low), Some("low-priority-fast"));
    }

    #[test]
    fn medium_priority_request_takes_the_median_candidate() {
        let strategy = PriorityBased;
        let candidates = vec![
            Candidate { pipeline_id: "p-low", priority: 0, security_enhanced: false },
            Candidate { pipeline_id: "p-mid", priority: 5, security_enhanced: false },
            Candidate { pipeline_id: "p-high", priority: 10, security_enhanced: false },
        ];
        assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, RequestPriority::Medium), Some("p-mid"));
    }

    #[test]
    fn equal_priority_breaks_on_response_time() {
        let strategy = PriorityBased;
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("slow".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 500.0, ..Default::default() });
        counters.insert("fast".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 20.0, ..Default::default() });

        let candidates =
            vec![Candidate { pipeline_id: "slow", priority: 5, security_enhanced: false }, Candidate { pipeline_id: "fast", priority: 5, security_enhanced: false }];
        assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::High), Some("fast"));
    }

    #[test]
    fn security_enhanced_preferred_over_primary_at_equal_priority() {
        let strategy = PriorityBased;
        let mut counters: HashMap<String, CounterSnapshot> = HashMap::new();
        counters.insert("primary".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 10.0, ..Default::default() });
        counters.insert("enhanced".to_owned(), CounterSnapshot { windowed_mean_response_time_ms: 50.0, ..Default::default() });

        let candidates = vec![
            Candidate { pipeline_id: "primary", priority: 5, security_enhanced: false },
            Candidate { pipeline_id: "enhanced", priority: 5, security_enhanced: true },
        ];
        assert_eq!(strategy.select(&candidates, &counters, 0, RequestPriority::High), Some("enhanced"));
    }

    #[test]
    fn security_enhanced_never_outranks_higher_priority_primary() {
        let strategy = PriorityBased;
        let candidates = vec![
            Candidate { pipeline_id: "enhanced-low-priority", priority: 0, security_enhanced: true },
            Candidate { pipeline_id: "primary-high-priority", priority: 10, security_enhanced: false },
        ];
        assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, RequestPriority::High), Some("primary-high-priority"));
    }

    #[test]
    fn single_candidate_is_always_selected_regardless_of_request_priority() {
        let strategy = PriorityBased;
        let candidates = vec![Candidate { pipeline_id: "only", priority: 0, security_enhanced: false }];
        for request_priority in [RequestPriority::High, RequestPriority::Medium, RequestPriority::Low] {
            assert_eq!(strategy.select(&candidates, &HashMap::new(), 0, request_priority), Some("only"));
        }
    }
}
