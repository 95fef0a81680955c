//! Blacklist (permanent) and temporary-block (time-bounded) sets
//!
//! Mirrors the circuit-breaker shape the provider-level health tracker used
//! in this codebase's predecessor, but keyed by pipeline id and split into
//! two independent sets per spec.md §4.6: a permanent blacklist for
//! unrecoverable failures, and a temporary block with a per-reason expiry
//! for everything else.

use dashmap::DashMap;
use relaymux_core::now_unix_secs;

/// Why a pipeline was temporarily blocked, for logging/metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Authentication,
    RateLimitOrRecoverable,
    Network,
    HealthCheckFailure,
}

pub struct Blocklist {
    blacklisted: DashMap<String, ()>,
    temp_blocks: DashMap<String, (u64, BlockReason)>,
}

impl Blocklist {
    #[must_use]
    pub fn new() -> Self {
        Self { blacklisted: DashMap::new(), temp_blocks: DashMap::new() }
    }

    /// Permanently remove a pipeline from selection (spec.md §4.6
    /// "unrecoverable → permanent blacklist")
    pub fn blacklist(&self, pipeline_id: &str) {
        self.blacklisted.insert(pipeline_id.to_owned(), ());
        self.temp_blocks.remove(pipeline_id);
    }

    /// Block a pipeline until `now + duration_secs`
    pub fn temp_block(&self, pipeline_id: &str, duration_secs: u64, reason: BlockReason) {
        let until = now_unix_secs() + duration_secs;
        self.temp_blocks.insert(pipeline_id.to_owned(), (until, reason));
    }

    /// Whether a pipeline is currently ineligible for selection, either
    /// permanently blacklisted or inside an unexpired temporary block
    pub fn is_blocked(&self, pipeline_id: &str) -> bool {
        if self.blacklisted.contains_key(pipeline_id) {
            return true;
        }
        match self.temp_blocks.get(pipeline_id) {
            Some(entry) => entry.0 > now_unix_secs(),
            None => false,
        }
    }

    /// Drop any temporary blocks whose expiry has passed. Does not touch
    /// the permanent blacklist. Returns the pipeline ids reactivated.
    pub fn clear_expired(&self) -> Vec<String> {
        let now = now_unix_secs();
        let expired: Vec<String> = self
            .temp_blocks
            .iter()
            .filter(|entry| entry.value().0 <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &expired {
            self.temp_blocks.remove(id);
        }
        expired
    }

    pub fn is_blacklisted(&self, pipeline_id: &str) -> bool {
        self.blacklisted.contains_key(pipeline_id)
    }
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blacklist_is_permanent() {
        let list = Blocklist::new();
        list.blacklist("p1");
        assert!(list.is_blocked("p1"));
        assert!(list.clear_expired().is_empty());
        assert!(list.is_blocked("p1"));
    }

    #[test]
    fn temp_block_expires() {
        let list = Blocklist::new();
        list.temp_block("p1", 0, BlockReason::RateLimitOrRecoverable);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(!list.is_blocked("p1"));
    }

    #[test]
    fn unblocked_pipeline_is_not_blocked() {
        let list = Blocklist::new();
        assert!(!list.is_blocked("p1"));
    }

    #[test]
    fn clear_expired_reports_reactivated_ids() {
        let list = Blocklist::new();
        list.temp_block("p1", 0, BlockReason::Network);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let reactivated = list.clear_expired();
        assert_eq!(reactivated, vec!["p1".to_owned()]);
    }
}
