//! Scheduler tuning knobs (spec.md §4.6)

use serde::Deserialize;

/// Which selection algorithm the scheduler uses for a virtual model's pool
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionAlgorithmConfig {
    /// Sort by pipelineId, advance a per-route counter (default)
    #[default]
    RoundRobin,
    /// Fewest in-flight executions, ties by pipelineId
    LeastConnections,
    /// Weighted random by recent latency and error rate
    Weighted,
    /// Lowest windowed mean response time
    ResponseTime,
    /// Ordered by request priority against pipeline priority
    PriorityBased,
}

/// Scheduler configuration (spec.md §4.6)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Selection algorithm for all virtual-model pools
    #[serde(default)]
    pub algorithm: SelectionAlgorithmConfig,
    /// Consecutive rate-limit/recoverable errors before a temporary block
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    /// Temporary block duration, seconds, once `max_error_count` is hit
    #[serde(default = "default_blacklist_duration_secs")]
    pub blacklist_duration_secs: u64,
    /// Temporary block duration, seconds, for authentication failures
    #[serde(default = "default_auth_retry_delay_secs")]
    pub auth_retry_delay_secs: u64,
    /// Temporary block duration, seconds, for a second consecutive network error
    #[serde(default = "default_network_block_secs")]
    pub network_block_secs: u64,
    /// Health-check tick interval, seconds
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// Window size (executions) for response-time mean tracking
    #[serde(default = "default_response_time_window")]
    pub response_time_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: SelectionAlgorithmConfig::default(),
            max_error_count: default_max_error_count(),
            blacklist_duration_secs: default_blacklist_duration_secs(),
            auth_retry_delay_secs: default_auth_retry_delay_secs(),
            network_block_secs: default_network_block_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            response_time_window: default_response_time_window(),
        }
    }
}

const fn default_max_error_count() -> u32 {
    3
}

const fn default_blacklist_duration_secs() -> u64 {
    300
}

const fn default_auth_retry_delay_secs() -> u64 {
    60
}

const fn default_network_block_secs() -> u64 {
    60
}

const fn default_health_check_interval_secs() -> u64 {
    30
}

const fn default_response_time_window() -> usize {
    100
}
