//! Runtime Scheduler / Load Balancer (spec.md §4.6, C6)

mod blocklist;
mod counters;
mod events;
mod scheduler;
pub mod strategy;

pub use blocklist::BlockReason;
pub use counters::{CounterSnapshot, PipelineCounters};
pub use events::SchedulerEvent;
pub use scheduler::{Scheduler, Selection};
