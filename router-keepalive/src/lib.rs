//! Idle-warmup scheduling: records which (model, host) pairs were just used
//! and fires small synthetic chat requests at them before they'd otherwise
//! go idle, bypassing the guardrail/masking/load-balancing pipeline entirely.

mod duration;
mod error;
mod scheduler;
mod usage;

pub use duration::parse_keep_alive;
pub use error::{KeepAliveError, Result};
pub use scheduler::KeepAliveScheduler;
pub use usage::record_usage;
