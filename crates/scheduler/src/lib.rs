//! The scheduler loop: the periodic driver that discovers due followups,
//! renders their message, hands off to the transport adapter, and re-arms
//! the next occurrence. Consumes [`cadence_core`]'s compiler and state
//! machine and [`cadence_store`]'s persistence contract; knows nothing about
//! the outer shell's web layer.

mod config;
mod runner;
mod tick;

pub use config::{ConfigError, SchedulerConfig};
pub use runner::Scheduler;
pub use tick::{run_tick, TickReport};
