//! Domain model, schedule compiler, followup state machine, and write API
//! for the cadence followup scheduler.
//!
//! This crate is pure business logic plus a thin façade over
//! [`cadence_store::FollowupStore`]; it never touches a network socket or a
//! database driver directly. `cadence-scheduler` is the component that
//! drives this crate's write API and compiler on a timer.

pub mod clock;
pub mod compiler;
pub mod error;
pub mod model;
pub mod state_machine;
pub mod write_api;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use write_api::{Core, FollowupFields};
