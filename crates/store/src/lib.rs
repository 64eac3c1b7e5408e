//! Persistence contract for the cadence followup scheduler: the domain
//! model, the `FollowupStore` trait every backend implements, and the
//! shared conformance suite backends run themselves against.

pub mod error;
pub mod model;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use traits::{FollowupStore, FollowupUpdate, NewActivityLogEntry, NewFollowup, NewUser};
