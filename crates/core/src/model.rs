//! Domain record types, defined in [`cadence_store::model`] so the Store
//! trait and its backends can speak the same types without a dependency
//! cycle back onto `cadence-core`. Re-exported here so callers keep writing
//! `cadence_core::model::Followup` etc., matching the component table.

pub use cadence_store::model::*;
