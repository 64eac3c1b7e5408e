//! SQLite-backed `FollowupStore`: schema migrations, row/domain-type
//! codecs, and the `sqlx`-driven trait implementation.

mod codec;
pub mod config;
pub mod migrations;
mod row;
mod store;

pub use config::SqliteConfig;
pub use store::SqliteStore;
