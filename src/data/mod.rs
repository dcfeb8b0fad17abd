//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations (profiles, follow edges, instances, statuses)
//! - Key-value cache (volatile)
//! - Sorted sets backing the relationship index (volatile)

mod cache;
mod database;
mod models;
mod sorted_set;
mod store;

pub use cache::{KeyValueCache, MokaCache, get_as, put_as, remember_as};
pub use database::Database;
pub use models::*;
pub use sorted_set::{MemorySortedSets, SortedSetStore};
pub use store::{EdgeStore, InstanceDirectory, OutboxSource, ProfileStore, UsageStats};

#[cfg(test)]
pub use store::{
    MockEdgeStore, MockInstanceDirectory, MockOutboxSource, MockProfileStore, MockUsageStats,
};

#[cfg(test)]
mod database_test;
