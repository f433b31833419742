//! Settings store for wox-settings
//!
//! This module provides the target store of the migration using SQLite with:
//! - Schema migrations
//! - Core and per-plugin key-value namespaces
//! - Scoped transactions that roll back unless committed

pub mod repo;
pub mod schema;

pub use repo::{Namespace, SettingStore, StoreTransaction};
