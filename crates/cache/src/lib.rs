//! SQLite repository metadata indexes.
//!
//! This crate writes the createrepo databases: the "primary" index with one
//! row per package in the `packages` table, plus the (empty) dependency
//! tables, and the "filelists" and "other" indexes, which share its package
//! keys. Each carries the `db_info` version marker that consumers check
//! before reading.
//!
//! The indexes are not a cache of anything: each run recreates them from scratch
//! with [`Database::create_index`], then writes through a single [`Repository`].

mod db;
pub mod error;
#[cfg(test)]
mod fixtures;
mod models;
mod repo;

pub use crate::db::{Database, IndexKind};
pub use crate::models::IndexedPackage;
pub use crate::repo::{KeyRepository, Repository};
