//! # Reltrack Shared Library
//!
//! Core of the release tracker: everything except the HTTP surface.
//!
//! ## Module Organization
//!
//! - `models`: users and releases, with their PostgreSQL queries
//! - `db`: connection pool and embedded migrations
//! - `store`: persistence traits with PostgreSQL and in-memory backends
//! - `auth`: passwords, session tokens, the capability gate and predicate
//! - `releases`: capability-checked release operations
//! - `manifest`: requirements.txt / pyproject.toml parsing
//! - `registry`: package registry lookups and the concurrent resolver
//! - `scan`: manifest → resolved scan rows
//! - `import`: scan rows → releases, without duplicates

pub mod auth;
pub mod db;
pub mod import;
pub mod manifest;
pub mod models;
pub mod registry;
pub mod releases;
pub mod scan;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
