//! Harvest Market Core - Shared types library.
//!
//! This crate provides common types used across all Harvest Market components:
//! - `marketplace` - The HTTP API (buyers, sellers, community, admin console)
//! - `cli` - Command-line tools for migrations, admin users and CSV imports
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, statuses and paging

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
