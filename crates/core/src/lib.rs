//! FIZKO Core - Shared domain types.
//!
//! This crate provides common types used across all FIZKO components:
//! - `site` - Public-facing site and API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identity ids, emails, prices,
//!   product categories, and subscription statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
