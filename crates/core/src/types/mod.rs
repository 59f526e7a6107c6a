//! Core types for the FIZKO site.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod category;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use category::{CategoryParseError, ProductCategory};
pub use email::{Email, EmailError};
pub use id::IdentityId;
pub use price::Price;
pub use status::{SubscriptionStatus, SubscriptionTier};
