//! Domain models for the site.

pub mod chat;
pub mod product;
pub mod profile;
pub mod session;
pub mod subscription;

pub use chat::ChatMessage;
pub use product::{Product, catalog};
pub use profile::{Profile, ProfileUpdate};
pub use session::{CurrentIdentity, keys as session_keys};
pub use subscription::Subscription;
