//! External service clients and domain services.
//!
//! Every non-trivial capability is delegated to an external provider and
//! wrapped in a thin typed client here: identity (session provider),
//! billing (payment processor), assistant (chat), postal lookup,
//! tax-data lookup, and support email. The domain services - [`access::AccessResolver`],
//! [`chat::ChatConversation`], and [`checkout::PurchaseInitiator`] - sit on
//! top of those clients behind traits so their policies are testable
//! without I/O.

pub mod access;
pub mod assistant;
pub mod billing;
pub mod chat;
pub mod checkout;
pub mod identity;
pub mod postal;
pub mod support;
pub mod taxdata;
