//! Integration tests for FIZKO.
//!
//! The scenario tests in `tests/` exercise the access resolver, the chat
//! conversation, and the purchase initiator end to end against the
//! in-memory fakes defined here. No database or network is required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fizko-integration-tests
//! ```

pub mod fakes;
