//! Expiring key-value store domain
//!
//! Shared substrate for refresh tokens and rate counters. Both consumers live in
//! disjoint key namespaces (see [`keys`]).

pub mod keys;
mod store;

pub use store::{CounterWindow, ExpiringStore};

#[cfg(test)]
pub use store::MockExpiringStore;
