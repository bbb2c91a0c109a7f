//! Postgres database client definitions.
//!
//! [`NonTx`] lazily holds a pooled connection for standalone operations,
//! [`Tx`] wraps one in a transaction for the booking commands that lock,
//! claim and insert atomically.

pub mod non_tx;
pub mod tx;

pub use self::{non_tx::NonTx, tx::Tx};
