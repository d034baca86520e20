//! Transaction demarcation for the persistence bridge
//!
//! This crate provides:
//! - [`LocalTransaction`]: the uniform [`Transaction`] contract over an
//!   engine's native (resource-local) transaction
//! - [`TransactionRegistry`]: named transactions with a configurable default
//! - [`transactional`]: closure-based demarcation with [`Propagation`] rules
//!
//! [`Transaction`]: bridge_core::Transaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod demarcation;
pub mod local;
pub mod registry;

pub use demarcation::{transactional, Propagation};
pub use local::LocalTransaction;
pub use registry::TransactionRegistry;
