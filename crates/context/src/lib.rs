//! Persistence-context layer for the bridge
//!
//! This crate owns the per-scope persistence state:
//! - FlushModeState: current mode plus pending restore target
//! - FlushModeController: change / restore / render hooks over a target
//! - PersistenceContexts: the sessions a scope touched, as one target
//! - ManagedPersistenceContext: lazily opened session with creation events
//! - PersistenceScope / RenderGuard: explicit scope ownership and render cycles
//! - BridgeConfig: `bridge.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod contexts;
pub mod controller;
pub mod events;
pub mod managed;
pub mod scope;
pub mod state;
pub mod target;

pub use config::{BridgeConfig, CONFIG_FILE_NAME};
pub use contexts::PersistenceContexts;
pub use controller::{FlushModeController, RenderPolicy};
pub use events::SessionEvents;
pub use managed::{ManagedPersistenceContext, SessionAccess};
pub use scope::{PersistenceScope, RenderGuard};
pub use state::FlushModeState;
pub use target::FlushModeTarget;
