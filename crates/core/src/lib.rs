//! Offline-first sync core for the Mindwell companion app.
//!
//! Local mutations land in a per-user keyed record store first and are
//! reconciled against the hosted backend opportunistically. This crate owns
//! the domain models, the persistence and remote-service contracts, the
//! per-entity reconcilers, the durable retry queue and the sync orchestrator.
//! Concrete collaborators live in sibling crates (`mindwell-backend`,
//! `mindwell-store-sqlite`).

pub mod errors;
pub mod models;
pub mod store;
pub mod sync;

pub use errors::{Error, RemoteError, RemoteErrorKind, Result, StoreError};
