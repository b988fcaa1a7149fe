//! HTTP client for the hosted backend.
//!
//! Speaks the PostgREST-style row API the backend exposes and implements
//! [`mindwell_core::sync::RemoteStore`] on top of it. All row filtering is
//! by `user_id` plus the entity's client-generated natural key; the server
//! enforces per-user row ownership on top of that.

mod client;
mod error;
mod types;

pub use client::{BackendClient, BackendConfig};
pub use error::BackendError;
