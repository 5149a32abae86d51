//! HTTP implementation of the engine's space-adapter seam.
//!
//! Thin transport plumbing: every method is one request against the remote
//! platform's structure API, with HTTP statuses mapped onto the adapter
//! error taxonomy. No reconciliation logic lives here.

pub mod client;

pub use client::{RestAdapter, RestConfig};
