//! `microsvc-client`: the discovery-aware RPC client (§4.8).

pub mod backoff;
pub mod client;
pub mod error;

pub use backoff::Backoff;
pub use client::{CallOptions, Client};
pub use error::ClientError;
