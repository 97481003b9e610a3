//! # Remote Change API
//!
//! Signed HTTP access to the external system that carries out changes.
//! [`RemoteApi`] is the seam the workers depend on; [`SignedClient`] is the
//! production implementation.

pub mod client;
pub mod errors;
pub mod signing;
pub mod types;

pub use client::{RemoteApi, SignedClient};
pub use errors::{ErrorClass, RemoteCallError, RemoteOperation};
pub use signing::SignedEnvelope;
pub use types::{InitiatedChange, StatusReport};
