//! Signaling API notifications for granted and waiting requests.
//!
//! This crate provides:
//! - `SignalClient` for posting notices to a request's `externalApiUrl`
//! - `RecorderProcessor`, the assignment and status callbacks of the loops
//! - `CredentialIssuer` for attaching a credential to grants

pub mod credential;
pub mod error;
pub mod notice;
pub mod processor;
pub mod signal;

pub use credential::{issuer_from_config, CredentialIssuer, NoCredential, StaticCredential};
pub use error::NotifyError;
pub use notice::{GrantNotice, UpdateNotice, QUEUE_UPDATE_EVENT};
pub use processor::RecorderProcessor;
pub use signal::SignalClient;
