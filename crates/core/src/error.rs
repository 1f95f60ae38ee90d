use thiserror::Error;

/// Rejection reasons for inbound events that fail boundary validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("empty field: {0}")]
    EmptyField(&'static str),
}

/// Settings that load fine but cannot run safely together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A grant can take up to the signaling timeout while the processing
    /// lock is held. A shorter lock lets a second instance grant the same
    /// request.
    #[error(
        "processing lock TTL ({lock_ttl_ms}ms) must exceed the signaling API timeout ({timeout_ms}ms)"
    )]
    LockShorterThanGrant { lock_ttl_ms: u64, timeout_ms: u64 },
}
