use meter_queue::QueueError;

/// Errors that can occur while notifying the signaling API.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The signaling API answered 404: the conference no longer exists.
    #[error("conference no longer exists: {0}")]
    ConferenceGone(String),

    #[error("signal api returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}
