//! Recorder pool tracker and request queue on top of a shared lease store.

pub mod error;
pub mod keys;
pub mod requests;
pub mod tracker;

pub use error::QueueError;
pub use keys::KeySpace;
pub use requests::{Assignment, DequeueOutcome, RequestQueue};
pub use tracker::PoolTracker;
