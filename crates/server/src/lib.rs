//! HTTP boundary of the recorder admission service.

pub mod api;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
