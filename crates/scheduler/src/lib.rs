//! Scheduler and update loops over the request queue.

pub mod handler;
pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod update;

pub use handler::{AssignError, AssignmentHandler, HandlerError, StatusHandler};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use runner::LoopRunner;
pub use scheduler::SchedulerLoop;
pub use update::UpdateLoop;
