//! Runs the scheduler and update loops as background tasks.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::scheduler::SchedulerLoop;
use crate::update::UpdateLoop;

struct Spawned {
    name: &'static str,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

pub struct LoopRunner {
    loops: Vec<Spawned>,
}

impl LoopRunner {
    /// Spawn both loops on the current runtime.
    pub fn start(scheduler: SchedulerLoop, updates: UpdateLoop) -> Self {
        let scheduler = Arc::new(scheduler);
        let updates = Arc::new(updates);

        let sched_stop = Arc::new(Notify::new());
        let sched_handle = {
            let stop = sched_stop.clone();
            tokio::spawn(async move { scheduler.run(stop).await })
        };

        let update_stop = Arc::new(Notify::new());
        let update_handle = {
            let stop = update_stop.clone();
            tokio::spawn(async move { updates.run(stop).await })
        };

        info!("background loops started");
        Self {
            loops: vec![
                Spawned {
                    name: "scheduler",
                    shutdown: sched_stop,
                    handle: sched_handle,
                },
                Spawned {
                    name: "update",
                    shutdown: update_stop,
                    handle: update_handle,
                },
            ],
        }
    }

    /// Signal both loops and wait for their current ticks to finish.
    pub async fn stop(self) {
        for l in &self.loops {
            l.shutdown.notify_one();
        }
        for l in self.loops {
            if let Err(e) = l.handle.await {
                error!(loop_name = l.name, error = %e, "loop task ended abnormally");
            }
        }
        info!("background loops stopped");
    }
}
