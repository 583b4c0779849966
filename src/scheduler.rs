use futures::FutureExt;
use std::{future::Future, panic::AssertUnwindSafe, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info};

/// Runs named checks on independent timers.
///
/// Each check runs immediately on registration, then again `interval` after
/// its previous run settled, so runs of the same check never overlap while
/// different checks run concurrently.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `operation` under `name` and start its timer
    pub(crate) fn register<F, Fut>(&mut self, name: &str, interval: Duration, operation: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        info!(check = name, interval_s = interval.as_secs(), "Registering check");

        let check = name.to_string();
        let handle = tokio::spawn(async move {
            loop {
                debug!(check = %check, "Running check");

                match AssertUnwindSafe(operation()).catch_unwind().await {
                    Ok(Ok(())) => debug!(check = %check, "Check completed"),
                    Ok(Err(e)) => error!(check = %check, error = %format!("{e:#}"), "Check failed"),
                    Err(_) => error!(check = %check, "Check panicked"),
                }

                sleep(interval).await;
            }
        });

        self.tasks.push((name.to_string(), handle));
    }

    /// Names of the registered checks
    pub(crate) fn checks(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| name.as_str())
    }

    /// Wait on the registered checks; returns only if every timer task ended
    pub(crate) async fn run(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!(check = %name, error = %e, "Check task terminated");
            }
        }
    }
}
