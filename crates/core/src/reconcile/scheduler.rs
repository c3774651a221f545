//! Interval scheduling for the reconciliation jobs.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info};

use super::service::{DeadLetterRepository, ImageRepository, ReconcileService};
use crate::blobstore::BlobClient;
use prism_shared::config::ReconcilerConfig;

/// Spawns and owns the three periodic reconciliation loops.
///
/// Built once at process startup with its collaborators injected; there is no
/// global registry. Each loop awaits its pass before sleeping for the next
/// tick, so a job never overlaps a slow run of itself. The three jobs are
/// independent of each other.
pub struct JobScheduler<R, D, B> {
    service: Arc<ReconcileService<R, D, B>>,
    config: ReconcilerConfig,
}

impl<R, D, B> JobScheduler<R, D, B>
where
    R: ImageRepository + 'static,
    D: DeadLetterRepository + 'static,
    B: BlobClient + 'static,
{
    /// Create a new scheduler.
    #[must_use]
    pub fn new(service: Arc<ReconcileService<R, D, B>>, config: ReconcilerConfig) -> Self {
        Self { service, config }
    }

    /// Spawn the reconciliation, audit, and retention loops.
    ///
    /// Returns the task handles; dropping them detaches the loops (they run
    /// for the life of the process).
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            reconcile_tick_secs = self.config.reconcile_tick_secs,
            audit_tick_secs = self.config.audit_tick_secs,
            retention_tick_secs = self.config.retention_tick_secs,
            "starting reconciliation jobs"
        );
        vec![
            self.spawn_reconcile_loop(),
            self.spawn_audit_loop(),
            self.spawn_retention_loop(),
        ]
    }

    fn spawn_reconcile_loop(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let period = Duration::from_secs(self.config.reconcile_tick_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match service.run_reconcile_pass().await {
                    Ok(summary) if summary.scanned > 0 || summary.swept_legacy > 0 => {
                        info!(
                            swept_legacy = summary.swept_legacy,
                            scanned = summary.scanned,
                            removed = summary.removed,
                            retried = summary.retried,
                            dead_lettered = summary.dead_lettered,
                            errors = summary.errors,
                            "reconciliation pass complete"
                        );
                    }
                    Ok(_) => debug!("reconciliation pass found nothing pending"),
                    Err(e) => error!(error = %e, "reconciliation pass failed"),
                }
            }
        })
    }

    fn spawn_audit_loop(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let period = Duration::from_secs(self.config.audit_tick_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match service.run_audit_pass().await {
                    Ok(summary) if summary.scanned > 0 => {
                        info!(
                            scanned = summary.scanned,
                            repaired = summary.repaired,
                            deleted = summary.deleted,
                            remaining = summary.remaining,
                            errors = summary.errors,
                            "audit pass complete"
                        );
                    }
                    Ok(_) => debug!("audit pass found an empty dead-letter store"),
                    Err(e) => error!(error = %e, "audit pass failed"),
                }
            }
        })
    }

    fn spawn_retention_loop(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let period = Duration::from_secs(self.config.retention_tick_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = service.run_retention_pass().await {
                    error!(error = %e, "retention sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::service::tests::fixture;

    // The first interval tick fires immediately, so a freshly started
    // scheduler runs one pass of each job right away.
    #[tokio::test]
    async fn test_start_spawns_three_running_loops() {
        let f = fixture();
        let service = Arc::new(f.service);
        let config = ReconcilerConfig {
            reconcile_tick_secs: 3600,
            audit_tick_secs: 3600,
            retention_tick_secs: 3600,
            ..ReconcilerConfig::default()
        };

        let scheduler = JobScheduler::new(service, config);
        let handles = scheduler.start();
        assert_eq!(handles.len(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        for handle in &handles {
            assert!(!handle.is_finished());
        }
        for handle in handles {
            handle.abort();
        }
    }
}
