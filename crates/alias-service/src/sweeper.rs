//! Expiry sweeper for temporary aliases.
//!
//! Periodically scans the expiry store and removes aliases whose window has
//! passed: first the provider's forwarding rule, then the bookkeeping entry.

use crate::alias::ExpiryRecord;
use chrono::{DateTime, Utc};
use email_routing_client::{DeleteOutcome, EmailRouting};
use kv_store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Summary of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys inspected
    pub checked: usize,
    /// Keys past their expiry
    pub expired: usize,
    /// Aliases fully removed
    pub removed: Vec<String>,
    /// Aliases left in place after a failure
    pub failed: Vec<String>,
}

/// Sweeper that removes expired aliases.
pub struct ExpirySweeper {
    provider: Arc<dyn EmailRouting>,
    kv: Arc<dyn KvStore>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a new sweeper.
    pub fn new(provider: Arc<dyn EmailRouting>, kv: Arc<dyn KvStore>, interval: Duration) -> Self {
        Self {
            provider,
            kv,
            interval,
        }
    }

    /// Run a single pass as of now.
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run a single pass treating `now` as the current time.
    ///
    /// Entries are handled one at a time. A failure on one alias leaves its
    /// entry for the next pass and moves on.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let keys = match self.kv.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Failed to list expiry records: {}", e);
                return report;
            }
        };

        for key in keys {
            report.checked += 1;

            let value = match self.kv.get(&key).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!(alias = %key, "Failed to read expiry record: {}", e);
                    continue;
                }
            };

            let Some(record) = ExpiryRecord::parse(key.as_str(), &value) else {
                warn!(alias = %key, value = %value, "Ignoring unparsable expiry record");
                continue;
            };

            if !record.is_expired(now) {
                continue;
            }
            report.expired += 1;

            if self.remove(&record).await {
                report.removed.push(record.address);
            } else {
                report.failed.push(record.address);
            }
        }

        report
    }

    /// Delete the provider rule, then the store entry.
    async fn remove(&self, record: &ExpiryRecord) -> bool {
        match self.provider.delete_rule(&record.address).await {
            Ok(DeleteOutcome::Deleted { rule_id }) => {
                info!(alias = %record.address, rule_id = %rule_id, "Deleted expired forwarding rule");
            }
            Ok(DeleteOutcome::NotFound) => {
                debug!(alias = %record.address, "No forwarding rule left for expired alias");
            }
            Err(e) => {
                warn!(alias = %record.address, "Failed to delete forwarding rule, will retry: {}", e);
                return false;
            }
        }

        match self.kv.delete(&record.address).await {
            Ok(()) => true,
            Err(e) => {
                warn!(alias = %record.address, "Failed to delete expiry record: {}", e);
                false
            }
        }
    }

    /// Run the sweeper as a background task.
    ///
    /// Passes start on a fixed cadence; a slow pass delays the next tick
    /// rather than bursting to catch up.
    pub async fn run(&self) {
        info!("Starting expiry sweeper, interval: {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let report = self.sweep_once().await;

            if report.expired == 0 {
                debug!(checked = report.checked, "No expired aliases this pass");
            } else {
                info!(
                    checked = report.checked,
                    removed = report.removed.len(),
                    failed = report.failed.len(),
                    "Sweep pass complete"
                );
            }
        }
    }
}

/// Spawn the expiry sweeper as a background task.
pub fn spawn_sweeper(sweeper: ExpirySweeper) -> tokio::task::JoinHandle<()> {
    let sweeper = Arc::new(sweeper);

    tokio::spawn(async move {
        sweeper.run().await;
    })
}
