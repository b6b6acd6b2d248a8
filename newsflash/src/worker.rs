use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::select;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};

use crate::notify;
use crate::scraping::NewsSource;
use crate::storage;
use crate::subscribers::SubscriberDirectory;
use crate::telegram::DeliveryChannel;

/// A non-fatal pipeline failure, tagged with the stage that produced it.
/// None of these ever aborts a cycle; they are collected into the report
/// and logged at the loop boundary.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("source {source}: {cause}")]
    Source {
        source: String,
        #[source]
        cause: anyhow::Error,
    },
    #[error("persist {link}: {cause}")]
    Persist { link: String, cause: anyhow::Error },
    #[error("resolve subscribers: {cause}")]
    Resolve { cause: anyhow::Error },
    #[error("deliver to chat {chat_id}: {cause}")]
    Deliver { chat_id: i64, cause: anyhow::Error },
}

/// Per-source tally for one cycle.
#[derive(Debug, Default)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub new: usize,
    pub notified: usize,
}

/// Everything one cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    pub faults: Vec<Fault>,
}

impl CycleReport {
    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|s| s.new).sum()
    }

    pub fn total_notified(&self) -> usize {
        self.sources.iter().map(|s| s.notified).sum()
    }
}

/// The pipeline's injected dependencies. Constructed once in `main` (or a
/// test) and borrowed by every cycle.
pub struct Pipeline {
    pub pool: SqlitePool,
    pub sources: Vec<Box<dyn NewsSource>>,
    pub directory: Box<dyn SubscriberDirectory>,
    pub channel: Box<dyn DeliveryChannel>,
}

/// Run one full fetch -> dedupe -> route -> deliver pass over every source.
/// Never fails: faults are collected in the returned report.
pub async fn run_cycle(pipeline: &Pipeline) -> CycleReport {
    let mut report = CycleReport::default();

    // Subscribers are resolved once per cycle; routing reads them only.
    let subscribers = match pipeline.directory.active_subscribers().await {
        Ok(subs) => subs,
        Err(cause) => {
            report.faults.push(Fault::Resolve { cause });
            Vec::new()
        }
    };

    for source in &pipeline.sources {
        let label = source.name().to_string();
        let mut tally = SourceReport {
            source: label.clone(),
            ..Default::default()
        };

        let candidates = match source.fetch_candidates().await {
            Ok(candidates) => candidates,
            Err(cause) => {
                report.faults.push(Fault::Source {
                    source: label,
                    cause,
                });
                report.sources.push(tally);
                continue;
            }
        };
        tally.fetched = candidates.len();

        // Insertion always runs; the batch gate only silences notification.
        let mut fresh = Vec::new();
        for candidate in candidates {
            match storage::insert_if_new(&pipeline.pool, &candidate).await {
                Ok(true) => fresh.push(candidate),
                Ok(false) => {}
                Err(cause) => report.faults.push(Fault::Persist {
                    link: candidate.link.clone(),
                    cause,
                }),
            }
        }
        tally.new = fresh.len();

        let deliveries = notify::plan_deliveries(&label, tally.fetched, &fresh, &subscribers);
        for delivery in deliveries {
            match pipeline.channel.send(delivery.chat_id, &delivery.text).await {
                Ok(()) => tally.notified += 1,
                Err(cause) => report.faults.push(Fault::Deliver {
                    chat_id: delivery.chat_id,
                    cause,
                }),
            }
        }

        info!(
            source = %tally.source,
            fetched = tally.fetched,
            new = tally.new,
            notified = tally.notified,
            "source processed"
        );
        report.sources.push(tally);
    }

    report
}

/// Top-level worker entrypoint. Runs a cycle immediately, then one per
/// interval, until `shutdown_notify` is signalled. An in-flight cycle
/// always finishes before the loop exits.
pub async fn run_worker(
    pipeline: Pipeline,
    interval: Duration,
    shutdown_notify: Arc<Notify>,
) -> anyhow::Result<()> {
    info!(interval_seconds = interval.as_secs(), "worker: starting scrape loop");

    loop {
        let report = run_cycle(&pipeline).await;
        for fault in &report.faults {
            error!(%fault, "cycle fault");
        }
        info!(
            new = report.total_new(),
            notified = report.total_notified(),
            faults = report.faults.len(),
            "cycle complete"
        );

        select! {
            _ = tokio::time::sleep(interval) => {
                // Loop again
            },
            _ = shutdown_notify.notified() => {
                info!("worker: shutdown requested, exiting loop");
                break;
            }
        }
    }

    info!("worker: cleanup complete");
    Ok(())
}
