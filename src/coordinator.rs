//! Run orchestration: enumeration strategy selection, the bounded worker
//! pool, and outcome aggregation.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio_retry2::strategy::jitter;
use tokio_retry2::{Retry, RetryError};
use tracing::{info, warn};

use crate::copy::{replicate_object, CopyContext};
use crate::enumerate::{self, BuiltinPatterns};
use crate::error::ReplicationError;
use crate::retry::backoff_schedule;
use crate::store::{StorageClient, StoreError};
use crate::types::{ObjectDescriptor, Outcome, ReplicationConfig, RunSummary};

/// Retries for the listing pass before the run gives up on enumeration.
const LIST_RETRIES: u32 = 3;

/// Runs one replication pass from the source bucket to the destination.
///
/// Enumeration tries the listing API first and falls back to probe-based
/// discovery only when listing is denied and the fallback is enabled. Every
/// discovered object is dispatched across the worker pool; per-object errors
/// become `Failed` outcomes and never abort the run. The returned summary is
/// classified against the failure-ratio threshold by [`RunSummary::status`].
pub async fn run_replication(
    source: Arc<dyn StorageClient>,
    dest: Arc<dyn StorageClient>,
    config: ReplicationConfig,
) -> Result<RunSummary, ReplicationError> {
    let started = Instant::now();
    info!(
        "replicating {} -> {}{}",
        config.source_bucket,
        config.dest_bucket,
        if config.dry_run { " (dry run)" } else { "" }
    );

    let descriptors = enumerate_source(&source, &config).await?;

    if descriptors.is_empty() {
        info!("nothing to do: enumeration produced no objects");
        let mut summary = RunSummary::new(0);
        summary.duration = started.elapsed();
        return Ok(summary);
    }

    let mut summary = dispatch(&source, &dest, &config, descriptors).await;
    summary.duration = started.elapsed();
    log_summary(&summary);
    Ok(summary)
}

/// Selects the enumeration strategy: listing first (with bounded retries on
/// transient errors), probe-based discovery only on a policy denial.
async fn enumerate_source(
    source: &Arc<dyn StorageClient>,
    config: &ReplicationConfig,
) -> Result<Vec<ObjectDescriptor>, ReplicationError> {
    let listed = Retry::spawn(backoff_schedule(LIST_RETRIES).map(jitter), || {
        let source = Arc::clone(source);
        let bucket = config.source_bucket.clone();

        async move {
            match enumerate::list_source(source.as_ref(), &bucket).await {
                Ok(descriptors) => Ok(descriptors),
                Err(err @ StoreError::AccessDenied(_)) => RetryError::to_permanent(err),
                Err(err) => {
                    warn!("listing attempt failed: {}", err);
                    RetryError::to_transient(err)
                }
            }
        }
    })
    .await;

    match listed {
        Ok(descriptors) => Ok(descriptors),
        Err(StoreError::AccessDenied(cause)) => {
            if !config.fallback_discovery {
                return Err(ReplicationError::EnumerationDenied(cause));
            }
            warn!("source listing denied ({}), switching to probe-based discovery", cause);

            let mut generator = BuiltinPatterns::new(config.hints.clone());
            if let Some(seed_path) = &config.seed_keys_path {
                match enumerate::load_seed_keys(seed_path) {
                    Ok(seeds) => {
                        info!("seeded {} keys from {}", seeds.len(), seed_path.display());
                        generator = generator.with_seed_keys(seeds);
                    }
                    Err(err) => {
                        warn!("could not read seed keys from {}: {}", seed_path.display(), err)
                    }
                }
            }

            let discovered = enumerate::probe_discovery(
                source.as_ref(),
                &config.source_bucket,
                &generator,
                config.max_workers,
            )
            .await;

            if let Some(path) = &config.discovered_keys_path {
                if !discovered.is_empty() {
                    if let Err(err) = enumerate::persist_discovered_keys(path, &discovered) {
                        warn!("could not persist discovered keys: {}", err);
                    }
                }
            }
            Ok(discovered)
        }
        Err(err) => Err(ReplicationError::FatalInit(format!(
            "source enumeration failed: {}",
            err
        ))),
    }
}

/// Dispatches every descriptor across the worker pool and aggregates the
/// outcomes into a summary, in completion order.
async fn dispatch(
    source: &Arc<dyn StorageClient>,
    dest: &Arc<dyn StorageClient>,
    config: &ReplicationConfig,
    descriptors: Vec<ObjectDescriptor>,
) -> RunSummary {
    let total = descriptors.len();
    let mut summary = RunSummary::new(total);

    let pb = indicatif::ProgressBar::new(total as u64);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}")
            .unwrap()
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(format!("replicating {} objects", total));

    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let (tx, mut rx) = mpsc::channel::<Outcome>(config.max_workers.max(1));

    for descriptor in descriptors {
        let semaphore = Arc::clone(&semaphore);
        let source = Arc::clone(source);
        let dest = Arc::clone(dest);
        let tx = tx.clone();
        let pb = pb.clone();
        let source_bucket = config.source_bucket.clone();
        let dest_bucket = config.dest_bucket.clone();
        let dry_run = config.dry_run;

        tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let ctx = CopyContext {
                source: source.as_ref(),
                dest: dest.as_ref(),
                source_bucket: &source_bucket,
                dest_bucket: &dest_bucket,
                dry_run,
            };
            let outcome = replicate_object(&ctx, &descriptor).await;
            pb.inc(1);
            // A closed receiver means the run was abandoned; the outcome
            // is dropped with it.
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    // Single aggregation point: outcomes fold into the summary here and
    // nowhere else. Workers never touch shared counters.
    let aggregate = async {
        while let Some(outcome) = rx.recv().await {
            if let Outcome::Failed { key, cause } = &outcome {
                warn!("{} failed: {}", key, cause);
            }
            summary.record(&outcome);
        }
    };

    match config.run_timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, aggregate).await.is_err() {
                warn!(
                    "run timeout of {} reached; abandoning outstanding workers",
                    humantime::format_duration(limit)
                );
                summary.truncated = true;
            }
        }
        None => aggregate.await,
    }

    pb.finish_and_clear();
    summary
}

fn log_summary(summary: &RunSummary) {
    let rounded = std::time::Duration::from_secs(summary.duration.as_secs());
    info!(
        "run finished in {}: total {}, copied {}, skipped {}, would copy {}, failed {}",
        humantime::format_duration(rounded),
        summary.total,
        summary.copied,
        summary.skipped,
        summary.would_copy,
        summary.failed
    );
    for key in &summary.failed_keys {
        warn!("failed: {}", key);
    }
    if summary.failed > 0 {
        warn!("failure ratio: {:.1}%", summary.failure_ratio() * 100.0);
    }
}
