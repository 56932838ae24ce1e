//! Per-object copy execution.
//!
//! State machine per object:
//! `Pending -> (Skipped | WouldCopy | Copying -> Verifying -> Copied) | Failed`.
//! No state is re-entered within a run, and the executor never retries —
//! a future run is idempotent and retries naturally.

use tracing::{debug, info};

use crate::diff;
use crate::error::ReplicationError;
use crate::store::StorageClient;
use crate::types::{ObjectDescriptor, Outcome};

/// Shared, read-only context for copy workers.
pub(crate) struct CopyContext<'a> {
    pub source: &'a dyn StorageClient,
    pub dest: &'a dyn StorageClient,
    pub source_bucket: &'a str,
    pub dest_bucket: &'a str,
    pub dry_run: bool,
}

/// Replicates one object, converting every error into a `Failed` outcome.
///
/// This is the worker boundary: nothing past it aborts the run.
pub(crate) async fn replicate_object(
    ctx: &CopyContext<'_>,
    descriptor: &ObjectDescriptor,
) -> Outcome {
    match try_replicate(ctx, descriptor).await {
        Ok(outcome) => outcome,
        Err(cause) => Outcome::Failed {
            key: descriptor.key.clone(),
            cause,
        },
    }
}

async fn try_replicate(
    ctx: &CopyContext<'_>,
    descriptor: &ObjectDescriptor,
) -> Result<Outcome, ReplicationError> {
    let key = &descriptor.key;

    // Idempotence guarantee: repeated runs converge to a zero-copy steady
    // state without touching the destination.
    if diff::matches(
        ctx.dest,
        ctx.dest_bucket,
        key,
        descriptor.size,
        &descriptor.fingerprint,
    )
    .await?
    {
        return Ok(Outcome::Skipped(
            "already exists and matches".to_string(),
        ));
    }

    if ctx.dry_run {
        info!("DRY RUN: would copy {}", key);
        return Ok(Outcome::WouldCopy);
    }

    // Fresh head against the source: discovers encryption attributes the
    // listing does not carry, and catches objects deleted since enumeration.
    let source_object = ctx
        .source
        .head(ctx.source_bucket, key)
        .await
        .map_err(|err| ReplicationError::CopyFailed {
            key: key.clone(),
            cause: format!("source metadata fetch failed: {}", err),
        })?
        .ok_or_else(|| ReplicationError::SourceMissing { key: key.clone() })?;

    debug!(
        "copying {} ({} bytes, encryption: {:?})",
        key, source_object.size, source_object.encryption
    );

    ctx.dest
        .copy(
            ctx.source_bucket,
            ctx.dest_bucket,
            key,
            source_object.encryption.as_deref(),
        )
        .await
        .map_err(|err| ReplicationError::CopyFailed {
            key: key.clone(),
            cause: err.to_string(),
        })?;

    // Only report Copied once the post-copy check confirms equivalence; this
    // closes the loop against copies that silently fail server-side or race
    // with a concurrent writer on the destination.
    if diff::matches(
        ctx.dest,
        ctx.dest_bucket,
        key,
        source_object.size,
        &source_object.fingerprint,
    )
    .await?
    {
        info!("copied {}", key);
        Ok(Outcome::Copied)
    } else {
        Err(ReplicationError::VerificationFailed { key: key.clone() })
    }
}
