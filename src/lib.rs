//! BucketSync - Server-side S3 bucket replication, cross-region capable
//!
//! This library replicates the contents of a source bucket into a destination
//! bucket using server-side copy, so object bytes never transit the machine
//! running it. Each run is a best-effort, idempotent convergence pass: it
//! enumerates the source, diffs against the destination's current state, and
//! copies only what is missing or different.
//!
//! # Features
//!
//! - **Server-Side Copy**: No local staging of object data
//! - **Destination Diffing**: Fingerprint + size equality skips up-to-date objects
//! - **Probe-Based Discovery**: Fallback enumeration when bucket listing is denied
//! - **Bounded Concurrency**: Configurable worker pool over independent per-object jobs
//! - **Dry-Run Mode**: Classify objects without touching the destination
//! - **Post-Copy Verification**: A copy only counts once the destination matches
//!
//! # Example
//!
//! ```no_run
//! use bucketsync::{run_replication, ReplicationConfig, S3StorageClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(S3StorageClient::for_region("us-east-1").await);
//! let dest = Arc::new(S3StorageClient::for_region("eu-west-1").await);
//!
//! let config = ReplicationConfig {
//!     source_bucket: "prod-data".to_string(),
//!     dest_bucket: "prod-data-replica".to_string(),
//!     ..Default::default()
//! };
//!
//! let summary = run_replication(source, dest, config).await?;
//! println!("copied {} of {} objects", summary.copied, summary.total);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod copy;
mod diff;
mod enumerate;
mod error;
mod retry;
mod store;
mod types;

pub use coordinator::run_replication;
pub use enumerate::{BuiltinPatterns, CandidateSource};
pub use error::ReplicationError;
pub use store::{ListPage, S3StorageClient, StorageClient, StoreError};
pub use types::{
    DiscoveryHints, ObjectDescriptor, Outcome, ReplicationConfig, RunStatus, RunSummary,
};
