//! Data structures for replication runs.

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ReplicationError;

/// Describes one storage object as observed by a listing or probe.
///
/// Immutable once created; `fingerprint` is an opaque equality token supplied
/// by the storage service (the ETag), not a cryptographic guarantee. Two
/// descriptors refer to equivalent objects iff `fingerprint` and `size` both
/// match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Object key, unique within one enumeration pass.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Service-supplied equality token (normalized ETag).
    pub fingerprint: String,
    /// Server-side encryption marker, if the object carries one.
    pub encryption: Option<String>,
}

impl ObjectDescriptor {
    /// Whether `other` holds equivalent content according to the service's
    /// equality oracle.
    pub fn equivalent(&self, other: &ObjectDescriptor) -> bool {
        self.fingerprint == other.fingerprint && self.size == other.size
    }
}

/// Terminal result for one object, produced exactly once per run.
///
/// Workers return outcomes by value; only the coordinator's aggregation point
/// ever folds them into shared state.
#[derive(Debug)]
pub enum Outcome {
    /// The object was copied and the post-copy check confirmed equivalence.
    Copied,
    /// No copy was needed; the reason says why.
    Skipped(String),
    /// Dry-run mode: the object would have been copied.
    WouldCopy,
    /// The object could not be replicated.
    Failed {
        /// Key of the failed object.
        key: String,
        /// What went wrong.
        cause: ReplicationError,
    },
}

/// How a completed run is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every object converged.
    Succeeded,
    /// Some objects failed, but no more than the tolerated ratio.
    SucceededWithWarnings,
    /// The failure ratio exceeded the tolerated threshold.
    Failed,
    /// The run deadline expired before every object was processed.
    Truncated,
    /// The enumeration produced zero objects.
    NothingToDo,
}

/// Failure ratio above which a run is classified as failed.
const FAILURE_RATIO_THRESHOLD: f64 = 0.10;

/// Aggregated result of one replication run.
///
/// Built incrementally from [`Outcome`]s in completion order and immutable
/// once the run finishes. This is the sole externally observable result of a
/// run besides side effects on the destination bucket.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Number of objects the enumerator produced.
    pub total: usize,
    /// Objects copied (and verified) this run.
    pub copied: usize,
    /// Objects skipped because the destination already matched.
    pub skipped: usize,
    /// Objects that would have been copied (dry-run only).
    pub would_copy: usize,
    /// Objects that failed.
    pub failed: usize,
    /// Keys of failed objects, in completion order.
    pub failed_keys: Vec<String>,
    /// True when the run deadline expired with workers still outstanding;
    /// the counters then cover only the outcomes recorded before the cut.
    pub truncated: bool,
    /// Wall-clock duration of the run.
    #[serde(serialize_with = "duration_secs")]
    pub duration: Duration,
}

fn duration_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunSummary {
    /// Creates a zeroed summary for a run over `total` objects.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            copied: 0,
            skipped: 0,
            would_copy: 0,
            failed: 0,
            failed_keys: Vec::new(),
            truncated: false,
            duration: Duration::ZERO,
        }
    }

    /// Folds one outcome into the counters.
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Copied => self.copied += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::WouldCopy => self.would_copy += 1,
            Outcome::Failed { key, .. } => {
                self.failed += 1;
                self.failed_keys.push(key.clone());
            }
        }
    }

    /// Fraction of objects that failed, 0.0 for an empty run.
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }

    /// Classifies the finished run against the failure-ratio threshold.
    ///
    /// A truncated run is never a success, whatever the recorded counters
    /// say: objects never dispatched are in an unknown state.
    pub fn status(&self) -> RunStatus {
        if self.truncated {
            RunStatus::Truncated
        } else if self.total == 0 {
            RunStatus::NothingToDo
        } else if self.failed == 0 {
            RunStatus::Succeeded
        } else if self.failure_ratio() <= FAILURE_RATIO_THRESHOLD {
            RunStatus::SucceededWithWarnings
        } else {
            RunStatus::Failed
        }
    }
}

/// Caller-supplied hints for probe-based discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryHints {
    /// File extensions to probe for (`pdf`, `csv`, ...).
    pub extensions: Vec<String>,
    /// Folder names to probe under.
    pub folders: Vec<String>,
    /// Key prefixes to probe.
    pub prefixes: Vec<String>,
}

impl DiscoveryHints {
    /// True when the caller supplied no hints at all.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.folders.is_empty() && self.prefixes.is_empty()
    }
}

/// Configuration for one replication run.
///
/// # Example
///
/// ```
/// use bucketsync::ReplicationConfig;
///
/// let config = ReplicationConfig {
///     source_bucket: "prod-data".to_string(),
///     dest_bucket: "prod-data-replica".to_string(),
///     dry_run: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Bucket to replicate from.
    pub source_bucket: String,
    /// Bucket to replicate into.
    pub dest_bucket: String,
    /// When true, classify objects without mutating the destination.
    pub dry_run: bool,
    /// Size of the worker pool (default: 10).
    ///
    /// Workers are I/O-bound; this is not limited by CPU cores. The limiting
    /// factor is the storage service's request throttling, not CPU.
    pub max_workers: usize,
    /// Fall back to probe-based discovery when listing is denied.
    pub fallback_discovery: bool,
    /// Hints feeding the probe candidate generator.
    pub hints: DiscoveryHints,
    /// Where to persist keys found by probe discovery, if anywhere.
    pub discovered_keys_path: Option<PathBuf>,
    /// Newline-delimited key file seeding the probe candidate set.
    pub seed_keys_path: Option<PathBuf>,
    /// Run-level deadline; outstanding workers are abandoned once it passes.
    pub run_timeout: Option<Duration>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            source_bucket: String::new(),
            dest_bucket: String::new(),
            dry_run: false,
            max_workers: 10,
            fallback_discovery: true,
            hints: DiscoveryHints::default(),
            discovered_keys_path: Some(PathBuf::from("discovered_objects.txt")),
            seed_keys_path: None,
            run_timeout: None,
        }
    }
}
