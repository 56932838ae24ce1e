//! Source enumeration: bucket listing and probe-based discovery.
//!
//! The listing strategy paginates the bucket listing to exhaustion. When
//! listing is denied by policy, the probe-based fallback tests a generated
//! candidate key space with metadata-only probes. Probing is a sampling
//! heuristic over an unbounded true key space: any key not matching a
//! generated pattern is a false negative, so the discovered set is
//! explicitly incomplete.

use chrono::Datelike;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ReplicationError;
use crate::store::{StorageClient, StoreError};
use crate::types::{DiscoveryHints, ObjectDescriptor};

/// Lists every object in `bucket`, following continuation tokens to
/// exhaustion.
///
/// Zero objects is not an error; the caller receives an empty vector.
pub(crate) async fn list_source(
    source: &dyn StorageClient,
    bucket: &str,
) -> Result<Vec<ObjectDescriptor>, StoreError> {
    let mut descriptors = Vec::new();
    let mut continuation = None;

    loop {
        let page = source.list_page(bucket, continuation).await?;
        descriptors.extend(page.objects);
        match page.next {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    info!("listed {} objects in {}", descriptors.len(), bucket);
    Ok(descriptors)
}

/// Produces candidate keys for probe-based discovery.
///
/// The built-in pattern dictionary is one implementation; the coordinator
/// only depends on this trait, so candidate generation can be extended or
/// swapped without touching it.
pub trait CandidateSource: Send + Sync {
    /// Candidate keys to probe, deduplicated, in probe order.
    fn candidates(&self) -> Vec<String>;
}

const EXTENSIONS: &[&str] = &[
    "txt", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "gif", "svg",
    "mp4", "mov", "mp3", "wav", "zip", "rar", "7z", "tar", "gz", "json", "xml", "csv", "log",
    "html", "css", "js", "sql", "db", "bak", "tmp",
];

const FOLDERS: &[&str] = &[
    "documents", "docs", "files", "data", "backup", "backups", "images", "photos", "media",
    "videos", "audio", "reports", "exports", "imports", "uploads", "downloads", "archive", "logs",
    "config", "public", "private", "shared", "assets", "static", "db",
];

const COMMON_NAMES: &[&str] = &[
    "index", "main", "default", "readme", "config", "settings", "data", "backup", "export",
    "import", "report", "log", "test", "sample", "template", "file", "document", "image",
];

const APP_LAYOUT_KEYS: &[&str] = &[
    "aws-logs/cloudtrail.json",
    "logs/application.log",
    "configs/app.json",
    "static/assets/style.css",
    "uploads/user_data.csv",
    "backups/db_backup.sql",
    "exports/data_export.xlsx",
];

/// The built-in candidate dictionary: common name/extension/folder/date
/// combinations plus caller-supplied hints and optional seed keys.
pub struct BuiltinPatterns {
    hints: DiscoveryHints,
    seed_keys: Vec<String>,
}

impl BuiltinPatterns {
    /// Dictionary extended with the given discovery hints.
    pub fn new(hints: DiscoveryHints) -> Self {
        Self {
            hints,
            seed_keys: Vec::new(),
        }
    }

    /// Prepends keys recovered from a previous discovery run; these are
    /// probed before any generated pattern.
    pub fn with_seed_keys(mut self, seed_keys: Vec<String>) -> Self {
        self.seed_keys = seed_keys;
        self
    }
}

impl CandidateSource for BuiltinPatterns {
    fn candidates(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut push = |candidate: String| {
            if seen.insert(candidate.clone()) {
                out.push(candidate);
            }
        };

        for key in &self.seed_keys {
            push(key.clone());
        }

        // Root-level files with common names.
        for name in COMMON_NAMES {
            for ext in EXTENSIONS {
                push(format!("{}.{}", name, ext));
            }
        }

        // Files in common folders, with numbered variants.
        for folder in FOLDERS {
            for name in COMMON_NAMES {
                for ext in EXTENSIONS {
                    push(format!("{}/{}.{}", folder, name, ext));
                    push(format!("{}/{}_1.{}", folder, name, ext));
                    push(format!("{}/{}_2.{}", folder, name, ext));
                }
            }
        }

        // Date-based layouts over the last five years.
        let current_year = chrono::Utc::now().year();
        for year in (current_year - 5)..=current_year {
            for month in 1..=12u32 {
                for ext in EXTENSIONS {
                    push(format!("{}/{:02}/data.{}", year, month, ext));
                    push(format!("{}-{:02}/backup.{}", year, month, ext));
                    push(format!("backup/{}/{:02}.{}", year, month, ext));
                    push(format!("reports/{}-{:02}.{}", year, month, ext));
                }
            }
        }

        // Numbered files.
        for i in 1..=100u32 {
            for ext in EXTENSIONS {
                push(format!("file{:03}.{}", i, ext));
                push(format!("document{}.{}", i, ext));
                push(format!("backup{}.{}", i, ext));
            }
        }

        for key in APP_LAYOUT_KEYS {
            push((*key).to_string());
        }

        // Hint-derived patterns.
        if !self.hints.extensions.is_empty() {
            let folders: Vec<&str> = if self.hints.folders.is_empty() {
                vec!["", "data", "files"]
            } else {
                self.hints.folders.iter().map(String::as_str).collect()
            };
            for folder in &folders {
                for ext in &self.hints.extensions {
                    for name in ["data", "file", "document", "backup", "export"] {
                        if folder.is_empty() {
                            push(format!("{}.{}", name, ext));
                        } else {
                            push(format!("{}/{}.{}", folder, name, ext));
                        }
                    }
                }
            }
        }

        for prefix in &self.hints.prefixes {
            for ext in ["txt", "json", "csv", "log", "pdf"] {
                push(format!("{}.{}", prefix, ext));
                push(format!("{}/data.{}", prefix, ext));
            }
        }

        out
    }
}

/// Probes the candidate key space against the source bucket and retains the
/// candidates that resolve to a real object.
///
/// Probes run with bounded concurrency. Any individual probe error is
/// treated the same as "not found" — a failed probe never fails the scan.
/// The result is inherently incomplete: only keys matching a generated
/// pattern can be discovered.
pub(crate) async fn probe_discovery(
    source: &dyn StorageClient,
    bucket: &str,
    generator: &dyn CandidateSource,
    max_workers: usize,
) -> Vec<ObjectDescriptor> {
    let candidates = generator.candidates();
    let total = candidates.len();
    info!("listing denied; probing {} candidate keys against {}", total, bucket);

    let mut probes = stream::iter(candidates.into_iter().map(|candidate| async move {
        match source.head(bucket, &candidate).await {
            Ok(found) => found,
            Err(err) => {
                // Fail open: an errored probe means "absent", never a
                // failed scan.
                debug!("probe error for {}: {}", candidate, err);
                None
            }
        }
    }))
    .buffer_unordered(max_workers.max(1));

    let mut discovered = Vec::new();
    let mut processed = 0usize;
    while let Some(found) = probes.next().await {
        processed += 1;
        if let Some(descriptor) = found {
            info!("discovered {}", descriptor.key);
            discovered.push(descriptor);
        }
        if processed % 500 == 0 {
            debug!(
                "probed {}/{} candidates, found {}",
                processed,
                total,
                discovered.len()
            );
        }
    }

    info!(
        "probe discovery complete: {} of {} candidates exist (scan is incomplete by nature)",
        discovered.len(),
        total
    );
    discovered
}

/// Persists discovered keys newline-delimited so a later run can seed its
/// candidate set without re-probing.
pub(crate) fn persist_discovered_keys(
    path: &Path,
    descriptors: &[ObjectDescriptor],
) -> Result<(), ReplicationError> {
    let mut lines = descriptors
        .iter()
        .map(|d| d.key.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    lines.push('\n');
    std::fs::write(path, lines)?;
    info!("persisted {} discovered keys to {}", descriptors.len(), path.display());
    Ok(())
}

/// Loads a newline-delimited key file produced by a previous run.
pub(crate) fn load_seed_keys(path: &Path) -> Result<Vec<String>, ReplicationError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MemoryStore;

    #[tokio::test]
    async fn listing_follows_pagination_to_exhaustion() {
        let store = MemoryStore::with_page_size(2);
        for i in 0..5 {
            store.insert("src", &format!("k{}.txt", i), 10, "fp");
        }
        let descriptors = list_source(&store, "src").await.unwrap();
        assert_eq!(descriptors.len(), 5);
    }

    #[tokio::test]
    async fn denied_listing_surfaces_access_denied() {
        let store = MemoryStore::new();
        store.deny_listing();
        let err = list_source(&store, "src").await.unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn empty_bucket_lists_as_empty_not_error() {
        let store = MemoryStore::new();
        assert!(list_source(&store, "src").await.unwrap().is_empty());
    }

    #[test]
    fn dictionary_covers_expected_pattern_families() {
        let candidates = BuiltinPatterns::new(DiscoveryHints::default()).candidates();
        let set: HashSet<&str> = candidates.iter().map(String::as_str).collect();
        assert!(set.contains("readme.txt"));
        assert!(set.contains("backups/db_backup.sql"));
        assert!(set.contains("file001.txt"));
        let year = chrono::Utc::now().year();
        assert!(set.contains(format!("{}/01/data.csv", year).as_str()));
        // Deduplicated.
        assert_eq!(set.len(), candidates.len());
    }

    #[test]
    fn hints_and_seed_keys_extend_the_dictionary() {
        let hints = DiscoveryHints {
            extensions: vec!["parquet".to_string()],
            folders: vec!["warehouse".to_string()],
            prefixes: vec!["nightly".to_string()],
        };
        let generator = BuiltinPatterns::new(hints)
            .with_seed_keys(vec!["known/object.bin".to_string()]);
        let candidates = generator.candidates();

        assert_eq!(candidates[0], "known/object.bin");
        assert!(candidates.contains(&"warehouse/data.parquet".to_string()));
        assert!(candidates.contains(&"nightly.csv".to_string()));
        assert!(candidates.contains(&"nightly/data.log".to_string()));
    }

    struct FixedCandidates(Vec<String>);

    impl CandidateSource for FixedCandidates {
        fn candidates(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn probing_retains_only_existing_objects() {
        let store = MemoryStore::new();
        store.insert("src", "data.csv", 42, "fp-data");
        let generator = FixedCandidates(vec![
            "data.csv".to_string(),
            "missing.txt".to_string(),
        ]);

        let discovered = probe_discovery(&store, "src", &generator, 4).await;
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].key, "data.csv");
        assert_eq!(discovered[0].size, 42);
    }

    #[tokio::test]
    async fn probe_errors_are_treated_as_absent() {
        let store = MemoryStore::new();
        store.insert("src", "a.txt", 1, "fp");
        store.insert("src", "b.txt", 2, "fp");
        store.fail_head("src", "b.txt");
        let generator = FixedCandidates(vec!["a.txt".to_string(), "b.txt".to_string()]);

        let discovered = probe_discovery(&store, "src", &generator, 2).await;
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].key, "a.txt");
    }

    #[test]
    fn discovered_keys_round_trip_through_the_seed_file() {
        let path = std::env::temp_dir().join(format!(
            "bucketsync-seed-{}-{:?}.txt",
            std::process::id(),
            std::thread::current().id()
        ));
        let descriptors = vec![
            ObjectDescriptor {
                key: "a.txt".to_string(),
                size: 1,
                fingerprint: "fp".to_string(),
                encryption: None,
            },
            ObjectDescriptor {
                key: "docs/b.pdf".to_string(),
                size: 2,
                fingerprint: "fp".to_string(),
                encryption: None,
            },
        ];

        persist_discovered_keys(&path, &descriptors).unwrap();
        let seeds = load_seed_keys(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(seeds, vec!["a.txt".to_string(), "docs/b.pdf".to_string()]);
    }
}
