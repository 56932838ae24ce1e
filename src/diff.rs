//! Destination-state diffing.

use tracing::{debug, info};

use crate::error::ReplicationError;
use crate::store::StorageClient;

/// Checks whether the destination already holds an object equivalent to the
/// source descriptor (fingerprint and size both equal).
///
/// An absent destination object is an ordinary `false`, and a mismatch is
/// logged at info level and reported as `false` (needs copy). Any lookup
/// error other than absence propagates as `DiffCheckFailed` — it is never
/// silently treated as a match or non-match.
pub(crate) async fn matches(
    dest: &dyn StorageClient,
    bucket: &str,
    key: &str,
    source_size: u64,
    source_fingerprint: &str,
) -> Result<bool, ReplicationError> {
    let existing = dest
        .head(bucket, key)
        .await
        .map_err(|err| ReplicationError::DiffCheckFailed {
            key: key.to_string(),
            cause: err.to_string(),
        })?;

    match existing {
        None => {
            debug!("{} not present in destination", key);
            Ok(false)
        }
        Some(dest_object) => {
            if dest_object.fingerprint == source_fingerprint && dest_object.size == source_size {
                debug!("{} already matches destination", key);
                Ok(true)
            } else {
                info!(
                    "{} differs from destination (fingerprint: {} vs {}, size: {} vs {})",
                    key, dest_object.fingerprint, source_fingerprint, dest_object.size, source_size
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MemoryStore;

    #[tokio::test]
    async fn equal_fingerprint_and_size_match() {
        let store = MemoryStore::new();
        store.insert("dest", "a.txt", 10, "fp1");
        assert!(matches(&store, "dest", "a.txt", 10, "fp1").await.unwrap());
    }

    #[tokio::test]
    async fn size_or_fingerprint_mismatch_needs_copy() {
        let store = MemoryStore::new();
        store.insert("dest", "a.txt", 10, "fp1");
        assert!(!matches(&store, "dest", "a.txt", 11, "fp1").await.unwrap());
        assert!(!matches(&store, "dest", "a.txt", 10, "fp2").await.unwrap());
    }

    #[tokio::test]
    async fn absent_object_is_false_not_an_error() {
        let store = MemoryStore::new();
        assert!(!matches(&store, "dest", "missing.txt", 10, "fp1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn transient_head_error_propagates() {
        let store = MemoryStore::new();
        store.insert("dest", "a.txt", 10, "fp1");
        store.fail_head("dest", "a.txt");
        let err = matches(&store, "dest", "a.txt", 10, "fp1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReplicationError::DiffCheckFailed { ref key, .. } if key == "a.txt"
        ));
    }
}
