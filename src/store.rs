//! Storage-client seam over the bucket APIs.
//!
//! The engine only ever talks to buckets through [`StorageClient`]: one
//! paginated listing call, one metadata-only head, one server-side copy.
//! [`S3StorageClient`] is the production implementation over the AWS SDK;
//! tests use an in-memory store with failure injection.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{MetadataDirective, ServerSideEncryption};
use thiserror::Error;

use crate::types::ObjectDescriptor;

/// Errors surfaced by a storage client.
///
/// `AccessDenied` is kept distinct because the coordinator switches
/// enumeration strategy on it; everything else is an opaque service error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The call was rejected by access policy.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other transport or service error.
    #[error("{0}")]
    Service(String),
}

/// One page of a bucket listing.
#[derive(Debug)]
pub struct ListPage {
    /// Descriptors on this page.
    pub objects: Vec<ObjectDescriptor>,
    /// Token for the next page, `None` on the last page.
    pub next: Option<String>,
}

/// Read-only handle to a bucket's object API, shared across all workers.
///
/// Implementations must not carry per-call mutable state; the coordinator
/// clones one `Arc` per worker and never rebinds it after construction.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetches one page of the bucket listing.
    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError>;

    /// Metadata-only lookup. Returns `Ok(None)` when the object is absent;
    /// any other failure is an error.
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectDescriptor>, StoreError>;

    /// Server-side copy of `key` from source to destination, inheriting
    /// source metadata verbatim and carrying `encryption` when present.
    async fn copy(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &str,
        encryption: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// ETags arrive quoted from the service; the fingerprint is the bare token.
fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let denied = matches!(err.code(), Some("AccessDenied") | Some("AllAccessDisabled"));
    let message = format!("{}", DisplayErrorContext(&err));
    if denied {
        StoreError::AccessDenied(message)
    } else {
        StoreError::Service(message)
    }
}

/// [`StorageClient`] backed by the AWS S3 SDK.
#[derive(Debug, Clone)]
pub struct S3StorageClient {
    client: aws_sdk_s3::Client,
}

impl S3StorageClient {
    /// Wraps an already-configured SDK client.
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Builds a client for `region` from the ambient credential chain.
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(aws_sdk_s3::Client::new(&config))
    }

    /// Pre-flight accessibility check for `bucket`.
    pub async fn check_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(classify)?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectDescriptor {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    fingerprint: normalize_etag(obj.e_tag().unwrap_or("")),
                    // Listings carry no encryption attribute; the copy path
                    // re-reads it from a head call.
                    encryption: None,
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            next: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectDescriptor>, StoreError> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectDescriptor {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                fingerprint: normalize_etag(output.e_tag().unwrap_or("")),
                encryption: output
                    .server_side_encryption()
                    .map(|sse| sse.as_str().to_string()),
            })),
            Err(err) => {
                let absent = err
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false);
                if absent {
                    Ok(None)
                } else {
                    Err(classify(err))
                }
            }
        }
    }

    async fn copy(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &str,
        encryption: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .copy_object()
            .copy_source(format!("{}/{}", source_bucket, key))
            .bucket(dest_bucket)
            .key(key)
            .metadata_directive(MetadataDirective::Copy);

        if let Some(sse) = encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse));
        }

        request.send().await.map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory storage client with failure injection for engine tests.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// A pair of buckets held in memory.
    ///
    /// Fault knobs: `deny_listing` rejects list calls like a policy denial,
    /// `fail_head`/`fail_copy` inject transient service errors, and
    /// `corrupt_copy` makes the copy "succeed" while leaving a mismatching
    /// destination object (a service that lied).
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        objects: Mutex<HashMap<(String, String), ObjectDescriptor>>,
        head_faults: Mutex<HashSet<(String, String)>>,
        head_delays: Mutex<HashMap<(String, String), Duration>>,
        copy_faults: Mutex<HashSet<String>>,
        corrupt_copies: Mutex<HashSet<String>>,
        listing_denied: AtomicBool,
        page_size: usize,
        mutations: AtomicUsize,
    }

    impl MemoryStore {
        pub(crate) fn new() -> Self {
            Self {
                page_size: usize::MAX,
                ..Self::default()
            }
        }

        pub(crate) fn with_page_size(page_size: usize) -> Self {
            Self {
                page_size,
                ..Self::default()
            }
        }

        pub(crate) fn insert(&self, bucket: &str, key: &str, size: u64, fingerprint: &str) {
            self.insert_encrypted(bucket, key, size, fingerprint, None);
        }

        pub(crate) fn insert_encrypted(
            &self,
            bucket: &str,
            key: &str,
            size: u64,
            fingerprint: &str,
            encryption: Option<&str>,
        ) {
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                ObjectDescriptor {
                    key: key.to_string(),
                    size,
                    fingerprint: fingerprint.to_string(),
                    encryption: encryption.map(str::to_string),
                },
            );
        }

        pub(crate) fn remove(&self, bucket: &str, key: &str) {
            self.objects
                .lock()
                .unwrap()
                .remove(&(bucket.to_string(), key.to_string()));
        }

        pub(crate) fn deny_listing(&self) {
            self.listing_denied.store(true, Ordering::SeqCst);
        }

        pub(crate) fn fail_head(&self, bucket: &str, key: &str) {
            self.head_faults
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()));
        }

        /// Makes head calls for `key` in `bucket` stall for `delay`,
        /// simulating a slow service.
        pub(crate) fn delay_head(&self, bucket: &str, key: &str, delay: Duration) {
            self.head_delays
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), delay);
        }

        pub(crate) fn fail_copy(&self, key: &str) {
            self.copy_faults.lock().unwrap().insert(key.to_string());
        }

        pub(crate) fn corrupt_copy(&self, key: &str) {
            self.corrupt_copies.lock().unwrap().insert(key.to_string());
        }

        /// Number of destination-mutating calls issued so far.
        pub(crate) fn mutation_count(&self) -> usize {
            self.mutations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageClient for MemoryStore {
        async fn list_page(
            &self,
            bucket: &str,
            continuation: Option<String>,
        ) -> Result<ListPage, StoreError> {
            if self.listing_denied.load(Ordering::SeqCst) {
                return Err(StoreError::AccessDenied(
                    "explicit deny on s3:ListBucket".to_string(),
                ));
            }

            let mut all: Vec<ObjectDescriptor> = self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|((b, _), _)| b == bucket)
                .map(|(_, descriptor)| descriptor.clone())
                .collect();
            all.sort_by(|a, b| a.key.cmp(&b.key));

            let start: usize = continuation
                .as_deref()
                .map(|token| token.parse().unwrap_or(0))
                .unwrap_or(0);
            let end = start.saturating_add(self.page_size.max(1)).min(all.len());
            let next = (end < all.len()).then(|| end.to_string());

            Ok(ListPage {
                objects: all[start..end].to_vec(),
                next,
            })
        }

        async fn head(
            &self,
            bucket: &str,
            key: &str,
        ) -> Result<Option<ObjectDescriptor>, StoreError> {
            let lookup = (bucket.to_string(), key.to_string());
            let delay = self.head_delays.lock().unwrap().get(&lookup).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.head_faults.lock().unwrap().contains(&lookup) {
                return Err(StoreError::Service("503 slow down".to_string()));
            }
            Ok(self.objects.lock().unwrap().get(&lookup).cloned())
        }

        async fn copy(
            &self,
            source_bucket: &str,
            dest_bucket: &str,
            key: &str,
            encryption: Option<&str>,
        ) -> Result<(), StoreError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);

            if self.copy_faults.lock().unwrap().contains(key) {
                return Err(StoreError::Service("copy rejected".to_string()));
            }

            let mut objects = self.objects.lock().unwrap();
            let source = objects
                .get(&(source_bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| StoreError::Service("NoSuchKey".to_string()))?;

            let mut copied = source;
            if let Some(sse) = encryption {
                copied.encryption = Some(sse.to_string());
            }
            if self.corrupt_copies.lock().unwrap().contains(key) {
                copied.fingerprint = format!("corrupt-{}", copied.fingerprint);
            }
            objects.insert((dest_bucket.to_string(), key.to_string()), copied);
            Ok(())
        }
    }
}
