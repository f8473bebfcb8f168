//! The seam between the content pipelines and the wire.
//!
//! Everything network-shaped (authentication, retries, connection
//! pooling, deadlines) lives behind this trait; the pipelines only see
//! bytes and tag lists. [`crate::registry::http::HttpRegistryTransport`]
//! is the production implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::reference::Reference;

#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// List the repository's tags exactly as the registry stores them
    /// (i.e. still carrying the `_` substitution).
    async fn list_tags(&self, reference: &Reference) -> Result<Vec<String>>;

    /// Fetch the manifest the reference's tag points at.
    async fn fetch_manifest(&self, reference: &Reference) -> Result<Bytes>;

    /// Fetch a blob by digest.
    async fn fetch_blob(&self, reference: &Reference, digest: &str) -> Result<Bytes>;

    /// Upload a blob under its digest.
    async fn push_blob(&self, reference: &Reference, digest: &str, data: Bytes) -> Result<()>;

    /// Upload a manifest under the reference's tag.
    async fn push_manifest(
        &self,
        reference: &Reference,
        media_type: &str,
        data: Bytes,
    ) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory registry standing in for the wire in tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::DistributorError;
    use crate::registry::manifest::Manifest;

    #[derive(Default)]
    struct State {
        tags: HashMap<String, Vec<String>>,
        manifests: HashMap<(String, String), Bytes>,
        blobs: HashMap<String, Bytes>,
    }

    #[derive(Default)]
    pub(crate) struct MockRegistry {
        state: Mutex<State>,
        manifest_fetches: AtomicUsize,
        push_attempts: AtomicUsize,
        pushes_fail: AtomicBool,
        fetch_delay: Mutex<Option<Duration>>,
    }

    impl MockRegistry {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn has_blob(&self, digest: &str) -> bool {
            self.state.lock().unwrap().blobs.contains_key(digest)
        }

        pub(crate) fn tags_of(&self, repository: &str) -> Vec<String> {
            self.state
                .lock()
                .unwrap()
                .tags
                .get(repository)
                .cloned()
                .unwrap_or_default()
        }

        pub(crate) fn set_tags(&self, repository: &str, tags: &[&str]) {
            self.state.lock().unwrap().tags.insert(
                repository.to_string(),
                tags.iter().map(|t| t.to_string()).collect(),
            );
        }

        pub(crate) fn insert_blob(&self, digest: &str, data: Bytes) {
            self.state
                .lock()
                .unwrap()
                .blobs
                .insert(digest.to_string(), data);
        }

        /// Replace the stored bytes under a digest without updating the
        /// digest itself.
        pub(crate) fn corrupt_blob(&self, digest: &str, data: &[u8]) {
            self.insert_blob(digest, Bytes::copy_from_slice(data));
        }

        pub(crate) fn rewrite_manifest(
            &self,
            reference: &Reference,
            mutate: impl FnOnce(&mut Manifest),
        ) {
            let key = (reference.repository.clone(), reference.tag.clone());
            let mut state = self.state.lock().unwrap();
            let raw = state.manifests.get(&key).expect("manifest not pushed");
            let mut manifest: Manifest = serde_json::from_slice(raw).unwrap();
            mutate(&mut manifest);
            let rewritten = Bytes::from(manifest.to_json().unwrap());
            state.manifests.insert(key, rewritten);
        }

        pub(crate) fn fail_pushes(&self) {
            self.pushes_fail.store(true, Ordering::SeqCst);
        }

        pub(crate) fn push_attempts(&self) -> usize {
            self.push_attempts.load(Ordering::SeqCst)
        }

        pub(crate) fn manifest_fetches(&self) -> usize {
            self.manifest_fetches.load(Ordering::SeqCst)
        }

        /// Delay manifest fetches so concurrent callers overlap.
        pub(crate) fn set_fetch_delay(&self, delay: Duration) {
            *self.fetch_delay.lock().unwrap() = Some(delay);
        }

        async fn maybe_delay(&self) {
            let delay = *self.fetch_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl RegistryTransport for MockRegistry {
        async fn list_tags(&self, reference: &Reference) -> Result<Vec<String>> {
            self.maybe_delay().await;
            Ok(self.tags_of(&reference.repository))
        }

        async fn fetch_manifest(&self, reference: &Reference) -> Result<Bytes> {
            self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
            self.maybe_delay().await;
            self.state
                .lock()
                .unwrap()
                .manifests
                .get(&(reference.repository.clone(), reference.tag.clone()))
                .cloned()
                .ok_or_else(|| {
                    DistributorError::Transport(format!("manifest fetch failed: {reference}"))
                })
        }

        async fn fetch_blob(&self, reference: &Reference, digest: &str) -> Result<Bytes> {
            let _ = reference;
            self.state
                .lock()
                .unwrap()
                .blobs
                .get(digest)
                .cloned()
                .ok_or_else(|| {
                    DistributorError::Transport(format!("blob fetch failed: {digest}"))
                })
        }

        async fn push_blob(&self, reference: &Reference, digest: &str, data: Bytes) -> Result<()> {
            let _ = reference;
            self.push_attempts.fetch_add(1, Ordering::SeqCst);
            if self.pushes_fail.load(Ordering::SeqCst) {
                return Err(DistributorError::Transport(
                    "blob upload failed: registry returned 503 Service Unavailable".to_string(),
                ));
            }
            self.insert_blob(digest, data);
            Ok(())
        }

        async fn push_manifest(
            &self,
            reference: &Reference,
            media_type: &str,
            data: Bytes,
        ) -> Result<()> {
            let _ = media_type;
            self.push_attempts.fetch_add(1, Ordering::SeqCst);
            if self.pushes_fail.load(Ordering::SeqCst) {
                return Err(DistributorError::Transport(
                    "manifest upload failed: registry returned 503 Service Unavailable".to_string(),
                ));
            }
            let mut state = self.state.lock().unwrap();
            state.manifests.insert(
                (reference.repository.clone(), reference.tag.clone()),
                data,
            );
            let tags = state.tags.entry(reference.repository.clone()).or_default();
            if !tags.contains(&reference.tag) {
                tags.push(reference.tag.clone());
            }
            Ok(())
        }
    }
}
