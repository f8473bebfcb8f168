//! Concurrent request coalescing for downloads.
//!
//! The first caller for a reference string performs the whole
//! resolve-list-match-pull-write sequence; every concurrent caller with
//! the same raw key blocks until that leading call finishes and receives
//! the identical outcome. Keys are the raw, unnormalized reference, so
//! differently-spelled but equivalent references do not coalesce. Entries
//! are evicted before the result broadcast, so a later request always
//! performs a fresh fetch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::download::{Downloader, version_from_reference};
use crate::error::DistributorError;

/// The `(path, error)` outcome shared by every caller of one flight.
pub type SharedOutcome = std::result::Result<PathBuf, Arc<DistributorError>>;

type OutcomeCell = Option<SharedOutcome>;

enum Role {
    Leader(watch::Sender<OutcomeCell>),
    Waiter(watch::Receiver<OutcomeCell>),
}

pub struct DownloadCoordinator {
    downloader: Downloader,
    in_flight: Mutex<HashMap<String, watch::Receiver<OutcomeCell>>>,
}

impl DownloadCoordinator {
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Download the referenced extension into `dest_dir`, coalescing with
    /// any in-flight download for the same raw reference string.
    ///
    /// When the reference carries no explicit semver tag, the version
    /// request falls back to "any released version" rather than "latest".
    pub async fn download(&self, reference: &str, dest_dir: &Path) -> SharedOutcome {
        let role = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(reference) {
                Some(cell) => Role::Waiter(cell.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(reference.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let guard = FlightGuard {
                    coordinator: self,
                    key: reference.to_string(),
                };
                let version = version_from_reference(reference);
                debug!(reference = %reference, version = %version, "leading download");
                let outcome: SharedOutcome = self
                    .downloader
                    .download_to(reference, &version, dest_dir)
                    .await
                    .map_err(Arc::new);
                // Evict before broadcasting: a caller arriving after the
                // broadcast must start a fresh flight.
                drop(guard);
                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
            Role::Waiter(mut rx) => {
                debug!(reference = %reference, "awaiting in-flight download");
                loop {
                    if let Some(outcome) = rx.borrow_and_update().clone() {
                        return outcome;
                    }
                    if rx.changed().await.is_err() {
                        return Err(Arc::new(DistributorError::Transport(
                            "leading download was abandoned before completing".to_string(),
                        )));
                    }
                }
            }
        }
    }
}

/// Removes the in-flight entry when the leading call completes, including
/// when it unwinds or is cancelled mid-flight.
struct FlightGuard<'a> {
    coordinator: &'a DownloadCoordinator,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.key);
    }
}
