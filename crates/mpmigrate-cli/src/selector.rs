//! Single-transfer selector
//!
//! Each invocation moves at most one bundle from a source tree into the
//! destination queue its item is routed to. An external scheduler calls it
//! repeatedly, and the single-slot queues pace it to the ingest consumer.

use crate::error::{CliError, Result};
use crate::markers::{MarkerKind, MarkerStore};
use crate::membership::{MembershipList, Route};
use crate::model::{discover_items, WorkItem};
use crate::queue::{DestinationQueue, QueueKind, TransferMode};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Why nothing was transferred although work may exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Both queues hold an unconsumed bundle
    AllQueuesBusy,
    /// Every eligible item is routed to a queue that is still busy
    TargetQueueBusy,
}

/// Result of one selector invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Transferred {
        id: String,
        queue: QueueKind,
        path: PathBuf,
    },
    Skipped {
        reason: SkipReason,
    },
    NoWorkAvailable,
}

/// Item-level failure that did not stop the scan
#[derive(Debug, Serialize)]
pub struct TransferFailure {
    pub id: String,
    pub error: String,
}

/// Outcome plus every failure met on the way
#[derive(Debug, Serialize)]
pub struct SelectionReport {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub failures: Vec<TransferFailure>,
}

impl SelectionReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Result of attempting a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTransfer {
    /// The bundle is in the queue. `unmarked` carries the error when the
    /// `ingested` marker could not be written afterwards.
    Delivered {
        queue: QueueKind,
        path: PathBuf,
        unmarked: Option<String>,
    },
    TargetBusy { queue: QueueKind },
}

/// Routes items to queues and performs deliveries
#[derive(Debug, Clone)]
pub struct Selector {
    markers: MarkerStore,
    membership: MembershipList,
    in_list: DestinationQueue,
    not_in_list: DestinationQueue,
    mode: TransferMode,
    prune: bool,
}

impl Selector {
    pub fn new(
        markers: MarkerStore,
        membership: MembershipList,
        dest_in_list: impl Into<PathBuf>,
        dest_not_in_list: impl Into<PathBuf>,
    ) -> Self {
        Self {
            markers,
            membership,
            in_list: DestinationQueue::new(QueueKind::InMembershipList, dest_in_list),
            not_in_list: DestinationQueue::new(QueueKind::NotInMembershipList, dest_not_in_list),
            mode: TransferMode::default(),
            prune: false,
        }
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    /// Delete the item's other files after a successful delivery
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn queue_for(&self, route: Route) -> &DestinationQueue {
        match route {
            Route::InList => &self.in_list,
            Route::NotInList => &self.not_in_list,
        }
    }

    /// Whether both queues are busy
    pub fn all_queues_busy(&self) -> Result<bool> {
        Ok(self.in_list.is_busy()? && self.not_in_list.is_busy()?)
    }

    /// Route `item` and deliver its bundle if its queue is free.
    ///
    /// On success the item gets its `ingested` marker. On failure nothing is
    /// marked; deciding what a failure means is up to the caller. Once the
    /// bundle has left for the queue the result is always `Delivered`, even
    /// if the marker write fails.
    pub fn transfer_item(&self, item: &WorkItem) -> Result<ItemTransfer> {
        let route = self.membership.classify(&item.id);
        let queue = self.queue_for(route);

        if queue.is_busy().map_err(|e| CliError::transfer(&item.id, e))? {
            debug!(item = %item.id, queue = %queue.kind(), "Target queue busy");
            return Ok(ItemTransfer::TargetBusy { queue: queue.kind() });
        }

        let path = queue.deliver(&item.id, &item.bundle_path(), self.mode)?;
        let note = format!("{} {}\n", Utc::now().to_rfc3339(), path.display());
        if let Err(e) = self
            .markers
            .set_marker(&item.path, MarkerKind::Ingested, Some(&note))
        {
            error!(item = %item.id, queue = %queue.kind(), error = %e, "Bundle delivered but not marked");
            return Ok(ItemTransfer::Delivered {
                queue: queue.kind(),
                path,
                unmarked: Some(e.to_string()),
            });
        }
        info!(item = %item.id, queue = %queue.kind(), "Item transferred");

        if self.prune {
            match item.prune(&self.markers) {
                Ok(removed) => debug!(item = %item.id, removed, "Pruned item directory"),
                Err(e) => warn!(item = %item.id, error = %e, "Could not prune item directory"),
            }
        }

        Ok(ItemTransfer::Delivered {
            queue: queue.kind(),
            path,
            unmarked: None,
        })
    }

    /// Scan `source_dir` and transfer at most one eligible item
    pub fn select_and_transfer(&self, source_dir: &Path) -> Result<SelectionReport> {
        let mut failures = Vec::new();

        if self.all_queues_busy()? {
            info!("Both destination queues are busy, nothing to do");
            return Ok(SelectionReport {
                outcome: Outcome::Skipped {
                    reason: SkipReason::AllQueuesBusy,
                },
                failures,
            });
        }

        let mut saw_busy_target = false;
        for item in discover_items(source_dir)? {
            if item.state(&self.markers).is_terminal() {
                continue;
            }

            match self.transfer_item(&item) {
                Ok(ItemTransfer::Delivered { queue, path, unmarked }) => {
                    if let Some(error) = unmarked {
                        failures.push(TransferFailure {
                            id: item.id.clone(),
                            error,
                        });
                    }
                    return Ok(SelectionReport {
                        outcome: Outcome::Transferred {
                            id: item.id,
                            queue,
                            path,
                        },
                        failures,
                    });
                },
                Ok(ItemTransfer::TargetBusy { .. }) => saw_busy_target = true,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(item = %item.id, error = %e, "Transfer failed, will retry on next run");
                    failures.push(TransferFailure {
                        id: item.id,
                        error: e.to_string(),
                    });
                },
            }
        }

        let outcome = if saw_busy_target {
            Outcome::Skipped {
                reason: SkipReason::TargetQueueBusy,
            }
        } else {
            Outcome::NoWorkAvailable
        };
        Ok(SelectionReport { outcome, failures })
    }
}

/// Validate paths, load the membership list and run one selection.
///
/// Every path is checked before the source tree is scanned.
pub fn select_and_transfer(
    source_dir: &Path,
    membership_file: &Path,
    dest_in_list: &Path,
    dest_not_in_list: &Path,
    settings: &crate::config::TransferSettings,
) -> Result<SelectionReport> {
    crate::config::require_dir("source directory", source_dir)?;
    crate::config::require_file("membership file", membership_file)?;
    crate::config::require_dir("in-membership-list queue", dest_in_list)?;
    crate::config::require_dir("not-in-membership-list queue", dest_not_in_list)?;

    let membership = MembershipList::load(membership_file, settings.match_mode)?;
    Selector::new(
        MarkerStore::new(settings.markers.clone()),
        membership,
        dest_in_list,
        dest_not_in_list,
    )
    .with_mode(settings.transfer_mode)
    .with_prune(settings.prune_ingested)
    .select_and_transfer(source_dir)
}
