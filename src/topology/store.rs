/*!
Storage for published simulation results.

This module defines:
- `PublishedSnapshot`: one report together with its revision and publication time.
- `SnapshotStore`: shared holder of the latest snapshot. A snapshot is fully built before it is
  swapped in, so readers never observe a half-updated state.
*/

use std::{
    sync::{Arc, RwLock},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::simulation::SimulationReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedSnapshot {
    pub revision: Uuid,
    pub published_at: SystemTime,
    pub report: SimulationReport,
}

impl PublishedSnapshot {
    pub fn published_at_rfc3339(&self) -> String {
        humantime::format_rfc3339_seconds(self.published_at).to_string()
    }
}

/// Outcome of `SnapshotStore::publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The revision differs from the previous snapshot (or there was none).
    Changed { previous: Option<Uuid>, current: Uuid },
    /// Same content as the current snapshot, only the timestamp was refreshed.
    Unchanged(Uuid),
}

impl PublishOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, PublishOutcome::Changed { .. })
    }
}

/// Latest published snapshot, shared between the producer and any number of readers.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<PublishedSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with `report`.
    pub fn publish(&self, report: SimulationReport) -> PublishOutcome {
        self.publish_at(report, SystemTime::now())
    }

    pub fn publish_at(&self, report: SimulationReport, published_at: SystemTime) -> PublishOutcome {
        let current = report.revision;
        let snapshot = Arc::new(PublishedSnapshot {
            revision: current,
            published_at,
            report,
        });

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = guard.as_ref().map(|snapshot| snapshot.revision);
        *guard = Some(snapshot);
        drop(guard);

        if previous == Some(current) {
            tracing::debug!(%current, "snapshot republished without changes");
            PublishOutcome::Unchanged(current)
        } else {
            tracing::info!(%current, at = %humantime::format_rfc3339_seconds(published_at), "published new snapshot");
            PublishOutcome::Changed { previous, current }
        }
    }

    /// Latest snapshot, if anything was published yet.
    pub fn latest(&self) -> Option<Arc<PublishedSnapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn revision(&self) -> Option<Uuid> {
        self.latest().map(|snapshot| snapshot.revision)
    }
}
