//! Applies a versioned default dataset to the ingredient registry and
//! collapses duplicate default records left behind by independent replicas.
//!
//! A pass is one critical section: fetch, plan, commit. Planning is pure and
//! produces a [`ChangeSet`] that the [`Registry`] applies atomically. The
//! [`MarkerStore`] only moves forward after that commit has succeeded, so a
//! failed pass is retried in full on the next run.

mod dedupe;
mod errors;
mod markers;
mod merge;
mod registry;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::dataset::Dataset;
use crate::locks::FileLock;

pub use dedupe::{plan_dedupe, DedupePlan, DuplicateGroup};
pub use errors::ReconcileError;
#[cfg(test)]
pub use markers::MemoryMarkers;
pub use markers::{MarkerError, MarkerStore, MetaMarkers};
pub use merge::{plan_bulk_load, plan_merge, MergePlan};
pub use registry::{ChangeSet, Registry, RegistryError, SqliteRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing applied before and the registry had no defaults: bulk insert.
    FirstLoad,
    /// Nothing applied before, but replicated defaults were already present.
    BulkLoadSkipped,
    Applied,
    Forced,
    UpToDate,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::FirstLoad => "first_load",
            Outcome::BulkLoadSkipped => "bulk_load_skipped",
            Outcome::Applied => "applied",
            Outcome::Forced => "forced",
            Outcome::UpToDate => "up_to_date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcome: Outcome,
    pub from_version: Option<i64>,
    pub to_version: Option<i64>,
    pub inserted: usize,
    pub updated: usize,
    pub renamed: usize,
    pub preserved_custom: usize,
    pub skipped_facts: usize,
    pub skipped_ingredients: usize,
    pub removed_duplicates: usize,
    pub digest_changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub force: bool,
}

pub struct Reconciler<'a, R: Registry, M: MarkerStore> {
    registry: &'a mut R,
    markers: &'a mut M,
    lock: Option<(PathBuf, Duration)>,
}

impl<'a, R: Registry, M: MarkerStore> Reconciler<'a, R, M> {
    pub fn new(registry: &'a mut R, markers: &'a mut M) -> Self {
        Self {
            registry,
            markers,
            lock: None,
        }
    }

    /// Serializes passes against other writers holding the same lock file.
    pub fn with_lock(mut self, path: PathBuf, timeout: Duration) -> Self {
        self.lock = Some((path, timeout));
        self
    }

    pub fn run(
        &mut self,
        dataset: &Dataset,
        options: ReconcileOptions,
    ) -> Result<ReconcileReport, ReconcileError> {
        let _guard = match &self.lock {
            Some((path, timeout)) => Some(FileLock::acquire(path, *timeout)?),
            None => None,
        };

        let loaded = self.markers.has_loaded_defaults()?;
        let applied = self.markers.applied_version()?;
        let applied_digest = self.markers.applied_digest()?;
        let existing = self
            .registry
            .fetch_all()
            .map_err(ReconcileError::StoreRead)?;
        let now = OffsetDateTime::now_utc();

        let (outcome, plan) = if !loaded {
            if existing.iter().any(|record| !record.is_custom) {
                log::info!("default records already present; skipping first-launch load");
                (Outcome::BulkLoadSkipped, MergePlan::default())
            } else {
                (
                    Outcome::FirstLoad,
                    plan_bulk_load(&dataset.ingredients, now),
                )
            }
        } else if dataset.version > applied.unwrap_or(0) {
            (
                Outcome::Applied,
                plan_merge(&existing, &dataset.ingredients, now),
            )
        } else if options.force {
            (
                Outcome::Forced,
                plan_merge(&existing, &dataset.ingredients, now),
            )
        } else {
            (Outcome::UpToDate, MergePlan::default())
        };

        let digest_changed = outcome == Outcome::UpToDate
            && applied == Some(dataset.version)
            && applied_digest
                .as_deref()
                .is_some_and(|digest| digest != dataset.digest());
        if digest_changed {
            log::warn!(
                "dataset {} changed without a version bump (still version {})",
                dataset.source(),
                dataset.version
            );
        }

        if !plan.changes.is_empty() {
            self.registry
                .commit(&plan.changes)
                .map_err(ReconcileError::Persistence)?;
        }

        let to_version = if outcome == Outcome::UpToDate {
            applied
        } else {
            let version = applied.map_or(dataset.version, |current| current.max(dataset.version));
            self.markers.mark_loaded(version, dataset.digest())?;
            Some(version)
        };

        let removed_duplicates = self.deduplicate()?;
        let unreadable = match outcome {
            Outcome::FirstLoad | Outcome::Applied | Outcome::Forced => dataset.rejected.len(),
            Outcome::BulkLoadSkipped | Outcome::UpToDate => 0,
        };

        let report = ReconcileReport {
            outcome,
            from_version: applied,
            to_version,
            inserted: plan.inserted,
            updated: plan.updated,
            renamed: plan.renamed,
            preserved_custom: plan.preserved_custom,
            skipped_facts: plan.skipped_facts,
            skipped_ingredients: plan.skipped_ingredients + unreadable,
            removed_duplicates,
            digest_changed,
        };
        log::info!(
            "reconcile {}: version {} -> {}, {} inserted, {} updated, {} renamed, {} duplicates removed",
            outcome.as_str(),
            display_version(report.from_version),
            display_version(report.to_version),
            report.inserted,
            report.updated,
            report.renamed,
            report.removed_duplicates
        );
        Ok(report)
    }

    /// Re-reads the registry so duplicates created by the merge commit are
    /// seen, then removes surplus defaults in one commit.
    fn deduplicate(&mut self) -> Result<usize, ReconcileError> {
        let records = self
            .registry
            .fetch_all()
            .map_err(ReconcileError::StoreRead)?;
        let plan = plan_dedupe(&records);
        if plan.changes.is_empty() {
            return Ok(0);
        }
        self.registry
            .commit(&plan.changes)
            .map_err(ReconcileError::Persistence)?;
        Ok(plan.removed())
    }
}

fn display_version(version: Option<i64>) -> String {
    version.map_or_else(|| "none".to_string(), |value| value.to_string())
}
