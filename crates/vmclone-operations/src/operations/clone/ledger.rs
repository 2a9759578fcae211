use std::collections::HashSet;

use tracing::{debug, warn};
use vmclone_core::{DatasetPath, SnapshotId, allocate_seeded};
use vmclone_saga::{CompensationLedger, SagaAuditLog};

use super::context::CloneSagaContext;
use super::steps::{CloneRequest, CreateCloneStep, CreateSnapshotStep};
use crate::Result;
use crate::error::OperationError;
use crate::traits::DatasetStore;
use crate::types::{DatasetFilter, QueryOptions};

/// Storage created by one clone run: snapshots and clones, each in creation
/// order.
#[derive(Default)]
pub struct CloneLedger {
    snapshots: CompensationLedger<SnapshotId>,
    clones: CompensationLedger<DatasetPath>,
}

impl CloneLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &SnapshotId> {
        self.snapshots.resources()
    }

    pub fn clones(&self) -> impl Iterator<Item = &DatasetPath> {
        self.clones.resources()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.clones.is_empty()
    }

    /// Destroys every recorded clone, newest first, then removes every
    /// recorded snapshot, newest first. Clones go first because a snapshot
    /// cannot be destroyed while a clone depends on it.
    ///
    /// Failures are logged and skipped. Returns how many resources were left
    /// behind.
    pub fn rollback<S: DatasetStore>(
        &mut self,
        ctx: &CloneSagaContext<S>,
        audit_log: &mut SagaAuditLog,
    ) -> usize {
        debug!(
            clones = self.clones.len(),
            snapshots = self.snapshots.len(),
            "rolling back clone storage"
        );

        let clone_failures = self
            .clones
            .rollback(&CreateCloneStep::new(), ctx, audit_log);
        for failure in &clone_failures {
            warn!(
                action = %failure.description,
                error = %failure.error,
                "rollback of VM clone left a dangling zvol"
            );
        }

        let snapshot_failures = self
            .snapshots
            .rollback(&CreateSnapshotStep::new(), ctx, audit_log);
        for failure in &snapshot_failures {
            warn!(
                action = %failure.description,
                error = %failure.error,
                "rollback of VM clone left a dangling snapshot"
            );
        }

        clone_failures.len() + snapshot_failures.len()
    }
}

/// Snapshots a dataset and clones the snapshot into a new sibling dataset.
pub struct SnapshotCloneStep<S> {
    snapshot: CreateSnapshotStep<S>,
    clone: CreateCloneStep<S>,
}

impl<S> Default for SnapshotCloneStep<S> {
    fn default() -> Self {
        Self {
            snapshot: CreateSnapshotStep::new(),
            clone: CreateCloneStep::new(),
        }
    }
}

impl<S: DatasetStore> SnapshotCloneStep<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new clone's path.
    ///
    /// The snapshot is named `base` and the clone `<dataset>_<base>` when
    /// those are free; otherwise a numbered name is allocated. Each resource
    /// is recorded in `ledger` as soon as it exists, so when cloning fails
    /// the snapshot is still recorded for rollback.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if `dataset` does not exist, or
    /// the error of the failing store call.
    pub fn run(
        &self,
        ctx: &CloneSagaContext<S>,
        dataset: &DatasetPath,
        base: &str,
        ledger: &mut CloneLedger,
        audit_log: &mut SagaAuditLog,
    ) -> Result<DatasetPath> {
        let source = ctx
            .datasets()
            .query(
                &DatasetFilter::named(dataset),
                &QueryOptions::names_only().with_snapshots(),
            )?
            .into_iter()
            .find(|d| &d.id == dataset)
            .ok_or_else(|| OperationError::NotFound(format!("zvol {dataset} does not exist")))?;

        let snapshot_name = allocate_seeded(base, ctx.suffix(), &source.snapshot_names());
        let snapshot = SnapshotId::new(dataset.clone(), snapshot_name)?;
        let snapshot = ledger
            .snapshots
            .execute(&self.snapshot, ctx, snapshot, audit_log)?;

        let siblings = sibling_names(ctx, dataset)?;
        let target = allocate_seeded(&format!("{dataset}_{base}"), ctx.suffix(), &siblings);
        let target = DatasetPath::new(target)?;

        ledger
            .clones
            .execute(&self.clone, ctx, CloneRequest { snapshot, target }, audit_log)
    }
}

fn sibling_names<S: DatasetStore>(
    ctx: &CloneSagaContext<S>,
    dataset: &DatasetPath,
) -> Result<HashSet<String>> {
    let parent = dataset.parent();
    let filter = match &parent {
        Some(parent) => DatasetFilter::ChildrenOf(parent.clone()),
        None => DatasetFilter::All,
    };

    Ok(ctx
        .datasets()
        .query(&filter, &QueryOptions::names_only())?
        .into_iter()
        .filter(|d| d.id.parent() == parent)
        .map(|d| d.id.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mocks::{DatasetOp, MockDatasetStore};
    use vmclone_core::DatasetType;
    use vmclone_saga::StepStatus;

    fn path(p: &str) -> DatasetPath {
        DatasetPath::new(p).expect("valid path")
    }

    fn context(store: MockDatasetStore) -> CloneSagaContext<MockDatasetStore> {
        CloneSagaContext::new(Arc::new(store), "_clone")
    }

    #[test]
    fn uses_seed_names_when_free() -> anyhow::Result<()> {
        let ctx = context(
            MockDatasetStore::new().with_dataset(&path("tank/vms/disk0"), DatasetType::Volume),
        );
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();

        let clone = SnapshotCloneStep::new().run(
            &ctx,
            &path("tank/vms/disk0"),
            "web_clone0",
            &mut ledger,
            &mut audit_log,
        )?;

        assert_eq!(clone, path("tank/vms/disk0_web_clone0"));
        assert_eq!(
            ledger.snapshots().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["tank/vms/disk0@web_clone0"]
        );
        assert_eq!(ledger.clones().cloned().collect::<Vec<_>>(), vec![clone]);
        Ok(())
    }

    #[test]
    fn allocates_around_taken_names() -> anyhow::Result<()> {
        let ctx = context(
            MockDatasetStore::new()
                .with_dataset(&path("tank/vms/disk0"), DatasetType::Volume)
                .with_snapshot(&path("tank/vms/disk0"), "web")
                .with_snapshot(&path("tank/vms/disk0"), "web_clone0")
                .with_dataset(&path("tank/vms/disk0_web"), DatasetType::Volume),
        );
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();

        let clone = SnapshotCloneStep::new().run(
            &ctx,
            &path("tank/vms/disk0"),
            "web",
            &mut ledger,
            &mut audit_log,
        )?;

        assert_eq!(clone, path("tank/vms/disk0_web_clone0"));
        assert_eq!(
            ledger.snapshots().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["tank/vms/disk0@web_clone1"]
        );
        Ok(())
    }

    #[test]
    fn missing_dataset_records_nothing() {
        let ctx = context(MockDatasetStore::new());
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();

        let result = SnapshotCloneStep::new().run(
            &ctx,
            &path("tank/vms/missing"),
            "web",
            &mut ledger,
            &mut audit_log,
        );

        assert!(matches!(result, Err(OperationError::NotFound(_))));
        assert!(ledger.is_empty());
        assert!(ctx.datasets().calls().is_empty());
    }

    #[test]
    fn failed_clone_keeps_snapshot_recorded() {
        let ctx = context(
            MockDatasetStore::new()
                .with_dataset(&path("tank/vms/disk0"), DatasetType::Volume)
                .with_failure(DatasetOp::CloneSnapshot, 1, "out of space"),
        );
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();

        let result = SnapshotCloneStep::new().run(
            &ctx,
            &path("tank/vms/disk0"),
            "web",
            &mut ledger,
            &mut audit_log,
        );

        assert!(result.is_err());
        assert_eq!(ledger.snapshots().count(), 1);
        assert_eq!(ledger.clones().count(), 0);
        assert_eq!(audit_log.count(StepStatus::Failed), 1);
    }

    #[test]
    fn rollback_removes_clones_before_snapshots() -> anyhow::Result<()> {
        let ctx = context(
            MockDatasetStore::new()
                .with_dataset(&path("tank/a"), DatasetType::Volume)
                .with_dataset(&path("tank/b"), DatasetType::Volume),
        );
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();
        let step = SnapshotCloneStep::new();
        step.run(&ctx, &path("tank/a"), "x", &mut ledger, &mut audit_log)?;
        step.run(&ctx, &path("tank/b"), "x", &mut ledger, &mut audit_log)?;

        let dangling = ledger.rollback(&ctx, &mut audit_log);

        assert_eq!(dangling, 0);
        assert!(ledger.is_empty());
        let calls = ctx.datasets().calls();
        assert_eq!(
            calls[4..],
            [
                "destroy tank/b_x",
                "destroy tank/a_x",
                "destroy_snapshot -d tank/b@x",
                "destroy_snapshot -d tank/a@x",
            ]
        );
        assert!(ctx.datasets().dataset_names().iter().all(|n| n == "tank/a" || n == "tank/b"));
        Ok(())
    }

    #[test]
    fn rollback_continues_past_failures() -> anyhow::Result<()> {
        let ctx = context(
            MockDatasetStore::new()
                .with_dataset(&path("tank/a"), DatasetType::Volume)
                .with_failure(DatasetOp::Delete, 1, "dataset is busy"),
        );
        let mut ledger = CloneLedger::new();
        let mut audit_log = SagaAuditLog::new();
        SnapshotCloneStep::new().run(&ctx, &path("tank/a"), "x", &mut ledger, &mut audit_log)?;

        let dangling = ledger.rollback(&ctx, &mut audit_log);

        assert_eq!(dangling, 1);
        assert_eq!(audit_log.count(StepStatus::CompensationFailed), 1);
        assert_eq!(audit_log.count(StepStatus::Compensated), 1);
        assert!(ctx.datasets().snapshot_names(&path("tank/a")).is_empty());
        Ok(())
    }
}
