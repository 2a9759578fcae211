use std::marker::PhantomData;

use tracing::debug;
use vmclone_core::{DatasetPath, SnapshotId};
use vmclone_saga::SagaStep;

use super::context::CloneSagaContext;
use crate::OperationError;
use crate::traits::DatasetStore;
use crate::types::{DeleteOptions, SnapshotDeleteOptions};

/// Takes a snapshot. Compensation destroys it with deferred-delete semantics,
/// so a snapshot still pinned by a hold or clone is removed once released.
pub struct CreateSnapshotStep<S> {
    _marker: PhantomData<S>,
}

impl<S> CreateSnapshotStep<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Default for CreateSnapshotStep<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DatasetStore> SagaStep for CreateSnapshotStep<S> {
    type Input = SnapshotId;
    type Output = SnapshotId;
    type Context = CloneSagaContext<S>;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_snapshot"
    }

    fn execute(&self, ctx: &Self::Context, input: Self::Input) -> Result<Self::Output, Self::Error> {
        ctx.datasets().create_snapshot(&input)?;
        debug!(snapshot = %input, "created snapshot");
        Ok(input)
    }

    fn compensate(&self, ctx: &Self::Context, output: &Self::Output) -> Result<(), Self::Error> {
        debug!(snapshot = %output, "removing snapshot");
        ctx.datasets().delete_snapshot(
            output,
            SnapshotDeleteOptions {
                defer_delete: true,
                recursive: false,
            },
        )
    }

    fn compensation_description(&self, output: &Self::Output) -> String {
        format!("remove snapshot {output}")
    }
}

#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub snapshot: SnapshotId,
    pub target: DatasetPath,
}

/// Materialises a snapshot as a new dataset. Compensation destroys the clone.
pub struct CreateCloneStep<S> {
    _marker: PhantomData<S>,
}

impl<S> CreateCloneStep<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Default for CreateCloneStep<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DatasetStore> SagaStep for CreateCloneStep<S> {
    type Input = CloneRequest;
    type Output = DatasetPath;
    type Context = CloneSagaContext<S>;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "clone_snapshot"
    }

    fn execute(&self, ctx: &Self::Context, input: Self::Input) -> Result<Self::Output, Self::Error> {
        ctx.datasets()
            .clone_snapshot(&input.snapshot, &input.target)?;
        debug!(snapshot = %input.snapshot, target = %input.target, "cloned snapshot");
        Ok(input.target)
    }

    fn compensate(&self, ctx: &Self::Context, output: &Self::Output) -> Result<(), Self::Error> {
        debug!(dataset = %output, "removing clone");
        ctx.datasets().delete(output, DeleteOptions::default())
    }

    fn compensation_description(&self, output: &Self::Output) -> String {
        format!("destroy clone {output}")
    }
}
