use vmclone_core::{DatasetPath, SnapshotId};

use crate::Result;
use crate::operations::PropertyUpdateEngine;
use crate::types::{
    DatasetDescriptor, DatasetFilter, DatasetSpec, DeleteOptions, PropertyChanges,
    PropertyUpdate, QueryOptions, SnapshotDeleteOptions,
};

/// Storage engine holding datasets and their snapshots.
pub trait DatasetStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the engine query fails. Datasets named by the
    /// filter that do not exist are omitted, not reported.
    fn query(&self, filter: &DatasetFilter, options: &QueryOptions)
    -> Result<Vec<DatasetDescriptor>>;

    /// # Errors
    ///
    /// Returns [`OperationError::Validation`](crate::OperationError::Validation)
    /// for root-level names or volumes without a size, and an external tool
    /// error carrying the engine message if creation fails.
    fn create(&self, spec: &DatasetSpec) -> Result<DatasetDescriptor>;

    /// Applies already validated updates in the order given.
    ///
    /// # Errors
    ///
    /// Returns the first engine failure; earlier updates stay applied.
    fn apply_property_updates(&self, id: &DatasetPath, updates: &[PropertyUpdate]) -> Result<()>;

    /// Validates and orders `changes`, then applies them.
    ///
    /// # Errors
    ///
    /// See [`PropertyUpdateEngine::apply`].
    fn update_properties(&self, id: &DatasetPath, changes: &PropertyChanges) -> Result<()> {
        PropertyUpdateEngine::new(self).apply(id, changes)
    }

    /// # Errors
    ///
    /// Returns a busy error if the dataset is in use.
    fn delete(&self, id: &DatasetPath, options: DeleteOptions) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`OperationError::NameCollision`](crate::OperationError::NameCollision)
    /// if the snapshot exists.
    fn create_snapshot(&self, snapshot: &SnapshotId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be destroyed or marked for
    /// deferred destruction.
    fn delete_snapshot(&self, snapshot: &SnapshotId, options: SnapshotDeleteOptions)
    -> Result<()>;

    /// # Errors
    ///
    /// Returns [`OperationError::NameCollision`](crate::OperationError::NameCollision)
    /// if `target` exists.
    fn clone_snapshot(&self, snapshot: &SnapshotId, target: &DatasetPath) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the hold cannot be placed.
    fn hold(&self, snapshot: &SnapshotId, recursive: bool) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the hold cannot be released.
    fn release(&self, snapshot: &SnapshotId, recursive: bool) -> Result<()>;

    /// Tags of the holds placed on `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not exist.
    fn holds(&self, snapshot: &SnapshotId) -> Result<Vec<String>>;
}
