mod error;
pub mod operations;
pub mod providers;
pub mod traits;
mod types;
mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod mocks;

pub use error::{ExternalToolKind, OperationError, Result};
pub use types::{
    DatasetDescriptor, DatasetFilter, DatasetSpec, DeleteOptions, PropertyChange, PropertyChanges,
    PropertyRetrieval, PropertyUpdate, QueryOptions, SnapshotDeleteOptions,
};
pub use validation::{ValidationError, ValidationErrors};
