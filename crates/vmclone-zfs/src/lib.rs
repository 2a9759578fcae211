mod error;
mod runner;
mod types;
mod zfs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::ZfsError;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use types::{
    CreateOptions, DatasetRecord, DestroyOptions, Hold, PropertyRecord, PropertySelection,
    SnapshotDestroyOptions,
};
pub use zfs::{DEFAULT_HOLD_TAG, Zfs};

pub type Result<T> = std::result::Result<T, ZfsError>;
