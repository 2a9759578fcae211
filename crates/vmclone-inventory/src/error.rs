use std::path::PathBuf;

use thiserror::Error;
use vmclone_core::{CoreError, EntityId};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize inventory for '{path}'")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("failed to write '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("VM {0} not found")]
    EntityNotFound(EntityId),

    #[error("device has no owning VM")]
    UnownedDevice,

    #[error("a VM named '{0}' already exists")]
    DuplicateName(String),

    #[error("no free display port pair in range {start}-{end}")]
    PortsExhausted { start: u16, end: u16 },

    #[error(transparent)]
    Core(#[from] CoreError),
}
