use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid dataset path '{path}': {reason}")]
    InvalidDatasetPath { path: String, reason: &'static str },

    #[error("invalid snapshot identifier '{id}': {reason}")]
    InvalidSnapshotId { id: String, reason: &'static str },

    #[error("path '{path}' is not a zvol under '{root}'")]
    NotAZvol { path: String, root: String },

    #[error("invalid MAC address '{0}'")]
    InvalidMacAddress(String),

    #[error("invalid display ports: {reason}")]
    InvalidDisplayPorts { reason: &'static str },

    #[error("invalid {field} for {device} device: {reason}")]
    InvalidDeviceAttribute {
        device: &'static str,
        field: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
