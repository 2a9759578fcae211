use std::fmt;

use thiserror::Error;
use vmclone_core::CoreError;
use vmclone_inventory::InventoryError;
use vmclone_zfs::ZfsError;

use crate::validation::ValidationErrors;

/// Coarse classification of a failed engine command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalToolKind {
    /// The dataset or device is in use.
    Busy,
    Other,
}

impl fmt::Display for ExternalToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::Other => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("name already taken: {0}")]
    NameCollision(String),

    #[error("{message}")]
    ExternalTool {
        message: String,
        kind: ExternalToolKind,
    },

    #[error("inventory access failed")]
    Inventory(#[source] InventoryError),
}

pub type Result<T> = std::result::Result<T, OperationError>;

impl OperationError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::ExternalTool {
                kind: ExternalToolKind::Busy,
                ..
            }
        )
    }

    pub(crate) fn external(message: impl Into<String>) -> Self {
        Self::ExternalTool {
            message: message.into(),
            kind: ExternalToolKind::Other,
        }
    }
}

impl From<CoreError> for OperationError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<ZfsError> for OperationError {
    fn from(err: ZfsError) -> Self {
        match err {
            ZfsError::NotFound { message } => Self::NotFound(message),
            ZfsError::AlreadyExists { message } => Self::NameCollision(message),
            ZfsError::Busy { message } => Self::ExternalTool {
                message,
                kind: ExternalToolKind::Busy,
            },
            ZfsError::Command { command, message } => {
                Self::external(format!("'{command}' failed: {message}"))
            }
            other => Self::external(render_chain(&other)),
        }
    }
}

impl From<InventoryError> for OperationError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::EntityNotFound(id) => Self::NotFound(format!("VM {id} not found")),
            InventoryError::DuplicateName(name) => Self::NameCollision(name),
            InventoryError::Core(core) => core.into(),
            other => Self::Inventory(other),
        }
    }
}

fn render_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
