use thiserror::Error;
use vmclone_core::{CoreError, DatasetPath, EntityId};
use vmclone_inventory::InventoryError;
use vmclone_operations::OperationError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration")]
    Config(#[source] InventoryError),

    #[error("failed to open inventory")]
    Inventory(#[source] OperationError),

    #[error("failed to clone VM {id}")]
    Clone {
        id: EntityId,
        #[source]
        source: OperationError,
    },

    #[error("failed to update properties of {dataset}")]
    PropertyUpdate {
        dataset: DatasetPath,
        #[source]
        source: OperationError,
    },

    #[error("invalid property assignment '{0}', expected <name>=<value>")]
    InvalidAssignment(String),

    #[error("invalid dataset name")]
    InvalidDataset(#[from] CoreError),

    #[error("invalid log filter")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::CliError;
    use vmclone_core::EntityId;
    use vmclone_operations::OperationError;

    #[test]
    fn clone_error_names_the_vm_and_keeps_the_cause() {
        let err = CliError::Clone {
            id: EntityId(7),
            source: OperationError::NotFound("VM 7 not found".to_string()),
        };

        assert!(err.to_string().contains("VM 7"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("VM 7 not found"));
    }

    #[test]
    fn invalid_assignment_shows_expected_form() {
        let err = CliError::InvalidAssignment("compression".to_string());

        let msg = err.to_string();

        assert!(msg.contains("'compression'"));
        assert!(msg.contains("<name>=<value>"));
    }

    #[test]
    fn core_error_converts_via_from() {
        let core = vmclone_core::DatasetPath::new("").expect_err("empty path is invalid");

        let err: CliError = core.into();

        assert!(matches!(err, CliError::InvalidDataset(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
