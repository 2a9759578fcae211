use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZfsError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    AlreadyExists { message: String },

    #[error("{message}")]
    Busy { message: String },

    #[error("'{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("failed to run '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected output from '{command}': '{line}'")]
    UnexpectedOutput { command: String, line: String },

    #[error("invalid name in engine output")]
    InvalidName(#[from] vmclone_core::CoreError),
}

impl ZfsError {
    /// Maps the stderr of a failed command onto an error kind.
    pub(crate) fn classify(command: &str, stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        if message.contains("dataset does not exist") || message.contains("could not find any snapshots") {
            Self::NotFound { message }
        } else if message.contains("already exists") {
            Self::AlreadyExists { message }
        } else if message.contains("Device busy") || message.contains("dataset is busy") {
            Self::Busy { message }
        } else {
            Self::Command {
                command: command.to_string(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_not_found() {
        let err = ZfsError::classify(
            "zfs destroy tank/x",
            "cannot open 'tank/x': dataset does not exist\n",
        );
        assert!(matches!(err, ZfsError::NotFound { .. }));
    }

    #[test]
    fn classify_already_exists() {
        let err = ZfsError::classify(
            "zfs clone tank/a@s tank/b",
            "cannot create 'tank/b': dataset already exists",
        );
        assert!(matches!(err, ZfsError::AlreadyExists { .. }));
    }

    #[test]
    fn classify_busy_variants() {
        for stderr in [
            "cannot destroy 'tank/a': dataset is busy",
            "cannot unmount '/mnt/tank/a': Device busy",
        ] {
            assert!(matches!(
                ZfsError::classify("zfs destroy tank/a", stderr),
                ZfsError::Busy { .. }
            ));
        }
    }

    #[test]
    fn classify_other_keeps_command_and_message() {
        let err = ZfsError::classify("zfs set quota=1 tank", "permission denied\n");
        let ZfsError::Command { command, message } = err else {
            panic!("expected command error");
        };
        assert_eq!(command, "zfs set quota=1 tank");
        assert_eq!(message, "permission denied");
    }
}
