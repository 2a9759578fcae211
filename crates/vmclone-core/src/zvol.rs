use crate::dataset::DatasetPath;
use crate::error::{CoreError, Result};

pub const DEFAULT_ZVOL_ROOT: &str = "/dev/zvol";

/// Maps between zvol device nodes and the volumes backing them.
///
/// Device nodes cannot carry spaces, so a space in a dataset name appears as
/// `+` in the node path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZvolRoot(String);

impl ZvolRoot {
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let trimmed = root.trim_end_matches('/');
        Self(if trimmed.is_empty() {
            DEFAULT_ZVOL_ROOT.to_string()
        } else {
            trimmed.to_string()
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// # Errors
    ///
    /// Returns [`CoreError::NotAZvol`] if `path` is not below this root, or
    /// the dataset error if the remainder is not a valid dataset path.
    pub fn path_to_name(&self, path: &str) -> Result<DatasetPath> {
        let rest = path
            .strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| CoreError::NotAZvol {
                path: path.to_string(),
                root: self.0.clone(),
            })?;
        DatasetPath::new(rest.replace('+', " "))
    }

    #[must_use]
    pub fn name_to_path(&self, name: &DatasetPath) -> String {
        format!("{}/{}", self.0, name.as_str().replace(' ', "+"))
    }
}

impl Default for ZvolRoot {
    fn default() -> Self {
        Self(DEFAULT_ZVOL_ROOT.to_string())
    }
}
