use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Hierarchical dataset name such as `tank/vms/disk0`.
///
/// A path is a non-empty sequence of `/`-separated components. Snapshot
/// (`@`) and bookmark (`#`) separators are rejected; use [`SnapshotId`] for
/// snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetPath(String);

impl DatasetPath {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDatasetPath`] if the path is empty, has an
    /// empty component, or contains a snapshot or bookmark separator.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let reason = if path.is_empty() {
            Some("path is empty")
        } else if path.contains('@') {
            Some("dataset paths cannot contain '@'")
        } else if path.contains('#') {
            Some("dataset paths cannot contain '#'")
        } else if path.split('/').any(str::is_empty) {
            Some("path has an empty component")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::InvalidDatasetPath { path, reason }),
            None => Ok(Self(path)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn pool(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Last path component.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.0.contains('/')
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}/{name}", self.0))
    }

    /// Returns `true` if `self` sits strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    #[must_use]
    pub fn snapshot(&self, name: impl Into<String>) -> SnapshotId {
        SnapshotId {
            dataset: self.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetPath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DatasetPath> for String {
    fn from(value: DatasetPath) -> Self {
        value.0
    }
}

impl AsRef<str> for DatasetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Snapshot identifier, rendered as `dataset@name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId {
    pub dataset: DatasetPath,
    pub name: String,
}

impl SnapshotId {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSnapshotId`] if the snapshot name is empty
    /// or contains a separator.
    pub fn new(dataset: DatasetPath, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['@', '/', '#']) {
            return Err(CoreError::InvalidSnapshotId {
                id: format!("{dataset}@{name}"),
                reason: "snapshot name must be non-empty and free of separators",
            });
        }
        Ok(Self { dataset, name })
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dataset, self.name)
    }
}

impl FromStr for SnapshotId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((dataset, name)) = s.split_once('@') else {
            return Err(CoreError::InvalidSnapshotId {
                id: s.to_string(),
                reason: "missing '@' separator",
            });
        };
        let dataset = DatasetPath::new(dataset).map_err(|_| CoreError::InvalidSnapshotId {
            id: s.to_string(),
            reason: "invalid dataset component",
        })?;
        Self::new(dataset, name)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(value: SnapshotId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatasetType {
    #[default]
    Filesystem,
    Volume,
}

impl DatasetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Volume => "volume",
        }
    }
}

impl FromStr for DatasetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filesystem" => Ok(Self::Filesystem),
            "volume" => Ok(Self::Volume),
            other => Err(format!("unknown dataset type '{other}'")),
        }
    }
}

/// Provenance of a property's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertySource {
    Local,
    Inherited,
    Default,
    None,
}

impl PropertySource {
    /// Parses the `source` column printed by `zfs get`.
    ///
    /// `inherited from <dataset>` maps to [`PropertySource::Inherited`]; `received`
    /// and `temporary` values count as locally set.
    #[must_use]
    pub fn from_zfs(source: &str) -> Self {
        match source.trim() {
            "local" | "received" | "temporary" => Self::Local,
            "default" => Self::Default,
            s if s.starts_with("inherited") => Self::Inherited,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub source: PropertySource,
}

/// Parsed representation of a property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedValue {
    Bool(bool),
    Integer(u64),
    Text(String),
}

impl ParsedValue {
    /// Renders the value the way the storage engine expects it on the wire.
    #[must_use]
    pub fn to_engine_string(&self) -> String {
        match self {
            Self::Bool(true) => "on".to_string(),
            Self::Bool(false) => "off".to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Property set of a dataset, keyed by property name.
pub type PropertyMap = BTreeMap<String, Property>;
