use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vmclone_core::{DatasetPath, DatasetType, ParsedValue, Property, PropertyMap, SnapshotId};

/// A dataset as reported by the [`DatasetStore`](crate::traits::DatasetStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    pub id: DatasetPath,
    pub kind: DatasetType,
    pub properties: PropertyMap,
    pub snapshots: Vec<SnapshotId>,
    /// Populated only for hierarchical queries.
    pub children: Vec<DatasetDescriptor>,
}

impl DatasetDescriptor {
    #[must_use]
    pub fn new(id: DatasetPath, kind: DatasetType) -> Self {
        Self {
            id,
            kind,
            properties: PropertyMap::new(),
            snapshots: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Short names (the part after `@`) of the retrieved snapshots.
    #[must_use]
    pub fn snapshot_names(&self) -> HashSet<String> {
        self.snapshots.iter().map(|s| s.name.clone()).collect()
    }
}

/// Which datasets a query covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatasetFilter {
    #[default]
    All,
    /// Exactly the named datasets. Missing names are skipped.
    Named(Vec<DatasetPath>),
    /// Direct children of a dataset.
    ChildrenOf(DatasetPath),
}

impl DatasetFilter {
    #[must_use]
    pub fn named(id: &DatasetPath) -> Self {
        Self::Named(vec![id.clone()])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropertyRetrieval {
    #[default]
    All,
    Only(Vec<String>),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub properties: PropertyRetrieval,
    /// Include properties with a `namespace:` prefix.
    pub user_properties: bool,
    pub snapshots: bool,
    /// Also report snapshots of descendants.
    pub snapshots_recursive: bool,
    /// With [`DatasetFilter::Named`], also report descendants of the named
    /// datasets.
    pub children: bool,
    /// Nest descendants under their parents instead of returning one list.
    pub hierarchical: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            properties: PropertyRetrieval::All,
            user_properties: true,
            snapshots: false,
            snapshots_recursive: false,
            children: false,
            hierarchical: false,
        }
    }
}

impl QueryOptions {
    /// Names and types only.
    #[must_use]
    pub fn names_only() -> Self {
        Self {
            properties: PropertyRetrieval::None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_snapshots(mut self) -> Self {
        self.snapshots = true;
        self
    }
}

/// Payload for creating a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: DatasetPath,
    pub kind: DatasetType,
    pub volsize: Option<u64>,
    pub sparse: bool,
    pub create_ancestors: bool,
    pub properties: IndexMap<String, String>,
}

impl DatasetSpec {
    #[must_use]
    pub fn filesystem(name: DatasetPath) -> Self {
        Self {
            name,
            kind: DatasetType::Filesystem,
            volsize: None,
            sparse: false,
            create_ancestors: false,
            properties: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn volume(name: DatasetPath, volsize: u64) -> Self {
        Self {
            kind: DatasetType::Volume,
            volsize: Some(volsize),
            ..Self::filesystem(name)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub force: bool,
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotDeleteOptions {
    /// Mark the snapshot for destruction once its holds and clones are gone.
    pub defer_delete: bool,
    pub recursive: bool,
}

/// One requested change in a property update batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PropertyChange {
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub parsed: Option<ParsedValue>,
    #[serde(default)]
    pub value: Option<String>,
}

impl PropertyChange {
    #[must_use]
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parsed(parsed: ParsedValue) -> Self {
        Self {
            parsed: Some(parsed),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn inherit() -> Self {
        Self {
            inherit: true,
            ..Self::default()
        }
    }
}

/// Property changes keyed by property name, in request order.
pub type PropertyChanges = IndexMap<String, PropertyChange>;

/// A validated change, ready to be applied to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyUpdate {
    Set { name: String, value: String },
    Inherit { name: String },
}

impl PropertyUpdate {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Inherit { name } => name,
        }
    }
}
