use vmclone_core::{DatasetPath, DatasetType, Property};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub name: DatasetPath,
    pub kind: DatasetType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub dataset: DatasetPath,
    pub property: Property,
}

/// Which properties `zfs get` should report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropertySelection {
    #[default]
    All,
    Only(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub kind: DatasetType,
    /// Required for volumes, ignored for filesystems.
    pub volsize: Option<u64>,
    pub sparse: bool,
    pub create_ancestors: bool,
    /// `-o name=value` pairs, applied in order.
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    pub force: bool,
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotDestroyOptions {
    /// Mark held snapshots for deferred destruction instead of failing.
    pub defer: bool,
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub tag: String,
    pub created: String,
}
