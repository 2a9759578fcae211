use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;
use vmclone_core::{DatasetPath, DatasetType, PropertyMap, SnapshotId};
use vmclone_zfs::{
    CommandRunner, CreateOptions, DEFAULT_HOLD_TAG, DatasetRecord, DestroyOptions,
    PropertySelection, SnapshotDestroyOptions, SystemRunner, Zfs, ZfsError,
};

use crate::Result;
use crate::error::OperationError;
use crate::traits::DatasetStore;
use crate::types::{
    DatasetDescriptor, DatasetFilter, DatasetSpec, DeleteOptions, PropertyRetrieval,
    PropertyUpdate, QueryOptions, SnapshotDeleteOptions,
};
use crate::validation::{ValidationError, ValidationErrorCollector};

/// Default `xattr` for new filesystems: extended attributes stored in the
/// dnode instead of hidden directories.
const DEFAULT_XATTR: &str = "sa";

/// [`DatasetStore`] backed by the `zfs` command line tool.
pub struct ZfsDatasetStore<R = SystemRunner> {
    zfs: Zfs<R>,
}

impl ZfsDatasetStore<SystemRunner> {
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self::new(Zfs::with_binary(binary))
    }
}

impl<R: CommandRunner> ZfsDatasetStore<R> {
    #[must_use]
    pub fn new(zfs: Zfs<R>) -> Self {
        Self { zfs }
    }

    #[must_use]
    pub fn zfs(&self) -> &Zfs<R> {
        &self.zfs
    }

    fn list(&self, filter: &DatasetFilter, children: bool) -> Result<Vec<DatasetRecord>> {
        match filter {
            DatasetFilter::All => Ok(self.zfs.list(&[], false)?),
            DatasetFilter::Named(names) => {
                let mut records = Vec::new();
                for name in names {
                    match self.zfs.list(std::slice::from_ref(name), children) {
                        Ok(found) => records.extend(found),
                        Err(ZfsError::NotFound { .. }) => {
                            debug!(dataset = %name, "skipping missing dataset");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(records)
            }
            DatasetFilter::ChildrenOf(parent) => match self.zfs.list_children(parent) {
                Err(ZfsError::NotFound { .. }) => Ok(Vec::new()),
                other => Ok(other?),
            },
        }
    }

    fn properties(
        &self,
        records: &[DatasetRecord],
        options: &QueryOptions,
    ) -> Result<HashMap<DatasetPath, PropertyMap>> {
        let selection = match &options.properties {
            PropertyRetrieval::All => PropertySelection::All,
            PropertyRetrieval::Only(names) => PropertySelection::Only(names.clone()),
            PropertyRetrieval::None => return Ok(HashMap::new()),
        };
        if records.is_empty() {
            return Ok(HashMap::new());
        }

        let names: Vec<DatasetPath> = records.iter().map(|r| r.name.clone()).collect();
        let mut by_dataset: HashMap<DatasetPath, PropertyMap> = HashMap::new();
        for record in self.zfs.get_properties(&names, &selection, false)? {
            if !options.user_properties && record.property.name.contains(':') {
                continue;
            }
            by_dataset
                .entry(record.dataset)
                .or_default()
                .insert(record.property.name.clone(), record.property);
        }
        Ok(by_dataset)
    }

    fn snapshots(&self, dataset: &DatasetPath, options: &QueryOptions) -> Result<Vec<SnapshotId>> {
        if !options.snapshots {
            return Ok(Vec::new());
        }
        Ok(self.zfs.list_snapshots(dataset, options.snapshots_recursive)?)
    }

    fn describe(&self, name: &DatasetPath) -> Result<DatasetDescriptor> {
        self.query(&DatasetFilter::named(name), &QueryOptions::default())?
            .into_iter()
            .find(|d| &d.id == name)
            .ok_or_else(|| OperationError::NotFound(format!("dataset {name} does not exist")))
    }
}

/// Moves every descriptor whose parent is also present under that parent.
fn nest(flat: Vec<DatasetDescriptor>) -> Vec<DatasetDescriptor> {
    let order: Vec<DatasetPath> = flat.iter().map(|d| d.id.clone()).collect();
    let mut by_path: BTreeMap<DatasetPath, DatasetDescriptor> =
        flat.into_iter().map(|d| (d.id.clone(), d)).collect();

    let mut deepest_first = order.clone();
    deepest_first.sort_by_key(|p| Reverse(p.depth()));
    for path in deepest_first {
        let Some(parent) = path.parent().filter(|p| by_path.contains_key(p)) else {
            continue;
        };
        let Some(child) = by_path.remove(&path) else {
            continue;
        };
        if let Some(parent) = by_path.get_mut(&parent) {
            parent.children.push(child);
        }
    }

    let rank: HashMap<&DatasetPath, usize> = order.iter().enumerate().map(|(i, p)| (p, i)).collect();
    let mut roots: Vec<DatasetDescriptor> = by_path.into_values().collect();
    sort_tree(&mut roots, &rank);
    roots
}

fn sort_tree(nodes: &mut [DatasetDescriptor], rank: &HashMap<&DatasetPath, usize>) {
    nodes.sort_by_key(|d| rank.get(&d.id).copied().unwrap_or(usize::MAX));
    for node in nodes {
        sort_tree(&mut node.children, rank);
    }
}

impl<R: CommandRunner> DatasetStore for ZfsDatasetStore<R> {
    fn query(
        &self,
        filter: &DatasetFilter,
        options: &QueryOptions,
    ) -> Result<Vec<DatasetDescriptor>> {
        let records = self.list(filter, options.children)?;
        let mut properties = self.properties(&records, options)?;

        let mut descriptors = Vec::with_capacity(records.len());
        for record in records {
            let mut descriptor = DatasetDescriptor::new(record.name, record.kind);
            descriptor.snapshots = self.snapshots(&descriptor.id, options)?;
            if let Some(map) = properties.remove(&descriptor.id) {
                descriptor.properties = map;
            }
            descriptors.push(descriptor);
        }

        if options.hierarchical {
            Ok(nest(descriptors))
        } else {
            Ok(descriptors)
        }
    }

    fn create(&self, spec: &DatasetSpec) -> Result<DatasetDescriptor> {
        let mut errors = ValidationErrorCollector::new();
        if !spec.name.has_parent() {
            errors.push(ValidationError::RootLevelDataset {
                name: spec.name.to_string(),
            });
        }
        if spec.kind == DatasetType::Volume && spec.volsize.is_none() {
            errors.push(ValidationError::MissingVolumeSize {
                name: spec.name.to_string(),
            });
        }
        if let Some(errors) = errors.into_errors() {
            return Err(errors.into());
        }

        let mut properties: Vec<(String, String)> = spec
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if spec.kind == DatasetType::Filesystem && !spec.properties.contains_key("xattr") {
            properties.push(("xattr".to_string(), DEFAULT_XATTR.to_string()));
        }

        self.zfs.create(
            &spec.name,
            &CreateOptions {
                kind: spec.kind,
                volsize: spec.volsize,
                sparse: spec.sparse,
                create_ancestors: spec.create_ancestors,
                properties,
            },
        )?;
        debug!(dataset = %spec.name, kind = %spec.kind.as_str(), "created dataset");
        self.describe(&spec.name)
    }

    fn apply_property_updates(&self, id: &DatasetPath, updates: &[PropertyUpdate]) -> Result<()> {
        for update in updates {
            match update {
                PropertyUpdate::Set { name, value } => self
                    .zfs
                    .set_properties(id, &[(name.clone(), value.clone())])?,
                PropertyUpdate::Inherit { name } => self.zfs.inherit(id, name)?,
            }
        }
        Ok(())
    }

    fn delete(&self, id: &DatasetPath, options: DeleteOptions) -> Result<()> {
        self.zfs.destroy(
            id,
            DestroyOptions {
                force: options.force,
                recursive: options.recursive,
            },
        )?;
        Ok(())
    }

    fn create_snapshot(&self, snapshot: &SnapshotId) -> Result<()> {
        Ok(self.zfs.snapshot(snapshot, false)?)
    }

    fn delete_snapshot(&self, snapshot: &SnapshotId, options: SnapshotDeleteOptions) -> Result<()> {
        Ok(self.zfs.destroy_snapshot(
            snapshot,
            SnapshotDestroyOptions {
                defer: options.defer_delete,
                recursive: options.recursive,
            },
        )?)
    }

    fn clone_snapshot(&self, snapshot: &SnapshotId, target: &DatasetPath) -> Result<()> {
        Ok(self.zfs.clone_snapshot(snapshot, target, &[])?)
    }

    fn hold(&self, snapshot: &SnapshotId, recursive: bool) -> Result<()> {
        Ok(self.zfs.hold(snapshot, DEFAULT_HOLD_TAG, recursive)?)
    }

    fn release(&self, snapshot: &SnapshotId, recursive: bool) -> Result<()> {
        Ok(self.zfs.release(snapshot, DEFAULT_HOLD_TAG, recursive)?)
    }

    fn holds(&self, snapshot: &SnapshotId) -> Result<Vec<String>> {
        Ok(self
            .zfs
            .holds(snapshot)?
            .into_iter()
            .map(|hold| hold.tag)
            .collect())
    }
}
