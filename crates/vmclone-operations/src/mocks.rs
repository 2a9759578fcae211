use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use vmclone_core::{
    CloneNameFamily, DatasetPath, DatasetType, Device, Entity, EntityId, EntitySpec, PortPair,
    Property, PropertyMap, PropertySource, SnapshotId,
};

use crate::Result;
use crate::error::{ExternalToolKind, OperationError};
use crate::traits::{DatasetStore, DeviceStore, EntityStore, PortAllocator};
use crate::types::{
    DatasetDescriptor, DatasetFilter, DatasetSpec, DeleteOptions, PropertyRetrieval,
    PropertyUpdate, QueryOptions, SnapshotDeleteOptions,
};
use crate::validation::{ValidationError, ValidationErrors};

/// Operations of [`MockDatasetStore`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetOp {
    Query,
    Create,
    UpdateProperties,
    Delete,
    CreateSnapshot,
    DeleteSnapshot,
    CloneSnapshot,
    Hold,
}

enum InjectedError {
    Tool(String),
    NameCollision(String),
}

impl InjectedError {
    fn to_error(&self) -> OperationError {
        match self {
            Self::Tool(message) => injected_error(message),
            Self::NameCollision(name) => OperationError::NameCollision(name.clone()),
        }
    }
}

struct InjectedFailure {
    op: DatasetOp,
    nth: usize,
    error: InjectedError,
}

fn injected_error(message: &str) -> OperationError {
    let kind = if message.contains("busy") {
        ExternalToolKind::Busy
    } else {
        ExternalToolKind::Other
    };
    OperationError::ExternalTool {
        message: message.to_string(),
        kind,
    }
}

#[derive(Debug, Clone)]
struct MockDataset {
    kind: DatasetType,
    properties: PropertyMap,
    snapshots: Vec<String>,
}

/// In-memory dataset store.
///
/// Every mutating call is recorded in [`calls`](Self::calls) before it runs,
/// including calls that then fail. Queries are counted but not recorded, and
/// always return a flat list.
pub struct MockDatasetStore {
    datasets: Mutex<BTreeMap<DatasetPath, MockDataset>>,
    holds: Mutex<HashMap<SnapshotId, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    counters: Mutex<HashMap<DatasetOp, usize>>,
    failures: Vec<InjectedFailure>,
}

impl MockDatasetStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            datasets: Mutex::new(BTreeMap::new()),
            holds: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            counters: Mutex::new(HashMap::new()),
            failures: Vec::new(),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_dataset(self, path: &DatasetPath, kind: DatasetType) -> Self {
        self.datasets.lock().expect("lock poisoned").insert(
            path.clone(),
            MockDataset {
                kind,
                properties: PropertyMap::new(),
                snapshots: Vec::new(),
            },
        );
        self
    }

    /// # Panics
    ///
    /// Panics if the dataset was not added first or the mutex is poisoned.
    #[must_use]
    pub fn with_property(
        self,
        path: &DatasetPath,
        name: &str,
        value: &str,
        source: PropertySource,
    ) -> Self {
        self.datasets
            .lock()
            .expect("lock poisoned")
            .get_mut(path)
            .expect("dataset added before its properties")
            .properties
            .insert(
                name.to_string(),
                Property {
                    name: name.to_string(),
                    value: value.to_string(),
                    source,
                },
            );
        self
    }

    /// # Panics
    ///
    /// Panics if the dataset was not added first or the mutex is poisoned.
    #[must_use]
    pub fn with_snapshot(self, path: &DatasetPath, name: &str) -> Self {
        self.datasets
            .lock()
            .expect("lock poisoned")
            .get_mut(path)
            .expect("dataset added before its snapshots")
            .snapshots
            .push(name.to_string());
        self
    }

    /// Makes the `nth` call (1-based) of `op` fail with `message`. Messages
    /// containing "busy" produce a busy error.
    #[must_use]
    pub fn with_failure(mut self, op: DatasetOp, nth: usize, message: &str) -> Self {
        self.failures.push(InjectedFailure {
            op,
            nth,
            error: InjectedError::Tool(message.to_string()),
        });
        self
    }

    /// Makes the `nth` call (1-based) of `op` fail as if another writer took
    /// `name` between allocation and creation.
    #[must_use]
    pub fn with_name_collision(mut self, op: DatasetOp, nth: usize, name: &str) -> Self {
        self.failures.push(InjectedFailure {
            op,
            nth,
            error: InjectedError::NameCollision(name.to_string()),
        });
        self
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets
            .lock()
            .expect("lock poisoned")
            .keys()
            .map(ToString::to_string)
            .collect()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshot_names(&self, path: &DatasetPath) -> Vec<String> {
        self.datasets
            .lock()
            .expect("lock poisoned")
            .get(path)
            .map(|d| d.snapshots.clone())
            .unwrap_or_default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn property_value(&self, path: &DatasetPath, name: &str) -> Option<String> {
        self.datasets
            .lock()
            .expect("lock poisoned")
            .get(path)
            .and_then(|d| d.properties.get(name))
            .map(|p| p.value.clone())
    }

    fn count(&self, op: DatasetOp) -> Result<()> {
        let mut counters = self.counters.lock().expect("lock poisoned");
        let n = counters.entry(op).or_insert(0);
        *n += 1;
        match self.failures.iter().find(|f| f.op == op && f.nth == *n) {
            Some(failure) => Err(failure.error.to_error()),
            None => Ok(()),
        }
    }

    fn record(&self, op: DatasetOp, call: String) -> Result<()> {
        self.calls.lock().expect("lock poisoned").push(call);
        self.count(op)
    }

    fn describe(
        path: &DatasetPath,
        dataset: &MockDataset,
        options: &QueryOptions,
    ) -> DatasetDescriptor {
        let mut descriptor = DatasetDescriptor::new(path.clone(), dataset.kind);
        descriptor.properties = dataset
            .properties
            .iter()
            .filter(|(name, _)| match &options.properties {
                PropertyRetrieval::All => true,
                PropertyRetrieval::Only(names) => names.contains(name),
                PropertyRetrieval::None => false,
            })
            .filter(|(name, _)| options.user_properties || !name.contains(':'))
            .map(|(name, property)| (name.clone(), property.clone()))
            .collect();
        if options.snapshots {
            descriptor.snapshots = dataset
                .snapshots
                .iter()
                .filter_map(|name| SnapshotId::new(path.clone(), name.clone()).ok())
                .collect();
        }
        descriptor
    }
}

impl Default for MockDatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetStore for MockDatasetStore {
    fn query(
        &self,
        filter: &DatasetFilter,
        options: &QueryOptions,
    ) -> Result<Vec<DatasetDescriptor>> {
        self.count(DatasetOp::Query)?;
        let datasets = self.datasets.lock().expect("lock poisoned");
        Ok(datasets
            .iter()
            .filter(|(path, _)| match filter {
                DatasetFilter::All => true,
                DatasetFilter::Named(names) => names
                    .iter()
                    .any(|n| *path == n || (options.children && path.is_descendant_of(n))),
                DatasetFilter::ChildrenOf(parent) => path.parent().as_ref() == Some(parent),
            })
            .map(|(path, dataset)| Self::describe(path, dataset, options))
            .collect())
    }

    fn create(&self, spec: &DatasetSpec) -> Result<DatasetDescriptor> {
        self.record(DatasetOp::Create, format!("create {}", spec.name))?;
        if !spec.name.has_parent() {
            return Err(ValidationErrors::single(ValidationError::RootLevelDataset {
                name: spec.name.to_string(),
            })
            .into());
        }
        let mut datasets = self.datasets.lock().expect("lock poisoned");
        if datasets.contains_key(&spec.name) {
            return Err(OperationError::NameCollision(spec.name.to_string()));
        }
        let properties = spec
            .properties
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    Property {
                        name: name.clone(),
                        value: value.clone(),
                        source: PropertySource::Local,
                    },
                )
            })
            .collect();
        let dataset = MockDataset {
            kind: spec.kind,
            properties,
            snapshots: Vec::new(),
        };
        let descriptor = Self::describe(&spec.name, &dataset, &QueryOptions::default());
        datasets.insert(spec.name.clone(), dataset);
        Ok(descriptor)
    }

    fn apply_property_updates(&self, id: &DatasetPath, updates: &[PropertyUpdate]) -> Result<()> {
        for update in updates {
            let call = match update {
                PropertyUpdate::Set { name, value } => format!("set {id} {name}={value}"),
                PropertyUpdate::Inherit { name } => format!("inherit {id} {name}"),
            };
            self.record(DatasetOp::UpdateProperties, call)?;

            let mut datasets = self.datasets.lock().expect("lock poisoned");
            let dataset = datasets
                .get_mut(id)
                .ok_or_else(|| OperationError::NotFound(format!("dataset {id} does not exist")))?;
            match update {
                PropertyUpdate::Set { name, value } => {
                    dataset.properties.insert(
                        name.clone(),
                        Property {
                            name: name.clone(),
                            value: value.clone(),
                            source: PropertySource::Local,
                        },
                    );
                }
                PropertyUpdate::Inherit { name } => {
                    if let Some(property) = dataset.properties.get_mut(name) {
                        property.source = PropertySource::Inherited;
                    }
                }
            }
        }
        Ok(())
    }

    fn delete(&self, id: &DatasetPath, options: DeleteOptions) -> Result<()> {
        self.record(DatasetOp::Delete, format!("destroy {id}"))?;
        let mut datasets = self.datasets.lock().expect("lock poisoned");
        if !datasets.contains_key(id) {
            return Err(OperationError::NotFound(format!(
                "cannot open '{id}': dataset does not exist"
            )));
        }
        let has_children = datasets.keys().any(|p| p.is_descendant_of(id));
        if has_children && !options.recursive {
            return Err(injected_error(&format!(
                "cannot destroy '{id}': filesystem has children"
            )));
        }
        datasets.retain(|p, _| p != id && !p.is_descendant_of(id));
        Ok(())
    }

    fn create_snapshot(&self, snapshot: &SnapshotId) -> Result<()> {
        self.record(DatasetOp::CreateSnapshot, format!("snapshot {snapshot}"))?;
        let mut datasets = self.datasets.lock().expect("lock poisoned");
        let dataset = datasets.get_mut(&snapshot.dataset).ok_or_else(|| {
            OperationError::NotFound(format!("dataset {} does not exist", snapshot.dataset))
        })?;
        if dataset.snapshots.contains(&snapshot.name) {
            return Err(OperationError::NameCollision(snapshot.to_string()));
        }
        dataset.snapshots.push(snapshot.name.clone());
        Ok(())
    }

    fn delete_snapshot(&self, snapshot: &SnapshotId, options: SnapshotDeleteOptions) -> Result<()> {
        let mut call = String::from("destroy_snapshot");
        if options.defer_delete {
            call.push_str(" -d");
        }
        if options.recursive {
            call.push_str(" -r");
        }
        self.record(DatasetOp::DeleteSnapshot, format!("{call} {snapshot}"))?;

        let mut datasets = self.datasets.lock().expect("lock poisoned");
        let dataset = datasets
            .get_mut(&snapshot.dataset)
            .filter(|d| d.snapshots.contains(&snapshot.name))
            .ok_or_else(|| {
                OperationError::NotFound(format!("could not find any snapshots to destroy: {snapshot}"))
            })?;
        dataset.snapshots.retain(|name| name != &snapshot.name);
        Ok(())
    }

    fn clone_snapshot(&self, snapshot: &SnapshotId, target: &DatasetPath) -> Result<()> {
        self.record(
            DatasetOp::CloneSnapshot,
            format!("clone {snapshot} {target}"),
        )?;
        let mut datasets = self.datasets.lock().expect("lock poisoned");
        let kind = datasets
            .get(&snapshot.dataset)
            .filter(|d| d.snapshots.contains(&snapshot.name))
            .map(|d| d.kind)
            .ok_or_else(|| OperationError::NotFound(format!("snapshot {snapshot} does not exist")))?;
        if datasets.contains_key(target) {
            return Err(OperationError::NameCollision(target.to_string()));
        }
        datasets.insert(
            target.clone(),
            MockDataset {
                kind,
                properties: PropertyMap::new(),
                snapshots: Vec::new(),
            },
        );
        Ok(())
    }

    fn hold(&self, snapshot: &SnapshotId, _recursive: bool) -> Result<()> {
        self.record(DatasetOp::Hold, format!("hold {snapshot}"))?;
        self.holds
            .lock()
            .expect("lock poisoned")
            .entry(snapshot.clone())
            .or_default()
            .push(vmclone_zfs::DEFAULT_HOLD_TAG.to_string());
        Ok(())
    }

    fn release(&self, snapshot: &SnapshotId, _recursive: bool) -> Result<()> {
        self.record(DatasetOp::Hold, format!("release {snapshot}"))?;
        if let Some(tags) = self.holds.lock().expect("lock poisoned").get_mut(snapshot) {
            tags.retain(|tag| tag != vmclone_zfs::DEFAULT_HOLD_TAG);
        }
        Ok(())
    }

    fn holds(&self, snapshot: &SnapshotId) -> Result<Vec<String>> {
        Ok(self
            .holds
            .lock()
            .expect("lock poisoned")
            .get(snapshot)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct MockEntityStore {
    entities: Mutex<Vec<Entity>>,
    created: Mutex<Vec<Entity>>,
    create_failure: Option<String>,
}

impl MockEntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            create_failure: None,
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_entity(self, entity: Entity) -> Self {
        self.entities.lock().expect("lock poisoned").push(entity);
        self
    }

    #[must_use]
    pub fn with_create_failure(mut self, message: &str) -> Self {
        self.create_failure = Some(message.to_string());
        self
    }

    /// Entities created through [`EntityStore::create`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn created(&self) -> Vec<Entity> {
        self.created.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MockEntityStore {
    fn get(&self, id: EntityId) -> Result<Entity> {
        self.entities
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| OperationError::NotFound(format!("VM {id} not found")))
    }

    fn create(&self, spec: EntitySpec) -> Result<Entity> {
        if let Some(message) = &self.create_failure {
            return Err(injected_error(message));
        }
        let mut entities = self.entities.lock().expect("lock poisoned");
        if entities.iter().any(|e| e.name == spec.name) {
            return Err(OperationError::NameCollision(spec.name));
        }
        let next = entities.iter().map(|e| e.id.0).max().unwrap_or(0) + 1;
        let entity = spec.into_entity(EntityId(next));
        entities.push(entity.clone());
        self.created
            .lock()
            .expect("lock poisoned")
            .push(entity.clone());
        Ok(entity)
    }

    fn list_names(&self, family: &CloneNameFamily) -> Result<HashSet<String>> {
        Ok(self
            .entities
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|e| family.matches(&e.name))
            .map(|e| e.name.clone())
            .collect())
    }
}

pub struct MockDeviceStore {
    devices: Mutex<Vec<Device>>,
    failure: Option<(usize, String)>,
}

impl MockDeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Makes the `nth` create call (1-based) fail.
    #[must_use]
    pub fn with_failure(mut self, nth: usize, message: &str) -> Self {
        self.failure = Some((nth, message.to_string()));
        self
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore for MockDeviceStore {
    fn create(&self, mut device: Device) -> Result<Device> {
        let mut devices = self.devices.lock().expect("lock poisoned");
        if let Some((nth, message)) = &self.failure {
            if devices.len() + 1 == *nth {
                return Err(injected_error(message));
            }
        }
        device.id = Some(vmclone_core::DeviceId(devices.len() as u64 + 1));
        devices.push(device.clone());
        Ok(device)
    }
}

/// Hands out consecutive port pairs starting at 5900.
pub struct MockPortAllocator {
    next: Mutex<u16>,
    exhausted: bool,
}

impl MockPortAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(5900)
    }

    #[must_use]
    pub fn starting_at(port: u16) -> Self {
        Self {
            next: Mutex::new(port),
            exhausted: false,
        }
    }

    #[must_use]
    pub fn exhausted() -> Self {
        Self {
            exhausted: true,
            ..Self::new()
        }
    }
}

impl Default for MockPortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortAllocator for MockPortAllocator {
    fn allocate(&self) -> Result<PortPair> {
        if self.exhausted {
            return Err(injected_error("no free display ports"));
        }
        let mut next = self.next.lock().expect("lock poisoned");
        let ports = PortPair::new(*next, *next + 1)?;
        *next += 2;
        Ok(ports)
    }
}
