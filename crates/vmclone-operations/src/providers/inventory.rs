use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use vmclone_core::{CloneNameFamily, Device, Entity, EntityId, EntitySpec, PortPair};
use vmclone_inventory::{Inventory, InventoryError, load_inventory, save_inventory};

use crate::Result;
use crate::error::OperationError;
use crate::traits::{DeviceStore, EntityStore, PortAllocator};

/// VM records, devices and display ports kept in a TOML inventory file.
///
/// Every successful mutation is written back to disk before it becomes
/// visible; a failed write leaves both the file and the in-memory state
/// untouched.
pub struct FileSystemInventoryStore {
    path: PathBuf,
    inventory: Mutex<Inventory>,
    port_range: RangeInclusive<u16>,
}

impl FileSystemInventoryStore {
    /// # Errors
    ///
    /// Returns an error if the inventory file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>, port_range: RangeInclusive<u16>) -> Result<Self> {
        let path = path.into();
        let inventory = load_inventory(&path)?;
        debug!(path = %path.display(), vms = inventory.len(), "opened inventory");
        Ok(Self {
            path,
            inventory: Mutex::new(inventory),
            port_range,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current inventory.
    #[must_use]
    pub fn inventory(&self) -> Inventory {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(
        &self,
        change: impl FnOnce(&mut Inventory) -> std::result::Result<T, InventoryError>,
    ) -> Result<T> {
        let mut current = self.lock();
        let mut next = current.clone();
        let value = change(&mut next)?;
        save_inventory(&self.path, &next)?;
        *current = next;
        Ok(value)
    }
}

impl EntityStore for FileSystemInventoryStore {
    fn get(&self, id: EntityId) -> Result<Entity> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| OperationError::NotFound(format!("VM {id} not found")))
    }

    fn create(&self, spec: EntitySpec) -> Result<Entity> {
        self.update(|inventory| inventory.insert(spec))
    }

    fn list_names(&self, family: &CloneNameFamily) -> Result<HashSet<String>> {
        Ok(self
            .lock()
            .names()
            .filter(|name| family.matches(name))
            .map(ToString::to_string)
            .collect())
    }
}

impl DeviceStore for FileSystemInventoryStore {
    fn create(&self, device: Device) -> Result<Device> {
        self.update(|inventory| inventory.add_device(device))
    }
}

impl PortAllocator for FileSystemInventoryStore {
    fn allocate(&self) -> Result<PortPair> {
        Ok(self.lock().allocate_ports(self.port_range.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;
    use vmclone_core::{DeviceAttributes, DisplayAttributes};

    fn spec(name: &str) -> EntitySpec {
        EntitySpec {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
            description: String::new(),
            vcpus: 1,
            memory: 512,
            autostart: false,
        }
    }

    fn open(dir: &TempDir) -> anyhow::Result<FileSystemInventoryStore> {
        Ok(FileSystemInventoryStore::open(
            dir.path().join("inventory.toml"),
            5900..=5905,
        )?)
    }

    #[test]
    fn created_entities_are_persisted() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;

        let entity = EntityStore::create(&store, spec("web"))?;

        let reopened = open(&dir)?;
        assert_eq!(EntityStore::get(&reopened, entity.id)?.name, "web");
        Ok(())
    }

    #[test]
    fn duplicate_name_is_a_collision() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;
        EntityStore::create(&store, spec("web"))?;

        let result = EntityStore::create(&store, spec("web"));

        assert!(matches!(result, Err(OperationError::NameCollision(_))));
        assert_eq!(store.inventory().len(), 1);
        Ok(())
    }

    #[test]
    fn missing_entity_is_not_found() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;

        assert!(EntityStore::get(&store, EntityId(7)).is_err_and(|e| e.is_not_found()));
        Ok(())
    }

    #[test]
    fn list_names_returns_the_clone_family() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;
        for name in ["web", "web_clone0", "web_clone7", "webserver", "db_clone0"] {
            EntityStore::create(&store, spec(name))?;
        }

        let names = store.list_names(&CloneNameFamily::of("web", "_clone"))?;

        let mut names: Vec<_> = names.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["web_clone0", "web_clone7"]);
        Ok(())
    }

    #[test]
    fn device_for_unknown_vm_is_not_found_and_not_saved() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;
        let device = Device::new(DeviceAttributes::Display(DisplayAttributes::new(
            PortPair::new(5900, 5901)?,
        )))
        .duplicate_for(EntityId(3));

        let result = DeviceStore::create(&store, device);

        assert!(result.is_err_and(|e| e.is_not_found()));
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn allocated_ports_skip_those_in_use() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir)?;
        let vm = EntityStore::create(&store, spec("web"))?;

        let first = store.allocate()?;
        let display = Device::new(DeviceAttributes::Display(DisplayAttributes::new(first)))
            .duplicate_for(vm.id);
        DeviceStore::create(&store, display)?;
        let second = store.allocate()?;

        assert_eq!(first, PortPair::new(5900, 5901)?);
        assert_eq!(second, PortPair::new(5902, 5903)?);
        Ok(())
    }

    #[test]
    fn exhausted_range_is_reported() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = FileSystemInventoryStore::open(dir.path().join("inventory.toml"), 5900..=5900)?;

        let result = store.allocate();

        assert!(matches!(result, Err(OperationError::Inventory(InventoryError::PortsExhausted { .. }))));
        Ok(())
    }
}
