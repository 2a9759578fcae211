use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use vmclone_core::{
    Device, DeviceAttributes, DeviceId, Entity, EntityId, EntitySpec, PortPair,
};

use crate::Result;
use crate::error::InventoryError;

fn first_id() -> u64 {
    1
}

/// VM definitions persisted in the inventory file.
///
/// Format:
/// ```toml
/// next_vm_id = 3
/// next_device_id = 7
///
/// [[vm]]
/// id = 1
/// name = "web"
/// uuid = "0c3b..."
/// vcpus = 2
/// memory = 2048
///
/// [[vm.devices]]
/// id = 1
/// vm = 1
/// [vm.devices.attributes]
/// dtype = "DISK"
/// path = "/dev/zvol/tank/vms/web"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default = "first_id")]
    next_vm_id: u64,
    #[serde(default = "first_id")]
    next_device_id: u64,
    #[serde(default, rename = "vm")]
    vms: Vec<Entity>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            next_vm_id: first_id(),
            next_device_id: first_id(),
            vms: Vec::new(),
        }
    }
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.vms.iter().find(|vm| vm.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.vms.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vms.iter().map(|vm| vm.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    /// Adds a VM record and assigns it the next free id.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::DuplicateName`] if a VM with the same name
    /// is already present.
    pub fn insert(&mut self, spec: EntitySpec) -> Result<Entity> {
        if self.names().any(|name| name == spec.name) {
            return Err(InventoryError::DuplicateName(spec.name));
        }

        let id = EntityId(self.take_vm_id());
        let entity = spec.into_entity(id);
        self.vms.push(entity.clone());
        Ok(entity)
    }

    /// Attaches `device` to its owning VM, assigning an id and, when unset,
    /// the next position in the VM's device order.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::UnownedDevice`] if the device names no VM
    /// and [`InventoryError::EntityNotFound`] if that VM does not exist.
    pub fn add_device(&mut self, mut device: Device) -> Result<Device> {
        let owner = device.vm.ok_or(InventoryError::UnownedDevice)?;
        let position = self
            .vms
            .iter()
            .position(|vm| vm.id == owner)
            .ok_or(InventoryError::EntityNotFound(owner))?;

        device.id = Some(DeviceId(self.take_device_id()));
        let vm = &mut self.vms[position];
        if device.order.is_none() {
            device.order = u32::try_from(vm.devices.len()).ok();
        }
        vm.devices.push(device.clone());
        Ok(device)
    }

    /// Ports held by display devices of every VM.
    #[must_use]
    pub fn used_display_ports(&self) -> BTreeSet<u16> {
        self.vms
            .iter()
            .flat_map(|vm| &vm.devices)
            .filter_map(|device| match &device.attributes {
                DeviceAttributes::Display(display) => Some(display.ports()),
                _ => None,
            })
            .flat_map(|ports| [ports.port, ports.web_port])
            .collect()
    }

    /// Picks the two lowest ports in `range` not held by any display device.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::PortsExhausted`] if fewer than two ports are
    /// free.
    pub fn allocate_ports(&self, range: RangeInclusive<u16>) -> Result<PortPair> {
        let used = self.used_display_ports();
        let (start, end) = (*range.start(), *range.end());
        let mut free = range.filter(|port| *port != 0 && !used.contains(port));

        match (free.next(), free.next()) {
            (Some(port), Some(web_port)) => Ok(PortPair::new(port, web_port)?),
            _ => Err(InventoryError::PortsExhausted { start, end }),
        }
    }

    fn take_vm_id(&mut self) -> u64 {
        let highest = self.vms.iter().map(|vm| vm.id.0).max().unwrap_or(0);
        let id = self.next_vm_id.max(highest + 1);
        self.next_vm_id = id + 1;
        id
    }

    fn take_device_id(&mut self) -> u64 {
        let highest = self
            .vms
            .iter()
            .flat_map(|vm| &vm.devices)
            .filter_map(|device| device.id.map(|id| id.0))
            .max()
            .unwrap_or(0);
        let id = self.next_device_id.max(highest + 1);
        self.next_device_id = id + 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vmclone_core::{DisplayAttributes, NicAttributes};

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

    fn display(owner: EntityId, port: u16, web_port: u16) -> Device {
        let ports = PortPair::new(port, web_port).expect("valid ports");
        let mut device = Device::new(DeviceAttributes::Display(DisplayAttributes::new(ports)));
        device.vm = Some(owner);
        device
    }

    mod entities {
        use super::*;

        #[test]
        fn insert_assigns_sequential_ids() -> anyhow::Result<()> {
            let mut inventory = Inventory::new();

            let first = inventory.insert(spec("a"))?;
            let second = inventory.insert(spec("b"))?;

            assert_eq!(first.id, EntityId(1));
            assert_eq!(second.id, EntityId(2));
            assert_eq!(inventory.len(), 2);
            assert_eq!(inventory.get(EntityId(2)).map(|vm| vm.name.as_str()), Some("b"));
            Ok(())
        }

        #[test]
        fn insert_rejects_duplicate_name() -> anyhow::Result<()> {
            let mut inventory = Inventory::new();
            inventory.insert(spec("a"))?;

            let result = inventory.insert(spec("a"));

            assert!(matches!(result, Err(InventoryError::DuplicateName(name)) if name == "a"));
            Ok(())
        }

        #[test]
        fn ids_skip_past_hand_edited_records() -> anyhow::Result<()> {
            let mut inventory: Inventory = toml::from_str(
                r#"
[[vm]]
id = 10
name = "legacy"
uuid = "67e55044-10b1-426f-9247-bb680e5fe0c8"
vcpus = 1
memory = 256
"#,
            )?;

            let created = inventory.insert(spec("new"))?;

            assert_eq!(created.id, EntityId(11));
            Ok(())
        }
    }

    mod devices {
        use super::*;

        #[test]
        fn add_device_assigns_id_and_order() -> anyhow::Result<()> {
            let mut inventory = Inventory::new();
            let vm = inventory.insert(spec("a"))?;

            let mut nic = Device::new(DeviceAttributes::Nic(NicAttributes::default()));
            nic.vm = Some(vm.id);
            let first = inventory.add_device(nic.clone())?;
            let second = inventory.add_device(nic)?;

            assert_eq!(first.id, Some(DeviceId(1)));
            assert_eq!(first.order, Some(0));
            assert_eq!(second.id, Some(DeviceId(2)));
            assert_eq!(second.order, Some(1));
            assert_eq!(inventory.get(vm.id).map(|vm| vm.devices.len()), Some(2));
            Ok(())
        }

        #[test]
        fn add_device_requires_existing_owner() {
            let mut inventory = Inventory::new();

            let unowned = inventory.add_device(Device::new(DeviceAttributes::Nic(
                NicAttributes::default(),
            )));
            let orphan = inventory.add_device(display(EntityId(5), 5900, 5901));

            assert!(matches!(unowned, Err(InventoryError::UnownedDevice)));
            assert!(matches!(
                orphan,
                Err(InventoryError::EntityNotFound(EntityId(5)))
            ));
        }
    }

    mod ports {
        use super::*;

        #[test]
        fn allocate_picks_lowest_free_ports() -> anyhow::Result<()> {
            let mut inventory = Inventory::new();
            let vm = inventory.insert(spec("a"))?;
            inventory.add_device(display(vm.id, 5900, 5902))?;

            let ports = inventory.allocate_ports(5900..=5910)?;

            assert_eq!(ports, PortPair::new(5901, 5903)?);
            Ok(())
        }

        #[test]
        fn allocate_fails_when_range_is_exhausted() -> anyhow::Result<()> {
            let mut inventory = Inventory::new();
            let vm = inventory.insert(spec("a"))?;
            inventory.add_device(display(vm.id, 5900, 5901))?;

            let result = inventory.allocate_ports(5900..=5902);

            assert!(matches!(
                result,
                Err(InventoryError::PortsExhausted {
                    start: 5900,
                    end: 5902
                })
            ));
            Ok(())
        }
    }
}
