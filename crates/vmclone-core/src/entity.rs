use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityState {
    Running,
    Stopped,
    Suspended,
    Error,
}

/// Runtime status reported by the hypervisor. Never copied to clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatus {
    pub state: EntityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// A virtual machine definition and its attached devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    pub vcpus: u32,
    /// Memory in MiB.
    pub memory: u64,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Entity {
    /// Creation payload for a copy of this entity.
    ///
    /// Identity, runtime status and devices are dropped; `name` and `uuid`
    /// replace the originals.
    #[must_use]
    pub fn duplicate_spec(&self, name: String, uuid: Uuid) -> EntitySpec {
        EntitySpec {
            name,
            uuid,
            description: self.description.clone(),
            vcpus: self.vcpus,
            memory: self.memory,
            autostart: self.autostart,
        }
    }
}

/// Fields required to create an entity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    pub vcpus: u32,
    pub memory: u64,
    #[serde(default)]
    pub autostart: bool,
}

impl EntitySpec {
    #[must_use]
    pub fn into_entity(self, id: EntityId) -> Entity {
        Entity {
            id,
            name: self.name,
            uuid: self.uuid,
            description: self.description,
            vcpus: self.vcpus,
            memory: self.memory,
            autostart: self.autostart,
            status: None,
            devices: Vec::new(),
        }
    }
}
