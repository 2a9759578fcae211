use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Nic,
    Display,
    Disk,
    Raw,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nic => "NIC",
            Self::Display => "DISPLAY",
            Self::Disk => "DISK",
            Self::Raw => "RAW",
        };
        write!(f, "{s}")
    }
}

/// A device attached to a VM.
///
/// `id` and `vm` are unset on devices that have not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub attributes: DeviceAttributes,
}

impl Device {
    #[must_use]
    pub fn new(attributes: DeviceAttributes) -> Self {
        Self {
            id: None,
            vm: None,
            order: None,
            attributes,
        }
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.attributes.device_type()
    }

    /// Copy of this device with its identity stripped and ownership moved to
    /// `owner`.
    #[must_use]
    pub fn duplicate_for(&self, owner: EntityId) -> Self {
        Self {
            id: None,
            vm: Some(owner),
            order: self.order,
            attributes: self.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "UPPERCASE")]
pub enum DeviceAttributes {
    Nic(NicAttributes),
    Display(DisplayAttributes),
    Disk(DiskAttributes),
    Raw(RawAttributes),
}

impl DeviceAttributes {
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::Nic(_) => DeviceType::Nic,
            Self::Display(_) => DeviceType::Display,
            Self::Disk(_) => DeviceType::Disk,
            Self::Raw(_) => DeviceType::Raw,
        }
    }
}

/// Colon-separated 48-bit hardware address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let octets: Vec<&str> = s.split(':').collect();
        let valid = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.bytes().all(|b| b.is_ascii_hexdigit()));
        if valid {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(CoreError::InvalidMacAddress(s.to_string()))
        }
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicAttributes {
    /// Unset means the hypervisor generates an address on first start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic_attach: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Primary (display protocol) and secondary (web client) port of a display
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortPair {
    pub port: u16,
    pub web_port: u16,
}

impl PortPair {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDisplayPorts`] if either port is zero or
    /// both are equal.
    pub fn new(port: u16, web_port: u16) -> Result<Self> {
        if port == 0 || web_port == 0 {
            return Err(CoreError::InvalidDisplayPorts {
                reason: "ports must be non-zero",
            });
        }
        if port == web_port {
            return Err(CoreError::InvalidDisplayPorts {
                reason: "port and web_port must differ",
            });
        }
        Ok(Self { port, web_port })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DisplayAttributesDef", into = "DisplayAttributesDef")]
pub struct DisplayAttributes {
    ports: PortPair,
    pub bind: String,
    pub web: bool,
    pub resolution: Option<String>,
}

impl DisplayAttributes {
    #[must_use]
    pub fn new(ports: PortPair) -> Self {
        Self {
            ports,
            bind: "0.0.0.0".to_string(),
            web: true,
            resolution: None,
        }
    }

    #[must_use]
    pub fn ports(&self) -> PortPair {
        self.ports
    }

    pub fn set_ports(&mut self, ports: PortPair) {
        self.ports = ports;
    }
}

#[derive(Serialize, Deserialize)]
struct DisplayAttributesDef {
    port: u16,
    web_port: u16,
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_web")]
    web: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_web() -> bool {
    true
}

impl TryFrom<DisplayAttributesDef> for DisplayAttributes {
    type Error = CoreError;

    fn try_from(def: DisplayAttributesDef) -> Result<Self> {
        Ok(Self {
            ports: PortPair::new(def.port, def.web_port)?,
            bind: def.bind,
            web: def.web,
            resolution: def.resolution,
        })
    }
}

impl From<DisplayAttributes> for DisplayAttributesDef {
    fn from(attrs: DisplayAttributes) -> Self {
        Self {
            port: attrs.ports.port,
            web_port: attrs.ports.web_port,
            bind: attrs.bind,
            web: attrs.web,
            resolution: attrs.resolution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiskBus {
    #[default]
    Ahci,
    Virtio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DiskAttributesDef", into = "DiskAttributesDef")]
pub struct DiskAttributes {
    path: String,
    pub bus: DiskBus,
}

impl DiskAttributes {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDeviceAttribute`] unless `path` is an
    /// absolute device path.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            path: absolute_path("DISK", path.into())?,
            bus: DiskBus::default(),
        })
    }

    /// Zvol device node backing this disk.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDeviceAttribute`] unless `path` is an
    /// absolute device path.
    pub fn set_path(&mut self, path: impl Into<String>) -> Result<()> {
        self.path = absolute_path("DISK", path.into())?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct DiskAttributesDef {
    path: String,
    #[serde(default, rename = "type")]
    bus: DiskBus,
}

impl TryFrom<DiskAttributesDef> for DiskAttributes {
    type Error = CoreError;

    fn try_from(def: DiskAttributesDef) -> Result<Self> {
        let mut attrs = Self::new(def.path)?;
        attrs.bus = def.bus;
        Ok(attrs)
    }
}

impl From<DiskAttributes> for DiskAttributesDef {
    fn from(attrs: DiskAttributes) -> Self {
        Self {
            path: attrs.path,
            bus: attrs.bus,
        }
    }
}

/// File-backed disk image. Never cloned automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttributes {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub boot: bool,
}

fn absolute_path(device: &'static str, path: String) -> Result<String> {
    if path.starts_with('/') && path.len() > 1 {
        Ok(path)
    } else {
        Err(CoreError::InvalidDeviceAttribute {
            device,
            field: "path",
            reason: "must be an absolute device path",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_validation() {
        assert!("00:A0:98:1b:2c:3d".parse::<MacAddress>().is_ok());
        assert!("00:a0:98:1b:2c".parse::<MacAddress>().is_err());
        assert!("00:a0:98:1b:2c:zz".parse::<MacAddress>().is_err());
        assert!("00a0981b2c3d".parse::<MacAddress>().is_err());
    }

    #[test]
    fn mac_address_normalises_case() {
        let mac: MacAddress = "00:A0:98:1B:2C:3D".parse().expect("valid mac");
        assert_eq!(mac.as_str(), "00:a0:98:1b:2c:3d");
    }

    #[test]
    fn port_pair_rejects_zero_and_equal_ports() {
        assert!(PortPair::new(0, 5901).is_err());
        assert!(PortPair::new(5900, 5900).is_err());
        assert!(PortPair::new(5900, 5901).is_ok());
    }

    #[test]
    fn disk_requires_absolute_path() {
        assert!(DiskAttributes::new("tank/vm").is_err());
        assert!(DiskAttributes::new("/").is_err());
        assert!(DiskAttributes::new("/dev/zvol/tank/vm").is_ok());
    }

    #[test]
    fn duplicate_strips_identity_and_reassigns_owner() {
        let mut device = Device::new(DeviceAttributes::Nic(NicAttributes::default()));
        device.id = Some(DeviceId(7));
        device.vm = Some(EntityId(1));
        device.order = Some(1002);

        let copy = device.duplicate_for(EntityId(9));

        assert_eq!(copy.id, None);
        assert_eq!(copy.vm, Some(EntityId(9)));
        assert_eq!(copy.order, Some(1002));
        assert_eq!(copy.attributes, device.attributes);
    }

    #[test]
    fn device_deserializes_tagged_attributes() {
        let json = r#"{
            "id": 3,
            "vm": 1,
            "attributes": {"dtype": "DISK", "path": "/dev/zvol/tank/vm1", "type": "VIRTIO"}
        }"#;

        let device: Device = serde_json::from_str(json).expect("valid device");

        assert_eq!(device.device_type(), DeviceType::Disk);
        let DeviceAttributes::Disk(disk) = &device.attributes else {
            panic!("expected disk attributes");
        };
        assert_eq!(disk.path(), "/dev/zvol/tank/vm1");
        assert_eq!(disk.bus, DiskBus::Virtio);
    }

    #[test]
    fn display_with_equal_ports_fails_to_deserialize() {
        let json = r#"{"attributes": {"dtype": "DISPLAY", "port": 5900, "web_port": 5900}}"#;
        let result: std::result::Result<Device, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn display_defaults_bind_and_web() {
        let json = r#"{"attributes": {"dtype": "DISPLAY", "port": 5900, "web_port": 5901}}"#;
        let device: Device = serde_json::from_str(json).expect("valid device");
        let DeviceAttributes::Display(display) = device.attributes else {
            panic!("expected display attributes");
        };
        assert_eq!(display.bind, "0.0.0.0");
        assert!(display.web);
        assert_eq!(display.ports(), PortPair::new(5900, 5901).expect("valid"));
    }
}
