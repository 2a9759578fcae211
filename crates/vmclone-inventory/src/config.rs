use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use vmclone_core::{CLONE_SUFFIX, ZvolRoot};

use crate::error::InventoryError;
use crate::{DEFAULT_INVENTORY_FILE, Result};

const DEFAULT_PORT_RANGE: (u16, u16) = (5900, 6900);

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    inventory: Option<PathBuf>,
    zfs: ZfsSection,
    clone: CloneSection,
    display: DisplaySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ZfsSection {
    binary: Option<String>,
    zvol_root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CloneSection {
    suffix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DisplaySection {
    port_range: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZfsConfig {
    binary: String,
    zvol_root: ZvolRoot,
}

impl Default for ZfsConfig {
    fn default() -> Self {
        Self {
            binary: String::from("zfs"),
            zvol_root: ZvolRoot::default(),
        }
    }
}

impl ZfsConfig {
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    #[must_use]
    pub fn zvol_root(&self) -> &ZvolRoot {
        &self.zvol_root
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneConfig {
    suffix: String,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            suffix: String::from(CLONE_SUFFIX),
        }
    }
}

impl CloneConfig {
    /// Tag inserted between a base name and its clone counter.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    port_range: RangeInclusive<u16>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            port_range: DEFAULT_PORT_RANGE.0..=DEFAULT_PORT_RANGE.1,
        }
    }
}

impl DisplayConfig {
    /// Inclusive range handed out to display devices.
    #[must_use]
    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_range.clone()
    }
}

/// Settings loaded from `vmclone.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    inventory: PathBuf,
    zfs: ZfsConfig,
    clone: CloneConfig,
    display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from(DEFAULT_INVENTORY_FILE),
            zfs: ZfsConfig::default(),
            clone: CloneConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Path of the inventory file. Relative paths in the configuration file
    /// are resolved against the directory containing it.
    #[must_use]
    pub fn inventory(&self) -> &Path {
        &self.inventory
    }

    #[must_use]
    pub fn zfs(&self) -> &ZfsConfig {
        &self.zfs
    }

    #[must_use]
    pub fn clone_config(&self) -> &CloneConfig {
        &self.clone
    }

    #[must_use]
    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    #[must_use]
    pub fn with_inventory(mut self, inventory: impl Into<PathBuf>) -> Self {
        self.inventory = inventory.into();
        self
    }
}

/// Parses configuration text read from `path`.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML, contains unknown keys, or
/// holds values that fail validation.
pub fn parse_config(content: &str, path: &Path) -> Result<Config> {
    let file: ConfigFile = toml::from_str(content).map_err(|source| InventoryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let inventory = resolve(
        base_dir,
        file.inventory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY_FILE)),
    );

    let defaults = ZfsConfig::default();
    let zfs = ZfsConfig {
        binary: file.zfs.binary.unwrap_or(defaults.binary),
        zvol_root: file
            .zfs
            .zvol_root
            .map(ZvolRoot::new)
            .unwrap_or(defaults.zvol_root),
    };
    if zfs.binary.trim().is_empty() {
        return Err(InventoryError::InvalidConfig {
            reason: "zfs.binary must not be empty".to_string(),
        });
    }

    let suffix = file
        .clone
        .suffix
        .unwrap_or_else(|| String::from(CLONE_SUFFIX));
    if suffix.is_empty() || suffix.chars().any(|c| c.is_ascii_digit() || c == '/' || c == '@') {
        return Err(InventoryError::InvalidConfig {
            reason: format!("clone.suffix '{suffix}' must be non-empty without digits, '/' or '@'"),
        });
    }

    let (start, end) = file.display.port_range.unwrap_or(DEFAULT_PORT_RANGE);
    if start == 0 || end <= start {
        return Err(InventoryError::InvalidConfig {
            reason: format!("display.port_range [{start}, {end}] must hold at least two non-zero ports"),
        });
    }

    Ok(Config {
        inventory,
        zfs,
        clone: CloneConfig { suffix },
        display: DisplayConfig {
            port_range: start..=end,
        },
    })
}

/// Loads configuration from `path`. A missing file yields the defaults, with
/// the inventory placed next to where the configuration file would be.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file, using defaults");
        return parse_config("", path);
    }

    let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
