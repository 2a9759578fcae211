use std::fs;
use std::path::Path;

use crate::Result;
use crate::error::InventoryError;
use crate::inventory::Inventory;

/// Reads the inventory at `path`. A missing file is an empty inventory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_inventory(path: &Path) -> Result<Inventory> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no inventory file, starting empty");
        return Ok(Inventory::new());
    }

    let content = fs::read_to_string(path).map_err(|source| InventoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| InventoryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the inventory to `path`, replacing any previous content.
///
/// The new content goes to a sibling temporary file first and is renamed over
/// `path`, so readers never observe a half-written inventory.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub fn save_inventory(path: &Path, inventory: &Inventory) -> Result<()> {
    let content =
        toml::to_string_pretty(inventory).map_err(|source| InventoryError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    let write_err = |source| InventoryError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let staging = path.with_extension("toml.tmp");
    fs::write(&staging, content).map_err(write_err)?;
    fs::rename(&staging, path).map_err(write_err)?;

    tracing::debug!(path = %path.display(), vms = inventory.len(), "inventory saved");
    Ok(())
}
