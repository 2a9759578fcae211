mod config;
mod error;
mod inventory;
mod io;

pub const DEFAULT_CONFIG_FILE: &str = "vmclone.toml";
pub const DEFAULT_INVENTORY_FILE: &str = "inventory.toml";

pub use config::{CloneConfig, Config, DisplayConfig, ZfsConfig, load_config, parse_config};
pub use error::InventoryError;
pub use inventory::Inventory;
pub use io::{load_inventory, save_inventory};

pub type Result<T> = std::result::Result<T, InventoryError>;
