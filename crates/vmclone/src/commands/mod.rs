mod clone;
mod dataset;
mod list;

use std::sync::Arc;

use clap::{Args, Subcommand};
use vmclone_inventory::Config;
use vmclone_operations::providers::FileSystemInventoryStore;

use crate::error::{CliError, Result};

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Clone a VM, its devices and its zvol-backed disks
    Clone(CloneArgs),
    /// List VMs in the inventory
    List,
    /// Manage ZFS datasets
    #[command(subcommand)]
    Dataset(DatasetCommand),
}

#[derive(Args)]
pub(crate) struct CloneArgs {
    /// Id of the VM to clone
    pub id: u64,

    /// Name for the new VM (default: `<source><suffix><n>`)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum DatasetCommand {
    /// Set or inherit dataset properties
    Set(SetArgs),
}

#[derive(Args)]
pub(crate) struct SetArgs {
    /// Dataset to update, e.g. tank/vms/web0
    pub dataset: String,

    /// Properties to set, as <name>=<value>
    pub assignments: Vec<String>,

    /// Properties to reset to their inherited value
    #[arg(long = "inherit", value_name = "PROPERTY")]
    pub inherit: Vec<String>,
}

impl Commands {
    pub(crate) fn execute(self, config: &Config, verbose: u8) -> Result<()> {
        match self {
            Self::Clone(args) => clone::run(args, config, verbose),
            Self::List => list::run(config),
            Self::Dataset(DatasetCommand::Set(args)) => dataset::run_set(args, config),
        }
    }
}

fn open_inventory(config: &Config) -> Result<Arc<FileSystemInventoryStore>> {
    FileSystemInventoryStore::open(config.inventory(), config.display().port_range())
        .map(Arc::new)
        .map_err(CliError::Inventory)
}
