use std::sync::Arc;

use vmclone_core::EntityId;
use vmclone_inventory::Config;
use vmclone_operations::operations::{CloneInput, CloneOperation, CloneOutput};
use vmclone_operations::providers::ZfsDatasetStore;

use super::{CloneArgs, open_inventory};
use crate::error::{CliError, Result};

pub(crate) fn run(args: CloneArgs, config: &Config, verbose: u8) -> Result<()> {
    let inventory = open_inventory(config)?;
    let datasets = Arc::new(ZfsDatasetStore::with_binary(config.zfs().binary()));

    let operation = CloneOperation::new(
        Arc::clone(&inventory),
        Arc::clone(&inventory),
        inventory,
        datasets,
    )
    .with_suffix(config.clone_config().suffix())
    .with_zvol_root(config.zfs().zvol_root().clone());

    let id = EntityId(args.id);
    let output = operation
        .execute(CloneInput {
            source: id,
            name: args.name,
        })
        .map_err(|source| CliError::Clone { id, source })?;

    print_clone(id, &output, verbose > 0);
    Ok(())
}

fn print_clone(source: EntityId, output: &CloneOutput, show_steps: bool) {
    println!(
        "Cloned VM {source} to '{}' (id {})",
        output.name, output.id
    );

    for warning in &output.warnings {
        println!("warning: {warning}");
    }

    if show_steps && !output.audit_log.records().is_empty() {
        println!();
        println!("Steps:");
        for line in output.audit_log.summary().lines() {
            println!("  {line}");
        }
    }
}
