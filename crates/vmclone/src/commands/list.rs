use vmclone_core::Entity;
use vmclone_inventory::Config;

use super::open_inventory;
use crate::error::Result;

pub(crate) fn run(config: &Config) -> Result<()> {
    let inventory = open_inventory(config)?.inventory();

    if inventory.is_empty() {
        println!("No VMs in inventory.");
        return Ok(());
    }

    let mut vms: Vec<&Entity> = inventory.iter().collect();
    vms.sort_by_key(|vm| vm.id);

    let width = vms.iter().map(|vm| vm.name.len()).max().unwrap_or(0).max(4);
    println!("{:>4}  {:<width$}  DEVICES", "ID", "NAME");
    for vm in vms {
        let devices: Vec<String> = vm
            .devices
            .iter()
            .map(|device| device.device_type().to_string())
            .collect();
        println!("{:>4}  {:<width$}  {}", vm.id.0, vm.name, devices.join(","));
    }

    Ok(())
}
