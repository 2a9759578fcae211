mod inventory;
mod zfs;

pub use inventory::FileSystemInventoryStore;
pub use zfs::ZfsDatasetStore;
