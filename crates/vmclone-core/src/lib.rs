pub mod dataset;
pub mod device;
pub mod entity;
pub mod error;
pub mod naming;
mod zvol;

pub use dataset::*;
pub use device::*;
pub use entity::*;
pub use error::*;
pub use naming::{CLONE_SUFFIX, CloneNameFamily, allocate, allocate_seeded};
pub use zvol::{DEFAULT_ZVOL_ROOT, ZvolRoot};
