use vmclone_core::Device;

use crate::Result;

pub trait DeviceStore: Send + Sync {
    /// Persists `device` under the entity named by `device.vm`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`](crate::OperationError::NotFound)
    /// if the owning entity does not exist, or a storage error.
    fn create(&self, device: Device) -> Result<Device>;
}
