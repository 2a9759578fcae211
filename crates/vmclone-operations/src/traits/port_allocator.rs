use vmclone_core::PortPair;

use crate::Result;

pub trait PortAllocator: Send + Sync {
    /// Returns a port pair not held by any display device.
    ///
    /// # Errors
    ///
    /// Returns an error if no free pair is left.
    fn allocate(&self) -> Result<PortPair>;
}
