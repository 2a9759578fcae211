mod dataset_store;
mod device_store;
mod entity_store;
mod port_allocator;

pub use dataset_store::DatasetStore;
pub use device_store::DeviceStore;
pub use entity_store::EntityStore;
pub use port_allocator::PortAllocator;
