use std::collections::HashSet;

use vmclone_core::{CloneNameFamily, Entity, EntityId, EntitySpec};

use crate::Result;

pub trait EntityStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`](crate::OperationError::NotFound)
    /// if no entity has this id.
    fn get(&self, id: EntityId) -> Result<Entity>;

    /// Persists a new entity and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NameCollision`](crate::OperationError::NameCollision)
    /// if the name is taken, or a storage error.
    fn create(&self, spec: EntitySpec) -> Result<Entity>;

    /// Names of all entities belonging to `family`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_names(&self, family: &CloneNameFamily) -> Result<HashSet<String>>;
}
