use tracing::debug;
use vmclone_core::DatasetPath;

use crate::Result;
use crate::error::OperationError;
use crate::traits::DatasetStore;
use crate::types::{
    DatasetDescriptor, DatasetFilter, PropertyChange, PropertyChanges, PropertyUpdate,
    QueryOptions,
};
use crate::validation::{ValidationError, ValidationErrorCollector};

/// Properties that cap capacity. Setting them before reservations in the same
/// batch can make the reservation fail, so they always go last.
const CAPACITY_LIMITS: [&str; 2] = ["quota", "refquota"];

/// Validates a batch of property changes against a dataset and applies it in
/// a safe order.
pub struct PropertyUpdateEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: DatasetStore + ?Sized> PropertyUpdateEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if `target` does not exist,
    /// [`OperationError::Validation`] with every violation in the batch (in
    /// which case nothing is applied), or the engine error of the first
    /// failing update.
    pub fn apply(&self, target: &DatasetPath, changes: &PropertyChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let dataset = self
            .store
            .query(&DatasetFilter::named(target), &QueryOptions::default())?
            .into_iter()
            .find(|d| &d.id == target)
            .ok_or_else(|| OperationError::NotFound(format!("dataset {target} does not exist")))?;

        let updates = Self::plan(&dataset, changes)?;
        debug!(
            dataset = %target,
            updates = ?updates.iter().map(PropertyUpdate::name).collect::<Vec<_>>(),
            "applying property updates"
        );
        self.store.apply_property_updates(target, &updates)
    }

    /// Validates `changes` against `dataset` and orders them for application.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Validation`] listing every violation.
    pub fn plan(dataset: &DatasetDescriptor, changes: &PropertyChanges) -> Result<Vec<PropertyUpdate>> {
        let mut collector = ValidationErrorCollector::new();
        for (name, change) in changes {
            validate(dataset, name, change, &mut collector);
        }
        if let Some(errors) = collector.into_errors() {
            return Err(errors.into());
        }

        let (limits, others): (Vec<_>, Vec<_>) = changes
            .iter()
            .partition(|(name, _)| CAPACITY_LIMITS.contains(&name.as_str()));

        Ok(others
            .into_iter()
            .chain(limits)
            .filter_map(|(name, change)| to_update(name, change))
            .collect())
    }
}

fn validate(
    dataset: &DatasetDescriptor,
    name: &str,
    change: &PropertyChange,
    collector: &mut ValidationErrorCollector,
) {
    let known = dataset.property(name).is_some();

    if change.inherit {
        if !known {
            collector.push(ValidationError::InheritNonexistent {
                property: name.to_string(),
            });
        }
        return;
    }

    if change.parsed.is_none() && change.value.is_none() {
        collector.push(ValidationError::MissingValue {
            property: name.to_string(),
        });
    }
    if !known && !name.contains(':') {
        collector.push(ValidationError::UserPropertyNamespace {
            property: name.to_string(),
        });
    }
}

fn to_update(name: &str, change: &PropertyChange) -> Option<PropertyUpdate> {
    if change.inherit {
        return Some(PropertyUpdate::Inherit {
            name: name.to_string(),
        });
    }
    let value = change
        .parsed
        .as_ref()
        .map(vmclone_core::ParsedValue::to_engine_string)
        .or_else(|| change.value.clone())?;
    Some(PropertyUpdate::Set {
        name: name.to_string(),
        value,
    })
}
