use std::sync::Arc;

use crate::traits::DatasetStore;

/// Collaborators shared by the storage steps of one clone run.
pub struct CloneSagaContext<S> {
    datasets: Arc<S>,
    suffix: String,
}

impl<S> Clone for CloneSagaContext<S> {
    fn clone(&self) -> Self {
        Self {
            datasets: Arc::clone(&self.datasets),
            suffix: self.suffix.clone(),
        }
    }
}

impl<S: DatasetStore> CloneSagaContext<S> {
    pub fn new(datasets: Arc<S>, suffix: impl Into<String>) -> Self {
        Self {
            datasets,
            suffix: suffix.into(),
        }
    }

    #[must_use]
    pub fn datasets(&self) -> &S {
        &self.datasets
    }

    /// Tag used when a seed name is taken and a numbered name is allocated.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}
