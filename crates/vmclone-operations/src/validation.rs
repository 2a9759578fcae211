use vmclone_core::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InheritNonexistent { property: String },
    MissingValue { property: String },
    UserPropertyNamespace { property: String },
    RootLevelDataset { name: String },
    MissingVolumeSize { name: String },
    Malformed(CoreError),
}

impl ValidationError {
    /// Dotted path of the offending input field.
    #[must_use]
    pub fn field(&self) -> String {
        match self {
            Self::InheritNonexistent { property }
            | Self::MissingValue { property }
            | Self::UserPropertyNamespace { property } => format!("properties.{property}"),
            Self::RootLevelDataset { .. } => "name".to_string(),
            Self::MissingVolumeSize { .. } => "volsize".to_string(),
            Self::Malformed(_) => "attributes".to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InheritNonexistent { property } => {
                write!(f, "cannot inherit a non-existent property '{property}'")
            }
            Self::MissingValue { property } => {
                write!(f, "'value' or 'parsed' must be given when setting '{property}'")
            }
            Self::UserPropertyNamespace { property } => {
                write!(
                    f,
                    "user property '{property}' requires a namespace (e.g. 'org:{property}')"
                )
            }
            Self::RootLevelDataset { name } => {
                write!(f, "'{name}' is not a full dataset name, e.g. pool/dataset")
            }
            Self::MissingVolumeSize { name } => {
                write!(f, "volume '{name}' requires a volsize")
            }
            Self::Malformed(err) => write!(f, "{err}"),
        }
    }
}

/// Collection of validation errors (guaranteed non-empty when constructed).
///
/// Build one through [`ValidationErrorCollector`] so that an empty batch
/// never turns into an error.
#[derive(Debug)]
#[allow(clippy::len_without_is_empty)]
pub struct ValidationErrors {
    first: ValidationError,
    rest: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn single(error: ValidationError) -> Self {
        Self {
            first: error,
            rest: Vec::new(),
        }
    }

    /// Returns `None` if `errors` is empty.
    #[must_use]
    pub fn try_from_vec(mut errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let first = errors.remove(0);
        Some(Self {
            first,
            rest: errors,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationError> {
        let mut errors = vec![self.first];
        errors.extend(self.rest);
        errors
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rest.is_empty() {
            return write!(f, "{}: {}", self.first.field(), self.first);
        }
        writeln!(f, "validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}: {error}", i + 1, error.field())?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl From<CoreError> for ValidationErrors {
    fn from(err: CoreError) -> Self {
        Self::single(ValidationError::Malformed(err))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ValidationErrorCollector {
    errors: Vec<ValidationError>,
}

impl ValidationErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Converts to `ValidationErrors` if there are any errors.
    pub fn into_errors(self) -> Option<ValidationErrors> {
        ValidationErrors::try_from_vec(self.errors)
    }
}
