//! Batch accumulation of policy violations.

use std::fmt;

use super::{Code, KnvError};

/// Anything that can contribute zero or more errors to a batch.
pub trait IntoKnvErrors {
    fn into_knv_errors(self) -> Vec<KnvError>;
}

impl IntoKnvErrors for KnvError {
    fn into_knv_errors(self) -> Vec<KnvError> {
        vec![self]
    }
}

impl IntoKnvErrors for Vec<KnvError> {
    fn into_knv_errors(self) -> Vec<KnvError> {
        self
    }
}

impl IntoKnvErrors for MultiError {
    fn into_knv_errors(self) -> Vec<KnvError> {
        self.errors
    }
}

impl<T: IntoKnvErrors> IntoKnvErrors for Option<T> {
    fn into_knv_errors(self) -> Vec<KnvError> {
        self.map(IntoKnvErrors::into_knv_errors).unwrap_or_default()
    }
}

impl<E: IntoKnvErrors> IntoKnvErrors for Result<(), E> {
    fn into_knv_errors(self) -> Vec<KnvError> {
        match self {
            Ok(()) => Vec::new(),
            Err(e) => e.into_knv_errors(),
        }
    }
}

/// Collects errors across a compile run. Nested batches are flattened on
/// insertion.
#[derive(Debug, Default)]
pub struct ErrorBuilder {
    errors: Vec<KnvError>,
}

impl ErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, errors: impl IntoKnvErrors) {
        self.errors.extend(errors.into_knv_errors());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn has_internal(&self) -> bool {
        self.errors.iter().any(KnvError::is_internal)
    }

    /// Finalizes the batch. Returns `None` when nothing was reported.
    pub fn build(self) -> Option<MultiError> {
        MultiError::from_errors(self.errors)
    }

    pub fn into_result(self) -> Result<(), MultiError> {
        match self.build() {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }
}

/// A non-empty, ordered set of errors.
///
/// Errors are sorted by rendered message and exact duplicates are
/// dropped, so a batch reads the same regardless of traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiError {
    errors: Vec<KnvError>,
}

impl MultiError {
    pub fn from_errors(errors: Vec<KnvError>) -> Option<Self> {
        let mut keyed: Vec<(String, KnvError)> =
            errors.into_iter().map(|e| (e.to_string(), e)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        if keyed.is_empty() {
            return None;
        }
        Some(Self {
            errors: keyed.into_iter().map(|(_, e)| e).collect(),
        })
    }

    pub fn errors(&self) -> &[KnvError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn codes(&self) -> Vec<Code> {
        self.errors.iter().map(KnvError::code).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnvError> {
        self.errors.iter()
    }
}

impl From<KnvError> for MultiError {
    fn from(error: KnvError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for MultiError {
    type Item = KnvError;
    type IntoIter = std::vec::IntoIter<KnvError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "Found issues: {} {}", self.errors.len(), noun)?;
        for (i, error) in self.errors.iter().enumerate() {
            write!(f, "\n\n[{}] {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
