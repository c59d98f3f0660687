//! Typed side-table for facts derived during compilation.
//!
//! Each pass reads the artifacts it depends on by type and may publish
//! new ones. A missing dependency is an ordering bug and surfaces as an
//! internal error through [`Data::require`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::knv::KnvError;

#[derive(Default)]
pub struct Data {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn require<T: Any + Send + Sync>(&self) -> Result<&T, KnvError> {
        self.get::<T>().ok_or_else(|| {
            KnvError::internal(format!("{} has not been computed", type_name::<T>()))
        })
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Flag(bool);

    #[test]
    fn test_insert_get_replace() {
        let mut data = Data::new();
        assert!(data.get::<Flag>().is_none());
        assert_eq!(data.insert(Flag(true)), None);
        assert_eq!(data.get::<Flag>(), Some(&Flag(true)));
        assert_eq!(data.insert(Flag(false)), Some(Flag(true)));
        data.get_mut::<Flag>().unwrap().0 = true;
        assert_eq!(data.remove::<Flag>(), Some(Flag(true)));
        assert!(!data.contains::<Flag>());
    }

    #[test]
    fn test_require_missing_is_internal() {
        let data = Data::new();
        let err = data.require::<Flag>().unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("Flag"));
    }
}
