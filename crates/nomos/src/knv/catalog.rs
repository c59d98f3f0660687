//! Catalogue of every error code the compiler can emit.
//!
//! The registry is assembled explicitly: each pass contributes the codes
//! it owns through a `register_codes` function, and a single composition
//! function in [`crate::compiler`] calls them all.

use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

use super::{Code, KnvError};
use crate::resource::{GroupVersionKind, ResourceRef};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("{code} is registered by both {first} and {second}")]
    Duplicate {
        code: Code,
        first: &'static str,
        second: &'static str,
    },
}

/// Documentation for one error code.
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub name: &'static str,
    pub explanation: &'static str,
    /// Canonical instance. The entry's code is taken from it.
    pub example: KnvError,
}

impl CodeEntry {
    pub fn new(name: &'static str, explanation: &'static str, example: KnvError) -> Self {
        Self {
            name,
            explanation,
            example,
        }
    }

    pub fn code(&self) -> Code {
        self.example.code()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    entries: BTreeMap<Code, CodeEntry>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: CodeEntry) -> Result<(), RegistryError> {
        let code = entry.code();
        if let Some(existing) = self.entries.get(&code) {
            return Err(RegistryError::Duplicate {
                code,
                first: existing.name,
                second: entry.name,
            });
        }
        self.entries.insert(code, entry);
        Ok(())
    }

    pub fn get(&self, code: Code) -> Option<&CodeEntry> {
        self.entries.get(&code)
    }

    pub fn contains(&self, code: Code) -> bool {
        self.entries.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeEntry> {
        self.entries.values()
    }

    /// Renders the catalogue as Markdown, ordered by code.
    pub fn render_markdown(&self) -> String {
        let mut out = String::from("# Error codes\n");
        for entry in self.entries.values() {
            let _ = write!(
                out,
                "\n## {} {}\n\nCategory: {}\n\n{}\n\nExample:\n\n```text\n{}\n```\n",
                entry.code(),
                entry.name,
                entry.example.category(),
                entry.explanation,
                entry.example
            );
        }
        out
    }
}

/// Builds an object reference for catalogue examples.
pub(crate) fn example_object(source: &str, api_version: &str, kind: &str, name: &str) -> ResourceRef {
    ResourceRef::new(
        source,
        GroupVersionKind::from_api_version(api_version, kind),
        name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = CodeRegistry::new();
        registry
            .register(CodeEntry::new("MissingRepo", "first", KnvError::MissingRepo))
            .unwrap();
        let err = registry
            .register(CodeEntry::new("MissingRepoAgain", "second", KnvError::MissingRepo))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                code: Code::MISSING_REPO,
                first: "MissingRepo",
                second: "MissingRepoAgain",
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_render_markdown() {
        let mut registry = CodeRegistry::new();
        registry
            .register(CodeEntry::new(
                "MissingRepo",
                "The system directory must declare a Repo.",
                KnvError::MissingRepo,
            ))
            .unwrap();
        let markdown = registry.render_markdown();
        assert!(markdown.starts_with("# Error codes\n"));
        assert!(markdown.contains("## KNV1017 MissingRepo"));
        assert!(markdown.contains("```text\nKNV1017: "));
    }
}
