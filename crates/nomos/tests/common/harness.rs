//! Test harness for compiling policy repositories written to disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use nomos::knv::Code;
use nomos::{CompileOptions, CompiledPolicies, Compiler, MultiError, NomosError};

/// A policy repository in a temporary directory.
pub struct TestHarness {
    temp_dir: TempDir,
    options: CompileOptions,
}

impl TestHarness {
    /// An empty repository with default compile options.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            options: CompileOptions::default(),
        }
    }

    /// A repository holding a version 1.0.0 Repo, optionally with
    /// inheritance enabled.
    pub fn with_repo(inheritance: bool) -> Self {
        let harness = Self::new();
        harness.write("system/repo.yaml", &super::repo(inheritance));
        harness
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn set_cluster(&mut self, name: &str) {
        self.options.cluster_name = Some(name.to_string());
    }

    /// Writes a manifest, creating parent directories as needed.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, content).expect("Failed to write manifest");
        path
    }

    /// Writes raw bytes, for files that are not valid text.
    pub fn write_bytes(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Creates an empty directory.
    pub fn mkdir(&self, relative: &str) {
        std::fs::create_dir_all(self.root().join(relative)).expect("Failed to create directory");
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.root().join(relative)).expect("Failed to remove file");
    }

    pub fn compile(&self) -> Result<CompiledPolicies, NomosError> {
        Compiler::new(self.options.clone()).compile_dir(self.root())
    }

    /// Compiles and expects success.
    pub fn compile_ok(&self) -> CompiledPolicies {
        match self.compile() {
            Ok(compiled) => compiled,
            Err(e) => panic!("expected the repository to compile:\n{}", e),
        }
    }

    /// Compiles and expects the policy to be rejected.
    pub fn compile_rejected(&self) -> MultiError {
        match self.compile() {
            Err(NomosError::Rejected(errors)) => errors,
            Err(e) => panic!("expected a rejection, got: {}", e),
            Ok(compiled) => panic!("expected a rejection, compiled: {:?}", compiled),
        }
    }

    /// Codes of the rejection, in report order.
    pub fn rejected_codes(&self) -> Vec<Code> {
        self.compile_rejected().codes()
    }
}
