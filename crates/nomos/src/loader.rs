//! Reads a policy repository from disk into [`Directory`] records.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::ast::Directory;
use crate::error::{NomosError, Result};
use crate::knv::{CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::{KnownKind, Resource};

/// File extensions that hold manifests.
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Everything read from a repository snapshot.
#[derive(Debug, Clone, Default)]
pub struct LoadedTree {
    /// Directories in depth-first pre-order, each with the objects declared
    /// directly in it.
    pub directories: Vec<Directory>,
    /// Documents that could not be decoded.
    pub errors: Vec<KnvError>,
}

impl LoadedTree {
    pub fn object_count(&self) -> usize {
        self.directories.iter().map(|d| d.objects.len()).sum()
    }
}

/// Loader for a policy repository rooted at a directory.
pub struct ManifestLoader {
    root: PathBuf,
}

impl ManifestLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the repository in sorted depth-first order. Hidden files and
    /// directories are skipped. A document that fails to decode is
    /// reported and the walk continues; I/O failures abort the load.
    pub fn load(&self) -> Result<LoadedTree> {
        if !self.root.is_dir() {
            return Err(NomosError::PolicyDirNotFound(self.root.clone()));
        }

        let mut tree = LoadedTree::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry.map_err(|e| NomosError::ReadDirectory {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: e,
            })?;
            let relative = self.relative_path(entry.path());

            if entry.file_type().is_dir() {
                index.insert(relative.clone(), tree.directories.len());
                tree.directories.push(Directory::new(relative));
                continue;
            }

            let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("");
            if !MANIFEST_EXTENSIONS.contains(&ext) {
                continue;
            }

            let bytes = fs::read(entry.path()).map_err(|e| NomosError::ReadFile {
                path: entry.path().to_path_buf(),
                source: e,
            })?;

            let dir = crate::ast::parent_path(&relative).to_string();
            let Some(&slot) = index.get(&dir) else {
                log::warn!("Skipping {}: parent directory was not walked", relative);
                continue;
            };

            let decoded = String::from_utf8(bytes).map_err(|e| KnvError::ObjectParse {
                path: relative.clone(),
                message: e.to_string(),
            });
            match decoded.and_then(|content| parse_manifests(&content, &relative)) {
                Ok(objects) => tree.directories[slot].objects.extend(objects),
                Err(e) => {
                    log::warn!("Failed to load {}: {}", relative, e);
                    tree.errors.push(e);
                }
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            directories = tree.directories.len(),
            objects = tree.object_count(),
            errors = tree.errors.len(),
            "loaded policy repository"
        );
        Ok(tree)
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Decodes every document in a manifest file. `v1 List` documents are
/// flattened into their items. Empty documents are skipped.
pub fn parse_manifests(content: &str, source: &str) -> std::result::Result<Vec<Resource>, KnvError> {
    let parse_error = |message: String| KnvError::ObjectParse {
        path: source.to_string(),
        message,
    };

    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_json::Value::deserialize(document).map_err(|e| parse_error(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let resource = Resource::from_manifest(value, source).map_err(parse_error)?;
        if resource.is(KnownKind::List) {
            objects.extend(flatten_list(resource, source)?);
        } else {
            objects.push(resource);
        }
    }
    Ok(objects)
}

fn flatten_list(list: Resource, source: &str) -> std::result::Result<Vec<Resource>, KnvError> {
    let items = match list.body.get("items") {
        Some(serde_json::Value::Array(items)) => items.clone(),
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(_) => {
            return Err(KnvError::ObjectParse {
                path: source.to_string(),
                message: "List items must be a sequence".to_string(),
            })
        }
    };
    items
        .into_iter()
        .map(|item| {
            Resource::from_manifest(item, source).map_err(|message| KnvError::ObjectParse {
                path: source.to_string(),
                message,
            })
        })
        .collect()
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> std::result::Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "ObjectParse",
        "A manifest document could not be decoded. Every document needs a string \
         apiVersion and kind, and metadata labels and annotations must map strings \
         to strings. Other files keep loading, so all parse failures are reported \
         together.",
        KnvError::ObjectParse {
            path: "namespaces/bar/broken.yaml".to_string(),
            message: "missing kind".to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const NAMESPACE: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: bar
"#;

    #[test]
    fn test_parse_multi_document() {
        let content = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: a
---
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: b
"#;
        let objects = parse_manifests(content, "namespaces/bar/cm.yaml").unwrap();
        let names: Vec<&str> = objects.iter().map(Resource::name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(objects.iter().all(|o| o.source == "namespaces/bar/cm.yaml"));
    }

    #[test]
    fn test_parse_flattens_list() {
        let content = r#"
apiVersion: v1
kind: List
items:
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: a
- apiVersion: rbac.authorization.k8s.io/v1
  kind: Role
  metadata:
    name: reader
"#;
        let objects = parse_manifests(content, "cluster/list.yaml").unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].gvk.group, "rbac.authorization.k8s.io");
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "bar"}}"#;
        let objects = parse_manifests(content, "namespaces/bar/ns.json").unwrap();
        assert_eq!(objects[0].name(), "bar");
    }

    #[test]
    fn test_parse_error_is_coded() {
        let err = parse_manifests("apiVersion: v1\nmetadata: {}\n", "x.yaml").unwrap_err();
        assert!(matches!(err, KnvError::ObjectParse { ref path, .. } if path == "x.yaml"));

        let err = parse_manifests("key: [unterminated", "y.yaml").unwrap_err();
        assert!(err.to_string().starts_with("KNV1006"));
    }

    #[test]
    fn test_load_walks_in_preorder() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "namespaces/bar/ns.yaml", NAMESPACE);
        write(temp.path(), "namespaces/abstract/.hidden/ns.yaml", NAMESPACE);
        write(temp.path(), "namespaces/abstract/leaf/ns.yaml", NAMESPACE);
        write(temp.path(), "namespaces/bar/.secret.yaml", NAMESPACE);
        write(temp.path(), "namespaces/bar/README.md", "not a manifest");
        write(temp.path(), "system/broken.yaml", "apiVersion: v1\n");

        let loaded = ManifestLoader::new(temp.path()).load().unwrap();
        let paths: Vec<&str> = loaded.directories.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "",
                "namespaces",
                "namespaces/abstract",
                "namespaces/abstract/leaf",
                "namespaces/bar",
                "system"
            ]
        );
        assert_eq!(loaded.object_count(), 2);
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.errors[0].paths(), vec!["system/broken.yaml"]);
    }

    #[test]
    fn test_load_reports_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "namespaces/bar/ns.yaml", NAMESPACE);
        fs::create_dir_all(temp.path().join("system")).unwrap();
        fs::write(temp.path().join("system/bad.yaml"), [0xff, 0xfe, 0x00]).unwrap();

        let loaded = ManifestLoader::new(temp.path()).load().unwrap();
        assert_eq!(loaded.object_count(), 1);
        assert_eq!(loaded.errors.len(), 1);
        assert!(matches!(
            &loaded.errors[0],
            KnvError::ObjectParse { path, .. } if path == "system/bad.yaml"
        ));
    }

    #[test]
    fn test_load_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = ManifestLoader::new(temp.path().join("missing")).load().unwrap_err();
        assert!(matches!(err, NomosError::PolicyDirNotFound(_)));
    }
}
