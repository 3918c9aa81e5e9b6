use super::project_locator::WalkFilter;
use crate::data::FileTree;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Annotation that marks the application's bootstrap class.
pub const DEFAULT_ENTRY_MARKER: &str = "@SpringBootApplication";

/// Only files with this suffix are opened while looking for the marker.
pub const DEFAULT_SOURCE_SUFFIX: &str = ".java";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Could not find an entry point ({marker}) under {}", root.display())]
    NoEntryFile { root: PathBuf, marker: String },

    #[error("Could not extract a package declaration from {}", file.display())]
    NoNamespace { file: PathBuf },

    #[error("Failed to read entry file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The bootstrap file of a project and the package it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub file: PathBuf,
    pub namespace: String,
}

impl EntryPoint {
    /// The namespace as a relative directory, e.g. `com.x` -> `com/x`.
    pub fn namespace_path(&self) -> PathBuf {
        self.namespace.split('.').collect()
    }
}

#[derive(Debug, Clone)]
pub struct EntryPointResolver {
    marker: String,
    suffix: String,
    filter: WalkFilter,
}

impl EntryPointResolver {
    pub fn new(marker: impl Into<String>, suffix: impl Into<String>, filter: WalkFilter) -> Self {
        Self {
            marker: marker.into(),
            suffix: suffix.into(),
            filter,
        }
    }

    /// Finds the first source file under `source_root` containing the marker.
    ///
    /// Same traversal as the project locator: name order, depth-first,
    /// directories rejected by the filter skipped, unreadable entries ignored.
    pub fn find_entry_file(&self, tree: &dyn FileTree, source_root: &Path) -> Option<PathBuf> {
        let entries = match tree.list_dir(source_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %source_root.display(), error = %e, "skipping unreadable directory");
                return None;
            }
        };

        for entry in entries {
            if entry.is_dir {
                if !self.filter.allows(&entry.name) {
                    continue;
                }
                if let Some(found) = self.find_entry_file(tree, &entry.path) {
                    return Some(found);
                }
            } else if entry.name.ends_with(&self.suffix) {
                match tree.read_to_string(&entry.path) {
                    Ok(content) if content.contains(&self.marker) => {
                        debug!(file = %entry.path.display(), "entry point found");
                        return Some(entry.path);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(file = %entry.path.display(), error = %e, "skipping unreadable file");
                    }
                }
            }
        }

        None
    }

    /// Reads `file` and returns its package declaration, if any.
    pub fn extract_namespace(
        &self,
        tree: &dyn FileTree,
        file: &Path,
    ) -> Result<Option<String>, ResolveError> {
        let content = tree.read_to_string(file).map_err(|source| ResolveError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        Ok(namespace_declaration(&content))
    }

    /// Finds the entry file under `source_root` and its namespace. Either
    /// missing piece is an error.
    pub fn resolve(
        &self,
        tree: &dyn FileTree,
        source_root: &Path,
    ) -> Result<EntryPoint, ResolveError> {
        let file = self
            .find_entry_file(tree, source_root)
            .ok_or_else(|| ResolveError::NoEntryFile {
                root: source_root.to_path_buf(),
                marker: self.marker.clone(),
            })?;
        let namespace = self
            .extract_namespace(tree, &file)?
            .ok_or_else(|| ResolveError::NoNamespace { file: file.clone() })?;
        Ok(EntryPoint { file, namespace })
    }
}

impl Default for EntryPointResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_MARKER, DEFAULT_SOURCE_SUFFIX, WalkFilter::hidden_only())
    }
}

fn package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"package\s+([A-Za-z0-9_.]+)\s*;").expect("valid regex"))
}

fn public_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"public\s+class\s+([A-Za-z0-9_]+)").expect("valid regex"))
}

/// First `package a.b.c;` declaration in `source`.
pub fn namespace_declaration(source: &str) -> Option<String> {
    package_re()
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Name of the first `public class` in `source`.
pub fn public_class_name(source: &str) -> Option<String> {
    public_class_re()
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
