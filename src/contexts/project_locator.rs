use crate::data::FileTree;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Build descriptors that mark a directory as a project root.
pub const DEFAULT_BUILD_DESCRIPTORS: &[&str] = &["pom.xml", "build.gradle", "build.gradle.kts"];

/// Conventional source directory a project root must contain.
pub const DEFAULT_SOURCE_DIR: &str = "src/main/java";

/// Directories never descended into while searching.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git", ".gradle", ".idea", ".vscode", "bin", "build", "dist", "node_modules", "out",
    "target",
];

/// Names starting with this marker are hidden and skipped by every walk.
pub const HIDDEN_MARKER: char = '.';

/// Which directories a walk may enter. Shared by the locator and the entry
/// point resolver so both skip the same trees.
#[derive(Debug, Clone)]
pub struct WalkFilter {
    excluded: HashSet<String>,
}

impl WalkFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Skips hidden directories only. Used inside source trees, where names
    /// like `build` or `target` are ordinary packages.
    pub fn hidden_only() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    pub fn allows(&self, dir_name: &str) -> bool {
        !dir_name.starts_with(HIDDEN_MARKER) && !self.excluded.contains(dir_name)
    }
}

impl Default for WalkFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_DIRS.iter().copied())
    }
}

/// Finds the project root inside a workspace.
///
/// A directory is a root when it holds at least one build descriptor and the
/// source directory. The search is depth-first in name order and the first
/// match wins; there is no ranking between several candidate roots.
#[derive(Debug, Clone)]
pub struct ProjectLocator {
    build_descriptors: Vec<String>,
    source_dir: PathBuf,
    filter: WalkFilter,
}

impl ProjectLocator {
    pub fn new<I, S>(build_descriptors: I, source_dir: impl Into<PathBuf>, filter: WalkFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            build_descriptors: build_descriptors.into_iter().map(Into::into).collect(),
            source_dir: source_dir.into(),
            filter,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn filter(&self) -> &WalkFilter {
        &self.filter
    }

    /// True when `dir` satisfies the project-root predicate.
    pub fn is_project_root(&self, tree: &dyn FileTree, dir: &Path) -> bool {
        let has_descriptor = self
            .build_descriptors
            .iter()
            .any(|name| tree.is_file(&dir.join(name)));
        has_descriptor && tree.is_dir(&dir.join(&self.source_dir))
    }

    /// Returns the first project root found from `start_dir`, or `None`.
    ///
    /// `start_dir` itself is tested even when its name is excluded; only
    /// subdirectories are filtered.
    pub fn locate(&self, tree: &dyn FileTree, start_dir: &Path) -> Option<PathBuf> {
        if self.is_project_root(tree, start_dir) {
            debug!(root = %start_dir.display(), "project root found at start directory");
            return Some(start_dir.to_path_buf());
        }
        self.search_children(tree, start_dir)
    }

    fn search_children(&self, tree: &dyn FileTree, dir: &Path) -> Option<PathBuf> {
        let entries = match tree.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return None;
            }
        };

        for entry in entries {
            if !entry.is_dir || !self.filter.allows(&entry.name) {
                continue;
            }
            if self.is_project_root(tree, &entry.path) {
                debug!(root = %entry.path.display(), "project root found");
                return Some(entry.path);
            }
            if let Some(found) = self.search_children(tree, &entry.path) {
                return Some(found);
            }
        }

        None
    }
}

impl Default for ProjectLocator {
    fn default() -> Self {
        Self::new(
            DEFAULT_BUILD_DESCRIPTORS.iter().copied(),
            DEFAULT_SOURCE_DIR,
            WalkFilter::default(),
        )
    }
}
