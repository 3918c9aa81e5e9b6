use crate::data::{DescriptorError, FileDescriptor, FileTree};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Problem statement written at the project root on each generation.
pub const PROBLEM_FILE: &str = "PROBLEM.md";

/// Directory under the project root holding the untouched copy of the main
/// files, used as the review baseline.
pub const STARTER_DIR: &str = "starter";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("No project files to write")]
    EmptyBatch,

    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// The path that failed, for I/O errors.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriteError::CreateDir { path, .. } | WriteError::Write { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Materializes generated files under a project root.
///
/// Each file is written on its own; a failure stops the batch but leaves the
/// files written before it in place.
pub struct ArtifactWriter<'a> {
    tree: &'a dyn FileTree,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(tree: &'a dyn FileTree) -> Self {
        Self { tree }
    }

    /// Writes main files, then test files, then the optional problem statement.
    ///
    /// # Returns
    /// * `Ok(manifest)` - Every path written, in write order
    /// * `Err(WriteError::EmptyBatch)` - `main_files` is empty; nothing was touched
    /// * `Err(WriteError::InvalidDescriptor)` - A path is empty or escapes `root`; nothing was touched
    /// * `Err(..)` - The first I/O failure, naming the path
    pub fn write(
        &self,
        root: &Path,
        main_files: &[FileDescriptor],
        test_files: &[FileDescriptor],
        problem_description: Option<&str>,
    ) -> Result<Vec<PathBuf>, WriteError> {
        if main_files.is_empty() {
            return Err(WriteError::EmptyBatch);
        }
        for descriptor in main_files.iter().chain(test_files) {
            descriptor.validate()?;
        }

        let mut manifest = Vec::with_capacity(main_files.len() + test_files.len() + 1);
        for descriptor in main_files.iter().chain(test_files) {
            let target = root.join(descriptor.relative_path());
            self.write_file(&target, &descriptor.content)?;
            manifest.push(target);
        }

        if let Some(problem) = problem_description {
            let target = root.join(PROBLEM_FILE);
            self.write_file(&target, problem)?;
            manifest.push(target);
        }

        info!(root = %root.display(), files = manifest.len(), "materialized exercise");
        Ok(manifest)
    }

    /// Copies `main_files` under `root/starter/`, mirroring their paths.
    pub fn snapshot_starter(
        &self,
        root: &Path,
        main_files: &[FileDescriptor],
    ) -> Result<Vec<PathBuf>, WriteError> {
        for descriptor in main_files {
            descriptor.validate()?;
        }

        let starter_root = root.join(STARTER_DIR);
        let mut written = Vec::with_capacity(main_files.len());
        for descriptor in main_files {
            let target = starter_root.join(descriptor.relative_path());
            self.write_file(&target, &descriptor.content)?;
            written.push(target);
        }
        Ok(written)
    }

    /// Writes a single scratch file, e.g. an extracted reference solution.
    pub fn write_scratch(
        &self,
        dir: &Path,
        file_name: &str,
        content: &str,
    ) -> Result<PathBuf, WriteError> {
        let target = dir.join(file_name);
        self.write_file(&target, content)?;
        Ok(target)
    }

    fn write_file(&self, target: &Path, content: &str) -> Result<(), WriteError> {
        if let Some(parent) = target.parent() {
            self.tree
                .create_dir_all(parent)
                .map_err(|source| WriteError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        self.tree
            .write(target, content)
            .map_err(|source| WriteError::Write {
                path: target.to_path_buf(),
                source,
            })?;
        debug!(path = %target.display(), "wrote file");
        Ok(())
    }
}
