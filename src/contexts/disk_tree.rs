use crate::data::{FileTree, TreeEntry};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// DiskTree is the implementation of the FileTree trait backed by the real
/// filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskTree;

impl DiskTree {
    pub fn new() -> Self {
        Self
    }
}

impl FileTree for DiskTree {
    /// Lists a directory, sorted by file name
    ///
    /// Entries whose metadata cannot be read are dropped; names that are not
    /// valid UTF-8 are converted lossily.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            // Links are never descended into; a link back to an ancestor
            // would otherwise make every walk loop.
            entries.push(TreeEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_dir: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        fs::write(path, content)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}
