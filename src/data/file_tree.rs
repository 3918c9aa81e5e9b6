use std::io;
use std::path::{Path, PathBuf};

/// A single child of a directory as seen by a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
}

/// FileTree trait for the filesystem operations the project locator,
/// entry point resolver and artifact writer need.
///
/// Implementations return entries of `list_dir` sorted by name so that every
/// walk over the tree visits children in the same order.
pub trait FileTree {
    /// Lists the immediate children of `dir`.
    ///
    /// # Returns
    /// * `Ok(entries)` - Children sorted by file name
    /// * `Err(e)` - If the directory cannot be read
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<TreeEntry>>;

    /// Returns true when `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns true when `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Reads a UTF-8 text file.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Creates `dir` and every missing parent.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Writes `content` to `path`, replacing any previous content.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Absolute form of `path` with links resolved. Trees without links
    /// return the path unchanged.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}
