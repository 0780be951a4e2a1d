// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface used by pipeline steps and the execution log.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::write(path, contents).with_context(|| format!("writing to file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}

/// Recursively collect files below `dir` whose extension equals `extension`.
///
/// A missing `dir` yields an empty list.
pub fn collect_files_with_extension(
    fs: &dyn FileSystem,
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !fs.is_dir(dir) {
        return Ok(found);
    }

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs.read_dir(&current)? {
            if fs.is_dir(&entry) {
                stack.push(entry);
            } else if entry.extension().and_then(|e| e.to_str()) == Some(extension) {
                found.push(entry);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Copy a file or a whole directory tree from `from` to `to`.
pub fn copy_recursive(fs: &dyn FileSystem, from: &Path, to: &Path) -> Result<()> {
    if fs.is_dir(from) {
        fs.create_dir_all(to)?;
        for entry in fs.read_dir(from)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            copy_recursive(fs, &entry, &to.join(name))?;
        }
        Ok(())
    } else {
        fs.copy_file(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockFileSystem;
    use super::*;

    #[test]
    fn collects_nested_files_by_extension() {
        let fs = MockFileSystem::new();
        fs.add_file("./book/part_i/ch1.mdx", "one");
        fs.add_file("./book/part_ii/ch2.mdx", "two");
        fs.add_file("./book/part_ii/notes.txt", "skip");

        let files = collect_files_with_extension(&fs, Path::new("./book"), "mdx").unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("./book/part_i/ch1.mdx"),
                PathBuf::from("./book/part_ii/ch2.mdx"),
            ]
        );
    }

    #[test]
    fn missing_dir_collects_nothing() {
        let fs = MockFileSystem::new();
        let files = collect_files_with_extension(&fs, Path::new("./nope"), "mdx").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn copies_directory_trees() {
        let fs = MockFileSystem::new();
        fs.add_file("./src_dir/a/one.md", "1");
        fs.add_file("./src_dir/two.md", "2");

        copy_recursive(&fs, Path::new("./src_dir"), Path::new("./dst")).unwrap();

        assert_eq!(fs.read_to_string(Path::new("./dst/a/one.md")).unwrap(), "1");
        assert_eq!(fs.read_to_string(Path::new("./dst/two.md")).unwrap(), "2");
    }
}
