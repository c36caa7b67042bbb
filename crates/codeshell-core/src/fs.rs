//! File-system boundary used by the project configuration and the CLI.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::language::language_from_path;

#[derive(Debug, Error)]
#[error("Failed to {action} {}: {source}", .path.display())]
pub struct FsError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FsError {
    fn new(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub content: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait FileSystem {
    fn read_file(&self, path: &Path) -> Result<String, FsError>;

    fn save_file(&self, path: &Path, content: &str) -> Result<(), FsError>;

    /// Entries of `path`, directories first, each group sorted by name.
    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, FsError>;

    /// Creates an empty file `name` inside `dir` and returns its path.
    fn create_file(&self, dir: &Path, name: &str) -> Result<PathBuf, FsError>;

    fn create_directory(&self, dir: &Path, name: &str) -> Result<PathBuf, FsError>;

    fn delete_file(&self, path: &Path) -> Result<(), FsError>;

    /// Removes `path` and everything below it.
    fn delete_directory(&self, path: &Path) -> Result<(), FsError>;

    fn exists(&self, path: &Path) -> bool;

    fn open_file(&self, path: &Path) -> Result<FileInfo, FsError> {
        let content = self.read_file(path)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("Unknown")
            .to_string();
        Ok(FileInfo {
            name,
            path: path.to_string_lossy().to_string(),
            content,
            language: language_from_path(path).to_string(),
        })
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        fs::read_to_string(path).map_err(|err| FsError::new("read file", path, err))
    }

    fn save_file(&self, path: &Path, content: &str) -> Result<(), FsError> {
        fs::write(path, content).map_err(|err| FsError::new("write file", path, err))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        let read_dir =
            fs::read_dir(path).map_err(|err| FsError::new("read directory", path, err))?;
        let mut entries: Vec<DirEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let is_dir = entry
                    .file_type()
                    .map(|kind| kind.is_dir())
                    .unwrap_or(false);
                Some(DirEntry { name, is_dir })
            })
            .collect();
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    fn create_file(&self, dir: &Path, name: &str) -> Result<PathBuf, FsError> {
        let full_path = dir.join(name);
        fs::write(&full_path, "").map_err(|err| FsError::new("create file", &full_path, err))?;
        Ok(full_path)
    }

    fn create_directory(&self, dir: &Path, name: &str) -> Result<PathBuf, FsError> {
        let full_path = dir.join(name);
        fs::create_dir(&full_path)
            .map_err(|err| FsError::new("create directory", &full_path, err))?;
        Ok(full_path)
    }

    fn delete_file(&self, path: &Path) -> Result<(), FsError> {
        fs::remove_file(path).map_err(|err| FsError::new("delete file", path, err))
    }

    fn delete_directory(&self, path: &Path) -> Result<(), FsError> {
        fs::remove_dir_all(path).map_err(|err| FsError::new("delete directory", path, err))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn list_directory_flags_directories_without_guessing_from_names() {
        let temp = TempDir::new().expect("tempdir");
        let fs = LocalFileSystem;
        fs.create_directory(temp.path(), "v1.2").expect("dotted dir");
        fs.create_file(temp.path(), "Makefile").expect("dotless file");
        fs.create_file(temp.path(), "a.txt").expect("file");

        let entries = fs.list_directory(temp.path()).expect("list");
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "v1.2".to_string(),
                    is_dir: true
                },
                DirEntry {
                    name: "Makefile".to_string(),
                    is_dir: false
                },
                DirEntry {
                    name: "a.txt".to_string(),
                    is_dir: false
                },
            ]
        );
    }

    #[test]
    fn open_file_detects_language() {
        let temp = TempDir::new().expect("tempdir");
        let fs = LocalFileSystem;
        let path = temp.path().join("main.py");
        fs.save_file(&path, "print('hi')\n").expect("save");

        let info = fs.open_file(&path).expect("open");
        assert_eq!(info.name, "main.py");
        assert_eq!(info.language, "python");
        assert_eq!(info.content, "print('hi')\n");
    }

    #[test]
    fn delete_directory_is_recursive() {
        let temp = TempDir::new().expect("tempdir");
        let fs = LocalFileSystem;
        let dir = fs.create_directory(temp.path(), "nested").expect("dir");
        fs.create_file(&dir, "inner.rs").expect("file");

        fs.delete_directory(&dir).expect("delete");
        assert!(!fs.exists(&dir));
    }

    #[test]
    fn read_missing_file_reports_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let err = LocalFileSystem
            .read_file(&temp.path().join("missing.txt"))
            .expect_err("missing");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing.txt"));
    }
}
