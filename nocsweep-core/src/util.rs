//! Contains a collection of useful utility functions.

use std::ffi::OsStr;
use std::fs::{read_dir, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::Result;

pub fn read_text_file(file_path: &Path) -> std::io::Result<String> {
    debug!("{:?}", file_path);
    let mut fd = File::open(&file_path)?;
    let mut content = String::new();
    fd.read_to_string(&mut content)?;

    Ok(content)
}

/// Get paths to files with any of the given extensions in the provided
/// directory. Non-recursive; a missing directory yields no paths.
pub fn find_files_with_extension(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if dir.is_dir() {
        let dir_entry = match read_dir(&dir) {
            Ok(d) => d,
            _ => {
                error!("couldn't read directory at path: {}", dir.to_string_lossy());
                return Vec::new();
            }
        };
        for entry in dir_entry {
            let path = match entry {
                Ok(p) => p.path(),
                _ => continue,
            };
            if path.is_file() {
                let ext = path
                    .extension()
                    .unwrap_or(OsStr::new(""))
                    .to_str()
                    .unwrap_or("");
                if extensions.contains(&ext) {
                    paths.push(path);
                }
            }
        }
    };
    paths
}

/// Removes all files with any of the given extensions from the provided
/// directory. Returns the number of files removed. Idempotent: a directory
/// with no matching files (or no directory at all) is not an error.
pub fn remove_files_with_extension(dir: &Path, extensions: &[&str]) -> Result<usize> {
    let mut removed = 0;
    for path in find_files_with_extension(dir, extensions) {
        std::fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}
