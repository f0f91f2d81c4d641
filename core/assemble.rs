use crate::error::{AppError, Result};
use crate::reader::FileResult;
use byte_unit::{Byte, UnitType};
use log;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub files: usize,
    pub errored: usize,
    pub combined_bytes: u64,
    pub tree_bytes: u64,
}

impl AssemblyReport {
    pub fn combined_size_readable(&self) -> String {
        human_size(self.combined_bytes)
    }
}

pub fn human_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

#[derive(Debug, Clone)]
pub struct Assembler {
    combined_path: PathBuf,
    tree_path: PathBuf,
}

impl Assembler {
    pub fn new(combined_path: &Path, tree_path: &Path) -> Self {
        Self {
            combined_path: combined_path.to_path_buf(),
            tree_path: tree_path.to_path_buf(),
        }
    }

    pub fn combined_path(&self) -> &Path {
        &self.combined_path
    }

    pub fn tree_path(&self) -> &Path {
        &self.tree_path
    }

    pub fn clear_stale(&self) -> Result<()> {
        for path in [&self.combined_path, &self.tree_path] {
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Removed stale output {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    log::error!("Error removing existing output file {}: {}", path.display(), e);
                    return Err(AppError::OutputRemoval {
                        path: path.clone(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn assemble(&self, results: Vec<FileResult>, tree_text: &str) -> Result<AssemblyReport> {
        let files = results.len();
        let errored = results.iter().filter(|r| r.is_error()).count();
        let combined = combine(results, tree_text);

        log::info!("Writing combined output to {}", self.combined_path.display());
        let combined_bytes = write_artifact(&self.combined_path, &combined)?;
        log::info!("Writing tree structure to {}", self.tree_path.display());
        let tree_bytes = write_artifact(&self.tree_path, tree_text)?;

        Ok(AssemblyReport {
            files,
            errored,
            combined_bytes,
            tree_bytes,
        })
    }
}

pub fn combine(mut results: Vec<FileResult>, tree_text: &str) -> String {
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    let body_len: usize = results.iter().map(|r| r.block.len()).sum();
    let mut combined = String::with_capacity(tree_text.len() + 2 + body_len);
    combined.push_str(tree_text);
    combined.push_str("\n\n");
    for result in &results {
        combined.push_str(&result.block);
    }
    combined
}

/// Writes through a temporary sibling file that replaces `path` only once
/// fully written.
pub fn write_artifact(path: &Path, content: &str) -> Result<u64> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| AppError::DirCreation {
        path: parent.clone(),
        source: e,
    })?;

    let write_err = |source: std::io::Error| AppError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut staged = NamedTempFile::new_in(&parent).map_err(write_err)?;
    staged.write_all(content.as_bytes()).map_err(write_err)?;
    staged.flush().map_err(write_err)?;
    staged.persist(path).map_err(|e| write_err(e.error))?;
    Ok(content.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rel: &str, body: &str) -> FileResult {
        FileResult {
            path: PathBuf::from(rel),
            relative_path: rel.to_string(),
            block: format!("[{}:{}]", rel, body),
            error: None,
        }
    }

    #[test]
    fn combine_sorts_by_relative_path_and_prepends_tree() {
        let results = vec![result("src/b.rs", "2"), result("README.md", "0"), result("src/a.rs", "1")];
        let combined = combine(results, "root\n├── x");
        assert_eq!(
            combined,
            "root\n├── x\n\n[README.md:0][src/a.rs:1][src/b.rs:2]"
        );
    }

    #[test]
    fn clear_stale_ignores_missing_files_and_removes_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let combined = tmp.path().join("combined.txt");
        let tree = tmp.path().join("tree.txt");
        fs::write(&combined, "old").unwrap();

        let assembler = Assembler::new(&combined, &tree);
        assembler.clear_stale().unwrap();
        assert!(!combined.exists());
    }

    #[test]
    fn clear_stale_fails_when_output_is_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let combined = tmp.path().join("combined.txt");
        fs::create_dir(&combined).unwrap();

        let assembler = Assembler::new(&combined, &tmp.path().join("tree.txt"));
        let err = assembler.clear_stale().unwrap_err();
        assert!(err.is_fatal_output());
    }

    #[test]
    fn write_artifact_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested/out/combined.txt");
        let written = write_artifact(&target, "hello").unwrap();
        assert_eq!(written, 5);
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }
}
