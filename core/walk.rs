use crate::filter::{ExclusionFilter, classify, entry_order};
use crate::matcher::EntryKind;
use log;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub relative_path: String,
}

pub struct TreeWalker<'a> {
    filter: &'a mut ExclusionFilter,
    errors: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new(filter: &'a mut ExclusionFilter) -> Self {
        Self { filter, errors: 0 }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn collect(&mut self) -> Vec<CandidateFile> {
        let root = self.filter.root().to_path_buf();
        log::info!("Walking directory: {}", root.display());
        self.errors = 0;

        let mut candidates = Vec::new();
        let mut entries = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by(compare_entries)
            .into_iter();

        while let Some(entry_result) = entries.next() {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    self.errors += 1;
                    let location = e
                        .path()
                        .map_or_else(|| "unknown path".into(), |p| p.display().to_string());
                    match e.io_error().map(|io| io.kind()) {
                        Some(ErrorKind::PermissionDenied) => {
                            log::warn!("Permission denied accessing {}: {}", location, e)
                        }
                        _ => log::error!("Error traversing {}: {}", location, e),
                    }
                    continue;
                }
            };

            match classify(entry.path(), entry.file_type()) {
                Some(EntryKind::Dir) => {
                    if self.filter.exclude_dir(entry.path()) {
                        entries.skip_current_dir();
                    }
                }
                Some(EntryKind::File) => {
                    if self.filter.exclude_file(entry.path()) {
                        continue;
                    }
                    match self.filter.relative_key(entry.path()) {
                        Some(relative_path) => {
                            log::trace!("Candidate: {}", relative_path);
                            candidates.push(CandidateFile {
                                path: entry.path().to_path_buf(),
                                relative_path,
                            });
                        }
                        None => log::warn!(
                            "Could not get relative path for: {}",
                            entry.path().display()
                        ),
                    }
                }
                None => log::trace!("Skipping special entry: {}", entry.path().display()),
            }
        }

        log::info!("Total files to process: {}", candidates.len());
        candidates
    }
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> std::cmp::Ordering {
    entry_order(
        a.file_type().is_dir(),
        a.file_name(),
        b.file_type().is_dir(),
        b.file_name(),
    )
}
