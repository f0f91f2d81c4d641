use crate::filter::{ExclusionFilter, classify, entry_order};
use crate::matcher::EntryKind;
use log;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE_PREFIX: &str = "│   ";
const SPACE_PREFIX: &str = "    ";

/// Box-drawing listing of the filtered tree. Uses the same filter as the
/// walker, so both views agree for a given rule set.
pub struct TreeRenderer<'a> {
    filter: &'a mut ExclusionFilter,
    errors: usize,
}

struct Listed {
    path: PathBuf,
    name: OsString,
    kind: EntryKind,
}

impl<'a> TreeRenderer<'a> {
    pub fn new(filter: &'a mut ExclusionFilter) -> Self {
        Self { filter, errors: 0 }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn render(&mut self) -> String {
        let root = self.filter.root().to_path_buf();
        self.errors = 0;
        let mut lines = Vec::new();
        self.render_dir(&root, "", &mut lines);
        format!("{}\n{}", root.display(), lines.join("\n"))
    }

    fn render_dir(&mut self, dir: &Path, prefix: &str, lines: &mut Vec<String>) {
        let visible = self.visible_children(dir);
        let count = visible.len();

        for (index, entry) in visible.into_iter().enumerate() {
            let is_last = index + 1 == count;
            let connector = if is_last { LAST_BRANCH } else { BRANCH };
            lines.push(format!(
                "{}{}{}",
                prefix,
                connector,
                entry.name.to_string_lossy()
            ));
            if entry.kind == EntryKind::Dir {
                let extension = if is_last { SPACE_PREFIX } else { PIPE_PREFIX };
                self.render_dir(&entry.path, &format!("{}{}", prefix, extension), lines);
            }
        }
    }

    fn visible_children(&mut self, dir: &Path) -> Vec<Listed> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) => {
                self.errors += 1;
                if e.kind() == ErrorKind::PermissionDenied {
                    log::warn!("Permission denied accessing {}: {}", dir.display(), e);
                } else {
                    log::error!("Error listing {}: {}", dir.display(), e);
                }
                return Vec::new();
            }
        };

        let mut children = Vec::new();
        for entry_result in read {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    self.errors += 1;
                    log::warn!("Error reading entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            match entry.file_type() {
                Ok(file_type) => children.push((entry.path(), entry.file_name(), file_type)),
                Err(e) => {
                    self.errors += 1;
                    log::warn!("Error reading type of {}: {}", entry.path().display(), e);
                }
            }
        }
        children.sort_by(|a, b| entry_order(a.2.is_dir(), &a.1, b.2.is_dir(), &b.1));

        children
            .into_iter()
            .filter_map(|(path, name, file_type)| {
                let kind = classify(&path, file_type)?;
                let excluded = match kind {
                    EntryKind::Dir => self.filter.exclude_dir(&path),
                    EntryKind::File => self.filter.exclude_file(&path),
                };
                (!excluded).then_some(Listed { path, name, kind })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;

    #[test]
    fn connectors_follow_visible_entries_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/nested/deep.rs"), "").unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();
        fs::write(root.join("z.log"), "").unwrap();

        let mut filter = ExclusionFilter::new(&root, 1024);
        filter.load_rules("target", None, parse_rules("*.log", "target"));
        let rendered = TreeRenderer::new(&mut filter).render();

        let expected = format!(
            "{}\n├── src\n│   ├── nested\n│   │   └── deep.rs\n│   └── lib.rs\n└── README.md",
            root.display()
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn empty_root_renders_only_the_header() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let mut filter = ExclusionFilter::new(&root, 1024);
        assert_eq!(
            TreeRenderer::new(&mut filter).render(),
            format!("{}\n", root.display())
        );
    }
}
