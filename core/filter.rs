use crate::cache::DecisionCache;
use crate::matcher::{EntryKind, PatternMatcher};
use crate::rules::{self, IgnoreRule};
use log;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::{self, FileType};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct IncludeOverrideSet {
    paths: HashSet<PathBuf>,
}

impl IncludeOverrideSet {
    pub fn resolve<I, P>(root: &Path, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths = entries
            .into_iter()
            .map(|entry| {
                let joined = root.join(entry.as_ref());
                joined.canonicalize().unwrap_or_else(|e| {
                    log::debug!(
                        "Include override {} could not be resolved ({}), keeping as given",
                        joined.display(),
                        e
                    );
                    joined
                })
            })
            .collect();
        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        if self.paths.is_empty() {
            return false;
        }
        match path.canonicalize() {
            Ok(resolved) => self.paths.contains(&resolved),
            Err(_) => self.paths.contains(path),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSourceInfo {
    pub label: String,
    pub path: Option<PathBuf>,
    pub rule_count: usize,
}

#[derive(Debug)]
pub struct ExclusionFilter {
    root: PathBuf,
    matcher: PatternMatcher,
    cache: DecisionCache,
    overrides: IncludeOverrideSet,
    artifacts: HashSet<PathBuf>,
    max_file_size: u64,
    sources: Vec<RuleSourceInfo>,
}

impl ExclusionFilter {
    pub fn new(root: &Path, max_file_size_kb: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            matcher: PatternMatcher::default(),
            cache: DecisionCache::new(),
            overrides: IncludeOverrideSet::default(),
            artifacts: HashSet::new(),
            max_file_size: max_file_size_kb.saturating_mul(1024),
            sources: Vec::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: IncludeOverrideSet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_artifacts<I>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.artifacts = artifacts
            .into_iter()
            .map(|p| normalize_artifact_path(&p))
            .collect();
        self
    }

    pub fn load_rules(&mut self, label: &str, path: Option<&Path>, rules: Vec<IgnoreRule>) {
        let rule_count = rules.len();
        self.matcher.extend(PatternMatcher::new(rules));
        self.cache.clear();
        log::debug!(
            "Loaded {} rule source with {} patterns ({} total)",
            label,
            rule_count,
            self.matcher.len()
        );
        self.sources.push(RuleSourceInfo {
            label: label.to_string(),
            path: path.map(Path::to_path_buf),
            rule_count,
        });
    }

    /// Loads an ignore file. A missing or unreadable file contributes no rules.
    pub fn load_rule_file(&mut self, label: &str, path: &Path) {
        let rules = if path.is_file() {
            rules::read_rule_file(path, label).unwrap_or_else(|e| {
                log::error!("Error reading {}: {}", path.display(), e);
                Vec::new()
            })
        } else {
            log::debug!("No {} ignore file at {}", label, path.display());
            Vec::new()
        };
        self.load_rules(label, Some(path), rules);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn overrides(&self) -> &IncludeOverrideSet {
        &self.overrides
    }

    pub fn sources(&self) -> &[RuleSourceInfo] {
        &self.sources
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn relative_key(&self, path: &Path) -> Option<String> {
        relative_key(&self.root, path)
    }

    pub fn exclude_dir(&mut self, path: &Path) -> bool {
        match relative_key(&self.root, path) {
            Some(rel) => {
                let excluded = self.cache.should_exclude(&self.matcher, &rel, EntryKind::Dir);
                if excluded {
                    log::debug!("Excluding directory: {}", rel);
                }
                excluded
            }
            None => {
                log::error!(
                    "Error checking directory exclusion for {}: not under {}",
                    path.display(),
                    self.root.display()
                );
                true
            }
        }
    }

    /// Override membership wins outright; otherwise the size limit and then the
    /// rule verdict apply.
    pub fn exclude_file(&mut self, path: &Path) -> bool {
        if self.overrides.contains(path) {
            log::debug!("Including override: {}", path.display());
            return false;
        }
        if self.artifacts.contains(path) {
            log::debug!("Skipping output artifact: {}", path.display());
            return true;
        }

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::error!("Error checking file exclusion for {}: {}", path.display(), e);
                return true;
            }
        };
        if size > self.max_file_size {
            log::debug!(
                "Excluding {} ({} bytes exceeds limit of {} bytes)",
                path.display(),
                size,
                self.max_file_size
            );
            return true;
        }

        match relative_key(&self.root, path) {
            Some(rel) => self.cache.should_exclude(&self.matcher, &rel, EntryKind::File),
            None => {
                log::error!(
                    "Error checking file exclusion for {}: not under {}",
                    path.display(),
                    self.root.display()
                );
                true
            }
        }
    }
}

pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(path, root)?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Classifies a directory entry. Symbolic links to files count as files;
/// links to directories are not followed.
pub fn classify(path: &Path, file_type: FileType) -> Option<EntryKind> {
    if file_type.is_dir() {
        return Some(EntryKind::Dir);
    }
    if file_type.is_file() {
        return Some(EntryKind::File);
    }
    if file_type.is_symlink() {
        return match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Some(EntryKind::File),
            Ok(meta) if meta.is_dir() => {
                log::debug!("Not following directory symlink: {}", path.display());
                None
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Broken symlink {}: {}", path.display(), e);
                None
            }
        };
    }
    None
}

pub fn entry_order(a_is_dir: bool, a_name: &OsStr, b_is_dir: bool, b_name: &OsStr) -> Ordering {
    b_is_dir.cmp(&a_is_dir).then_with(|| {
        let a_lower = a_name.to_string_lossy().to_lowercase();
        let b_lower = b_name.to_string_lossy().to_lowercase();
        a_lower.cmp(&b_lower).then_with(|| a_name.cmp(b_name))
    })
}

fn normalize_artifact_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;

    #[test]
    fn relative_keys_use_forward_slashes() {
        let root = Path::new("/work/project");
        assert_eq!(
            relative_key(root, &root.join("src").join("lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn loading_a_source_clears_cached_decisions() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("important.log"), "x").unwrap();

        let mut filter = ExclusionFilter::new(&root, 1024);
        filter.load_rules("global", None, parse_rules("*.log", "global"));
        assert!(filter.exclude_file(&root.join("important.log")));
        assert_eq!(filter.cache().len(), 1);

        filter.load_rules("target", None, parse_rules("!important.log", "target"));
        assert!(filter.cache().is_empty());
        assert!(!filter.exclude_file(&root.join("important.log")));
        assert_eq!(filter.sources().len(), 2);
    }

    #[test]
    fn ordering_puts_directories_first_then_ignores_case() {
        let mut names = vec![
            (false, "b.txt"),
            (true, "Zeta"),
            (false, "A.txt"),
            (true, "alpha"),
            (false, "a.txt"),
        ];
        names.sort_by(|a, b| entry_order(a.0, OsStr::new(a.1), b.0, OsStr::new(b.1)));
        let ordered: Vec<_> = names.iter().map(|n| n.1).collect();
        assert_eq!(ordered, vec!["alpha", "Zeta", "A.txt", "a.txt", "b.txt"]);
    }
}
