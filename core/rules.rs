use crate::error::{AppError, Result};
use log;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_IGNORE_FILENAME: &str = ".combineignore";

// Loaded ahead of the global rules, so a later `!` rule can still re-include them.
pub const BUILTIN_IGNORE_PATTERNS: &[&str] = &[".git/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Exclude,
    Include,
}

// `pattern` is the bare glob body; the `!`, leading `/` and trailing `/`
// markers live in the other fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoreRule {
    pub pattern: String,
    pub polarity: Polarity,
    pub dir_only: bool,
    pub anchored: bool,
    pub origin: String,
}

impl IgnoreRule {
    pub fn parse(line: &str, origin: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (polarity, rest) = match line.strip_prefix('!') {
            Some(rest) => (Polarity::Include, rest),
            None => (Polarity::Exclude, line),
        };
        // `\!` and `\#` escape a literal leading character.
        let rest = match rest.strip_prefix('\\') {
            Some(escaped) if escaped.starts_with(['!', '#']) => escaped,
            _ => rest,
        };

        let dir_only = rest.ends_with('/');
        let body = rest.trim_end_matches('/');
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            log::trace!("Skipping empty ignore pattern from {}: {:?}", origin, line);
            return None;
        }

        Some(Self {
            pattern: body.to_string(),
            polarity,
            dir_only,
            anchored,
            origin: origin.to_string(),
        })
    }

    pub fn is_negated(&self) -> bool {
        self.polarity == Polarity::Include
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negated() {
            f.write_str("!")?;
        }
        if self.anchored && !self.pattern.contains('/') {
            f.write_str("/")?;
        }
        f.write_str(&self.pattern)?;
        if self.dir_only {
            f.write_str("/")?;
        }
        Ok(())
    }
}

pub fn parse_rules(content: &str, origin: &str) -> Vec<IgnoreRule> {
    content
        .lines()
        .filter_map(|line| IgnoreRule::parse(line, origin))
        .collect()
}

pub fn builtin_rules() -> Vec<IgnoreRule> {
    BUILTIN_IGNORE_PATTERNS
        .iter()
        .filter_map(|p| IgnoreRule::parse(p, "builtin"))
        .collect()
}

pub fn read_rule_file(path: &Path, origin: &str) -> Result<Vec<IgnoreRule>> {
    let content = fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rules = parse_rules(&content, origin);
    log::debug!(
        "Loaded {} ignore patterns from {}: {:?}",
        origin,
        path.display(),
        rules.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
    Ok(rules)
}

pub fn find_rule_file(start: &Path, filename: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Resolves the global rule source. A value that looks like a path is used
/// as-is (after `~` expansion); a bare filename is searched upward from `start`.
pub fn locate_global_rule_file(start: &Path, setting: &str) -> Option<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(setting).as_ref());
    let looks_like_path = expanded.is_absolute() || expanded.components().count() > 1;

    let found = if looks_like_path {
        let path = if expanded.is_absolute() {
            expanded
        } else {
            start.join(expanded)
        };
        path.is_file().then_some(path)
    } else {
        find_rule_file(start, setting)
    };

    match &found {
        Some(path) => log::info!("Found global ignore file at {}", path.display()),
        None => log::info!(
            "No global ignore file '{}' found from {}",
            setting,
            start.display()
        ),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let rules = parse_rules("\n# comment\n   \n*.log\n  # indented comment\n", "t");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "*.log");
    }

    #[test]
    fn parses_negation_dir_only_and_anchor() {
        let rule = IgnoreRule::parse("!/build/", "t").unwrap();
        assert_eq!(rule.polarity, Polarity::Include);
        assert!(rule.dir_only);
        assert!(rule.anchored);
        assert_eq!(rule.pattern, "build");
        assert_eq!(rule.to_string(), "!/build/");

        let nested = IgnoreRule::parse("docs/*.md", "t").unwrap();
        assert!(nested.anchored);
        assert!(!nested.dir_only);

        let floating = IgnoreRule::parse("target/", "t").unwrap();
        assert!(!floating.anchored);
        assert!(floating.dir_only);
    }

    #[test]
    fn escaped_leading_characters_are_literal() {
        let rule = IgnoreRule::parse("\\!keep.txt", "t").unwrap();
        assert_eq!(rule.polarity, Polarity::Exclude);
        assert_eq!(rule.pattern, "!keep.txt");
    }

    #[test]
    fn bare_slashes_and_bangs_are_dropped() {
        assert!(IgnoreRule::parse("/", "t").is_none());
        assert!(IgnoreRule::parse("!", "t").is_none());
    }

    #[test]
    fn upward_search_finds_nearest_file() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("a").join(DEFAULT_IGNORE_FILENAME), "*.tmp\n").unwrap();

        let found = find_rule_file(&nested, DEFAULT_IGNORE_FILENAME).unwrap();
        assert_eq!(found, tmp.path().join("a").join(DEFAULT_IGNORE_FILENAME));
        assert!(find_rule_file(&nested, "no-such-ignore-file-anywhere").is_none());
    }
}
