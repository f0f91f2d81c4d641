use crate::error::Result;
use crate::rules::{IgnoreRule, Polarity};
use globset::{GlobBuilder, GlobMatcher};
use log;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: IgnoreRule,
    exact: GlobMatcher,
    nested: GlobMatcher,
}

impl CompiledRule {
    fn compile(rule: IgnoreRule) -> Result<Self> {
        let base = if rule.anchored {
            rule.pattern.clone()
        } else {
            format!("**/{}", rule.pattern)
        };
        let exact = build_matcher(&base)?;
        let nested = build_matcher(&format!("{}/**", base))?;
        Ok(Self {
            rule,
            exact,
            nested,
        })
    }

    // A directory-only rule binds to directories themselves and, like every
    // rule, to anything underneath a matching directory.
    fn hits(&self, relative_path: &str, kind: EntryKind) -> bool {
        let exact_hit = (!self.rule.dir_only || kind == EntryKind::Dir)
            && self.exact.is_match(relative_path);
        exact_hit || self.nested.is_match(relative_path)
    }
}

fn build_matcher(glob: &str) -> Result<GlobMatcher> {
    let compiled = GlobBuilder::new(glob).literal_separator(true).build()?;
    Ok(compiled.compile_matcher())
}

#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<CompiledRule>,
}

impl PatternMatcher {
    pub fn new(rules: impl IntoIterator<Item = IgnoreRule>) -> Self {
        let compiled = rules
            .into_iter()
            .filter_map(|rule| {
                let display = rule.to_string();
                match CompiledRule::compile(rule) {
                    Ok(compiled) => {
                        log::trace!("Compiled ignore pattern: {}", display);
                        Some(compiled)
                    }
                    Err(e) => {
                        log::debug!("Skipping malformed ignore pattern \"{}\": {}", display, e);
                        None
                    }
                }
            })
            .collect();
        Self { rules: compiled }
    }

    /// Appends `later` after the current rules, so its rules take precedence.
    pub fn extend(&mut self, later: PatternMatcher) {
        self.rules.extend(later.rules);
    }

    pub fn combine(global: PatternMatcher, target: PatternMatcher) -> Self {
        let mut combined = global;
        combined.extend(target);
        combined
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> impl Iterator<Item = &IgnoreRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn deciding_rule(&self, relative_path: &str, kind: EntryKind) -> Option<&IgnoreRule> {
        let path = relative_path.trim_matches('/');
        self.rules
            .iter()
            .rev()
            .find(|c| c.hits(path, kind))
            .map(|c| &c.rule)
    }

    pub fn matches(&self, relative_path: &str, kind: EntryKind) -> bool {
        self.deciding_rule(relative_path, kind)
            .is_some_and(|rule| rule.polarity == Polarity::Exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;

    fn matcher(lines: &str) -> PatternMatcher {
        PatternMatcher::new(parse_rules(lines, "test"))
    }

    #[test]
    fn empty_matcher_passes_everything() {
        let m = PatternMatcher::default();
        assert!(m.is_empty());
        assert!(!m.matches("src/main.rs", EntryKind::File));
        assert!(!m.matches("src", EntryKind::Dir));
    }

    #[test]
    fn unanchored_patterns_match_at_any_depth() {
        let m = matcher("*.log");
        assert!(m.matches("app.log", EntryKind::File));
        assert!(m.matches("deep/nested/app.log", EntryKind::File));
        assert!(!m.matches("app.log.txt", EntryKind::File));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let m = matcher("/src/*.rs");
        assert!(m.matches("src/lib.rs", EntryKind::File));
        assert!(!m.matches("src/nested/lib.rs", EntryKind::File));
        assert!(!m.matches("other/src/lib.rs", EntryKind::File));
    }

    #[test]
    fn double_star_spans_directories() {
        let m = matcher("docs/**/*.md");
        assert!(m.matches("docs/a/b/readme.md", EntryKind::File));
        assert!(m.matches("docs/readme.md", EntryKind::File));
        assert!(!m.matches("src/readme.md", EntryKind::File));
    }

    #[test]
    fn directory_only_rules_skip_plain_files() {
        let m = matcher("build/");
        assert!(m.matches("build", EntryKind::Dir));
        assert!(m.matches("pkg/build", EntryKind::Dir));
        assert!(!m.matches("build", EntryKind::File));
        assert!(m.matches("build/out.bin", EntryKind::File));
    }

    #[test]
    fn last_matching_rule_wins() {
        let m = matcher("*.log\n!important.log");
        assert!(m.matches("other.log", EntryKind::File));
        assert!(!m.matches("important.log", EntryKind::File));

        let reversed = matcher("!important.log\n*.log");
        assert!(reversed.matches("important.log", EntryKind::File));
    }

    #[test]
    fn combine_appends_target_after_global() {
        let global = matcher("*.log");
        let target = matcher("!important.log");
        let combined = PatternMatcher::combine(global, target);
        assert_eq!(combined.len(), 2);
        assert!(!combined.matches("important.log", EntryKind::File));
        assert!(combined.matches("other.log", EntryKind::File));
        let origins: Vec<_> = combined.rules().map(|r| r.pattern.as_str()).collect();
        assert_eq!(origins, vec!["*.log", "important.log"]);
    }

    #[test]
    fn malformed_patterns_are_skipped() {
        let m = matcher("[unclosed\n*.tmp");
        assert_eq!(m.len(), 1);
        assert!(m.matches("x.tmp", EntryKind::File));
    }
}
