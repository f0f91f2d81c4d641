use crate::matcher::{EntryKind, PatternMatcher};
use log;
use std::collections::HashMap;

// Verdicts are only valid for the rule set they were computed against.
#[derive(Debug, Default)]
pub struct DecisionCache {
    decisions: HashMap<(String, EntryKind), bool>,
    hits: usize,
    misses: usize,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_exclude(
        &mut self,
        matcher: &PatternMatcher,
        relative_path: &str,
        kind: EntryKind,
    ) -> bool {
        let key = (relative_path.to_string(), kind);
        if let Some(&excluded) = self.decisions.get(&key) {
            self.hits += 1;
            return excluded;
        }
        self.misses += 1;
        let excluded = matcher.matches(relative_path, kind);
        log::trace!(
            "Decision for {:?} {}: {}",
            kind,
            relative_path,
            if excluded { "excluded" } else { "included" }
        );
        self.decisions.insert(key, excluded);
        excluded
    }

    pub fn get(&self, relative_path: &str, kind: EntryKind) -> Option<bool> {
        self.decisions
            .get(&(relative_path.to_string(), kind))
            .copied()
    }

    pub fn clear(&mut self) {
        if !self.decisions.is_empty() {
            log::debug!("Clearing {} cached path decisions", self.decisions.len());
        }
        self.decisions.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;

    #[test]
    fn repeated_queries_return_the_same_verdict() {
        let matcher = PatternMatcher::new(parse_rules("*.log", "test"));
        let mut cache = DecisionCache::new();

        assert!(cache.should_exclude(&matcher, "a.log", EntryKind::File));
        assert!(cache.should_exclude(&matcher, "a.log", EntryKind::File));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(matcher.len(), 1);
    }

    #[test]
    fn kinds_do_not_share_slots() {
        let matcher = PatternMatcher::new(parse_rules("out/", "test"));
        let mut cache = DecisionCache::new();

        assert!(cache.should_exclude(&matcher, "out", EntryKind::Dir));
        assert!(!cache.should_exclude(&matcher, "out", EntryKind::File));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("out", EntryKind::Dir), Some(true));
        assert_eq!(cache.get("out", EntryKind::File), Some(false));
    }

    #[test]
    fn clear_forgets_everything() {
        let matcher = PatternMatcher::default();
        let mut cache = DecisionCache::new();
        cache.should_exclude(&matcher, "x", EntryKind::File);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("x", EntryKind::File), None);
        assert_eq!(cache.stats(), (0, 0));
    }
}
