//! Pure include/exclude filtering decisions.
//!
//! A [`PathFilter`] is compiled once per scan from the effective pattern
//! lists and then consulted per entry. Malformed glob patterns are dropped at
//! compile time and simply never match; a bad pattern must degrade the
//! filter, not fail the scan.
//!
//! Files and directories are treated asymmetrically on purpose: ignore-file
//! negations re-admit individual files but are declared at arbitrary
//! directory scope, so an ignored directory must still be recursed whenever a
//! negation could target something inside it (conservative recurse: extra
//! I/O beats wrongly dropping negated files).

use globset::{Glob, GlobSet, GlobSetBuilder};

/// The ignore-matcher's verdict for one entry, computed by the caller.
#[derive(Debug, Clone, Copy)]
pub struct IgnoreVerdict {
    pub ignored: bool,
    /// For directories: whether any explicit negation pattern targets this
    /// directory or a descendant of it.
    pub negation_reaches: bool,
}

impl IgnoreVerdict {
    pub fn clean() -> Self {
        Self {
            ignored: false,
            negation_reaches: false,
        }
    }
}

/// Why an entry was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// Kept: matched an include pattern (overrides excludes).
    Included,
    /// Kept: no rule dropped it.
    Default,
    /// Kept despite being ignored: a negation reaches into this directory.
    NegationRecurse,
    /// Dropped: include patterns are active and none matched.
    NotIncluded,
    ExcludedByPattern,
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterDecision {
    pub keep: bool,
    pub reason: FilterReason,
}

impl FilterDecision {
    fn keep(reason: FilterReason) -> Self {
        Self { keep: true, reason }
    }

    fn drop(reason: FilterReason) -> Self {
        Self { keep: false, reason }
    }
}

/// Compiled include/exclude sets for one scan.
#[derive(Debug)]
pub struct PathFilter {
    include: GlobSet,
    exclude: GlobSet,
    has_includes: bool,
}

impl PathFilter {
    /// Compiles the pattern lists, skipping any pattern that fails to parse.
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Self {
        let include = compile_set(include_patterns);
        Self {
            include,
            exclude: compile_set(exclude_patterns),
            has_includes: !include_patterns.is_empty(),
        }
    }

    /// Decides whether one entry is retained.
    ///
    /// Files: with include patterns active, a file must match an include and
    /// not be ignored; the include match overrides excludes but never the
    /// ignore verdict. Without includes, a file survives unless excluded or
    /// ignored.
    ///
    /// Directories: pruned only by an explicit exclude match; an ignored
    /// directory is still recursed when a negation reaches it.
    pub fn decide(&self, rel_path: &str, is_dir: bool, verdict: IgnoreVerdict) -> FilterDecision {
        if is_dir {
            if self.exclude.is_match(rel_path) {
                return FilterDecision::drop(FilterReason::ExcludedByPattern);
            }
            if verdict.ignored {
                return if verdict.negation_reaches {
                    FilterDecision::keep(FilterReason::NegationRecurse)
                } else {
                    FilterDecision::drop(FilterReason::Ignored)
                };
            }
            return FilterDecision::keep(FilterReason::Default);
        }

        if self.has_includes {
            if !self.include.is_match(rel_path) {
                return FilterDecision::drop(FilterReason::NotIncluded);
            }
            if verdict.ignored {
                return FilterDecision::drop(FilterReason::Ignored);
            }
            return FilterDecision::keep(FilterReason::Included);
        }

        if self.exclude.is_match(rel_path) {
            return FilterDecision::drop(FilterReason::ExcludedByPattern);
        }
        if verdict.ignored {
            return FilterDecision::drop(FilterReason::Ignored);
        }
        FilterDecision::keep(FilterReason::Default)
    }
}

fn compile_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(error) => {
                log::debug!("dropping malformed glob pattern {pattern:?}: {error}");
            }
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> PathFilter {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        PathFilter::new(&include, &exclude)
    }

    #[test]
    fn include_match_overrides_exclude() {
        let filter = filter(&["**/*.txt"], &["docs/**"]);
        let decision = filter.decide("docs/a.txt", false, IgnoreVerdict::clean());
        assert!(decision.keep);
        assert_eq!(decision.reason, FilterReason::Included);
    }

    #[test]
    fn include_never_overrides_ignore() {
        let filter = filter(&["**/*.txt"], &[]);
        let verdict = IgnoreVerdict {
            ignored: true,
            negation_reaches: false,
        };
        let decision = filter.decide("a.txt", false, verdict);
        assert!(!decision.keep);
        assert_eq!(decision.reason, FilterReason::Ignored);
    }

    #[test]
    fn non_matching_file_dropped_when_includes_active() {
        let filter = filter(&["**/*.txt"], &[]);
        let decision = filter.decide("a.md", false, IgnoreVerdict::clean());
        assert!(!decision.keep);
        assert_eq!(decision.reason, FilterReason::NotIncluded);
    }

    #[test]
    fn empty_includes_keep_unless_excluded_or_ignored() {
        let filter = filter(&[], &["**/*.log"]);
        assert!(filter.decide("a.txt", false, IgnoreVerdict::clean()).keep);
        assert!(!filter.decide("a.log", false, IgnoreVerdict::clean()).keep);
    }

    #[test]
    fn directory_pruned_only_by_exclude() {
        let filter = filter(&["**/*.txt"], &["target/**", "target"]);
        // Include patterns never prune directories.
        assert!(filter.decide("src", true, IgnoreVerdict::clean()).keep);
        assert!(!filter.decide("target", true, IgnoreVerdict::clean()).keep);
    }

    #[test]
    fn ignored_directory_recursed_when_negation_reaches() {
        let filter = filter(&[], &[]);
        let verdict = IgnoreVerdict {
            ignored: true,
            negation_reaches: true,
        };
        let decision = filter.decide("build", true, verdict);
        assert!(decision.keep);
        assert_eq!(decision.reason, FilterReason::NegationRecurse);

        let no_negation = IgnoreVerdict {
            ignored: true,
            negation_reaches: false,
        };
        assert!(!filter.decide("build", true, no_negation).keep);
    }

    #[test]
    fn malformed_pattern_never_matches() {
        let filter = filter(&[], &["[invalid"]);
        assert!(filter.decide("[invalid", false, IgnoreVerdict::clean()).keep);
        assert!(filter.decide("anything", false, IgnoreVerdict::clean()).keep);
    }

    #[test]
    fn include_matches_root_level_files() {
        let filter = filter(&["**/*.md"], &[]);
        assert!(filter.decide("README.md", false, IgnoreVerdict::clean()).keep);
        assert!(filter.decide("docs/guide.md", false, IgnoreVerdict::clean()).keep);
    }
}
