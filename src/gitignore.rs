//! Ignore-file matching with directory-scoped rule loading.
//!
//! The traversal engine consumes ignore verdicts through the
//! [`IgnoreMatcher`] trait so hosts can plug in their own rule source. The
//! default [`GitignoreMatcher`] loads gitignore-style files lazily, one scope
//! per visited directory, on top of the `ignore` crate's matcher.
//!
//! Explicit negation (`!`) patterns are tracked separately because they drive
//! two behaviors the plain matcher cannot express: recursing into ignored
//! directories that a negation reaches, and re-admitting negated files whose
//! ancestor directory was structurally pruned.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;

use crate::error::Result;
use crate::node::rel_path_of;

/// One `!`-prefixed line from an ignore file, with the directory scope it was
/// declared in.
#[derive(Debug, Clone)]
pub struct NegationPattern {
    /// Directory containing the ignore file the line came from.
    pub scope: PathBuf,
    /// The line as written, including the leading `!`.
    pub raw: String,
}

impl NegationPattern {
    /// The pattern text without the `!` prefix or a leading slash.
    pub fn pattern(&self) -> &str {
        self.raw
            .trim_start_matches('!')
            .trim_start_matches('/')
    }

    /// True when the pattern names a concrete path (no glob metacharacters),
    /// so it can reference something on disk directly.
    pub fn is_literal(&self) -> bool {
        !self.pattern().contains(['*', '?', '['])
    }

    /// Absolute path the pattern refers to, for literal patterns.
    pub fn target_path(&self) -> Option<PathBuf> {
        if self.is_literal() {
            Some(self.scope.join(self.pattern()))
        } else {
            None
        }
    }
}

/// Verdict source for the traversal engine.
pub trait IgnoreMatcher: Send {
    /// Loads root-level rules. Called once at the start of a scan.
    fn load_root(&mut self, root: &Path, ignore_file_names: &[String]) -> Result<()>;

    /// Loads rules declared in `dir`, if any. Called as traversal descends.
    fn load_for_dir(&mut self, dir: &Path) -> Result<()>;

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool;

    /// All explicit negation patterns loaded so far.
    fn negations(&self) -> &[NegationPattern];
}

/// Whether any explicit negation targets `dir_rel` or a descendant of it.
///
/// Conservative: patterns with no literal directory prefix (bare names,
/// leading wildcards) can apply anywhere, so they reach every directory.
pub fn negation_reaches(negations: &[NegationPattern], root: &Path, dir_rel: &str) -> bool {
    negations.iter().any(|negation| {
        let scope_rel = match rel_path_of(root, &negation.scope) {
            Some(rel) => rel,
            None => return true,
        };
        let literal_prefix = negation
            .pattern()
            .split(['*', '?', '['])
            .next()
            .unwrap_or("")
            .trim_end_matches('/');
        if literal_prefix.contains('/') {
            // Anchored pattern: it reaches dir_rel if the target is the
            // directory itself, lies underneath it, or dir_rel is on the
            // path down to it.
            let target_rel = crate::node::join_rel(&scope_rel, literal_prefix);
            return target_rel == dir_rel
                || target_rel.starts_with(&format!("{dir_rel}/"))
                || dir_rel.starts_with(&format!("{target_rel}/"));
        }
        // Bare names and leading wildcards match at any depth under their
        // scope: they reach the scope, anything inside it, and the path
        // above it.
        scope_rel.is_empty()
            || dir_rel == scope_rel
            || dir_rel.starts_with(&format!("{scope_rel}/"))
            || scope_rel.starts_with(&format!("{dir_rel}/"))
    })
}

/// Gitignore-file backed implementation. Scopes stack: rules loaded for a
/// deeper directory take precedence over shallower ones.
#[derive(Debug, Default)]
pub struct GitignoreMatcher {
    scopes: Vec<(PathBuf, Gitignore)>,
    negations: Vec<NegationPattern>,
    ignore_file_names: Vec<String>,
    loaded_dirs: HashSet<PathBuf>,
}

impl GitignoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn load_ignore_file(&mut self, dir: &Path, file: &Path) {
        let mut builder = GitignoreBuilder::new(dir);
        if let Some(error) = builder.add(file) {
            log::debug!("skipping unparseable ignore file {}: {error}", file.display());
            return;
        }
        match builder.build() {
            Ok(matcher) => self.scopes.push((dir.to_path_buf(), matcher)),
            Err(error) => {
                log::debug!("failed to build ignore rules from {}: {error}", file.display());
                return;
            }
        }
        // Record negation lines verbatim for recurse/re-admission logic.
        if let Ok(text) = fs::read_to_string(file) {
            for line in text.lines() {
                let line = line.trim();
                if line.starts_with('!') && line.len() > 1 {
                    self.negations.push(NegationPattern {
                        scope: dir.to_path_buf(),
                        raw: line.to_string(),
                    });
                }
            }
        }
    }
}

impl IgnoreMatcher for GitignoreMatcher {
    fn load_root(&mut self, root: &Path, ignore_file_names: &[String]) -> Result<()> {
        self.ignore_file_names = ignore_file_names.to_vec();
        self.load_for_dir(root)
    }

    fn load_for_dir(&mut self, dir: &Path) -> Result<()> {
        if !self.loaded_dirs.insert(dir.to_path_buf()) {
            return Ok(());
        }
        let names = self.ignore_file_names.clone();
        for name in &names {
            let file = dir.join(name);
            if file.is_file() {
                self.load_ignore_file(dir, &file);
            }
        }
        Ok(())
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        // Deepest scope wins: walk the stack in reverse and return on the
        // first definitive match.
        for (scope_dir, matcher) in self.scopes.iter().rev() {
            if !path.starts_with(scope_dir) {
                continue;
            }
            match matcher.matched_path_or_any_parents(path, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        false
    }

    fn negations(&self) -> &[NegationPattern] {
        &self.negations
    }
}

/// Matcher that ignores nothing; used when `respect_gitignore` is off.
#[derive(Debug, Default)]
pub struct NoIgnore;

impl IgnoreMatcher for NoIgnore {
    fn load_root(&mut self, _root: &Path, _names: &[String]) -> Result<()> {
        Ok(())
    }

    fn load_for_dir(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn is_ignored(&self, _path: &Path, _is_dir: bool) -> bool {
        false
    }

    fn negations(&self) -> &[NegationPattern] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_gitignore(dir: &Path, contents: &str) {
        let mut file = File::create(dir.join(".gitignore")).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn loaded_matcher(root: &Path) -> GitignoreMatcher {
        let mut matcher = GitignoreMatcher::new();
        matcher
            .load_root(root, &[".gitignore".to_string()])
            .unwrap();
        matcher
    }

    #[test]
    fn root_rules_ignore_matching_files() {
        let temp = TempDir::new().unwrap();
        write_gitignore(temp.path(), "*.log\n");
        let matcher = loaded_matcher(temp.path());

        assert!(matcher.is_ignored(&temp.path().join("debug.log"), false));
        assert!(!matcher.is_ignored(&temp.path().join("main.rs"), false));
    }

    #[test]
    fn negation_lines_are_listed_verbatim() {
        let temp = TempDir::new().unwrap();
        write_gitignore(temp.path(), "build/\n!build/keep.txt\n# comment\n");
        let matcher = loaded_matcher(temp.path());

        let raw: Vec<&str> = matcher.negations().iter().map(|n| n.raw.as_str()).collect();
        assert_eq!(raw, vec!["!build/keep.txt"]);
        assert!(matcher.negations()[0].is_literal());
        assert_eq!(
            matcher.negations()[0].target_path().unwrap(),
            temp.path().join("build/keep.txt")
        );
    }

    #[test]
    fn whitelisted_file_is_not_ignored() {
        let temp = TempDir::new().unwrap();
        write_gitignore(temp.path(), "*.log\n!important.log\n");
        let matcher = loaded_matcher(temp.path());

        assert!(matcher.is_ignored(&temp.path().join("debug.log"), false));
        assert!(!matcher.is_ignored(&temp.path().join("important.log"), false));
    }

    #[test]
    fn deeper_scope_overrides_shallower() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_gitignore(temp.path(), "*.tmp\n");
        write_gitignore(&sub, "!special.tmp\n");

        let mut matcher = loaded_matcher(temp.path());
        matcher.load_for_dir(&sub).unwrap();

        assert!(matcher.is_ignored(&temp.path().join("a.tmp"), false));
        assert!(!matcher.is_ignored(&sub.join("special.tmp"), false));
        assert!(matcher.is_ignored(&sub.join("other.tmp"), false));
    }

    #[test]
    fn load_for_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_gitignore(temp.path(), "!keep.txt\n");
        let mut matcher = loaded_matcher(temp.path());
        matcher.load_for_dir(temp.path()).unwrap();

        assert_eq!(matcher.negations().len(), 1);
    }

    #[test]
    fn negation_reaches_target_directory_and_ancestors() {
        let temp = TempDir::new().unwrap();
        let negations = vec![NegationPattern {
            scope: temp.path().to_path_buf(),
            raw: "!build/nested/keep.txt".to_string(),
        }];

        assert!(negation_reaches(&negations, temp.path(), "build"));
        assert!(negation_reaches(&negations, temp.path(), "build/nested"));
        assert!(!negation_reaches(&negations, temp.path(), "src"));
    }

    #[test]
    fn bare_name_negation_reaches_everywhere_in_scope() {
        let temp = TempDir::new().unwrap();
        let negations = vec![NegationPattern {
            scope: temp.path().to_path_buf(),
            raw: "!keep.txt".to_string(),
        }];
        assert!(negation_reaches(&negations, temp.path(), "any/dir"));
    }
}
