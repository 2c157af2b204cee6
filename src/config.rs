//! Configuration contract for scans and the tree controller.
//!
//! Loading and merging config files is the host's concern; this crate only
//! defines the deserializable shape and its defaults.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Limits, patterns, and tuning knobs for one workspace.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    /// Single-file size ceiling in bytes; larger files are skipped outright.
    pub max_file_size: u64,
    /// Hard cap on the number of files admitted into the tree.
    pub max_files: usize,
    /// Soft ceiling on the summed size of admitted files.
    pub max_total_size_bytes: u64,
    /// Entries deeper than this are skipped; depth equal to it is still scanned.
    pub max_directory_depth: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub respect_gitignore: bool,
    /// Named pattern bundles merged into include/exclude when selected.
    pub filter_presets: BTreeMap<String, FilterPreset>,
    /// Preset name to apply for this scan, if any.
    pub active_preset: Option<String>,
    /// Group name -> globs; matching files are re-homed under a top-level
    /// virtual group node.
    pub virtual_folders: BTreeMap<String, Vec<String>>,
    /// Page size for shallow listing of very wide directories.
    pub directory_page_size: usize,
    /// Backlog size beyond which one full rescan beats draining hydrations.
    pub max_pending_hydrations: usize,
    pub pending_hydration_batch_size: usize,
    pub pending_hydration_batch_delay_ms: u64,
    /// Debounce window for coalescing change events per directory.
    pub debounce_ms: u64,
    /// Interactive threshold escalation (prompt) vs silent one-shot override.
    pub prompts_on_thresholds: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            max_files: 1000,
            max_total_size_bytes: 100 * 1024 * 1024,
            max_directory_depth: 20,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            respect_gitignore: true,
            filter_presets: BTreeMap::new(),
            active_preset: None,
            virtual_folders: BTreeMap::new(),
            directory_page_size: 200,
            max_pending_hydrations: 200,
            pending_hydration_batch_size: 25,
            pending_hydration_batch_delay_ms: 25,
            debounce_ms: 250,
            prompts_on_thresholds: false,
        }
    }
}

/// A named include/exclude bundle selectable by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterPreset {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ScanConfig {
    /// Include/exclude sets with the active preset merged in. Negative
    /// (`!`-prefixed) patterns are stripped from the exclude set here; they
    /// belong to ignore-file negation handling, not glob exclusion.
    pub fn effective_patterns(&self) -> (Vec<String>, Vec<String>) {
        let mut include = self.include_patterns.clone();
        let mut exclude = self.exclude_patterns.clone();
        if let Some(preset) = self
            .active_preset
            .as_ref()
            .and_then(|name| self.filter_presets.get(name))
        {
            include.extend(preset.include.iter().cloned());
            exclude.extend(preset.exclude.iter().cloned());
        }
        exclude.retain(|pattern| !pattern.starts_with('!'));
        (include, exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = ScanConfig::default();
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.max_files, 1000);
        assert_eq!(config.max_total_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_directory_depth, 20);
        assert_eq!(config.directory_page_size, 200);
        assert_eq!(config.max_pending_hydrations, 200);
        assert_eq!(config.pending_hydration_batch_size, 25);
        assert_eq!(config.pending_hydration_batch_delay_ms, 25);
        assert!(config.respect_gitignore);
        assert!(!config.prompts_on_thresholds);
    }

    #[test]
    fn preset_merges_into_effective_patterns() {
        let mut config = ScanConfig::default();
        config.include_patterns = vec!["**/*.rs".into()];
        config.filter_presets.insert(
            "docs".into(),
            FilterPreset {
                include: vec!["**/*.md".into()],
                exclude: vec!["**/drafts/**".into()],
            },
        );
        config.active_preset = Some("docs".into());

        let (include, exclude) = config.effective_patterns();
        assert_eq!(include, vec!["**/*.rs".to_string(), "**/*.md".to_string()]);
        assert_eq!(exclude, vec!["**/drafts/**".to_string()]);
    }

    #[test]
    fn negative_patterns_stripped_from_exclude() {
        let mut config = ScanConfig::default();
        config.exclude_patterns = vec!["**/target/**".into(), "!keep.txt".into()];
        let (_, exclude) = config.effective_patterns();
        assert_eq!(exclude, vec!["**/target/**".to_string()]);
    }
}
