//! Corpus file discovery (§4.1 step 1): walk `corpus_root`, applying
//! gitignore rules, built-in ignore patterns, and user-configured patterns,
//! keeping only files whose extension is in `Config.extensions`.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Directories that are always excluded from discovery.
pub const BUILTIN_IGNORE_PATTERNS: &[&str] = &[
    "!.claude/",
    "!.cursor/",
    "!.vscode/",
    "!.idea/",
    "!.git/",
    "!node_modules/",
    "!.obsidian/",
    "!__pycache__/",
    "!.next/",
    "!.nuxt/",
    "!.svelte-kit/",
    "!target/",
    "!dist/",
    "!build/",
    "!out/",
];

/// Discovers corpus files under `corpus_root`, applying gitignore rules,
/// built-in ignore patterns, and user-configured ignore patterns.
#[derive(Debug)]
pub struct FileDiscovery {
    corpus_root: PathBuf,
    extensions: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl FileDiscovery {
    /// Create a new `FileDiscovery` from the loaded config.
    pub fn new(config: &Config) -> Self {
        Self {
            corpus_root: config.corpus_root.clone(),
            extensions: config.extensions.clone(),
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }

    /// Discover all matching files under `corpus_root`.
    ///
    /// Returns a sorted `Vec<PathBuf>` of paths relative to `corpus_root`.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut results = Vec::new();

        if !self.corpus_root.is_dir() {
            debug!("corpus root does not exist: {}", self.corpus_root.display());
            return Ok(results);
        }

        let overrides = self.build_overrides(&self.corpus_root)?;

        let walker = WalkBuilder::new(&self.corpus_root)
            .standard_filters(true)
            .overrides(overrides)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let msg = e.to_string();
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other(msg)),
                )
            })?;

            let path = entry.path();
            if !path.is_file() || !self.has_matching_extension(path) {
                continue;
            }

            let relative = path.strip_prefix(&self.corpus_root).map_err(|_| {
                Error::Io(std::io::Error::other(format!(
                    "path {} is not under corpus root {}",
                    path.display(),
                    self.corpus_root.display()
                )))
            })?;

            results.push(relative.to_path_buf());
        }

        results.sort();
        results.dedup();
        Ok(results)
    }

    fn has_matching_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Build override rules combining built-in patterns and user-configured patterns.
    fn build_overrides(&self, dir: &Path) -> Result<ignore::overrides::Override> {
        let mut builder = OverrideBuilder::new(dir);

        for pattern in BUILTIN_IGNORE_PATTERNS {
            builder.add(pattern).map_err(|e| {
                Error::Config(format!("invalid built-in ignore pattern '{pattern}': {e}"))
            })?;
        }

        for pattern in &self.ignore_patterns {
            let negated = if pattern.starts_with('!') {
                pattern.clone()
            } else {
                format!("!{pattern}")
            };
            builder
                .add(&negated)
                .map_err(|e| Error::Config(format!("invalid ignore pattern '{pattern}': {e}")))?;
        }

        builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build override rules: {e}")))
    }
}
