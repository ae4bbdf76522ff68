//! Target resolution: CLI glob arguments to concrete test directories.
//!
//! A bare argument (`foo`, `aws_*`) is rooted under the tests root
//! (`tests/foo`); an argument containing `/` is used as-is. Every top-level
//! directory referenced by a pattern is enumerated and its entries are
//! matched against the patterns. `*` never crosses a `/`. Patterns that
//! climb out of the working directory (`..`, absolute paths) are rejected.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;

use tint_core::error::PlanError;
use tint_core::types::{UnitId, is_contained_path};

/// Resolves target patterns relative to a working directory.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    base_dir: PathBuf,
    tests_root: String,
}

impl TargetResolver {
    /// Create a resolver. `tests_root` is the directory bare names are rooted under.
    pub fn new(base_dir: impl Into<PathBuf>, tests_root: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            tests_root: tests_root.into(),
        }
    }

    /// Normalize CLI arguments into glob patterns.
    ///
    /// No arguments means every test under the tests root.
    pub fn target_globs(&self, args: &[String]) -> Vec<String> {
        if args.is_empty() {
            return vec![format!("{}/*", self.tests_root)];
        }
        args.iter()
            .map(|arg| {
                let pattern = if arg.contains('/') {
                    arg.clone()
                } else {
                    format!("{}/{}", self.tests_root, arg)
                };
                match pattern.strip_suffix('/') {
                    Some(stripped) => stripped.to_owned(),
                    None => pattern,
                }
            })
            .collect()
    }

    /// Top-level directories referenced by the patterns, first occurrence order.
    pub fn target_dirs(globs: &[String]) -> Vec<String> {
        let mut dirs: Vec<String> = Vec::new();
        for glob in globs {
            let top = glob.split('/').next().unwrap_or_default().to_owned();
            if !dirs.contains(&top) {
                dirs.push(top);
            }
        }
        dirs
    }

    /// Every test directory under each top-level directory, as `dir/name`.
    ///
    /// Hidden entries and plain files are not tests. Entries are sorted per
    /// directory so runs are reproducible.
    pub async fn available_tests(&self, dirs: &[String]) -> Result<Vec<String>, PlanError> {
        let mut tests = Vec::new();
        for dir in dirs {
            let path = self.base_dir.join(dir);
            let mut entries = tokio::fs::read_dir(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PlanError::DirectoryNotFound { path: dir.clone() }
                } else {
                    PlanError::ReadDir {
                        path: dir.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

            let mut names = Vec::new();
            loop {
                let entry = entries.next_entry().await.map_err(|e| PlanError::ReadDir {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?;
                let Some(entry) = entry else { break };
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    names.push(name);
                }
            }
            names.sort();
            tests.extend(names.into_iter().map(|name| format!("{dir}/{name}")));
        }
        Ok(tests)
    }

    /// Keep the available tests that match any pattern, in availability order.
    pub fn select(available: &[String], globs: &[String]) -> Result<Vec<String>, PlanError> {
        let set = build_glob_set(globs)?;
        Ok(available
            .iter()
            .filter(|test| set.is_match(Path::new(test.as_str())))
            .cloned()
            .collect())
    }

    /// Full resolution: arguments to selected test identities.
    pub async fn resolve(&self, args: &[String]) -> Result<Vec<UnitId>, PlanError> {
        let globs = self.target_globs(args);
        let escaping = globs
            .iter()
            .find(|g| !is_contained_path(Path::new(g.as_str())));
        if let Some(path) = escaping {
            return Err(PlanError::OutsideWorkspace { path: path.clone() });
        }
        let dirs = Self::target_dirs(&globs);
        let available = self.available_tests(&dirs).await?;
        let selected = Self::select(&available, &globs)?;
        debug!(
            globs = ?globs,
            available = available.len(),
            selected = selected.len(),
            "targets resolved"
        );
        Ok(selected.into_iter().map(UnitId::new).collect())
    }
}

fn build_glob_set(globs: &[String]) -> Result<GlobSet, PlanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| PlanError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| PlanError::InvalidPattern {
        pattern: globs.join(" "),
        reason: e.to_string(),
    })
}
