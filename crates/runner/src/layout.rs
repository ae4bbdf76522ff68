//! On-disk test layout.
//!
//! A test directory holds provisioner configuration, queries and their
//! companions for each phase:
//!
//! ```text
//! tests/foo/
//!   dependencies.txt              prerequisites
//!   .env.staging                  per-test environment
//!   main.tf  variables.tf         test phase configuration
//!   pretest-main.tf               pretest phase configuration
//!   query.sql                     test phase default query
//!   variables.json  expected.json
//!   posttest-tags-query.sql       posttest query named "tags"
//!   posttest-tags-expected.json
//! ```

use std::path::{Path, PathBuf};

use tint_core::error::ExecutionError;
use tint_core::types::{Phase, UnitId};

const DEFAULT_QUERY: &str = "query.sql";
const QUERY_SUFFIX: &str = "-query.sql";

/// Query files for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Empty for the test phase default query.
    pub name: String,
    pub phase: Phase,
    pub query: PathBuf,
    pub variables: PathBuf,
    pub expected: PathBuf,
}

/// Locates the files of a test relative to the working directory.
#[derive(Debug, Clone)]
pub struct TestLayout {
    base_dir: PathBuf,
    extensions: Vec<String>,
    env_file: String,
}

impl TestLayout {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        extensions: Vec<String>,
        env_file: impl Into<String>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            extensions,
            env_file: env_file.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn test_dir(&self, id: &UnitId) -> PathBuf {
        self.base_dir.join(id.as_path())
    }

    pub fn env_file_path(&self, id: &UnitId) -> PathBuf {
        self.test_dir(id).join(&self.env_file)
    }

    /// Provisioner configuration files for a phase, sorted by name.
    ///
    /// The test phase takes every recognized file not prefixed by another
    /// phase; other phases take files prefixed `<phase>-`.
    pub async fn config_files(
        &self,
        id: &UnitId,
        phase: Phase,
    ) -> Result<Vec<PathBuf>, ExecutionError> {
        let dir = self.test_dir(id);
        let names = file_names(&dir).await?;
        Ok(names
            .into_iter()
            .filter(|name| self.has_extension(name) && belongs_to(name, phase))
            .map(|name| dir.join(name))
            .collect())
    }

    /// Query files for a phase, sorted by file name.
    pub async fn queries(
        &self,
        id: &UnitId,
        phase: Phase,
    ) -> Result<Vec<QuerySpec>, ExecutionError> {
        let dir = self.test_dir(id);
        let names = file_names(&dir).await?;
        let prefix = phase.file_prefix();

        Ok(names
            .into_iter()
            .filter_map(|file| {
                if phase == Phase::Test && file == DEFAULT_QUERY {
                    return Some(QuerySpec {
                        name: String::new(),
                        phase,
                        query: dir.join(DEFAULT_QUERY),
                        variables: dir.join("variables.json"),
                        expected: dir.join("expected.json"),
                    });
                }
                let name = file.strip_prefix(&prefix)?.strip_suffix(QUERY_SUFFIX)?;
                if name.is_empty() {
                    return None;
                }
                Some(QuerySpec {
                    name: name.to_owned(),
                    phase,
                    query: dir.join(&file),
                    variables: dir.join(format!("{prefix}{name}-variables.json")),
                    expected: dir.join(format!("{prefix}{name}-expected.json")),
                })
            })
            .collect())
    }

    fn has_extension(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

fn belongs_to(name: &str, phase: Phase) -> bool {
    match phase {
        Phase::Test => !Phase::ALL
            .iter()
            .filter(|p| **p != Phase::Test)
            .any(|p| name.starts_with(&p.file_prefix())),
        other => name.starts_with(&other.file_prefix()),
    }
}

/// Sorted names of the regular files in `dir`.
async fn file_names(dir: &Path) -> Result<Vec<String>, ExecutionError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExecutionError::io(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExecutionError::io(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
