//! Run environment.
//!
//! The process environment is captured once at startup and never modified.
//! Per-test env files and the run-wide resource names are layered on top in a
//! [`RunEnvironment`] that the orchestrator threads through every phase; the
//! layered variables are handed to child processes explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use tracing::debug;

use tint_core::error::ExecutionError;

/// Upper bound (inclusive) of the random suffix in generated resource names.
pub const RESOURCE_SUFFIX_MAX: u32 = 10_000;

/// Run-wide resource names shared by a test and its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub resource_name: String,
    pub resource_name_1: String,
    pub resource_name_2: String,
}

impl ResourceNames {
    /// Three names of the form `<prefix><0..=10000>`.
    pub fn generate(prefix: &str) -> Self {
        let mut rng = rand::thread_rng();
        let mut next = || format!("{prefix}{}", rng.gen_range(0..=RESOURCE_SUFFIX_MAX));
        Self {
            resource_name: next(),
            resource_name_1: next(),
            resource_name_2: next(),
        }
    }

    fn values(&self) -> [(&'static str, &str); 3] {
        [
            ("", self.resource_name.as_str()),
            ("_1", self.resource_name_1.as_str()),
            ("_2", self.resource_name_2.as_str()),
        ]
    }
}

/// Inherited variables plus everything layered on during the run.
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    prefix: String,
    inherited: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
    resource_names: Option<ResourceNames>,
}

impl RunEnvironment {
    /// Environment over an explicit set of inherited variables.
    pub fn new<I>(prefix: impl Into<String>, inherited: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            prefix: prefix.into(),
            inherited: inherited.into_iter().collect(),
            overrides: BTreeMap::new(),
            resource_names: None,
        }
    }

    /// Environment over a snapshot of the current process environment.
    pub fn from_process(prefix: impl Into<String>) -> Self {
        Self::new(prefix, std::env::vars())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inherited
            .get(name)
            .or_else(|| self.overrides.get(name))
            .map(String::as_str)
    }

    /// Layer a dotenv file. Variables that are already set are kept.
    ///
    /// A missing file is not an error. Returns the names that were added.
    pub fn load_env_file(&mut self, path: &Path) -> Result<Vec<String>, ExecutionError> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ExecutionError::EnvFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut added = Vec::new();
        for item in iter {
            let (name, value) = item.map_err(|e| ExecutionError::EnvFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            if self.get(&name).is_none() {
                self.overrides.insert(name.clone(), value);
                added.push(name);
            }
        }
        debug!(path = %path.display(), added = added.len(), "env file loaded");
        Ok(added)
    }

    /// Fix the run-wide resource names on first call.
    ///
    /// Each externally set, non-empty `<prefix>RESOURCE_NAME[_1|_2]` wins
    /// over the generated value. Later calls change nothing.
    pub fn establish_resource_names(&mut self, generated: ResourceNames) -> &ResourceNames {
        let names = match self.resource_names.take() {
            Some(existing) => existing,
            None => ResourceNames {
                resource_name: self.external_name("", generated.resource_name),
                resource_name_1: self.external_name("_1", generated.resource_name_1),
                resource_name_2: self.external_name("_2", generated.resource_name_2),
            },
        };
        self.resource_names.insert(names)
    }

    fn external_name(&self, suffix: &str, fallback: String) -> String {
        self.get(&format!("{}RESOURCE_NAME{suffix}", self.prefix))
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or(fallback)
    }

    pub fn resource_names(&self) -> Option<&ResourceNames> {
        self.resource_names.as_ref()
    }

    /// Variables whose names start with the env prefix, sorted by name.
    pub fn custom_vars(&self) -> Vec<(String, String)> {
        let mut vars: BTreeMap<&String, &String> = BTreeMap::new();
        for (name, value) in self.overrides.iter().chain(self.inherited.iter()) {
            if name.starts_with(&self.prefix) {
                vars.insert(name, value);
            }
        }
        vars.into_iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    /// Variables layered over the inherited environment for child processes.
    pub fn process_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .overrides
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        if let Some(names) = &self.resource_names {
            for (suffix, value) in names.values() {
                vars.push((
                    format!("{}RESOURCE_NAME{suffix}", self.prefix),
                    value.to_owned(),
                ));
            }
        }
        vars
    }

    /// [`process_vars`](Self::process_vars) plus the provisioner input variables.
    pub fn provisioning_vars(&self) -> Vec<(String, String)> {
        let mut vars = self.process_vars();
        if let Some(names) = &self.resource_names {
            for (suffix, value) in names.values() {
                vars.push((format!("TF_VAR_resource_name{suffix}"), value.to_owned()));
            }
        }
        vars
    }
}
