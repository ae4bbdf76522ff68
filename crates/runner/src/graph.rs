//! Dependency graph: expands declared prerequisites into an execution plan.
//!
//! Each test may list prerequisite tests in `dependencies.txt`
//! (whitespace-separated paths, relative to the test directory). The plan is
//! a depth-first post-order walk over the selected tests: prerequisites are
//! emitted before their dependents and each test appears once, at its first
//! occurrence. A prerequisite that leads back to a test still being expanded
//! is a [`PlanError::CircularPrerequisite`]. Every identity must stay inside
//! the working directory, since its scratch directory is derived from it.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use tint_core::error::PlanError;
use tint_core::types::UnitId;

use crate::unit::TestUnit;

/// File inside a test directory that lists its prerequisites.
pub const DEPENDENCIES_FILE: &str = "dependencies.txt";

/// One entry of the execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedUnit {
    pub id: UnitId,
    /// Direct prerequisites, in declaration order.
    pub prereqs: Vec<UnitId>,
}

/// Ordered, deduplicated test plan for one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    units: Vec<PlannedUnit>,
}

impl ExecutionPlan {
    /// Planned units in execution order.
    pub fn units(&self) -> &[PlannedUnit] {
        &self.units
    }

    /// Identities in execution order.
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Construct fresh test units, scratch directories rooted at `scratch_root`.
    pub fn into_units(self, scratch_root: &Path) -> Vec<TestUnit> {
        self.units
            .into_iter()
            .map(|u| TestUnit::new(u.id, u.prereqs, scratch_root))
            .collect()
    }
}

/// Builds an [`ExecutionPlan`] by reading prerequisite declarations from disk.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    base_dir: PathBuf,
}

struct Frame {
    id: UnitId,
    prereqs: Vec<UnitId>,
    next: usize,
}

impl PlanBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Read the resolved prerequisites of one test.
    ///
    /// A missing or empty `dependencies.txt` means no prerequisites.
    pub async fn prerequisites(&self, test: &UnitId) -> Result<Vec<UnitId>, PlanError> {
        if !test.is_contained() {
            return Err(PlanError::OutsideWorkspace {
                path: test.to_string(),
            });
        }
        let path = self.base_dir.join(test.as_path()).join(DEPENDENCIES_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PlanError::ReadDependencies {
                    path: test.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut prereqs = Vec::new();
        for declared in content.split_whitespace() {
            let resolved = normalize(&test.as_path().join(declared));
            let id = UnitId::new(to_slash(&resolved));
            if !id.is_contained() {
                return Err(PlanError::OutsideWorkspace {
                    path: id.to_string(),
                });
            }
            if !tokio::fs::metadata(self.base_dir.join(&resolved))
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                return Err(PlanError::DirectoryNotFound {
                    path: id.to_string(),
                });
            }
            prereqs.push(id);
        }
        Ok(prereqs)
    }

    /// Expand the selected tests into a plan.
    pub async fn build(&self, selected: &[UnitId]) -> Result<ExecutionPlan, PlanError> {
        let mut cache: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
        let mut done: HashSet<UnitId> = HashSet::new();
        let mut units = Vec::new();

        for target in selected {
            if done.contains(target) {
                continue;
            }

            let mut stack = vec![Frame {
                id: target.clone(),
                prereqs: self.cached_prerequisites(&mut cache, target).await?,
                next: 0,
            }];

            while let Some(frame) = stack.last_mut() {
                if frame.next < frame.prereqs.len() {
                    let prereq = frame.prereqs[frame.next].clone();
                    frame.next += 1;

                    if done.contains(&prereq) {
                        continue;
                    }
                    if let Some(pos) = stack.iter().position(|f| f.id == prereq) {
                        let mut chain: Vec<String> =
                            stack[pos..].iter().map(|f| f.id.to_string()).collect();
                        chain.push(prereq.to_string());
                        return Err(PlanError::CircularPrerequisite { chain });
                    }

                    let prereqs = self.cached_prerequisites(&mut cache, &prereq).await?;
                    stack.push(Frame {
                        id: prereq,
                        prereqs,
                        next: 0,
                    });
                } else if let Some(frame) = stack.pop() {
                    done.insert(frame.id.clone());
                    units.push(PlannedUnit {
                        id: frame.id,
                        prereqs: frame.prereqs,
                    });
                }
            }
        }

        debug!(
            selected = selected.len(),
            planned = units.len(),
            "execution plan built"
        );
        Ok(ExecutionPlan { units })
    }

    async fn cached_prerequisites(
        &self,
        cache: &mut HashMap<UnitId, Vec<UnitId>>,
        id: &UnitId,
    ) -> Result<Vec<UnitId>, PlanError> {
        if let Some(prereqs) = cache.get(id) {
            return Ok(prereqs.clone());
        }
        let prereqs = self.prerequisites(id).await?;
        cache.insert(id.clone(), prereqs.clone());
        Ok(prereqs)
    }
}

/// Lexically resolve `.` and `..` components. Leading `..` are kept.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
