//! Pass/fail summary of a finished run.

use serde::Serialize;

use tint_core::types::UnitId;

use crate::orchestrator::{RunAbort, RunResults};

/// Largest exit code a process can report without wrapping.
const MAX_EXIT_CODE: usize = 255;

/// Counts and failing identities of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    /// Failing units, in plan order.
    pub failing: Vec<UnitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<RunAbort>,
}

impl Summary {
    /// A unit passes when it is not marked failed.
    pub fn from_results(results: &RunResults) -> Self {
        let failing: Vec<UnitId> = results
            .units
            .iter()
            .filter(|u| u.failed())
            .map(|u| u.id().clone())
            .collect();
        Self {
            total: results.units.len(),
            passed: results.units.len() - failing.len(),
            failing,
            aborted: results.aborted.clone(),
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn none_passed(&self) -> bool {
        self.passed == 0
    }

    /// Number of non-passing units, capped so a large count never wraps to 0.
    pub fn exit_code(&self) -> i32 {
        // capped at 255, fits in i32
        self.failed().min(MAX_EXIT_CODE) as i32
    }
}
