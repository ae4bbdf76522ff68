//! Test unit state and phase snapshots.
//!
//! A [`TestUnit`] is never mutated while a phase is running. The executor
//! collects results in a [`PhaseBuilder`], which borrows the unit read-only
//! and exposes the pending state to templating. When the phase ends the
//! builder is turned into a [`PhaseReport`] and applied to the unit, producing
//! the next snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use tint_core::types::{Phase, StepKey, StepResult, UnitId};

/// Scratch subdirectory holding rendered provisioner configuration.
pub const PROVISION_DIR: &str = "provision";

/// Results recorded for one phase of one unit, keyed by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PhaseRecord {
    steps: BTreeMap<StepKey, StepResult>,
}

impl PhaseRecord {
    pub fn get(&self, key: &StepKey) -> Option<&StepResult> {
        self.steps.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepKey, &StepResult)> {
        self.steps.iter()
    }

    fn insert(&mut self, key: StepKey, result: StepResult) {
        self.steps.insert(key, result);
    }

    fn extend(&mut self, other: PhaseRecord) {
        self.steps.extend(other.steps);
    }
}

/// One test's accumulated state across the run.
///
/// Serializes in camelCase with one key per recorded phase, which is also the
/// shape templates see.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUnit {
    dir: UnitId,
    tmp_dir: PathBuf,
    prereqs: Vec<UnitId>,
    failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_name: Option<Value>,
    output: Map<String, Value>,
    #[serde(flatten)]
    phases: BTreeMap<Phase, PhaseRecord>,
}

impl TestUnit {
    /// Fresh unit with its scratch directory under `scratch_root`.
    pub fn new(dir: UnitId, prereqs: Vec<UnitId>, scratch_root: &Path) -> Self {
        let tmp_dir = scratch_root.join(dir.as_path());
        Self {
            dir,
            tmp_dir,
            prereqs,
            failed: false,
            resource_id: None,
            resource_name: None,
            output: Map::new(),
            phases: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Whether the scratch directory lies inside the scratch root.
    ///
    /// False for identities with `..` or root components, whose joined path
    /// points somewhere the unit does not own.
    pub fn owns_scratch_dir(&self) -> bool {
        self.dir.is_contained()
    }

    pub fn prereqs(&self) -> &[UnitId] {
        &self.prereqs
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn resource_id(&self) -> Option<&Value> {
        self.resource_id.as_ref()
    }

    pub fn resource_name(&self) -> Option<&Value> {
        self.resource_name.as_ref()
    }

    pub fn output(&self) -> &Map<String, Value> {
        &self.output
    }

    /// Results of a phase, if the phase ran.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.get(&phase)
    }

    /// Scratch directory for a phase's rendered provisioner configuration.
    pub fn phase_dir(&self, phase: Phase) -> PathBuf {
        self.tmp_dir.join(PROVISION_DIR).join(phase.as_str())
    }

    /// Apply a finished phase, producing the next snapshot.
    ///
    /// `failed` only ever moves from `false` to `true`.
    pub fn apply(mut self, report: PhaseReport) -> Self {
        self.phases
            .entry(report.phase)
            .or_default()
            .extend(report.record);
        self.output = report.output;
        if report.resource_id.is_some() {
            self.resource_id = report.resource_id;
        }
        if report.resource_name.is_some() {
            self.resource_name = report.resource_name;
        }
        self.failed |= report.failed;
        self
    }

    /// Snapshot with the failure flag set.
    pub fn into_failed(mut self) -> Self {
        self.failed = true;
        self
    }
}

/// Collects the results of one phase against a read-only unit.
#[derive(Debug)]
pub struct PhaseBuilder<'a> {
    unit: &'a TestUnit,
    phase: Phase,
    record: PhaseRecord,
    output: Map<String, Value>,
    resource_id: Option<Value>,
    resource_name: Option<Value>,
    failed: bool,
}

impl<'a> PhaseBuilder<'a> {
    pub fn new(unit: &'a TestUnit, phase: Phase) -> Self {
        Self {
            unit,
            phase,
            record: PhaseRecord::default(),
            output: unit.output.clone(),
            resource_id: None,
            resource_name: None,
            failed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn unit(&self) -> &TestUnit {
        self.unit
    }

    /// Record a step result for this phase.
    pub fn record(&mut self, key: StepKey, result: StepResult) {
        self.record.insert(key, result);
    }

    /// Result recorded so far in this phase.
    pub fn step(&self, key: &StepKey) -> Option<&StepResult> {
        self.record.get(key)
    }

    /// Deep-merge a value into the pending output.
    ///
    /// Objects merge key by key, arrays index by index. A top-level array is
    /// merged under its index keys. Scalars at the top level are ignored.
    pub fn merge_output(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, v) in map {
                    merge_into(self.output.entry(key.clone()).or_insert(Value::Null), v);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    merge_into(self.output.entry(i.to_string()).or_insert(Value::Null), v);
                }
            }
            _ => {}
        }
    }

    /// Lift the well-known identifiers onto the unit.
    pub fn set_resource(&mut self, id: Value, name: Value) {
        self.resource_id = Some(id);
        self.resource_name = Some(name);
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Whether the unit will be failed once this phase is applied.
    pub fn failed(&self) -> bool {
        self.unit.failed || self.failed
    }

    /// Template context: the unit as it would look after this phase so far.
    pub fn context(&self) -> Value {
        let mut preview = self.unit.clone();
        preview.phases.insert(self.phase, self.record.clone());
        preview.output = self.output.clone();
        if let Some(id) = &self.resource_id {
            preview.resource_id = Some(id.clone());
        }
        if let Some(name) = &self.resource_name {
            preview.resource_name = Some(name.clone());
        }
        preview.failed = self.failed();
        // every map key in TestUnit is a string, so this cannot fail
        serde_json::to_value(&preview).unwrap_or(Value::Null)
    }

    pub fn finish(self) -> PhaseReport {
        PhaseReport {
            phase: self.phase,
            record: self.record,
            output: self.output,
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            failed: self.failed,
        }
    }
}

/// Outcome of one phase, ready to be applied to its unit.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    phase: Phase,
    record: PhaseRecord,
    output: Map<String, Value>,
    resource_id: Option<Value>,
    resource_name: Option<Value>,
    failed: bool,
}

impl PhaseReport {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn failed(&self) -> bool {
        self.failed
    }
}

fn merge_into(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, v) in src {
                merge_into(dst.entry(key.clone()).or_insert(Value::Null), v);
            }
        }
        (Value::Array(dst), Value::Array(src)) => {
            for (i, v) in src.iter().enumerate() {
                match dst.get_mut(i) {
                    Some(slot) => merge_into(slot, v),
                    None => dst.push(v.clone()),
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}
