//! Run orchestrator.
//!
//! Drives the executor across the plan: a forward pass in plan order
//! (setup, pretest, test, posttest per unit), then teardown of every unit in
//! reverse plan order. A run-fatal error stops the forward pass; teardown
//! still runs for every unit, including those never reached.

use serde::Serialize;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use tint_core::event::RunEvent;
use tint_core::types::{Phase, UnitId};

use crate::env::{ResourceNames, RunEnvironment};
use crate::executor::{Aborted, PhaseExecutor};
use crate::provisioner::Provisioner;
use crate::query::QueryRunner;
use crate::template::TemplateRenderer;
use crate::unit::TestUnit;

/// Where and why the forward pass stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunAbort {
    pub unit: UnitId,
    pub phase: Phase,
    pub message: String,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunResults {
    /// Every planned unit, in plan order.
    pub units: Vec<TestUnit>,
    pub aborted: Option<RunAbort>,
    /// Units in the order they were torn down.
    pub teardown_order: Vec<UnitId>,
}

impl RunResults {
    pub fn get(&self, id: &UnitId) -> Option<&TestUnit> {
        self.units.iter().find(|u| u.id() == id)
    }
}

/// Runs a whole plan through a [`PhaseExecutor`].
pub struct Orchestrator<P, Q, T> {
    executor: PhaseExecutor<P, Q, T>,
    resource_prefix: String,
    run_id: Uuid,
}

impl<P, Q, T> Orchestrator<P, Q, T>
where
    P: Provisioner,
    Q: QueryRunner,
    T: TemplateRenderer,
{
    pub fn new(executor: PhaseExecutor<P, Q, T>, resource_prefix: impl Into<String>) -> Self {
        Self {
            executor,
            resource_prefix: resource_prefix.into(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn executor(&self) -> &PhaseExecutor<P, Q, T> {
        &self.executor
    }

    /// Execute the plan. Never fails: fatal errors end up in
    /// [`RunResults::aborted`].
    pub async fn run(&self, units: Vec<TestUnit>, env: RunEnvironment) -> RunResults {
        let span = info_span!("run", run_id = %self.run_id);
        self.run_inner(units, env).instrument(span).await
    }

    async fn run_inner(&self, units: Vec<TestUnit>, mut env: RunEnvironment) -> RunResults {
        let ids: Vec<UnitId> = units.iter().map(|u| u.id().clone()).collect();
        info!(units = ids.len(), "run started");
        self.executor
            .emit(RunEvent::PlanResolved { units: ids })
            .await;

        let names = ResourceNames::generate(&self.resource_prefix);
        let mut reached = Vec::with_capacity(units.len());
        let mut pending = units.into_iter();
        let mut aborted = None;

        'forward: for unit in pending.by_ref() {
            let mut unit = match self.executor.run_setup(unit, &mut env, &names).await {
                Ok(unit) => unit,
                Err(abort) => {
                    aborted = Some(self.record_abort(*abort, &mut reached).await);
                    break 'forward;
                }
            };
            for phase in Phase::PROVISIONING {
                match self.executor.run_phase(unit, phase, &env).await {
                    Ok(next) => unit = next,
                    Err(abort) => {
                        aborted = Some(self.record_abort(*abort, &mut reached).await);
                        break 'forward;
                    }
                }
            }
            reached.push(unit);
        }
        reached.extend(pending);

        let mut teardown_order = Vec::with_capacity(reached.len());
        let mut finished = Vec::with_capacity(reached.len());
        for unit in reached.into_iter().rev() {
            teardown_order.push(unit.id().clone());
            finished.push(self.executor.run_teardown(unit, &env).await);
        }
        finished.reverse();

        let failed = finished.iter().filter(|u| u.failed()).count();
        info!(
            units = finished.len(),
            failed,
            aborted = aborted.is_some(),
            "run finished"
        );
        RunResults {
            units: finished,
            aborted,
            teardown_order,
        }
    }

    async fn record_abort(&self, abort: Aborted, reached: &mut Vec<TestUnit>) -> RunAbort {
        let Aborted { unit, phase, error } = abort;
        error!(
            unit = %unit.id(),
            phase = %phase,
            error = %error,
            "stopping run and entering teardown"
        );
        let info = RunAbort {
            unit: unit.id().clone(),
            phase,
            message: error.to_string(),
        };
        self.executor
            .emit(RunEvent::Aborted {
                unit: Some(info.unit.clone()),
                phase: Some(phase),
                message: info.message.clone(),
            })
            .await;
        reached.push(unit);
        info
    }
}
