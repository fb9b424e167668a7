//! Demand-driven evaluation.
//!
//! A pull on a cell returns a value that is fresh as of the current logical
//! time. Constants are always fresh. A computation confirmed at the current
//! time is returned as is. Otherwise its evidence is walked in recorded order;
//! the first dependency whose change time is newer than the cached value
//! forces a rerun, and if none is, the cached value is confirmed without
//! running anything. A rerun whose result compares equal keeps its old change
//! time, so dependents further up do not rerun because of it.

use std::mem;

use crate::cell::{CellId, CellKind, Computation, ComputeFn, Data, Status};
use crate::error::Result;
use crate::network::{Network, State};
use crate::time::LogicalTime;
use crate::tracer::Evaluation;

enum Step {
    Ready(Data),
    Run,
    Revalidate {
        evidence: Vec<CellId>,
        value_time: LogicalTime,
    },
}

fn computation_mut(state: &mut State, id: CellId) -> &mut Computation {
    match &mut state.store.cell_mut(id).kind {
        CellKind::Computation(c) => c,
        CellKind::Constant { .. } => unreachable!("cell {} is a constant", id),
    }
}

impl Network {
    /// Return an up-to-date value for `id`.
    ///
    /// With `record_edge`, the running computation (if any) records `id` as
    /// evidence. Revalidation walks pass `false`: they refresh cells that are
    /// already evidence of the cell being validated.
    pub(crate) fn evaluate(&self, id: CellId, record_edge: bool) -> Result<Data> {
        let _lock = self.lock();
        let step = self.with_state(|st| {
            if record_edge {
                if let Some(caller) = st.store.caller() {
                    if st.store.add_edge(caller, id) {
                        st.tracer.on_dependency_registered(
                            &st.store.cell(caller).name,
                            &st.store.cell(id).name,
                        );
                    }
                }
            }
            plan(st, id)
        });

        match step {
            Step::Ready(data) => Ok(data),
            Step::Run => self.run(id),
            Step::Revalidate {
                evidence,
                value_time,
            } => {
                for dependency in evidence {
                    self.evaluate(dependency, false)?;
                    let newer = self.with_state(|st| {
                        st.store
                            .cell(dependency)
                            .change_time()
                            .map_or(true, |t| t > value_time)
                    });
                    if newer {
                        return self.run(id);
                    }
                }
                let validated = self.with_state(|st| {
                    let now = st.store.now();
                    let status = computation_mut(st, id).status.as_mut()?;
                    status.value_time = now;
                    let value = status.value.clone();
                    st.tracer.on_evaluation(
                        &st.store.cell(id).name,
                        Evaluation::Validated,
                        &value,
                    );
                    Some(value)
                });
                match validated {
                    Some(value) => Ok(value),
                    None => self.run(id),
                }
            }
        }
    }

    /// Run the cell's function, then store the result.
    ///
    /// A failed run keeps the previous value and change time, so that a later
    /// successful run producing the same value is still cut off. The cell is
    /// marked failed: its partial evidence cannot vouch for the kept value, so
    /// the next pull runs it again.
    fn run(&self, id: CellId) -> Result<Data> {
        let (frame, func) = Frame::enter(self, id);
        let result = func(self);
        drop(frame);

        match result {
            Ok(value) => {
                let (value, replaced) = self.with_state(|st| {
                    let now = st.store.now();
                    let c = computation_mut(st, id);
                    c.failed = false;
                    let (evaluation, current, replaced) =
                        if let Some(status) = c.status.as_mut() {
                            status.value_time = now;
                            if (c.equality)(&*status.value, &*value) {
                                (Evaluation::Cutoff, status.value.clone(), Some(value))
                            } else {
                                c.change_time = Some(now);
                                let old = mem::replace(&mut status.value, value.clone());
                                (Evaluation::Changed, value, Some(old))
                            }
                        } else {
                            c.status = Some(Status {
                                value: value.clone(),
                                value_time: now,
                            });
                            c.change_time = Some(now);
                            (Evaluation::Fresh, value, None)
                        };
                    st.tracer
                        .on_evaluation(&st.store.cell(id).name, evaluation, &current);
                    let collected = st.store.collect(id);
                    st.report_collected(&collected);
                    (current, replaced)
                });
                // Values may own handles; drop the discarded one outside the borrow.
                drop(replaced);
                Ok(value)
            }
            Err(err) => {
                self.with_state(|st| {
                    let name = st.store.cell(id).name.clone();
                    tracing::error!(cell = %name, error = %err, "computation failed");
                    computation_mut(st, id).failed = true;
                    st.tracer.on_evaluation_failed(&name, &err.to_string());
                    let collected = st.store.collect(id);
                    st.report_collected(&collected);
                });
                Err(err)
            }
        }
    }
}

fn plan(st: &State, id: CellId) -> Step {
    let now = st.store.now();
    let cell = st.store.cell(id);
    match &cell.kind {
        CellKind::Constant { value, .. } => Step::Ready(value.clone()),
        CellKind::Computation(c) if c.failed => Step::Run,
        CellKind::Computation(c) => match &c.status {
            Some(status) if status.value_time == now => {
                st.tracer
                    .on_evaluation(&cell.name, Evaluation::CacheHit, &status.value);
                Step::Ready(status.value.clone())
            }
            Some(status) => Step::Revalidate {
                evidence: c.evidence.clone(),
                value_time: status.value_time,
            },
            None => Step::Run,
        },
    }
}

/// One entry of the evaluation stack.
///
/// Entering pushes the cell and starts a fresh evidence set; dropping pops it
/// and releases every dependency the run no longer read. Both happen on every
/// exit path, including errors and panics in the user function.
struct Frame<'a> {
    net: &'a Network,
    id: CellId,
    old_evidence: Vec<CellId>,
}

impl<'a> Frame<'a> {
    fn enter(net: &'a Network, id: CellId) -> (Self, ComputeFn) {
        let (old_evidence, func) = net.with_state(|st| {
            st.store.stack.push(id);
            let c = computation_mut(st, id);
            (mem::take(&mut c.evidence), c.func.clone())
        });
        (
            Self {
                net,
                id,
                old_evidence,
            },
            func,
        )
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let guard = self.net.lock();
        let graveyard = {
            let Ok(mut st) = guard.try_borrow_mut() else {
                return;
            };
            let popped = st.store.stack.pop();
            debug_assert_eq!(popped, Some(self.id));
            if std::thread::panicking() {
                computation_mut(&mut st, self.id).failed = true;
            }

            let evidence = st.store.cell(self.id).evidence().to_vec();
            for dependency in mem::take(&mut self.old_evidence) {
                if !evidence.contains(&dependency) {
                    let collected = st.store.release(self.id, dependency);
                    st.report_collected(&collected);
                }
            }
            st.store.take_graveyard()
        };
        drop(graveyard);
    }
}
