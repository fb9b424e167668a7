//! Dependency edges and reference-counted collection.
//!
//! `evidence` (what a computation read) and `is_evidence_for` (who read a cell)
//! are kept mutual. A cell stays in the store while it is anchored or read by
//! some live computation; once neither holds it is removed, and the removal
//! releases its own evidence in turn.

use std::sync::Arc;

use crate::cell::{CellId, CellKind};
use crate::store::CellStore;

impl CellStore {
    /// Record that `caller` read `dependency`. Returns `true` for a new edge.
    pub fn add_edge(&mut self, caller: CellId, dependency: CellId) -> bool {
        let added = match &mut self.cell_mut(caller).kind {
            CellKind::Computation(c) if !c.evidence.contains(&dependency) => {
                c.evidence.push(dependency);
                true
            }
            _ => false,
        };
        self.cell_mut(dependency).is_evidence_for.insert(caller);
        added
    }

    /// Drop the reverse edge `dependency -> reader` and collect `dependency`
    /// if nothing retains it any more. Returns the names of removed cells.
    pub fn release(&mut self, reader: CellId, dependency: CellId) -> Vec<Arc<str>> {
        self.cell_mut(dependency).is_evidence_for.remove(&reader);
        self.collect(dependency)
    }

    /// Remove `id` if it is neither anchored nor read by anyone, cascading
    /// through its evidence. Returns the names of removed cells.
    ///
    /// Cells on the evaluation stack are left alone; they are reconsidered
    /// when their frame completes.
    pub fn collect(&mut self, id: CellId) -> Vec<Arc<str>> {
        let mut collected = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            // A cell can be queued twice by one cascade.
            let Some(cell) = self.get(id) else { continue };
            if cell.is_retained() || self.is_on_stack(id) {
                continue;
            }
            let mut cell = self.remove(id);
            if let CellKind::Computation(c) = &mut cell.kind {
                for dependency in std::mem::take(&mut c.evidence) {
                    self.cell_mut(dependency).is_evidence_for.remove(&id);
                    pending.push(dependency);
                }
            }
            tracing::trace!(cell = %cell.name, "collected");
            collected.push(cell.name.clone());
            self.graveyard.push(cell);
        }
        collected
    }
}
