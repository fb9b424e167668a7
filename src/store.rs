//! Arena of cells, the logical clock, and the evaluation stack.

use std::collections::HashMap;
use std::sync::Arc;

use slab::Slab;

use crate::cell::{Cell, CellId};
use crate::time::LogicalTime;

/// Owns every cell of a network.
///
/// Cells live in a slab and refer to each other by slot index, so the
/// bidirectional dependency edges never own anything. Names map to slots; a
/// name is bound to at most one live cell.
pub(crate) struct CellStore {
    cells: Slab<Cell>,
    names: HashMap<Arc<str>, CellId>,
    now: LogicalTime,
    next_id: u64,
    /// Computations currently running, innermost last.
    pub stack: Vec<CellId>,
    /// Set while a `sample` is being evaluated.
    pub sampling: bool,
    /// Cells removed by collection, dropped once the state is released.
    pub graveyard: Vec<Cell>,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore {
    pub fn new() -> Self {
        Self {
            cells: Slab::new(),
            names: HashMap::new(),
            now: LogicalTime::ZERO,
            next_id: 0,
            stack: Vec::new(),
            sampling: false,
            graveyard: Vec::new(),
        }
    }

    pub fn now(&self) -> LogicalTime {
        self.now
    }

    /// Advance the clock by one tick and return the new time.
    pub fn tick(&mut self) -> LogicalTime {
        self.now = self.now.next();
        self.now
    }

    /// Next value of the id generator used for synthetic names.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a cell, binding its name.
    ///
    /// Panics if the name is already bound; callers look names up first.
    pub fn insert(&mut self, cell: Cell) -> CellId {
        let name = cell.name.clone();
        assert!(
            !self.names.contains_key(&name),
            "cell name `{}` is already bound",
            name
        );
        let id = self.cells.insert(cell);
        self.names.insert(name, id);
        id
    }

    /// Remove a cell and unbind its name.
    pub fn remove(&mut self, id: CellId) -> Cell {
        let cell = self.cells.remove(id);
        self.names.remove(&cell.name);
        cell
    }

    pub fn lookup(&self, name: &str) -> Option<CellId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    pub fn take_graveyard(&mut self) -> Vec<Cell> {
        std::mem::take(&mut self.graveyard)
    }

    /// The computation whose function is currently running, if any.
    pub fn caller(&self) -> Option<CellId> {
        self.stack.last().copied()
    }

    pub fn is_on_stack(&self, id: CellId) -> bool {
        self.stack.contains(&id)
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<CellId> {
        self.cells.iter().map(|(id, _)| id).collect()
    }
}
