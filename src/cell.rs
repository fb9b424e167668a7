//! Cells: the entries of the network's store.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::network::Network;
use crate::time::LogicalTime;

/// Bounds for a value stored in a cell.
///
/// - `Clone` because reads hand out owned copies (wrap large values in `Arc`)
/// - `Debug` so traces can show values
/// - `Send + Sync + 'static` so the network can be shared across threads
pub trait CellValue: Clone + Debug + Send + Sync + 'static {}
impl<T: Clone + Debug + Send + Sync + 'static> CellValue for T {}

/// Object-safe view of a stored value.
pub(crate) trait CellData: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Debug + Send + Sync> CellData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) type Data = Arc<dyn CellData>;

/// Type-erased computation owned by a cell.
pub(crate) type ComputeFn = Arc<dyn Fn(&Network) -> Result<Data> + Send + Sync>;

/// Type-erased equality used for cutoff.
pub(crate) type EqFn = Arc<dyn Fn(&dyn CellData, &dyn CellData) -> bool + Send + Sync>;

/// Index of a cell in the store's arena.
pub(crate) type CellId = usize;

pub(crate) fn erase_compute<T, F>(func: F) -> ComputeFn
where
    T: CellValue,
    F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |net: &Network| func(net).map(|v| Arc::new(v) as Data))
}

pub(crate) fn erase_eq<T, F>(eq: F) -> EqFn
where
    T: CellValue,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Arc::new(move |a: &dyn CellData, b: &dyn CellData| {
        match (a.as_any().downcast_ref::<T>(), b.as_any().downcast_ref::<T>()) {
            (Some(a), Some(b)) => eq(a, b),
            // Values of different types are never equal.
            _ => false,
        }
    })
}

pub(crate) fn partial_eq<T: CellValue + PartialEq>() -> EqFn {
    erase_eq(|a: &T, b: &T| a == b)
}

pub(crate) fn downcast<T: CellValue>(data: &Data) -> Option<T> {
    // Deref first: `Arc<dyn CellData>` is itself a `CellData`.
    (**data).as_any().downcast_ref::<T>().cloned()
}

/// A cached result and the time as of which it is known to be fresh.
pub(crate) struct Status {
    pub value: Data,
    pub value_time: LogicalTime,
}

pub(crate) struct Computation {
    pub func: ComputeFn,
    pub equality: EqFn,
    pub status: Option<Status>,
    /// Time the cached value last actually changed. `None` until first evaluated.
    pub change_time: Option<LogicalTime>,
    /// Cells read during the most recent run, in first-access order.
    pub evidence: Vec<CellId>,
    /// The most recent run returned an error.
    pub failed: bool,
}

pub(crate) enum CellKind {
    Constant {
        value: Data,
        change_time: LogicalTime,
    },
    Computation(Computation),
}

pub(crate) struct Cell {
    pub name: Arc<str>,
    pub is_anchor: bool,
    /// Computations that read this cell during their most recent run.
    pub is_evidence_for: HashSet<CellId>,
    pub kind: CellKind,
}

impl Cell {
    pub fn constant(name: Arc<str>, value: Data, now: LogicalTime) -> Self {
        Self {
            name,
            is_anchor: true,
            is_evidence_for: HashSet::new(),
            kind: CellKind::Constant {
                value,
                change_time: now,
            },
        }
    }

    pub fn computation(name: Arc<str>, is_anchor: bool, func: ComputeFn, equality: EqFn) -> Self {
        Self {
            name,
            is_anchor,
            is_evidence_for: HashSet::new(),
            kind: CellKind::Computation(Computation {
                func,
                equality,
                status: None,
                change_time: None,
                evidence: Vec::new(),
                failed: false,
            }),
        }
    }

    pub fn change_time(&self) -> Option<LogicalTime> {
        match &self.kind {
            CellKind::Constant { change_time, .. } => Some(*change_time),
            CellKind::Computation(c) => c.change_time,
        }
    }

    /// The stored value: a constant's value or a computation's cached result.
    pub fn stored_value(&self) -> Option<&Data> {
        match &self.kind {
            CellKind::Constant { value, .. } => Some(value),
            CellKind::Computation(c) => c.status.as_ref().map(|s| &s.value),
        }
    }

    pub fn evidence(&self) -> &[CellId] {
        match &self.kind {
            CellKind::Constant { .. } => &[],
            CellKind::Computation(c) => &c.evidence,
        }
    }

    pub fn is_retained(&self) -> bool {
        self.is_anchor || !self.is_evidence_for.is_empty()
    }
}
