//! Tracer trait for observing network evaluation.
//!
//! This module defines the [`Tracer`] trait and the tracers shipped with the
//! crate. The default [`NoopTracer`] costs nothing; [`LogTracer`] forwards to
//! the `tracing` crate and backs [`Network::set_debug`](crate::Network::set_debug);
//! [`RecordingTracer`] keeps events in memory for assertions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cell_network::{Network, RecordingTracer, Evaluation, TraceEvent};
//!
//! let tracer = Arc::new(RecordingTracer::new());
//! let net = Network::builder().tracer(tracer.clone()).build();
//!
//! let a = net.input(2);
//! let doubled = net.output({
//!     let a = a.clone();
//!     move |_| Ok(a.get()? * 2)
//! });
//! assert_eq!(doubled.get().unwrap(), 4);
//! assert!(tracer.events().iter().any(|e| matches!(
//!     e,
//!     TraceEvent::Evaluated { evaluation: Evaluation::Fresh, .. }
//! )));
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::time::LogicalTime;

/// How a computation cell produced the value it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Evaluation {
    /// Already confirmed at the current time; nothing was checked.
    CacheHit,
    /// First run of the function.
    Fresh,
    /// Dependencies were walked and none had changed; the function did not run.
    Validated,
    /// The function reran and produced a different value.
    Changed,
    /// The function reran but the value compared equal, so dependents are not
    /// considered changed.
    Cutoff,
}

/// Tracer trait for observing network evaluation.
///
/// All methods have default empty implementations, so you only need to
/// override the events you're interested in.
///
/// Tracers are invoked while the network is locked; they must not call back
/// into the network.
pub trait Tracer: Send + Sync + 'static {
    /// Called when a computation cell returns a value.
    #[inline]
    fn on_evaluation(&self, _cell: &str, _evaluation: Evaluation, _value: &dyn Debug) {}

    /// Called when a computation cell's function failed.
    #[inline]
    fn on_evaluation_failed(&self, _cell: &str, _message: &str) {}

    /// Called when a running computation reads a cell for the first time in this run.
    #[inline]
    fn on_dependency_registered(&self, _parent: &str, _dependency: &str) {}

    /// Called when a cell is removed from the store.
    #[inline]
    fn on_collected(&self, _cell: &str) {}

    /// Called after an input write advanced the clock.
    #[inline]
    fn on_tick(&self, _time: LogicalTime) {}
}

impl<T: Tracer> Tracer for Arc<T> {
    fn on_evaluation(&self, cell: &str, evaluation: Evaluation, value: &dyn Debug) {
        (**self).on_evaluation(cell, evaluation, value)
    }

    fn on_evaluation_failed(&self, cell: &str, message: &str) {
        (**self).on_evaluation_failed(cell, message)
    }

    fn on_dependency_registered(&self, parent: &str, dependency: &str) {
        (**self).on_dependency_registered(parent, dependency)
    }

    fn on_collected(&self, cell: &str) {
        (**self).on_collected(cell)
    }

    fn on_tick(&self, time: LogicalTime) {
        (**self).on_tick(time)
    }
}

/// Zero-cost tracer that discards all events.
///
/// This is the default tracer of a [`Network`](crate::Network).
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that forwards every event to the `tracing` crate at debug level.
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_evaluation(&self, cell: &str, evaluation: Evaluation, value: &dyn Debug) {
        tracing::debug!(cell, ?evaluation, value = ?value, "evaluated");
    }

    fn on_evaluation_failed(&self, cell: &str, message: &str) {
        tracing::debug!(cell, message, "evaluation failed");
    }

    fn on_dependency_registered(&self, parent: &str, dependency: &str) {
        tracing::trace!(parent, dependency, "dependency registered");
    }

    fn on_collected(&self, cell: &str) {
        tracing::debug!(cell, "collected");
    }

    fn on_tick(&self, time: LogicalTime) {
        tracing::debug!(time = time.0, "tick");
    }
}

/// An event captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// See [`Tracer::on_evaluation`]. The value is its `Debug` rendering.
    Evaluated {
        /// Cell name.
        cell: String,
        /// How the value was produced.
        evaluation: Evaluation,
        /// `{:?}` of the value.
        value: String,
    },
    /// See [`Tracer::on_evaluation_failed`].
    Failed {
        /// Cell name.
        cell: String,
        /// Display of the error.
        message: String,
    },
    /// See [`Tracer::on_dependency_registered`].
    Dependency {
        /// Reading cell.
        parent: String,
        /// Cell that was read.
        dependency: String,
    },
    /// See [`Tracer::on_collected`].
    Collected {
        /// Cell name.
        cell: String,
    },
    /// See [`Tracer::on_tick`].
    Tick {
        /// The new time.
        time: LogicalTime,
    },
}

/// Tracer that accumulates events for later inspection and assertion.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTracer {
    /// Create a new empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Take collected events, clearing the tracer.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Evaluations recorded for `cell`, in order.
    pub fn evaluations_of(&self, cell: &str) -> Vec<Evaluation> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Evaluated {
                    cell: c,
                    evaluation,
                    ..
                } if c == cell => Some(*evaluation),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for RecordingTracer {
    fn on_evaluation(&self, cell: &str, evaluation: Evaluation, value: &dyn Debug) {
        self.push(TraceEvent::Evaluated {
            cell: cell.to_string(),
            evaluation,
            value: format!("{:?}", value),
        });
    }

    fn on_evaluation_failed(&self, cell: &str, message: &str) {
        self.push(TraceEvent::Failed {
            cell: cell.to_string(),
            message: message.to_string(),
        });
    }

    fn on_dependency_registered(&self, parent: &str, dependency: &str) {
        self.push(TraceEvent::Dependency {
            parent: parent.to_string(),
            dependency: dependency.to_string(),
        });
    }

    fn on_collected(&self, cell: &str) {
        self.push(TraceEvent::Collected {
            cell: cell.to_string(),
        });
    }

    fn on_tick(&self, time: LogicalTime) {
        self.push(TraceEvent::Tick { time });
    }
}
