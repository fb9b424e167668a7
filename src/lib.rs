//! Cell-Network: a demand-driven, self-adjusting computation network.
//!
//! A [`Network`] holds named input cells and computation cells derived from
//! them. A computation records every cell it reads while it runs; writing an
//! input only advances a logical clock. Pulling an [`Output`] then reruns just
//! the computations whose recorded dependencies actually changed.
//!
//! # Key Features
//!
//! - **Dynamic dependencies**: each run records its own reads, so branches may
//!   read different cells from one run to the next
//! - **Early cutoff**: a rerun producing an equal value does not disturb its dependents
//! - **Named values**: [`Network::value`] and [`ValueFunc`] share one cached
//!   computation between every reader, across outputs and recursion
//! - **Reference-counted collection**: a cell disappears as soon as no output
//!   and no other cell reads it
//! - **Observable**: plug in a [`Tracer`], or turn on `tracing` logs with
//!   [`Network::set_debug`]
//!
//! # Example
//!
//! ```
//! use cell_network::Network;
//!
//! let net = Network::new();
//! let a = net.input(3);
//! let b = net.input(4);
//!
//! let squared = net.output({
//!     let a = a.clone();
//!     move |net| net.value("a_squared", {
//!         let a = a.clone();
//!         move |_| Ok(a.get()? * a.get()?)
//!     })
//! });
//! let total = net.output({
//!     let (a, b) = (a.clone(), b.clone());
//!     move |net| {
//!         let sq = net.value("a_squared", {
//!             let a = a.clone();
//!             move |_| Ok(a.get()? * a.get()?)
//!         })?;
//!         Ok(sq + b.get()?)
//!     }
//! });
//!
//! assert_eq!(squared.get().unwrap(), 9);
//! assert_eq!(total.get().unwrap(), 13);
//!
//! b.set(10).unwrap();
//! assert_eq!(total.get().unwrap(), 19);
//! ```
//!
//! # Collection
//!
//! Inputs and outputs are anchors. Every other cell lives while some
//! computation read it in its most recent run. Deleting an output (or
//! dropping its handle) releases whatever only it kept alive; see
//! [`Network::cell_count`] and [`Network::cell_names`] to observe this.

#![deny(missing_docs)]

mod cell;
mod engine;
pub mod equality;
mod error;
mod graph;
mod handle;
mod memo;
mod network;
mod store;
mod time;
pub mod tracer;

pub use cell::CellValue;
pub use error::{NetworkError, Result, UsageError};
pub use handle::{Input, Output};
pub use memo::ValueFunc;
pub use network::{Network, NetworkBuilder, TickSubscription};
pub use time::LogicalTime;
pub use tracer::{Evaluation, LogTracer, NoopTracer, RecordingTracer, TraceEvent, Tracer};
