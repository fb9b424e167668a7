//! The network: public entry points over the cell store.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use slab::Slab;

use crate::cell::{erase_compute, erase_eq, partial_eq, Cell, CellKind, CellValue, ComputeFn, EqFn};
use crate::error::{NetworkError, Result, UsageError};
use crate::handle::{Input, Output};
use crate::memo::ValueFunc;
use crate::store::CellStore;
use crate::time::LogicalTime;
use crate::tracer::{LogTracer, NoopTracer, Tracer};

const INPUT_PREFIX: &str = "__INPUT_";
const OUTPUT_PREFIX: &str = "__OUTPUT_";

/// Names of this form are generated for inputs and outputs.
fn is_reserved(name: &str) -> bool {
    name.starts_with(INPUT_PREFIX) || name.starts_with(OUTPUT_PREFIX)
}

pub(crate) type TickListener = Arc<dyn Fn(LogicalTime) + Send + Sync>;

pub(crate) struct State {
    pub store: CellStore,
    pub tracer: Arc<dyn Tracer>,
    pub listeners: Slab<TickListener>,
}

impl State {
    pub fn report_collected(&self, names: &[Arc<str>]) {
        for name in names {
            self.tracer.on_collected(name);
        }
    }
}

struct Shared {
    state: ReentrantMutex<RefCell<State>>,
}

/// A store of named input cells and derived computation cells.
///
/// Reading a cell from inside a computation records a dependency; writing an
/// input advances the logical clock. Nothing is recomputed eagerly: the next
/// pull on an output walks its dependencies, reruns only what actually changed,
/// and serves the rest from cache.
///
/// This is cheap to clone; clones share the same store. All operations on one
/// network are serialized by a single reentrant lock, so computations may call
/// back into the network on their own thread while other threads wait.
///
/// Computations own whatever they capture. A computation capturing an
/// [`Input`] keeps the network alive until the computation's cell is
/// collected, which happens once every [`Output`] reaching it is deleted.
///
/// # Example
///
/// ```
/// use cell_network::Network;
///
/// let net = Network::new();
/// let a = net.input(3);
/// let b = net.input(4);
///
/// let sum = net.output({
///     let (a, b) = (a.clone(), b.clone());
///     move |_| Ok(a.get()? + b.get()?)
/// });
///
/// assert_eq!(sum.get().unwrap(), 7);
/// b.set(40).unwrap();
/// assert_eq!(sum.get().unwrap(), 43);
/// ```
#[derive(Clone)]
pub struct Network {
    shared: Arc<Shared>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("time", &self.current_time())
            .field("cells", &self.cell_count())
            .finish()
    }
}

#[test]
fn test_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<Network>();
    assert_sync::<Network>();
}

impl Network {
    /// Create a new network with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for customizing the network.
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<State>> {
        self.shared.state.lock()
    }

    /// Run `f` with exclusive access to the state.
    ///
    /// Never call user code or re-enter the engine from inside `f`.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let guard = self.lock();
        let (result, graveyard) = {
            let mut state = guard.borrow_mut();
            let result = f(&mut state);
            (result, state.store.take_graveyard())
        };
        // Collected cells own user closures; drop them without holding the borrow.
        drop(graveyard);
        result
    }

    /// Create an anchored input cell holding `initial`.
    pub fn input<T: CellValue>(&self, initial: T) -> Input<T> {
        let name = self.with_state(|st| {
            let name: Arc<str> = Arc::from(format!("{}{}", INPUT_PREFIX, st.store.next_id()));
            let now = st.store.now();
            st.store
                .insert(Cell::constant(name.clone(), Arc::new(initial), now));
            name
        });
        Input::new(self.clone(), name)
    }

    /// Create an anchored output cell computing `func`.
    ///
    /// The output is evaluated lazily by [`Output::get`].
    pub fn output<T, F>(&self, func: F) -> Output<T>
    where
        T: CellValue + PartialEq,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
    {
        self.make_output(None, erase_compute(func), partial_eq::<T>())
    }

    /// Like [`output`](Self::output), with a debug name embedded in the cell name.
    pub fn output_named<T, F>(&self, debug_name: &str, func: F) -> Output<T>
    where
        T: CellValue + PartialEq,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
    {
        self.make_output(Some(debug_name), erase_compute(func), partial_eq::<T>())
    }

    /// Like [`output`](Self::output), deciding "unchanged" with `eq`.
    pub fn output_with_eq<T, F, E>(&self, func: F, eq: E) -> Output<T>
    where
        T: CellValue,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.make_output(None, erase_compute(func), erase_eq(eq))
    }

    fn make_output<T: CellValue>(
        &self,
        debug_name: Option<&str>,
        func: ComputeFn,
        equality: EqFn,
    ) -> Output<T> {
        let name = self.with_state(|st| {
            let id = st.store.next_id();
            let name: Arc<str> = match debug_name {
                Some(debug) => Arc::from(format!("{}{}_{}", OUTPUT_PREFIX, debug, id)),
                None => Arc::from(format!("{}{}", OUTPUT_PREFIX, id)),
            };
            st.store
                .insert(Cell::computation(name.clone(), true, func, equality));
            name
        });
        Output::new(self.clone(), name)
    }

    /// Read the named value `name`, creating it from `func` on first request.
    ///
    /// Only valid while some computation is running: the value becomes a
    /// dependency of that computation and lives as long as something reads it.
    /// If `name` is already bound, `func` is ignored and the existing cell is used.
    ///
    /// # Errors
    ///
    /// - [`UsageError::Naming`] for an empty name, or one starting with the
    ///   `__INPUT_`/`__OUTPUT_` prefixes of inputs and outputs
    /// - [`UsageError::Context`] when no evaluation is in progress
    /// - [`UsageError::TypeMismatch`] when `name` holds another type
    /// - whatever `func` (or anything it reads) fails with
    pub fn value<T, F>(&self, name: &str, func: F) -> Result<T>
    where
        T: CellValue + PartialEq,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
    {
        self.value_erased(name, erase_compute(func), partial_eq::<T>())
    }

    /// Like [`value`](Self::value), deciding "unchanged" with `eq`.
    pub fn value_with_eq<T, F, E>(&self, name: &str, func: F, eq: E) -> Result<T>
    where
        T: CellValue,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.value_erased(name, erase_compute(func), erase_eq(eq))
    }

    pub(crate) fn value_erased<T: CellValue>(
        &self,
        name: &str,
        func: ComputeFn,
        equality: EqFn,
    ) -> Result<T> {
        if name.is_empty() || is_reserved(name) {
            return Err(NetworkError::usage(UsageError::Naming));
        }
        let _lock = self.lock();
        let id = self.with_state(|st| {
            if st.store.caller().is_none() {
                return Err(NetworkError::usage(UsageError::Context {
                    name: name.to_string(),
                }));
            }
            Ok(match st.store.lookup(name) {
                Some(id) => id,
                None => st
                    .store
                    .insert(Cell::computation(Arc::from(name), false, func, equality)),
            })
        })?;
        let data = self.evaluate(id, true)?;
        crate::cell::downcast::<T>(&data).ok_or_else(|| {
            NetworkError::usage(UsageError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
        })
    }

    /// Wrap `body` as a function memoized per argument.
    ///
    /// Each distinct argument value gets its own named value, keyed by `name`
    /// and the JSON serialization of the arguments. Calls must happen inside
    /// an evaluation, like [`value`](Self::value).
    pub fn value_func<A, T, F>(&self, name: &str, body: F) -> Result<ValueFunc<A, T>>
    where
        A: serde::Serialize + Clone + Send + Sync + 'static,
        T: CellValue + PartialEq,
        F: Fn(&Network, A) -> Result<T> + Send + Sync + 'static,
    {
        ValueFunc::new(name, body)
    }

    /// Like [`value_func`](Self::value_func), passing the memoized function to
    /// its own body so it can recurse through the cache.
    ///
    /// ```
    /// use cell_network::Network;
    ///
    /// let net = Network::new();
    /// let fib = net
    ///     .value_func_recursive::<u64, u64, _>("fib", |net, fib, n| {
    ///         Ok(if n < 2 { n } else { fib.call(net, n - 1)? + fib.call(net, n - 2)? })
    ///     })
    ///     .unwrap();
    /// assert_eq!(net.sample(move |net| fib.call(net, 30)).unwrap(), 832040);
    /// ```
    pub fn value_func_recursive<A, T, F>(&self, name: &str, body: F) -> Result<ValueFunc<A, T>>
    where
        A: serde::Serialize + Clone + Send + Sync + 'static,
        T: CellValue + PartialEq,
        F: Fn(&Network, &ValueFunc<A, T>, A) -> Result<T> + Send + Sync + 'static,
    {
        ValueFunc::recursive(name, body)
    }

    /// Evaluate `func` once as a throwaway output and return its value.
    ///
    /// Named values read during the sample are shared within it and collected
    /// afterwards, unless something else retains them. A `sample` nested inside
    /// a sample simply runs `func` in the enclosing one.
    ///
    /// # Errors
    ///
    /// [`UsageError::Reentrancy`] when called from inside a computation that is
    /// not itself part of a sample.
    pub fn sample<T, F>(&self, func: F) -> Result<T>
    where
        T: CellValue,
        F: Fn(&Network) -> Result<T> + Send + Sync + 'static,
    {
        let _lock = self.lock();
        if self.with_state(|st| st.store.sampling) {
            return func(self);
        }
        let output: Output<T> =
            self.make_output(None, erase_compute(func), erase_eq(|_: &T, _: &T| false));
        let sampling = SamplingGuard::enter(self);
        let result = output.get();
        output.delete();
        drop(sampling);
        result
    }

    /// Register a listener called after every input write with the new time.
    ///
    /// Listeners run after the write has completed and may pull outputs.
    pub fn on_tick<F>(&self, listener: F) -> TickSubscription
    where
        F: Fn(LogicalTime) + Send + Sync + 'static,
    {
        let key = self.with_state(|st| st.listeners.insert(Arc::new(listener)));
        TickSubscription {
            net: self.clone(),
            key,
        }
    }

    pub(crate) fn tick_listeners(&self) -> Vec<TickListener> {
        self.with_state(|st| st.listeners.iter().map(|(_, l)| l.clone()).collect())
    }

    /// Current logical time.
    pub fn current_time(&self) -> LogicalTime {
        self.with_state(|st| st.store.now())
    }

    /// Number of live cells.
    pub fn cell_count(&self) -> usize {
        self.with_state(|st| st.store.len())
    }

    /// Names of all live cells, sorted.
    pub fn cell_names(&self) -> Vec<String> {
        self.with_state(|st| st.store.names())
    }

    /// Returns `true` if a cell is bound to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.with_state(|st| st.store.lookup(name).is_some())
    }

    /// Returns `true` while a computation is running on this network.
    pub fn is_evaluating(&self) -> bool {
        self.with_state(|st| st.store.caller().is_some())
    }

    /// Replace the tracer.
    pub fn set_tracer(&self, tracer: impl Tracer) {
        let tracer: Arc<dyn Tracer> = Arc::new(tracer);
        self.with_state(|st| st.tracer = tracer);
    }

    /// Toggle debug tracing through the `tracing` crate.
    ///
    /// Enabling installs a [`LogTracer`]; disabling installs a [`NoopTracer`],
    /// replacing any custom tracer either way.
    pub fn set_debug(&self, enabled: bool) {
        if enabled {
            self.set_tracer(LogTracer);
        } else {
            self.set_tracer(NoopTracer);
        }
    }

    /// Clear the anchor of the cell bound to `name` and collect it if unreachable.
    pub(crate) fn release_anchor(&self, name: &str) {
        self.with_state(|st| {
            let Some(id) = st.store.lookup(name) else {
                return;
            };
            st.store.cell_mut(id).is_anchor = false;
            let collected = st.store.collect(id);
            st.report_collected(&collected);
        });
    }

    /// Replace the value of the input bound to `name` and advance the clock.
    pub(crate) fn write<T: CellValue>(&self, name: &str, value: T) -> Result<LogicalTime> {
        let lock = self.lock();
        let (time, old) = self.with_state(|st| {
            let collected = || {
                NetworkError::usage(UsageError::Collected {
                    name: name.to_string(),
                })
            };
            let id = st.store.lookup(name).ok_or_else(collected)?;
            let now = st.store.now().next();
            let old = match &mut st.store.cell_mut(id).kind {
                CellKind::Constant {
                    value: slot,
                    change_time,
                } => {
                    *change_time = now;
                    std::mem::replace(slot, Arc::new(value))
                }
                CellKind::Computation(_) => return Err(collected()),
            };
            st.store.tick();
            st.tracer.on_tick(now);
            Ok((now, old))
        })?;
        drop(old);
        let listeners = self.tick_listeners();
        drop(lock);
        for listener in listeners {
            listener(time);
        }
        Ok(time)
    }
}

/// Keeps the `sampling` flag set for the duration of a sample, on every exit path.
struct SamplingGuard<'a> {
    net: &'a Network,
}

impl<'a> SamplingGuard<'a> {
    fn enter(net: &'a Network) -> Self {
        net.with_state(|st| st.store.sampling = true);
        Self { net }
    }
}

impl Drop for SamplingGuard<'_> {
    fn drop(&mut self) {
        let guard = self.net.lock();
        if let Ok(mut state) = guard.try_borrow_mut() {
            state.store.sampling = false;
        };
    }
}

/// Registration of a tick listener; see [`Network::on_tick`].
pub struct TickSubscription {
    net: Network,
    key: usize,
}

impl TickSubscription {
    /// Stop receiving ticks. Dropping the subscription does the same.
    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for TickSubscription {
    fn drop(&mut self) {
        let guard = self.net.lock();
        let removed = match guard.try_borrow_mut() {
            Ok(mut state) => state.listeners.try_remove(self.key),
            Err(_) => None,
        };
        // The listener may own handles; drop it without holding the borrow.
        drop(removed);
    }
}

impl fmt::Debug for TickSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickSubscription")
            .field("key", &self.key)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Network`] with customizable settings.
///
/// # Example
///
/// ```
/// use cell_network::{Network, RecordingTracer};
/// use std::sync::Arc;
///
/// let tracer = Arc::new(RecordingTracer::new());
/// let net = Network::builder().tracer(tracer.clone()).build();
/// # let _ = net;
/// ```
pub struct NetworkBuilder {
    tracer: Arc<dyn Tracer>,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Set the tracer receiving evaluation events.
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Trace through the `tracing` crate when `enabled`; see [`Network::set_debug`].
    pub fn debug(self, enabled: bool) -> Self {
        if enabled {
            self.tracer(LogTracer)
        } else {
            self.tracer(NoopTracer)
        }
    }

    /// Build the network.
    pub fn build(self) -> Network {
        Network {
            shared: Arc::new(Shared {
                state: ReentrantMutex::new(RefCell::new(State {
                    store: CellStore::new(),
                    tracer: self.tracer,
                    listeners: Slab::new(),
                })),
            }),
        }
    }
}
