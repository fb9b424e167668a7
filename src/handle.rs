//! Typed handles to input and output cells.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cell::{downcast, CellValue};
use crate::error::{NetworkError, Result, UsageError};
use crate::network::Network;
use crate::time::LogicalTime;

fn collected(name: &str) -> NetworkError {
    NetworkError::usage(UsageError::Collected {
        name: name.to_string(),
    })
}

fn mismatch<T>(name: &str) -> NetworkError {
    NetworkError::usage(UsageError::TypeMismatch {
        name: name.to_string(),
        expected: std::any::type_name::<T>(),
    })
}

/// Handle to an input cell created by [`Network::input`].
///
/// Cloning the handle does not copy the cell; all clones refer to the same
/// input. Computations capture clones to read the input.
pub struct Input<T> {
    net: Network,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            net: self.net.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.name).finish()
    }
}

impl<T: CellValue> Input<T> {
    pub(crate) fn new(net: Network, name: Arc<str>) -> Self {
        Self {
            net,
            name,
            _marker: PhantomData,
        }
    }

    /// Name of the underlying cell.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current value.
    ///
    /// Inside a computation this records the input as a dependency.
    ///
    /// # Errors
    ///
    /// [`UsageError::Collected`] once the input was deleted and nothing reads it.
    pub fn get(&self) -> Result<T> {
        let _lock = self.net.lock();
        let id = self
            .net
            .with_state(|st| st.store.lookup(&self.name))
            .ok_or_else(|| collected(&self.name))?;
        let data = self.net.evaluate(id, true)?;
        downcast::<T>(&data).ok_or_else(|| mismatch::<T>(&self.name))
    }

    /// Replace the value, advance the clock and notify tick listeners.
    ///
    /// Writing a value equal to the current one still advances the clock.
    /// Returns the new time.
    pub fn set(&self, value: T) -> Result<LogicalTime> {
        self.net.write(&self.name, value)
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> Result<LogicalTime> {
        let _lock = self.net.lock();
        let current = self.get()?;
        self.set(f(current))
    }

    /// Release the input. It is collected as soon as no computation reads it.
    pub fn delete(&self) {
        self.net.release_anchor(&self.name);
    }
}

/// Handle to an output cell created by [`Network::output`].
///
/// An output keeps its cell and everything it reads alive. Dropping the handle
/// (or calling [`delete`](Self::delete)) releases them.
pub struct Output<T> {
    net: Network,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Output").field(&self.name).finish()
    }
}

impl<T: CellValue> Output<T> {
    pub(crate) fn new(net: Network, name: Arc<str>) -> Self {
        Self {
            net,
            name,
            _marker: PhantomData,
        }
    }

    /// Name of the underlying cell.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bring the output up to date and return its value.
    ///
    /// # Errors
    ///
    /// - [`UsageError::Reentrancy`] when called while another evaluation is running
    /// - whatever the computation fails with
    pub fn get(&self) -> Result<T> {
        let _lock = self.net.lock();
        let id = self.net.with_state(|st| {
            if st.store.caller().is_some() {
                return Err(NetworkError::usage(UsageError::Reentrancy {
                    name: self.name.to_string(),
                }));
            }
            st.store.lookup(&self.name).ok_or_else(|| collected(&self.name))
        })?;
        let data = self.net.evaluate(id, false)?;
        downcast::<T>(&data).ok_or_else(|| mismatch::<T>(&self.name))
    }

    /// Release the output; cells only it kept alive are collected.
    pub fn delete(self) {
        drop(self)
    }
}

impl<T> Drop for Output<T> {
    fn drop(&mut self) {
        self.net.release_anchor(&self.name);
    }
}
