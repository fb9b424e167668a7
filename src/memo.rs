//! Functions memoized per argument.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cell::{erase_compute, erase_eq, partial_eq, CellValue, EqFn};
use crate::error::{NetworkError, Result, UsageError};
use crate::network::Network;

type Body<A, T> = Arc<dyn Fn(&Network, &ValueFunc<A, T>, A) -> Result<T> + Send + Sync>;

/// A function whose calls are memoized as named values, one per distinct argument.
///
/// The cell name for a call is `name(<json of args>)`, so `fib.call(net, 10)`
/// reads the named value `fib(10)`. Every call must happen inside an
/// evaluation. Results stay cached for as long as some retained computation
/// reads them.
///
/// Cheap to clone.
pub struct ValueFunc<A, T> {
    name: Arc<str>,
    body: Body<A, T>,
    equality: EqFn,
}

impl<A, T> Clone for ValueFunc<A, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            body: self.body.clone(),
            equality: self.equality.clone(),
        }
    }
}

impl<A, T> fmt::Debug for ValueFunc<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueFunc").field(&self.name).finish()
    }
}

impl<A, T> ValueFunc<A, T>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: CellValue,
{
    pub(crate) fn new<F>(name: &str, body: F) -> Result<Self>
    where
        T: PartialEq,
        F: Fn(&Network, A) -> Result<T> + Send + Sync + 'static,
    {
        Self::recursive(name, move |net: &Network, _: &ValueFunc<A, T>, args: A| {
            body(net, args)
        })
    }

    pub(crate) fn recursive<F>(name: &str, body: F) -> Result<Self>
    where
        T: PartialEq,
        F: Fn(&Network, &ValueFunc<A, T>, A) -> Result<T> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(NetworkError::usage(UsageError::Naming));
        }
        Ok(Self {
            name: Arc::from(name),
            body: Arc::new(body),
            equality: partial_eq::<T>(),
        })
    }

    /// Use `eq` instead of `PartialEq` to decide whether a recomputed result changed.
    #[must_use]
    pub fn with_eq<E>(self, eq: E) -> Self
    where
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            equality: erase_eq(eq),
            ..self
        }
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the cell caching the call with `args`.
    pub fn key(&self, args: &A) -> Result<String> {
        let json = serde_json::to_string(args).map_err(|e| {
            NetworkError::usage(UsageError::Key {
                name: self.name.to_string(),
                message: e.to_string(),
            })
        })?;
        Ok(format!("{}({})", self.name, json))
    }

    /// Call the function, reusing the cached result for `args` when it is still valid.
    ///
    /// # Errors
    ///
    /// Same as [`Network::value`]; in particular [`UsageError::Context`]
    /// outside of an evaluation.
    pub fn call(&self, net: &Network, args: A) -> Result<T> {
        let key = self.key(&args)?;
        let this = self.clone();
        let func = erase_compute(move |net: &Network| (this.body)(net, &this, args.clone()));
        net.value_erased(&key, func, self.equality.clone())
    }
}
