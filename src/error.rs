//! Error types for network operations.

use std::fmt;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type Result<T, E = NetworkError> = std::result::Result<T, E>;

/// Errors raised by the network, covering both misuse and failing computations.
///
/// Any error type implementing `Into<anyhow::Error>` converts into
/// [`NetworkError::Computation`], so a computation body can use the `?` operator on
/// its own errors, and `?` on a nested read forwards the inner error untouched.
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// The network was used in a way its contract forbids.
    Usage(UsageError),

    /// A user-supplied computation failed.
    ///
    /// The error is shared, so every enclosing evaluation observes the very same
    /// value that the failing function returned.
    Computation(Arc<anyhow::Error>),
}

/// Programmer errors. None of these are recoverable by retrying the same call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// A named value was requested with an empty name, or with a name
    /// reserved for inputs and outputs.
    #[error("value name is empty or reserved")]
    Naming,

    /// A named value was requested with no evaluation in progress.
    #[error("value `{name}` cannot be read outside of an output cell")]
    Context {
        /// Name of the requested value.
        name: String,
    },

    /// An output (or a sample) was pulled from inside another evaluation.
    #[error("output `{name}` cannot be read inside a cell")]
    Reentrancy {
        /// Name of the output that was pulled.
        name: String,
    },

    /// The cell behind a handle has already been collected.
    #[error("cell `{name}` no longer exists")]
    Collected {
        /// Name of the missing cell.
        name: String,
    },

    /// A name is bound to a value of another type.
    #[error("cell `{name}` does not hold a value of type `{expected}`")]
    TypeMismatch {
        /// Name of the cell.
        name: String,
        /// Type requested by the caller.
        expected: &'static str,
    },

    /// Arguments of a memoized function could not be turned into a cell name.
    #[error("cannot derive a key for `{name}`: {message}")]
    Key {
        /// Name of the memoized function.
        name: String,
        /// Serializer message.
        message: String,
    },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Usage(e) => write!(f, "usage error: {}", e),
            NetworkError::Computation(e) => write!(f, "computation error: {}", e),
        }
    }
}

impl<T: Into<anyhow::Error>> From<T> for NetworkError {
    fn from(err: T) -> Self {
        NetworkError::Computation(Arc::new(err.into()))
    }
}

impl NetworkError {
    pub(crate) fn usage(err: UsageError) -> Self {
        NetworkError::Usage(err)
    }

    /// Returns the usage error if this is a `Usage` variant.
    pub fn usage_error(&self) -> Option<&UsageError> {
        match self {
            NetworkError::Usage(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the inner error if this is a `Computation` variant.
    pub fn computation_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            NetworkError::Computation(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the computation error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.computation_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is a `Computation` error holding an `E`.
    pub fn is<E: std::error::Error + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns `true` if both errors are the same shared computation failure.
    pub fn is_same_failure(&self, other: &NetworkError) -> bool {
        match (self, other) {
            (NetworkError::Computation(a), NetworkError::Computation(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
