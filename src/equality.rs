//! Equality functions for cutoff.
//!
//! These are meant for [`Network::output_with_eq`](crate::Network::output_with_eq),
//! [`Network::value_with_eq`](crate::Network::value_with_eq) and
//! [`ValueFunc::with_eq`](crate::ValueFunc::with_eq), when the value type has
//! no useful `PartialEq` or when "unchanged" means something other than `==`.

use std::sync::Arc;

/// Never equal: every rerun counts as a change and dependents rerun too.
pub fn never<T>(_: &T, _: &T) -> bool {
    false
}

/// Equal when both point to the same allocation.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use cell_network::{equality, Network};
///
/// let net = Network::new();
/// let shared = Arc::new(vec![1, 2, 3]);
/// let out = net.output_with_eq(
///     {
///         let shared = shared.clone();
///         move |_| Ok(shared.clone())
///     },
///     equality::ptr_eq,
/// );
/// assert!(Arc::ptr_eq(&out.get().unwrap(), &shared));
/// ```
pub fn ptr_eq<T>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Compare only the `Ok` values. Returns `false` for any `Err` case,
/// causing dependents to rerun.
pub fn ok_or_invalidate<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Compare `Ok` values for equality, treat all `Err` as equal.
///
/// Use this when a cell stores a failure as a value and dependents should not
/// rerun while it keeps failing, whatever the error content.
pub fn ignore_err<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never() {
        assert!(!never(&1, &1));
    }

    #[test]
    fn test_ptr_eq() {
        let a = Arc::new(String::from("x"));
        let b = Arc::new(String::from("x"));
        assert!(ptr_eq(&a, &a.clone()));
        assert!(!ptr_eq(&a, &b));
    }

    #[test]
    fn test_result_helpers() {
        let ok1: Result<i32, String> = Ok(1);
        let ok2: Result<i32, String> = Ok(2);
        let e1: Result<i32, String> = Err("a".into());
        let e2: Result<i32, String> = Err("b".into());

        assert!(ok_or_invalidate(&ok1, &ok1.clone()));
        assert!(!ok_or_invalidate(&ok1, &ok2));
        assert!(!ok_or_invalidate(&e1, &e1.clone()));

        assert!(ignore_err(&ok1, &ok1.clone()));
        assert!(ignore_err(&e1, &e2));
        assert!(!ignore_err(&ok1, &e1));
    }
}
