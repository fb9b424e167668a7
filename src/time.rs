use std::fmt;

/// LogicalTime is a monotonically increasing counter advanced once per input write.
///
/// Freshness of cached values is expressed in logical time rather than wall-clock time:
/// a cached value is confirmed up to date "as of" some `LogicalTime`, and every cell
/// remembers the `LogicalTime` at which its value last actually changed.
///
/// # Examples
///
/// ```
/// # use cell_network::LogicalTime;
/// let t = LogicalTime::ZERO;
/// assert!(t.next() > t);
/// assert_eq!(t.next(), LogicalTime(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LogicalTime(pub u64);

impl LogicalTime {
    /// The time of a freshly created network, before any write.
    pub const ZERO: LogicalTime = LogicalTime(0);

    /// The tick following this one.
    #[must_use]
    pub fn next(self) -> Self {
        LogicalTime(self.0 + 1)
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
