//! Port and port range types.
//!
//! [`Port`] is a validated, non-zero port number and [`PortRange`] an
//! inclusive interval of them. Service types, scan windows and the extended
//! auto-resolution window are all expressed as `PortRange`s.

pub mod info;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use info::{DetectionMethod, PortInfo, PortStatus, Protocol};

/// A valid network port number (1-65535).
///
/// Port 0 asks the OS for an ephemeral port and is never a valid allocation.
///
/// # Examples
///
/// ```
/// use berth::Port;
///
/// let port = Port::try_from(8080).unwrap();
/// assert_eq!(port.value(), 8080);
/// assert!(Port::try_from(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// The minimum valid port number.
    pub const MIN: u16 = 1;

    /// The maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Returns the underlying port number.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the port `offset` above this one, if it still fits in a `u16`.
    ///
    /// ```
    /// use berth::Port;
    ///
    /// let port = Port::try_from(65534).unwrap();
    /// assert_eq!(port.checked_add(1).map(Port::value), Some(65535));
    /// assert!(port.checked_add(2).is_none());
    /// ```
    #[must_use]
    pub fn checked_add(self, offset: u16) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl TryFrom<u16> for Port {
    type Error = InvalidPortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(InvalidPortError {
                value,
                reason: "port 0 is invalid".into(),
            })
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for invalid port numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPortError {
    /// The invalid port value.
    pub value: u16,
    /// The reason the port is invalid.
    pub reason: String,
}

impl fmt::Display for InvalidPortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid port {}: {}", self.value, self.reason)
    }
}

impl std::error::Error for InvalidPortError {}

/// An inclusive range of ports.
///
/// # Examples
///
/// ```
/// use berth::{Port, PortRange};
///
/// let range = PortRange::from_bounds(3000, 3099).unwrap();
/// assert_eq!(range.len(), 100);
/// assert!(range.contains(Port::try_from(3050).unwrap()));
/// assert!(!range.contains(Port::try_from(2999).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u16, u16)", into = "(u16, u16)")]
pub struct PortRange {
    min: Port,
    max: Port,
}

impl PortRange {
    /// Creates a new port range.
    ///
    /// # Errors
    ///
    /// Returns an error if `max` is less than `min`.
    pub fn new(min: Port, max: Port) -> Result<Self, InvalidPortRangeError> {
        if max < min {
            Err(InvalidPortRangeError {
                min: min.value(),
                max: max.value(),
                reason: "max must be greater than or equal to min".into(),
            })
        } else {
            Ok(Self { min, max })
        }
    }

    /// Creates a range from raw bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is 0 or the bounds are inverted.
    pub fn from_bounds(min: u16, max: u16) -> Result<Self, InvalidPortRangeError> {
        let invalid = |reason: &str| InvalidPortRangeError {
            min,
            max,
            reason: reason.into(),
        };
        let min_port = Port::try_from(min).map_err(|_| invalid("port 0 is invalid"))?;
        let max_port = Port::try_from(max).map_err(|_| invalid("port 0 is invalid"))?;
        Self::new(min_port, max_port)
    }

    /// Range from literal bounds, checked at compile time when used in a
    /// `const` context.
    pub(crate) const fn const_bounds(min: u16, max: u16) -> Self {
        assert!(min != 0 && min <= max, "invalid port range");
        Self {
            min: Port(min),
            max: Port(max),
        }
    }

    /// Returns the minimum port in the range.
    #[must_use]
    pub const fn min(&self) -> Port {
        self.min
    }

    /// Returns the maximum port in the range.
    #[must_use]
    pub const fn max(&self) -> Port {
        self.max
    }

    /// Returns `true` if the range contains the given port.
    #[must_use]
    pub const fn contains(&self, port: Port) -> bool {
        port.value() >= self.min.value() && port.value() <= self.max.value()
    }

    /// Returns `true` if the raw port number falls inside the range.
    #[must_use]
    pub const fn contains_value(&self, port: u16) -> bool {
        port >= self.min.value() && port <= self.max.value()
    }

    /// Returns the number of ports in the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.max.value() as u32 - self.min.value() as u32 + 1
    }

    /// A valid range always holds at least one port.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over all ports in this range, ascending.
    #[must_use]
    pub fn iter(self) -> PortRangeIter {
        PortRangeIter {
            next: Some(self.min.value()),
            max: self.max.value(),
        }
    }

    /// Returns an iterator starting at `start` (clamped into the range).
    #[must_use]
    pub fn iter_from(self, start: Port) -> PortRangeIter {
        let first = start.value().max(self.min.value());
        PortRangeIter {
            next: (first <= self.max.value()).then_some(first),
            max: self.max.value(),
        }
    }

    /// Returns up to `count` ports spread evenly across the range.
    ///
    /// The first sample is always the range minimum. Used to bound the cost
    /// of bind-probing large ranges.
    ///
    /// ```
    /// use berth::PortRange;
    ///
    /// let range = PortRange::from_bounds(3000, 3999).unwrap();
    /// let sample = range.sample(4);
    /// let values: Vec<u16> = sample.iter().map(|p| p.value()).collect();
    /// assert_eq!(values, vec![3000, 3250, 3500, 3750]);
    /// ```
    #[must_use]
    pub fn sample(self, count: usize) -> Vec<Port> {
        if count == 0 {
            return Vec::new();
        }
        let len = self.len() as usize;
        if count >= len {
            return self.iter().collect();
        }
        let step = len / count;
        self.iter().step_by(step.max(1)).take(count).collect()
    }
}

impl TryFrom<(u16, u16)> for PortRange {
    type Error = InvalidPortRangeError;

    fn try_from((min, max): (u16, u16)) -> Result<Self, Self::Error> {
        Self::from_bounds(min, max)
    }
}

impl From<PortRange> for (u16, u16) {
    fn from(range: PortRange) -> Self {
        (range.min.value(), range.max.value())
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl IntoIterator for PortRange {
    type Item = Port;
    type IntoIter = PortRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over ports in a [`PortRange`].
#[derive(Debug, Clone)]
pub struct PortRangeIter {
    next: Option<u16>,
    max: u16,
}

impl Iterator for PortRangeIter {
    type Item = Port;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.max {
            Some(current + 1)
        } else {
            None
        };
        Some(Port(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map_or(0, |n| usize::from(self.max) - usize::from(n) + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PortRangeIter {}

/// Error type for invalid port ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPortRangeError {
    /// The requested minimum.
    pub min: u16,
    /// The requested maximum.
    pub max: u16,
    /// The reason the range is invalid.
    pub reason: String,
}

impl fmt::Display for InvalidPortRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid port range {}-{}: {}",
            self.min, self.max, self.reason
        )
    }
}

impl std::error::Error for InvalidPortRangeError {}
