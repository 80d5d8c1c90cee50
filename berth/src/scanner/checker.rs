//! The occupancy seam between allocator and scanner.

use std::collections::HashSet;

use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};

/// Occupancy queries the allocator needs.
///
/// [`crate::PortScanner`] is the production implementation.
pub trait PortChecker {
    /// Whether `port` looks free, using cached scan data when present.
    fn is_available(&mut self, port: u16) -> bool;

    /// Whether `port` can be bound right now, ignoring any cache.
    fn verify(&mut self, port: u16) -> bool;

    /// Drops cached scan data.
    fn refresh(&mut self);

    /// Details for each of `ports` that is not available.
    fn conflicts(&mut self, ports: &[u16]) -> Vec<PortInfo> {
        ports
            .iter()
            .filter(|p| !self.is_available(**p))
            .map(|p| {
                PortInfo::new(
                    *p,
                    PortStatus::OccupiedSystem,
                    Protocol::Tcp,
                    DetectionMethod::BindTest,
                )
                .with_description("port in use")
            })
            .collect()
    }
}

impl<C: PortChecker + ?Sized> PortChecker for Box<C> {
    fn is_available(&mut self, port: u16) -> bool {
        (**self).is_available(port)
    }

    fn verify(&mut self, port: u16) -> bool {
        (**self).verify(port)
    }

    fn refresh(&mut self) {
        (**self).refresh();
    }

    fn conflicts(&mut self, ports: &[u16]) -> Vec<PortInfo> {
        (**self).conflicts(ports)
    }
}

/// Checker with a configurable set of occupied ports.
///
/// `racing` ports look free to [`PortChecker::is_available`] but fail
/// [`PortChecker::verify`], which models a foreign process grabbing the
/// port between scan and commit.
///
/// # Examples
///
/// ```
/// use berth::scanner::{MockChecker, PortChecker};
///
/// let mut checker = MockChecker::occupied([3000]);
/// assert!(!checker.is_available(3000));
/// assert!(checker.is_available(3001));
///
/// checker.occupy(3001);
/// assert!(!checker.verify(3001));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockChecker {
    occupied: HashSet<u16>,
    racing: HashSet<u16>,
    refreshes: usize,
}

impl MockChecker {
    /// A checker where every port is free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A checker with the given ports occupied.
    #[must_use]
    pub fn occupied(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            occupied: ports.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Marks a port occupied.
    pub fn occupy(&mut self, port: u16) {
        self.occupied.insert(port);
    }

    /// Marks a port free again.
    pub fn free(&mut self, port: u16) {
        self.occupied.remove(&port);
        self.racing.remove(&port);
    }

    /// Makes `port` pass the cached check but fail live verification.
    pub fn race(&mut self, port: u16) {
        self.racing.insert(port);
    }

    /// Number of times [`PortChecker::refresh`] was called.
    #[must_use]
    pub const fn refreshes(&self) -> usize {
        self.refreshes
    }
}

impl PortChecker for MockChecker {
    fn is_available(&mut self, port: u16) -> bool {
        !self.occupied.contains(&port)
    }

    fn verify(&mut self, port: u16) -> bool {
        !self.occupied.contains(&port) && !self.racing.contains(&port)
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}
