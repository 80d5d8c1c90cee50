//! Live bind probes.

use std::collections::HashSet;

use crate::port::Protocol;

/// Answers "can I bind this port right now?".
pub trait PortProbe {
    /// Returns `true` if a local bind on `port` succeeds.
    fn is_free(&self, port: u16, protocol: Protocol) -> bool;
}

impl<P: PortProbe + ?Sized> PortProbe for Box<P> {
    fn is_free(&self, port: u16, protocol: Protocol) -> bool {
        (**self).is_free(port, protocol)
    }
}

/// Probe backed by real socket binds via the `port-selector` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl PortProbe for SystemProbe {
    fn is_free(&self, port: u16, protocol: Protocol) -> bool {
        if port == 0 {
            return false;
        }
        match protocol {
            Protocol::Tcp => port_selector::is_free_tcp(port),
            Protocol::Udp => port_selector::is_free_udp(port),
        }
    }
}

/// Probe with a fixed set of occupied ports, for tests.
///
/// # Examples
///
/// ```
/// use berth::scanner::{MockProbe, PortProbe};
/// use berth::Protocol;
///
/// let probe = MockProbe::occupied([3000]);
/// assert!(!probe.is_free(3000, Protocol::Tcp));
/// assert!(probe.is_free(3001, Protocol::Tcp));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    occupied: HashSet<u16>,
}

impl MockProbe {
    /// A probe where every port is free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe reporting the given ports as taken.
    #[must_use]
    pub fn occupied(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            occupied: ports.into_iter().collect(),
        }
    }
}

impl PortProbe for MockProbe {
    fn is_free(&self, port: u16, _protocol: Protocol) -> bool {
        port != 0 && !self.occupied.contains(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_system_probe_sees_held_socket() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!SystemProbe.is_free(port, Protocol::Tcp));
        drop(listener);
    }

    #[test]
    fn test_port_zero_never_free() {
        assert!(!SystemProbe.is_free(0, Protocol::Tcp));
        assert!(!MockProbe::new().is_free(0, Protocol::Udp));
    }
}
