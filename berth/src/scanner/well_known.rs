//! Static port tables.

/// Ports commonly held by local development servers. Always bind-probed.
pub const COMMON_DEV_PORTS: &[u16] = &[
    3000, 3001, 3306, 4000, 4200, 5000, 5173, 5432, 5601, 5672, 6379, 8000, 8080, 8081, 8443,
    8888, 9000, 9090, 9200, 11211, 27017,
];

/// Conventional service ports kept out of allocation.
pub const RESERVED_PORTS: &[(u16, &str)] = &[
    (22, "ssh"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (443, "https"),
    (631, "cups"),
    (2375, "docker"),
    (2376, "docker tls"),
    (3306, "mysql"),
    (5432, "postgresql"),
    (5672, "rabbitmq"),
    (6379, "redis"),
    (9200, "elasticsearch"),
    (11211, "memcached"),
    (27017, "mongodb"),
];

/// Returns the service name for a reserved port.
///
/// ```
/// use berth::scanner::well_known::reserved_service;
///
/// assert_eq!(reserved_service(27017), Some("mongodb"));
/// assert_eq!(reserved_service(27018), None);
/// ```
#[must_use]
pub fn reserved_service(port: u16) -> Option<&'static str> {
    RESERVED_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
}
