//! Built-in service types.
//!
//! Ranges and defaults sit one step away from each technology's usual
//! port (mongodb 27018, redis 6380, postgres 5433, ...), since developer
//! machines often already run those services on their conventional ports.

use super::ServiceType;
use crate::PortRange;

/// Name of the catch-all type used when classification finds no match.
pub const GENERIC_TYPE: &str = "service";

struct Entry {
    name: &'static str,
    range: (u16, u16),
    default_port: Option<u16>,
    priority: u32,
    alternatives: &'static [u16],
    description: &'static str,
}

const ENTRIES: &[Entry] = &[
    Entry {
        name: "frontend",
        range: (3000, 3099),
        default_port: Some(3000),
        priority: 1,
        alternatives: &[3001, 3002, 3003],
        description: "Web UI / dev server",
    },
    Entry {
        name: "backend",
        range: (8000, 8099),
        default_port: Some(8000),
        priority: 1,
        alternatives: &[8001, 8002, 8003],
        description: "Application API server",
    },
    Entry {
        name: "gateway",
        range: (8100, 8199),
        default_port: Some(8100),
        priority: 2,
        alternatives: &[8101, 8102],
        description: "API gateway",
    },
    Entry {
        name: "proxy",
        range: (8880, 8899),
        default_port: Some(8880),
        priority: 2,
        alternatives: &[8881, 8882],
        description: "Reverse proxy",
    },
    Entry {
        name: "websocket",
        range: (3100, 3199),
        default_port: Some(3100),
        priority: 2,
        alternatives: &[3101, 3102],
        description: "Realtime / websocket server",
    },
    Entry {
        name: "postgres",
        range: (5433, 5499),
        default_port: Some(5433),
        priority: 2,
        alternatives: &[5434, 5435],
        description: "PostgreSQL",
    },
    Entry {
        name: "mysql",
        range: (3307, 3399),
        default_port: Some(3307),
        priority: 2,
        alternatives: &[3308, 3309],
        description: "MySQL / MariaDB",
    },
    Entry {
        name: "mongodb",
        range: (27018, 27099),
        default_port: Some(27018),
        priority: 2,
        alternatives: &[27019, 27020],
        description: "MongoDB",
    },
    Entry {
        name: "redis",
        range: (6380, 6399),
        default_port: Some(6380),
        priority: 3,
        alternatives: &[6381, 6382],
        description: "Redis cache",
    },
    Entry {
        name: "elasticsearch",
        range: (9201, 9299),
        default_port: Some(9201),
        priority: 3,
        alternatives: &[9202, 9203],
        description: "Elasticsearch",
    },
    Entry {
        name: "rabbitmq",
        range: (5673, 5699),
        default_port: Some(5673),
        priority: 3,
        alternatives: &[5674, 5675],
        description: "RabbitMQ broker",
    },
    Entry {
        name: "kafka",
        range: (9093, 9099),
        default_port: Some(9093),
        priority: 3,
        alternatives: &[9094, 9095],
        description: "Kafka broker",
    },
    Entry {
        name: "worker",
        range: (8200, 8299),
        default_port: None,
        priority: 4,
        alternatives: &[],
        description: "Background worker with a health endpoint",
    },
    Entry {
        name: "prometheus",
        range: (9091, 9092),
        default_port: Some(9091),
        priority: 5,
        alternatives: &[9092],
        description: "Prometheus",
    },
    Entry {
        name: "grafana",
        range: (3200, 3299),
        default_port: Some(3201),
        priority: 5,
        alternatives: &[3202, 3203],
        description: "Grafana dashboards",
    },
    Entry {
        name: "devtools",
        range: (8300, 8399),
        default_port: None,
        priority: 6,
        alternatives: &[],
        description: "Debuggers, storybook and similar tools",
    },
    Entry {
        name: "mailhog",
        range: (8500, 8599),
        default_port: Some(8525),
        priority: 6,
        alternatives: &[8526],
        description: "Mail catcher UI",
    },
    Entry {
        name: GENERIC_TYPE,
        range: (9000, 9099),
        default_port: None,
        priority: 10,
        alternatives: &[],
        description: "Unclassified service",
    },
];

/// Returns the built-in service types.
#[must_use]
pub fn builtin_types() -> Vec<ServiceType> {
    ENTRIES
        .iter()
        .filter_map(|e| {
            let range = PortRange::from_bounds(e.range.0, e.range.1).ok()?;
            Some(ServiceType {
                name: e.name.to_string(),
                port_range: range,
                default_port: e.default_port,
                priority: e.priority,
                port_alternatives: e.alternatives.to_vec(),
                description: e.description.to_string(),
            })
        })
        .collect()
}
