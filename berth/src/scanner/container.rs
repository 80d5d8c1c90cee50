//! Container runtime detector.
//!
//! Reads published host ports from `docker ps`. These detections override
//! every host-level pass because a `docker-proxy` listener says nothing
//! about which container owns the port.

use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};

/// Arguments passed to `docker`.
pub const DOCKER_PS_ARGS: [&str; 3] = ["ps", "--format", "{{.Names}}\t{{.Ports}}"];

/// Expands a host port spec (`8000` or `8000-8003`) to its ports.
fn host_ports(spec: &str) -> Vec<u16> {
    match spec.split_once('-') {
        Some((lo, hi)) => match (lo.parse::<u16>(), hi.parse::<u16>()) {
            (Ok(lo), Ok(hi)) if lo <= hi && lo > 0 => (lo..=hi).collect(),
            _ => Vec::new(),
        },
        None => spec.parse::<u16>().ok().filter(|p| *p > 0).into_iter().collect(),
    }
}

/// Parses one `{{.Ports}}` column into `(host port, protocol)` pairs.
///
/// Unpublished entries such as `5432/tcp` are ignored.
#[must_use]
pub fn parse_port_mappings(column: &str) -> Vec<(u16, Protocol)> {
    let mut mappings = Vec::new();
    for mapping in column.split(',').map(str::trim) {
        let Some((host, container)) = mapping.split_once("->") else {
            continue;
        };
        let protocol = if container.ends_with("/udp") {
            Protocol::Udp
        } else {
            Protocol::Tcp
        };
        let Some((_, spec)) = host.rsplit_once(':') else {
            continue;
        };
        for port in host_ports(spec) {
            if !mappings.contains(&(port, protocol)) {
                mappings.push((port, protocol));
            }
        }
    }
    mappings
}

/// Parses full `docker ps --format '{{.Names}}\t{{.Ports}}'` output.
#[must_use]
pub fn parse_docker_ps(output: &str) -> Vec<PortInfo> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .flat_map(|(name, ports)| {
            let name = name.trim().to_string();
            parse_port_mappings(ports)
                .into_iter()
                .map(move |(port, protocol)| {
                    PortInfo::new(
                        port,
                        PortStatus::OccupiedContainer,
                        protocol,
                        DetectionMethod::ContainerRuntime,
                    )
                    .with_container(name.clone())
                    .with_description(format!("published by container {name}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_dual_stack_mapping() {
        let mappings = parse_port_mappings("0.0.0.0:27017->27017/tcp, :::27017->27017/tcp");
        assert_eq!(mappings, vec![(27017, Protocol::Tcp)]);
    }

    #[test]
    fn test_range_mapping() {
        let mappings = parse_port_mappings("0.0.0.0:8000-8002->8000-8002/tcp");
        let ports: Vec<u16> = mappings.iter().map(|(p, _)| *p).collect();
        assert_eq!(ports, vec![8000, 8001, 8002]);
    }

    #[test]
    fn test_unpublished_and_udp() {
        assert!(parse_port_mappings("5432/tcp").is_empty());
        assert_eq!(
            parse_port_mappings("[::]:5353->53/udp"),
            vec![(5353, Protocol::Udp)]
        );
    }

    #[test]
    fn test_parse_docker_ps() {
        let output = "mongo\t0.0.0.0:27017->27017/tcp\nworker\t\napi\t0.0.0.0:8080->80/tcp, 9229/tcp\n";
        let infos = parse_docker_ps(output);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].container_name.as_deref(), Some("mongo"));
        assert_eq!(infos[0].status, PortStatus::OccupiedContainer);
        assert_eq!(infos[1].port, 8080);
        assert_eq!(infos[1].description, "published by container api");
    }
}
