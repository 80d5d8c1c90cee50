//! Parsers for `ss` and `netstat` output.

use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};

/// Extracts the port from a local-address column.
///
/// Handles Linux `addr:port`, bracketed IPv6 `[::]:port`, scoped
/// `127.0.0.53%lo:53`, and BSD `addr.port` / `*.port` forms.
#[must_use]
pub fn address_port(addr: &str) -> Option<u16> {
    let from_dot = addr
        .rsplit_once('.')
        .and_then(|(_, tail)| tail.parse::<u16>().ok());
    let port = from_dot.or_else(|| {
        addr.rsplit_once(':')
            .and_then(|(_, tail)| tail.parse::<u16>().ok())
    })?;
    (port != 0).then_some(port)
}

/// Pulls `("name",pid=123,...)` out of the `ss -p` users column.
fn ss_process(column: &str) -> (Option<String>, Option<u32>) {
    let Some(start) = column.find("((\"") else {
        return (None, None);
    };
    let rest = &column[start + 3..];
    let name = rest.split('"').next().map(str::to_string);
    let pid = rest
        .split("pid=")
        .nth(1)
        .and_then(|s| s.split([',', ')']).next())
        .and_then(|s| s.parse().ok());
    (name, pid)
}

/// Parses `ss -tulnpH` output.
///
/// Columns are `Netid State Recv-Q Send-Q Local Peer [Process]`.
#[must_use]
pub fn parse_ss(output: &str) -> Vec<PortInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            let protocol = match fields[0] {
                "tcp" if fields[1] == "LISTEN" => Protocol::Tcp,
                "udp" => Protocol::Udp,
                _ => return None,
            };
            let port = address_port(fields[4])?;
            let (name, pid) = fields
                .get(6..)
                .map(|rest| ss_process(&rest.join(" ")))
                .unwrap_or((None, None));
            let description = name
                .as_deref()
                .map_or_else(|| "listening socket".to_string(), |n| format!("used by {n}"));
            Some(
                PortInfo::new(
                    port,
                    PortStatus::OccupiedSystem,
                    protocol,
                    DetectionMethod::SocketSummary,
                )
                .with_process(name, pid)
                .with_description(description),
            )
        })
        .collect()
}

/// Parses `netstat -tuln` (Linux) or `netstat -an` (BSD) output.
///
/// TCP rows must be in `LISTEN` state; every UDP row counts.
#[must_use]
pub fn parse_netstat(output: &str) -> Vec<PortInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let proto = fields[0].to_ascii_lowercase();
            let protocol = if proto.starts_with("tcp") {
                if !fields.iter().any(|f| *f == "LISTEN") {
                    return None;
                }
                Protocol::Tcp
            } else if proto.starts_with("udp") {
                Protocol::Udp
            } else {
                return None;
            };
            let port = address_port(fields[3])?;
            Some(
                PortInfo::new(
                    port,
                    PortStatus::OccupiedSystem,
                    protocol,
                    DetectionMethod::LegacyListing,
                )
                .with_description("listening socket"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_port_forms() {
        assert_eq!(address_port("0.0.0.0:3000"), Some(3000));
        assert_eq!(address_port("127.0.0.1:631"), Some(631));
        assert_eq!(address_port("[::]:8080"), Some(8080));
        assert_eq!(address_port(":::80"), Some(80));
        assert_eq!(address_port("127.0.0.53%lo:53"), Some(53));
        assert_eq!(address_port("*.5353"), Some(5353));
        assert_eq!(address_port("fe80::1%lo0.8080"), Some(8080));
        assert_eq!(address_port("0.0.0.0:*"), None);
        assert_eq!(address_port("garbage"), None);
    }

    #[test]
    fn test_parse_ss_with_users() {
        let output = "\
tcp   LISTEN 0      511          0.0.0.0:3000      0.0.0.0:*    users:((\"node\",pid=1234,fd=20))
tcp   LISTEN 0      4096            [::]:8080         [::]:*
udp   UNCONN 0      0      127.0.0.53%lo:53           0.0.0.0:*    users:((\"systemd-resolve\",pid=612,fd=13))
tcp   ESTAB  0      0          127.0.0.1:51234   127.0.0.1:3000
";
        let infos = parse_ss(output);
        assert_eq!(infos.len(), 3);

        assert_eq!(infos[0].port, 3000);
        assert_eq!(infos[0].process_name.as_deref(), Some("node"));
        assert_eq!(infos[0].process_id, Some(1234));
        assert_eq!(infos[0].description, "used by node");

        assert_eq!(infos[1].port, 8080);
        assert!(infos[1].process_id.is_none());

        assert_eq!(infos[2].protocol, Protocol::Udp);
        assert_eq!(infos[2].process_name.as_deref(), Some("systemd-resolve"));
    }

    #[test]
    fn test_parse_netstat_linux() {
        let output = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN
tcp6       0      0 :::5000                 :::*                    LISTEN
tcp        0      0 127.0.0.1:40000         127.0.0.1:22            ESTABLISHED
udp        0      0 0.0.0.0:68              0.0.0.0:*
";
        let ports: Vec<(u16, Protocol)> = parse_netstat(output)
            .iter()
            .map(|i| (i.port, i.protocol))
            .collect();
        assert_eq!(
            ports,
            vec![(22, Protocol::Tcp), (5000, Protocol::Tcp), (68, Protocol::Udp)]
        );
    }

    #[test]
    fn test_parse_netstat_bsd() {
        let output = "\
Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  *.3000                 *.*                    LISTEN
tcp46      0      0  *.8080                 *.*                    LISTEN
tcp4       0      0  192.168.1.5.52000      17.57.146.20.443       ESTABLISHED
udp4       0      0  *.5353                 *.*
";
        let ports: Vec<u16> = parse_netstat(output).iter().map(|i| i.port).collect();
        assert_eq!(ports, vec![3000, 8080, 5353]);
        assert!(parse_netstat(output)
            .iter()
            .all(|i| i.detection_method == DetectionMethod::LegacyListing));
    }
}
