//! Scan result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Occupancy classification for a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    /// Nothing detected on the port.
    Available,
    /// A host process is listening.
    OccupiedSystem,
    /// A container publishes the port on the host.
    OccupiedContainer,
    /// A well-known service port kept out of allocation.
    Reserved,
    /// No detector could classify the port.
    Unknown,
}

impl PortStatus {
    /// Returns `true` only for [`PortStatus::Available`].
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// Parses the snake_case name used in output and filters.
    ///
    /// ```
    /// use berth::PortStatus;
    ///
    /// assert_eq!(PortStatus::parse("occupied_container"), Some(PortStatus::OccupiedContainer));
    /// assert_eq!(PortStatus::parse("nope"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "available" => Some(Self::Available),
            "occupied_system" => Some(Self::OccupiedSystem),
            "occupied_container" => Some(Self::OccupiedContainer),
            "reserved" => Some(Self::Reserved),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::OccupiedSystem => "occupied_system",
            Self::OccupiedContainer => "occupied_container",
            Self::Reserved => "reserved",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Transport protocol of a detected socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// Which probing technique produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// `/proc/net/*` joined with process file descriptors.
    ProcessTable,
    /// `ss` output.
    SocketSummary,
    /// `netstat` output.
    LegacyListing,
    /// `docker ps` port mappings.
    ContainerRuntime,
    /// A failed local bind.
    BindTest,
    /// The static reserved-port table.
    WellKnown,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ProcessTable => "process_table",
            Self::SocketSummary => "socket_summary",
            Self::LegacyListing => "legacy_listing",
            Self::ContainerRuntime => "container_runtime",
            Self::BindTest => "bind_test",
            Self::WellKnown => "well_known",
        };
        f.write_str(s)
    }
}

/// What the scanner knows about one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// The port number.
    pub port: u16,
    /// Occupancy classification.
    pub status: PortStatus,
    /// Owning process name, when the detector could see it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// Owning process id, when the detector could see it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    /// Publishing container, for container detections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Human-readable summary.
    pub description: String,
    /// Detector that produced this entry.
    pub detection_method: DetectionMethod,
}

impl PortInfo {
    /// Creates an entry with no process or container attribution.
    #[must_use]
    pub fn new(
        port: u16,
        status: PortStatus,
        protocol: Protocol,
        detection_method: DetectionMethod,
    ) -> Self {
        Self {
            port,
            status,
            process_name: None,
            process_id: None,
            container_name: None,
            protocol,
            description: String::new(),
            detection_method,
        }
    }

    /// Attaches the owning process.
    #[must_use]
    pub fn with_process(mut self, name: Option<String>, pid: Option<u32>) -> Self {
        self.process_name = name;
        self.process_id = pid;
        self
    }

    /// Attaches the publishing container.
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Best available label for who holds the port.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.container_name
            .as_deref()
            .or(self.process_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&PortStatus::OccupiedSystem).unwrap();
        assert_eq!(json, "\"occupied_system\"");
        assert_eq!(PortStatus::OccupiedSystem.to_string(), "occupied_system");
    }

    #[test]
    fn test_info_skips_missing_attribution() {
        let info = PortInfo::new(
            3000,
            PortStatus::OccupiedSystem,
            Protocol::Tcp,
            DetectionMethod::BindTest,
        );
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("process_name").is_none());
        assert_eq!(json["detection_method"], "bind_test");
        assert_eq!(json["protocol"], "tcp");
    }

    #[test]
    fn test_owner_prefers_container() {
        let info = PortInfo::new(
            27017,
            PortStatus::OccupiedContainer,
            Protocol::Tcp,
            DetectionMethod::ContainerRuntime,
        )
        .with_process(Some("docker-proxy".into()), Some(812))
        .with_container("mongo");
        assert_eq!(info.owner(), Some("mongo"));
    }
}
