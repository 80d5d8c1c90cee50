//! One-time capability detection.
//!
//! Instead of each pass discovering at scan time that its tool is missing,
//! the scanner asks once which detectors and which artifact serializers this
//! host supports and then only runs those.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::command::CommandRunner;
use crate::output::ArtifactFormat;
use crate::port::DetectionMethod;

/// A scan pass, in the order passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    /// `/proc` socket tables.
    ProcessTable,
    /// `ss`.
    SocketSummary,
    /// `netstat`.
    LegacyListing,
    /// `docker ps`.
    ContainerRuntime,
    /// Local bind probes.
    BindTest,
}

impl Detector {
    /// Every detector in pass order.
    pub const ALL: [Self; 5] = [
        Self::ProcessTable,
        Self::SocketSummary,
        Self::LegacyListing,
        Self::ContainerRuntime,
        Self::BindTest,
    ];

    /// The detection method recorded on results from this pass.
    #[must_use]
    pub const fn method(self) -> DetectionMethod {
        match self {
            Self::ProcessTable => DetectionMethod::ProcessTable,
            Self::SocketSummary => DetectionMethod::SocketSummary,
            Self::LegacyListing => DetectionMethod::LegacyListing,
            Self::ContainerRuntime => DetectionMethod::ContainerRuntime,
            Self::BindTest => DetectionMethod::BindTest,
        }
    }

    /// External program this pass needs, if any.
    #[must_use]
    pub const fn program(self) -> Option<&'static str> {
        match self {
            Self::SocketSummary => Some("ss"),
            Self::LegacyListing => Some("netstat"),
            Self::ContainerRuntime => Some("docker"),
            Self::ProcessTable | Self::BindTest => None,
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.method(), f)
    }
}

impl FromStr for Detector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|d| d.to_string() == normalized)
            .ok_or_else(|| format!("unknown detector: {s}"))
    }
}

/// What this host can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Usable detectors, in pass order.
    pub detectors: Vec<Detector>,
    /// Detectors that were disabled or whose tool is missing.
    pub missing: Vec<Detector>,
    /// Artifact formats that can be produced natively.
    pub serializers: Vec<ArtifactFormat>,
}

impl Capabilities {
    /// Probes the host once.
    ///
    /// `proc_root` is normally `/proc`; a detector listed in `disabled` is
    /// reported missing without being probed.
    pub fn detect<R: CommandRunner>(runner: &R, proc_root: &Path, disabled: &[Detector]) -> Self {
        let mut detectors = Vec::new();
        let mut missing = Vec::new();

        for detector in Detector::ALL {
            let usable = !disabled.contains(&detector)
                && match detector {
                    Detector::ProcessTable => proc_root.join("net").join("tcp").is_file(),
                    Detector::BindTest => true,
                    other => other.program().is_some_and(|p| runner.exists(p)),
                };
            if usable {
                detectors.push(detector);
            } else {
                missing.push(detector);
            }
        }

        log::debug!(
            "detectors available: [{}], missing: [{}]",
            join(&detectors),
            join(&missing)
        );

        Self {
            detectors,
            missing,
            serializers: ArtifactFormat::probe(),
        }
    }

    /// Capabilities with exactly the given detectors, for tests and
    /// reduced-capability setups.
    #[must_use]
    pub fn only(detectors: &[Detector]) -> Self {
        Self {
            detectors: detectors.to_vec(),
            missing: Detector::ALL
                .into_iter()
                .filter(|d| !detectors.contains(d))
                .collect(),
            serializers: ArtifactFormat::probe(),
        }
    }

    /// Returns `true` if `detector` will run.
    #[must_use]
    pub fn has(&self, detector: Detector) -> bool {
        self.detectors.contains(&detector)
    }

    /// Returns `true` if any pass other than the bind test is usable.
    #[must_use]
    pub fn has_tool_detectors(&self) -> bool {
        self.detectors.iter().any(|d| *d != Detector::BindTest)
    }

    /// Returns `true` if `format` can be written natively.
    #[must_use]
    pub fn supports(&self, format: ArtifactFormat) -> bool {
        self.serializers.contains(&format)
    }
}

fn join(detectors: &[Detector]) -> String {
    detectors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::super::command::MockCommandRunner;
    use super::*;

    #[test]
    fn test_detector_parse() {
        assert_eq!(
            "container-runtime".parse::<Detector>().unwrap(),
            Detector::ContainerRuntime
        );
        assert_eq!(" BIND_TEST ".parse::<Detector>().unwrap(), Detector::BindTest);
        assert!("lsof".parse::<Detector>().is_err());
    }

    #[test]
    fn test_detect_respects_missing_tools() {
        let mut runner = MockCommandRunner::new();
        runner.expect_exists().returning(|program| program == "ss");
        let dir = tempfile::tempdir().unwrap();

        let caps = Capabilities::detect(&runner, dir.path(), &[]);
        assert_eq!(caps.detectors, vec![Detector::SocketSummary, Detector::BindTest]);
        assert!(caps.missing.contains(&Detector::ProcessTable));
        assert!(caps.missing.contains(&Detector::ContainerRuntime));
        assert!(caps.has_tool_detectors());
    }

    #[test]
    fn test_detect_respects_disabled() {
        let mut runner = MockCommandRunner::new();
        runner.expect_exists().returning(|_| true);
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("net")).unwrap();
        std::fs::write(dir.path().join("net/tcp"), "header\n").unwrap();

        let caps = Capabilities::detect(
            &runner,
            dir.path(),
            &[Detector::ContainerRuntime, Detector::LegacyListing],
        );
        assert_eq!(
            caps.detectors,
            vec![
                Detector::ProcessTable,
                Detector::SocketSummary,
                Detector::BindTest
            ]
        );
    }

    #[test]
    fn test_bind_only() {
        let caps = Capabilities::only(&[Detector::BindTest]);
        assert!(!caps.has_tool_detectors());
        assert_eq!(caps.missing.len(), 4);
        assert!(caps.supports(ArtifactFormat::Json));
    }
}
