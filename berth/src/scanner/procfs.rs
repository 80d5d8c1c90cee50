//! Process-table detector for Linux.
//!
//! Listening sockets come from `/proc/net/{tcp,tcp6,udp,udp6}`. Each socket
//! inode is then matched against the `socket:[inode]` links under
//! `/proc/<pid>/fd` to recover the owning process, whose name is read from
//! `/proc/<pid>/comm`. Processes we may not inspect are skipped silently.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::port::{DetectionMethod, PortInfo, PortStatus, Protocol};
use crate::{Error, Result};

const TCP_LISTEN: &str = "0A";
const UDP_UNCONNECTED: &str = "07";

/// One bound socket from a `/proc/net` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcSocket {
    /// Local port.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Socket inode, used to find the owner.
    pub inode: u64,
}

/// Parses the contents of a `/proc/net/tcp*` or `/proc/net/udp*` file.
///
/// Only listening TCP sockets and unconnected UDP sockets are returned.
#[must_use]
pub fn parse_net_table(content: &str, protocol: Protocol) -> Vec<ProcSocket> {
    let wanted_state = match protocol {
        Protocol::Tcp => TCP_LISTEN,
        Protocol::Udp => UDP_UNCONNECTED,
    };

    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != wanted_state {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            let inode = fields[9].parse().ok()?;
            (port != 0).then_some(ProcSocket {
                port,
                protocol,
                inode,
            })
        })
        .collect()
}

/// Extracts the inode from a `socket:[12345]` fd link target.
#[must_use]
pub fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Maps socket inodes to `(pid, process name)` by walking `<root>/<pid>/fd`.
fn inode_owners(proc_root: &Path) -> HashMap<u64, (u32, Option<String>)> {
    let mut owners = HashMap::new();
    let Ok(entries) = fs::read_dir(proc_root) else {
        return owners;
    };

    for entry in entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        let mut name: Option<Option<String>> = None;
        for fd in fds.flatten() {
            let Ok(target) = fs::read_link(fd.path()) else {
                continue;
            };
            let Some(inode) = target.to_str().and_then(socket_inode) else {
                continue;
            };
            let owner_name = name
                .get_or_insert_with(|| {
                    fs::read_to_string(entry.path().join("comm"))
                        .ok()
                        .map(|comm| comm.trim().to_string())
                })
                .clone();
            owners.entry(inode).or_insert((pid, owner_name));
        }
    }
    owners
}

/// Runs the process-table pass rooted at `proc_root` (normally `/proc`).
///
/// # Errors
///
/// Returns [`Error::DetectionUnavailable`] if none of the socket tables can
/// be read.
pub fn scan(proc_root: &Path) -> Result<Vec<PortInfo>> {
    let tables = [
        ("tcp", Protocol::Tcp),
        ("tcp6", Protocol::Tcp),
        ("udp", Protocol::Udp),
        ("udp6", Protocol::Udp),
    ];

    let mut sockets = Vec::new();
    let mut readable = 0;
    for (file, protocol) in tables {
        if let Ok(content) = fs::read_to_string(proc_root.join("net").join(file)) {
            readable += 1;
            sockets.extend(parse_net_table(&content, protocol));
        }
    }
    if readable == 0 {
        return Err(Error::DetectionUnavailable {
            method: DetectionMethod::ProcessTable.to_string(),
            reason: format!("no socket tables under {}", proc_root.display()),
        });
    }

    let owners = inode_owners(proc_root);
    Ok(sockets
        .into_iter()
        .map(|socket| {
            let (pid, name) = owners
                .get(&socket.inode)
                .map_or((None, None), |(pid, name)| (Some(*pid), name.clone()));
            let description = name
                .as_deref()
                .map_or_else(|| "listening socket".to_string(), |n| format!("used by {n}"));
            PortInfo::new(
                socket.port,
                PortStatus::OccupiedSystem,
                socket.protocol,
                DetectionMethod::ProcessTable,
            )
            .with_process(name, pid)
            .with_description(description)
        })
        .collect())
}
