//! IP addressing, host and remote transfer helpers.

mod remote;

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error};

use crate::error::SyError;
use crate::execution::{Command, Executor};
use crate::{path, Result};

pub use remote::{download, download_with, Mail, DEFAULT_MAIL_PORT};

/// Default hosts file.
pub const HOSTS_FILE: &str = "/etc/hosts";

/// Whether `address` parses as an IPv4 or IPv6 address.
pub fn is_valid_ip(address: &str) -> bool {
    address.parse::<IpAddr>().is_ok()
}

/// Network address of `address` under `netmask`.
///
/// The netmask may be dotted (`255.255.255.0`) or a prefix length (`24`).
pub fn network_address(address: &str, netmask: &str) -> Result<IpAddr> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| SyError::InvalidAddress(address.to_string()))?;

    match ip {
        IpAddr::V4(v4) => {
            let mask = match netmask.parse::<Ipv4Addr>() {
                Ok(mask) => u32::from(mask),
                Err(_) => prefix_mask_v4(parse_prefix(netmask, 32)?),
            };
            Ok(IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask)))
        }
        IpAddr::V6(v6) => {
            let mask = match netmask.parse::<Ipv6Addr>() {
                Ok(mask) => u128::from(mask),
                Err(_) => prefix_mask_v6(parse_prefix(netmask, 128)?),
            };
            Ok(IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask)))
        }
    }
}

fn parse_prefix(netmask: &str, max: u32) -> Result<u32> {
    netmask
        .parse::<u32>()
        .ok()
        .filter(|p| *p <= max)
        .ok_or_else(|| SyError::InvalidAddress(format!("netmask {netmask}")))
}

fn prefix_mask_v4(prefix: u32) -> u32 {
    u32::MAX.checked_shl(32 - prefix).unwrap_or(0)
}

fn prefix_mask_v6(prefix: u32) -> u128 {
    u128::MAX.checked_shl(128 - prefix).unwrap_or(0)
}

/// Whether a TCP connection to `address:port` succeeds within `timeout`.
pub fn port_is_open(address: IpAddr, port: u16, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&SocketAddr::new(address, port), timeout).is_ok()
}

/// Whether `host` answers a single ping.
pub fn can_ping(executor: &Executor, host: &str) -> Result<bool> {
    let result = executor.run(&Command::new("ping -c 1 {}").arg(host))?;
    Ok(result.success())
}

/// Editor for a hosts(5) style file.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl Default for HostsFile {
    fn default() -> Self {
        Self::new(HOSTS_FILE)
    }
}

impl HostsFile {
    /// Operate on the hosts file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address to hostnames map. Comment lines, short lines and invalid
    /// addresses are skipped.
    pub fn entries(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut hosts = BTreeMap::new();
        for line in path::lines(&self.path)? {
            if line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(address) = fields.next() else {
                continue;
            };
            let names: Vec<String> = fields.map(str::to_string).collect();
            if names.is_empty() {
                continue;
            }
            if !is_valid_ip(address) {
                error!(address, file = %self.path.display(), "bad IP in hosts file");
                continue;
            }
            hosts.insert(address.to_string(), names);
        }
        Ok(hosts)
    }

    /// Add `hostname` for `address`.
    ///
    /// If the address already has an entry its names are replaced, or with
    /// `append_hostname` extended. Otherwise a new line is appended.
    pub fn add_entry(&self, address: &str, hostname: &str, append_hostname: bool) -> Result<()> {
        if !is_valid_ip(address) {
            return Err(SyError::InvalidAddress(address.to_string()));
        }
        let entries = self.entries()?;

        match entries.get(address) {
            Some(existing) => {
                let mut names = if append_hostname {
                    existing.clone()
                } else {
                    Vec::new()
                };
                if !names.iter().any(|n| n == hostname) {
                    names.push(hostname.to_string());
                }
                let line = format!("{address}\t{}\n", names.join(" "));
                let pattern = format!(r"^{}\s", regex::escape(address));
                path::replace_lines(&self.path, &pattern, &line)?;
            }
            None => {
                path::append(&self.path, &format!("{address}\t{hostname}\n"))?;
            }
        }
        debug!(address, hostname, file = %self.path.display(), "updated host entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use tempfile::TempDir;

    #[test]
    fn test_is_valid_ip() {
        assert!(is_valid_ip("10.0.0.1"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("10.0.0.256"));
        assert!(!is_valid_ip("host"));
    }

    #[test]
    fn test_network_address() {
        assert_eq!(
            network_address("192.168.10.77", "255.255.255.0").unwrap(),
            "192.168.10.0".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            network_address("10.1.2.3", "8").unwrap(),
            "10.0.0.0".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            network_address("10.1.2.3", "0").unwrap(),
            "0.0.0.0".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            network_address("2001:db8::1", "32").unwrap(),
            "2001:db8::".parse::<IpAddr>().unwrap()
        );
        assert!(network_address("10.1.2.3", "33").is_err());
        assert!(network_address("nope", "24").is_err());
    }

    #[test]
    fn test_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(port_is_open(localhost, port, Duration::from_secs(1)));

        drop(listener);
        assert!(!port_is_open(localhost, port, Duration::from_secs(1)));
    }

    fn hosts_file(content: &str) -> (TempDir, HostsFile) {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("hosts");
        path::dump(&p, content).unwrap();
        (dir, HostsFile::new(p))
    }

    #[test]
    fn test_entries_skips_junk() {
        let (_dir, hosts) =
            hosts_file("# comment\n127.0.0.1\tlocalhost loghost\nlonely\n999.1.1.1 bad\n");
        let entries = hosts.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["127.0.0.1"], vec!["localhost", "loghost"]);
    }

    #[test]
    fn test_add_entry_new_and_replace() {
        let (_dir, hosts) = hosts_file("127.0.0.1\tlocalhost\n");

        hosts.add_entry("10.0.0.5", "db", false).unwrap();
        assert_eq!(
            path::slurp(hosts.path()).unwrap(),
            "127.0.0.1\tlocalhost\n10.0.0.5\tdb\n"
        );

        hosts.add_entry("10.0.0.5", "db2", false).unwrap();
        assert_eq!(hosts.entries().unwrap()["10.0.0.5"], vec!["db2"]);

        hosts.add_entry("10.0.0.5", "db3", true).unwrap();
        assert_eq!(hosts.entries().unwrap()["10.0.0.5"], vec!["db2", "db3"]);
        assert_eq!(hosts.entries().unwrap()["127.0.0.1"], vec!["localhost"]);
    }

    #[test]
    fn test_add_entry_does_not_touch_prefix_addresses() {
        let (_dir, hosts) = hosts_file("10.0.0.50\tother\n10.0.0.5\tdb\n");
        hosts.add_entry("10.0.0.5", "db2", false).unwrap();
        let entries = hosts.entries().unwrap();
        assert_eq!(entries["10.0.0.50"], vec!["other"]);
        assert_eq!(entries["10.0.0.5"], vec!["db2"]);
    }

    #[test]
    fn test_add_entry_invalid_address() {
        let (_dir, hosts) = hosts_file("");
        assert!(matches!(
            hosts.add_entry("bogus", "x", false),
            Err(SyError::InvalidAddress(_))
        ));
    }
}
