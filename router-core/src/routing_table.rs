use crate::interface::{config_lines, parse_ipv4};
use crate::ConfigError;
use cidr::{Cidr, Inet, Ipv4Cidr, Ipv4Inet};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// A static route. A gateway of `0.0.0.0` means the destination is directly connected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteEntry {
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub interface: String,
}

impl RouteEntry {
    pub fn new(prefix: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr, interface: &str) -> Self {
        RouteEntry {
            prefix,
            mask,
            gateway,
            interface: String::from(interface),
        }
    }

    /// The address to resolve for a datagram headed to `destination` over this route
    pub fn next_hop(&self, destination: Ipv4Addr) -> Ipv4Addr {
        if self.gateway.is_unspecified() {
            destination
        } else {
            self.gateway
        }
    }

    /// The network this route covers. Host bits set in `prefix` are ignored.
    fn network(&self) -> Result<Ipv4Cidr, ConfigError> {
        let len = u32::from(self.mask).count_ones() as u8;
        let network = Ipv4Inet::new(self.prefix, len)
            .map_err(|_| ConfigError::NonContiguousMask(self.mask))?
            .network();
        if network.mask() != self.mask {
            return Err(ConfigError::NonContiguousMask(self.mask));
        }
        Ok(network)
    }
}

/// An ordered, immutable list of routes, each paired with the network it covers.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    entries: Vec<(Ipv4Cidr, RouteEntry)>,
}

impl RoutingTable {
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, ConfigError> {
        let entries = entries
            .into_iter()
            .map(|entry| Ok((entry.network()?, entry)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(RoutingTable { entries })
    }

    /// Parses the classic `rtable` format, one route per line:
    ///
    /// ```text
    /// <destination> <gateway> <mask> <interface>
    /// 0.0.0.0       10.0.1.100 0.0.0.0       eth0
    /// 192.168.2.0   0.0.0.0    255.255.255.0 eth1
    /// ```
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = vec![];
        for (index, line) in config_lines(text) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return Err(ConfigError::Parse {
                    line: index,
                    reason: format!("expected 4 fields, found {}", fields.len()),
                });
            }
            entries.push(RouteEntry::new(
                parse_ipv4(fields[0])?,
                parse_ipv4(fields[2])?,
                parse_ipv4(fields[1])?,
                fields[3],
            ));
        }
        RoutingTable::new(entries)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        RoutingTable::parse(&fs::read_to_string(path)?)
    }

    /// Longest prefix match. Among matching routes the longest network wins; when two matching
    /// routes share a length, the one loaded first wins.
    pub fn lookup(&self, destination: Ipv4Addr) -> Option<&RouteEntry> {
        let mut best: Option<&(Ipv4Cidr, RouteEntry)> = None;
        for route in self.entries.iter() {
            let (network, _) = route;
            if !network.contains(&destination) {
                continue;
            }
            match best {
                Some((current, _)) if current.network_length() >= network.network_length() => {}
                _ => best = Some(route),
            }
        }
        best.map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
