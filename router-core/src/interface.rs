use crate::ConfigError;
use router_packets::MacAddr;
use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// A router port: its name, link address and IP address
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interface {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

impl Interface {
    pub fn new(name: &str, mac: MacAddr, ip: Ipv4Addr) -> Self {
        Interface {
            name: String::from(name),
            mac,
            ip,
        }
    }
}

/// Read only after construction.
#[derive(Clone, Debug, Default)]
pub struct InterfaceTable {
    interfaces: Vec<Interface>,
    by_name: HashMap<String, usize>,
}

impl InterfaceTable {
    pub fn new(interfaces: Vec<Interface>) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::with_capacity(interfaces.len());
        for (index, interface) in interfaces.iter().enumerate() {
            if by_name.insert(interface.name.clone(), index).is_some() {
                return Err(ConfigError::DuplicateInterface(interface.name.clone()));
            }
        }
        Ok(InterfaceTable {
            interfaces,
            by_name,
        })
    }

    /// Parses one interface per line, `<name> <mac> <ip>`, e.g.
    ///
    /// ```text
    /// eth0 02:00:00:00:00:01 10.0.1.1
    /// ```
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut interfaces = vec![];
        for (index, line) in config_lines(text) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(ConfigError::Parse {
                    line: index,
                    reason: format!("expected 3 fields, found {}", fields.len()),
                });
            }
            let mac = fields[1]
                .parse::<MacAddr>()
                .map_err(|_| ConfigError::Address(String::from(fields[1])))?;
            let ip = parse_ipv4(fields[2])?;
            interfaces.push(Interface::new(fields[0], mac, ip));
        }
        InterfaceTable::new(interfaces)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        InterfaceTable::parse(&fs::read_to_string(path)?)
    }

    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.by_name.get(name).map(|&index| &self.interfaces[index])
    }

    /// The interface that owns `ip`, if any
    pub fn owner_of(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|interface| interface.ip == ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// Numbered (from 1), trimmed, non-empty, non-comment lines
pub(crate) fn config_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
}

pub(crate) fn parse_ipv4(text: &str) -> Result<Ipv4Addr, ConfigError> {
    text.parse::<Ipv4Addr>()
        .map_err(|_| ConfigError::Address(String::from(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> InterfaceTable {
        InterfaceTable::new(vec![
            Interface::new("eth0", MacAddr::new([2, 0, 0, 0, 0, 1]), Ipv4Addr::new(10, 0, 1, 1)),
            Interface::new("eth1", MacAddr::new([2, 0, 0, 0, 0, 2]), Ipv4Addr::new(10, 0, 2, 1)),
        ])
        .unwrap()
    }

    #[test]
    fn lookup_by_name_and_address() {
        let table = table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("eth1").unwrap().ip, Ipv4Addr::new(10, 0, 2, 1));
        assert!(table.get("eth2").is_none());
        assert_eq!(table.owner_of(Ipv4Addr::new(10, 0, 1, 1)).unwrap().name, "eth0");
        assert!(table.owner_of(Ipv4Addr::new(10, 0, 1, 2)).is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        let result = InterfaceTable::new(vec![
            Interface::new("eth0", mac, Ipv4Addr::new(10, 0, 1, 1)),
            Interface::new("eth0", mac, Ipv4Addr::new(10, 0, 2, 1)),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateInterface(name)) if name == "eth0"));
    }

    #[test]
    fn parse_text() {
        let text = "
            # name  mac                ip
            eth0 02:00:00:00:00:01 10.0.1.1
            eth1 02:00:00:00:00:02 10.0.2.1   # uplink
        ";
        let table = InterfaceTable::parse(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("eth0").unwrap().mac,
            MacAddr::new([2, 0, 0, 0, 0, 1])
        );
        assert_eq!(table.get("eth1").unwrap().ip, Ipv4Addr::new(10, 0, 2, 1));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            InterfaceTable::parse("eth0 02:00:00:00:00:01"),
            Err(ConfigError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            InterfaceTable::parse("eth0 nope 10.0.1.1"),
            Err(ConfigError::Address(_))
        ));
        assert!(matches!(
            InterfaceTable::parse("\neth0 02:00:00:00:00:01 10.0.1"),
            Err(ConfigError::Address(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = InterfaceTable::from_file("/nonexistent/router/interfaces");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
