use std::fmt;
use std::str::FromStr;

pub type PacketData = Vec<u8>;

pub const IPV4_ETHER_TYPE: u16 = 0x0800;
pub const ARP_ETHER_TYPE: u16 = 0x0806;

/// 48-bit Ethernet hardware address
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr { bytes: [0xff; 6] };

    pub fn new(bytes: [u8; 6]) -> MacAddr {
        MacAddr { bytes }
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = &'static str;

    /// Parses the colon separated hex form, e.g. `de:ad:be:ef:00:01`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut octets = s.split(':');
        for byte in bytes.iter_mut() {
            let octet = octets.next().ok_or("MAC address has fewer than 6 octets")?;
            if octet.is_empty() || octet.len() > 2 {
                return Err("MAC address octet must be 1 or 2 hex digits");
            }
            *byte = u8::from_str_radix(octet, 16).map_err(|_| "MAC address octet is not hex")?;
        }
        if octets.next().is_some() {
            return Err("MAC address has more than 6 octets");
        }
        Ok(MacAddr { bytes })
    }
}

/// Transport protocol carried in the IPv4 protocol field
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpProtocol {
    ICMP,
    TCP,
    UDP,
    Other(u8),
}

impl From<u8> for IpProtocol {
    fn from(protocol: u8) -> Self {
        match protocol {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            other => IpProtocol::Other(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(protocol: IpProtocol) -> Self {
        match protocol {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::Other(other) => other,
        }
    }
}
