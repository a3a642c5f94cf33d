use crate::*;
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

#[derive(Clone, Debug)]
pub struct Ipv4Packet {
    pub data: PacketData,
    pub layer2_offset: Option<usize>,
    pub layer3_offset: usize,
    pub payload_offset: usize,
}

impl Ipv4Packet {
    fn new(
        mut data: PacketData,
        layer2_offset: Option<usize>,
        layer3_offset: usize,
    ) -> Result<Ipv4Packet, &'static str> {
        // Header of Ethernet Frame: 14 bytes
        // Header of IPv4 Frame: 20 bytes
        if data.len() < layer3_offset + IPV4_HEADER_LEN {
            return Err("Data is too short to be an IPv4 Packet");
        }

        // Check version number
        let version: u8 = (data[layer3_offset] & 0xF0) >> 4;
        if version != 4 {
            return Err("Packet has incorrect version, is not Ipv4Packet");
        }

        // This is the header length in 32bit words
        let ihl = (data[layer3_offset] & 0x0F) as usize;
        let payload_offset = layer3_offset + (ihl * 4);
        if ihl < 5 {
            return Err("Packet has an IHL shorter than the minimum header");
        }

        // TotalLen is the 3rd and 4th byte of the IP Header
        let total_len = u16::from_be_bytes(
            data[layer3_offset + 2..=layer3_offset + 3]
                .try_into()
                .unwrap(),
        ) as usize;
        if total_len < ihl * 4 {
            return Err("Packet total length is shorter than its header");
        }
        if data.len() < layer3_offset + total_len {
            return Err("Packet is shorter than its total length field");
        }

        // Anything past the total length is link layer padding
        data.truncate(layer3_offset + total_len);

        Ok(Ipv4Packet {
            data,
            layer2_offset,
            layer3_offset,
            payload_offset,
        })
    }

    /// Decodes a bare datagram that starts at the IP header.
    pub fn from_datagram(data: PacketData) -> Result<Ipv4Packet, &'static str> {
        Ipv4Packet::new(data, None, 0)
    }

    /// Returns a bare 20 byte header with version, IHL and total length set, everything else
    /// zeroed.
    pub fn empty() -> Ipv4Packet {
        let mut data = vec![0; IPV4_HEADER_LEN];
        data[0] = 0x45;
        data[2..4].copy_from_slice(&(IPV4_HEADER_LEN as u16).to_be_bytes());
        Ipv4Packet {
            data,
            layer2_offset: None,
            layer3_offset: 0,
            payload_offset: IPV4_HEADER_LEN,
        }
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        let data: [u8; 4] = self.data[self.layer3_offset + 12..self.layer3_offset + 16]
            .try_into()
            .unwrap();
        Ipv4Addr::from(data)
    }

    pub fn set_src_addr(&mut self, addr: Ipv4Addr) {
        self.data[self.layer3_offset + 12..self.layer3_offset + 16].copy_from_slice(&addr.octets());
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        let data: [u8; 4] = self.data[self.layer3_offset + 16..self.layer3_offset + 20]
            .try_into()
            .unwrap();
        Ipv4Addr::from(data)
    }

    pub fn set_dest_addr(&mut self, addr: Ipv4Addr) {
        self.data[self.layer3_offset + 16..self.layer3_offset + 20].copy_from_slice(&addr.octets());
    }

    pub fn ihl(&self) -> u8 {
        self.data[self.layer3_offset] & 0x0F
    }

    pub fn header_len(&self) -> usize {
        self.payload_offset - self.layer3_offset
    }

    /// The header, options included
    pub fn header(&self) -> &[u8] {
        &self.data[self.layer3_offset..self.payload_offset]
    }

    /// Header and payload, without any layer 2 bytes in front
    pub fn datagram(&self) -> &[u8] {
        &self.data[self.layer3_offset..]
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.payload_offset..]
    }

    /// Replaces the payload and updates the total length field. The checksum is left stale.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data.truncate(self.payload_offset);
        self.data.reserve_exact(payload.len());
        self.data.extend_from_slice(payload);

        let total_len = (self.header_len() + payload.len()) as u16;
        self.data[self.layer3_offset + 2..=self.layer3_offset + 3]
            .copy_from_slice(&total_len.to_be_bytes());
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 2..=self.layer3_offset + 3]
                .try_into()
                .unwrap(),
        )
    }

    pub fn identification(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 4..=self.layer3_offset + 5]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_identification(&mut self, id: u16) {
        self.data[self.layer3_offset + 4..=self.layer3_offset + 5]
            .copy_from_slice(&id.to_be_bytes());
    }

    /// Returns tuple of (Don't Fragment, More Fragments)
    pub fn flags(&self) -> (bool, bool) {
        let df = (self.data[self.layer3_offset + 6] & 0x40) != 0;
        let mf = (self.data[self.layer3_offset + 6] & 0x20) != 0;
        (df, mf)
    }

    /// Offset of this fragment in 8 byte units
    pub fn fragment_offset(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 6..=self.layer3_offset + 7]
                .try_into()
                .unwrap(),
        ) & 0x1FFF
    }

    pub fn ttl(&self) -> u8 {
        self.data[self.layer3_offset + 8]
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.data[self.layer3_offset + 8] = ttl;
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from(self.data[self.layer3_offset + 9])
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) {
        self.data[self.layer3_offset + 9] = u8::from(protocol);
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 10..=self.layer3_offset + 11]
                .try_into()
                .unwrap(),
        )
    }

    /// Verifies the header checksum, options included.
    pub fn validate_checksum(&self) -> bool {
        verify_checksum(self.header())
    }

    /// Calculates what the checksum should be set to given the current header
    pub fn calculate_checksum(&self) -> u16 {
        let mut header = self.header().to_vec();
        header[10] = 0;
        header[11] = 0;
        checksum(&header)
    }

    /// Sets checksum field to valid value
    pub fn set_checksum(&mut self) {
        let new_checksum = self.calculate_checksum();
        self.data[self.layer3_offset + 10..=self.layer3_offset + 11]
            .copy_from_slice(&new_checksum.to_be_bytes());
    }

    /// Copies the datagram out into a new bare packet, dropping any layer 2 bytes.
    pub fn to_datagram(&self) -> Ipv4Packet {
        Ipv4Packet {
            data: self.datagram().to_vec(),
            layer2_offset: None,
            layer3_offset: 0,
            payload_offset: self.header_len(),
        }
    }
}

/// Ipv4Packets are considered the same if they have the same data from the layer 3
/// header and onward.
impl PartialEq for Ipv4Packet {
    fn eq(&self, other: &Self) -> bool {
        self.data[self.layer3_offset..] == other.data[other.layer3_offset..]
    }
}

impl Eq for Ipv4Packet {}

impl TryFrom<EthernetFrame> for Ipv4Packet {
    type Error = &'static str;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != IPV4_ETHER_TYPE {
            return Err("Frame does not have IPv4 ether type");
        }
        Ipv4Packet::new(frame.data, Some(0), frame.payload_offset)
    }
}
