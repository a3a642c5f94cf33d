use crate::*;
use std::convert::{TryFrom, TryInto};

/// Type, code, checksum and the 4 byte rest-of-header field
pub const ICMP_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    SourceQuench,
    Redirect,
    EchoRequest,
    TimeExceeded,
    ParameterProblem,
    Other(u8),
}

impl IcmpType {
    /// Error messages must never trigger another ICMP error (RFC 1122 3.2.2)
    pub fn is_error(self) -> bool {
        matches!(
            self,
            IcmpType::DestinationUnreachable
                | IcmpType::SourceQuench
                | IcmpType::Redirect
                | IcmpType::TimeExceeded
                | IcmpType::ParameterProblem
        )
    }
}

impl From<u8> for IcmpType {
    fn from(icmp_type: u8) -> Self {
        match icmp_type {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            4 => IcmpType::SourceQuench,
            5 => IcmpType::Redirect,
            8 => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            12 => IcmpType::ParameterProblem,
            other => IcmpType::Other(other),
        }
    }
}

impl From<IcmpType> for u8 {
    fn from(icmp_type: IcmpType) -> Self {
        match icmp_type {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::SourceQuench => 4,
            IcmpType::Redirect => 5,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
            IcmpType::ParameterProblem => 12,
            IcmpType::Other(other) => other,
        }
    }
}

/// Codes for `IcmpType::DestinationUnreachable`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnreachableCode {
    Net = 0,
    Host = 1,
    Protocol = 2,
    Port = 3,
}

/// Code for `IcmpType::TimeExceeded` raised by a router
pub const TTL_EXCEEDED_IN_TRANSIT: u8 = 0;

#[derive(Clone, Debug)]
pub struct IcmpMessage {
    pub data: PacketData,
    pub layer3_offset: Option<usize>,
    pub layer4_offset: usize,
}

impl IcmpMessage {
    /// Allocates a bare message, checksum left zeroed.
    pub fn new(icmp_type: IcmpType, code: u8, rest_of_header: [u8; 4], payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());
        data.push(u8::from(icmp_type));
        data.push(code);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&rest_of_header);
        data.extend_from_slice(payload);
        IcmpMessage {
            data,
            layer3_offset: None,
            layer4_offset: 0,
        }
    }

    pub fn icmp_type(&self) -> IcmpType {
        IcmpType::from(self.data[self.layer4_offset])
    }

    pub fn code(&self) -> u8 {
        self.data[self.layer4_offset + 1]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer4_offset + 2..=self.layer4_offset + 3]
                .try_into()
                .unwrap(),
        )
    }

    pub fn rest_of_header(&self) -> [u8; 4] {
        self.data[self.layer4_offset + 4..self.layer4_offset + 8]
            .try_into()
            .unwrap()
    }

    /// Echo identifier, only meaningful for echo request/reply
    pub fn identifier(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer4_offset + 4..=self.layer4_offset + 5]
                .try_into()
                .unwrap(),
        )
    }

    /// Echo sequence number, only meaningful for echo request/reply
    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer4_offset + 6..=self.layer4_offset + 7]
                .try_into()
                .unwrap(),
        )
    }

    /// Everything after the 8 byte header
    pub fn payload(&self) -> &[u8] {
        &self.data[self.layer4_offset + ICMP_HEADER_LEN..]
    }

    /// The whole ICMP message, header included
    pub fn message(&self) -> &[u8] {
        &self.data[self.layer4_offset..]
    }

    /// The checksum covers the whole message
    pub fn validate_checksum(&self) -> bool {
        verify_checksum(self.message())
    }

    pub fn set_checksum(&mut self) {
        self.data[self.layer4_offset + 2] = 0;
        self.data[self.layer4_offset + 3] = 0;
        let new_checksum = checksum(self.message());
        self.data[self.layer4_offset + 2..=self.layer4_offset + 3]
            .copy_from_slice(&new_checksum.to_be_bytes());
    }
}

impl TryFrom<Ipv4Packet> for IcmpMessage {
    type Error = &'static str;

    fn try_from(packet: Ipv4Packet) -> Result<Self, Self::Error> {
        if packet.protocol() != IpProtocol::ICMP {
            return Err("Protocol is incorrect, since it isn't ICMP");
        }
        if packet.payload().len() < ICMP_HEADER_LEN {
            return Err("Payload is too short to contain an ICMP header");
        }
        Ok(IcmpMessage {
            layer3_offset: Some(packet.layer3_offset),
            layer4_offset: packet.payload_offset,
            data: packet.data,
        })
    }
}
