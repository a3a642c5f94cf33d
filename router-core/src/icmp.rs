use router_packets::{
    IcmpMessage, IcmpType, IpProtocol, Ipv4Packet, UnreachableCode, TTL_EXCEEDED_IN_TRANSIT,
};
use std::cmp;
use std::convert::TryFrom;
use std::net::Ipv4Addr;

/// Bytes of the offending datagram's payload quoted after its header in an error message
const QUOTED_PAYLOAD_LEN: usize = 8;

/// Builds the ICMP datagrams a router originates: echo replies and the errors for expired TTLs,
/// missing routes, unresolvable hosts and unserved protocols. Every datagram returned is a
/// freshly allocated bare IPv4 packet with both checksums filled in.
pub struct IcmpGenerator {
    ttl: u8,
}

impl IcmpGenerator {
    /// # Arguments
    ///
    /// * `ttl` - TTL of every generated datagram
    pub fn new(ttl: u8) -> Self {
        IcmpGenerator { ttl }
    }

    /// Answers an echo request. The reply comes from the address the request was sent to, and
    /// carries the request's identifier, sequence number and data unchanged.
    ///
    /// Returns `None` if `request` is not an ICMP echo request.
    pub fn echo_reply(&self, request: &Ipv4Packet) -> Option<Ipv4Packet> {
        let echo = IcmpMessage::try_from(request.to_datagram()).ok()?;
        if echo.icmp_type() != IcmpType::EchoRequest {
            return None;
        }
        let message = IcmpMessage::new(
            IcmpType::EchoReply,
            0,
            echo.rest_of_header(),
            echo.payload(),
        );
        Some(self.datagram(request.dest_addr(), request.src_addr(), message))
    }

    /// Time Exceeded (11/0) for a datagram whose TTL ran out in transit
    pub fn ttl_exceeded_error(&self, src_ip: Ipv4Addr, packet: &Ipv4Packet) -> Option<Ipv4Packet> {
        self.generic_error(
            src_ip,
            packet,
            IcmpType::TimeExceeded,
            TTL_EXCEEDED_IN_TRANSIT,
        )
    }

    /// Destination Unreachable (type 3) with the given code
    pub fn unreachable_error(
        &self,
        src_ip: Ipv4Addr,
        packet: &Ipv4Packet,
        code: UnreachableCode,
    ) -> Option<Ipv4Packet> {
        self.generic_error(
            src_ip,
            packet,
            IcmpType::DestinationUnreachable,
            code as u8,
        )
    }

    /// Common way of constructing an ICMP error message: the 8 byte ICMP header followed by the
    /// offending datagram's header and the first 8 bytes of its payload. Returns `None` if an
    /// error must not be generated and the datagram should be silently discarded instead.
    fn generic_error(
        &self,
        src_ip: Ipv4Addr,
        packet: &Ipv4Packet,
        msg_type: IcmpType,
        msg_code: u8,
    ) -> Option<Ipv4Packet> {
        if !should_generate_error(packet) {
            return None;
        }

        let quoted_len = packet.header_len() + cmp::min(packet.payload().len(), QUOTED_PAYLOAD_LEN);
        let quoted = &packet.datagram()[..quoted_len];
        let message = IcmpMessage::new(msg_type, msg_code, [0; 4], quoted);
        Some(self.datagram(src_ip, packet.src_addr(), message))
    }

    fn datagram(&self, src: Ipv4Addr, dest: Ipv4Addr, mut message: IcmpMessage) -> Ipv4Packet {
        message.set_checksum();

        let mut packet = Ipv4Packet::empty();
        packet.set_ttl(self.ttl);
        packet.set_protocol(IpProtocol::ICMP);
        packet.set_src_addr(src);
        packet.set_dest_addr(dest);
        packet.set_payload(message.message());
        packet.set_checksum();
        packet
    }
}

/// Checks based on RFC 1812 4.3.2.7 (When Not to Send ICMP Errors)
fn should_generate_error(packet: &Ipv4Packet) -> bool {
    // Only the first fragment
    if packet.fragment_offset() != 0 {
        return false;
    }
    // Avoid infinite loops, no errors from errors
    if packet.protocol() == IpProtocol::ICMP {
        match IcmpMessage::try_from(packet.to_datagram()) {
            Ok(message) if !message.icmp_type().is_error() => {}
            _ => return false,
        }
    }
    // Only to a single, real host
    let src = packet.src_addr();
    !(src.is_unspecified() || src.is_broadcast() || src.is_multicast() || src.is_loopback())
}
