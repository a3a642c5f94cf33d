use crate::{EthernetFrame, MacAddr, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

pub enum ArpHardwareType {
    Ethernet = 1,
}

const HARDWARE_TYPE_RANGE: (usize, usize) = (0, 2);
const PROTOCOL_TYPE_RANGE: (usize, usize) = (2, 4);
const HARDWARE_ADDR_LEN_RANGE: (usize, usize) = (4, 5);
const PROTOCOL_ADDR_LEN_RANGE: (usize, usize) = (5, 6);
const OPCODE_RANGE: (usize, usize) = (6, 8);

/// ARP payload length for Ethernet hardware and IPv4 protocol addresses
pub const ARP_IPV4_PAYLOAD_LEN: usize = 28;

///
/// EthernetFrame wrapper with getters/setters for the packet structure described in RFC 826
/// https://tools.ietf.org/html/rfc826
///
#[derive(Clone, Debug)]
pub struct ArpFrame {
    frame: EthernetFrame,
}

impl ArpFrame {
    ///
    /// Constructs a new, empty packet with a payload big enough for all ARP fields,
    /// given some hardware/protocol address lengths.
    ///
    pub fn new(hardware_addr_len: u8, protocol_addr_len: u8) -> Self {
        let payload_len = 8 + (2 * hardware_addr_len as usize) + (2 * protocol_addr_len as usize);
        let payload: Vec<u8> = vec![0; payload_len];

        let mut frame = EthernetFrame::empty();
        frame.set_payload(payload.as_slice());
        frame.set_ether_type(ARP_ETHER_TYPE);

        let mut arp_frame = ArpFrame { frame };
        arp_frame.set_hardware_addr_len(hardware_addr_len);
        arp_frame.set_protocol_addr_len(protocol_addr_len);
        arp_frame
    }

    ///
    /// Builds a complete Ethernet/IPv4 ARP frame. Requests are broadcast with a zeroed target
    /// hardware address, replies are unicast to the target.
    ///
    pub fn ipv4(
        op: ArpOp,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        let mut arp_frame = ArpFrame::new(6, 4);
        arp_frame.set_hardware_type(ArpHardwareType::Ethernet as u16);
        arp_frame.set_protocol_type(IPV4_ETHER_TYPE);
        arp_frame.set_opcode(op as u16);
        arp_frame.set_sender_hardware_addr(sender_mac);
        arp_frame.set_sender_protocol_addr(sender_ip);
        arp_frame.set_target_protocol_addr(target_ip);

        arp_frame.frame.set_src_mac(sender_mac);
        match op {
            ArpOp::Request => {
                arp_frame.set_target_hardware_addr(MacAddr::default());
                arp_frame.frame.set_dest_mac(MacAddr::BROADCAST);
            }
            ArpOp::Reply => {
                arp_frame.set_target_hardware_addr(target_mac);
                arp_frame.frame.set_dest_mac(target_mac);
            }
        }
        arp_frame
    }

    pub fn hardware_type(&self) -> u16 {
        let (start, end) = HARDWARE_TYPE_RANGE;
        u16::from_be_bytes(self.arp_data(start, end).try_into().unwrap())
    }

    pub fn protocol_type(&self) -> u16 {
        let (start, end) = PROTOCOL_TYPE_RANGE;
        u16::from_be_bytes(self.arp_data(start, end).try_into().unwrap())
    }

    pub fn hardware_addr_len(&self) -> u8 {
        let (start, _) = HARDWARE_ADDR_LEN_RANGE;
        self.arp_data(start, start + 1)[0]
    }

    pub fn protocol_addr_len(&self) -> u8 {
        let (start, _) = PROTOCOL_ADDR_LEN_RANGE;
        self.arp_data(start, start + 1)[0]
    }

    pub fn opcode(&self) -> u16 {
        let (start, end) = OPCODE_RANGE;
        u16::from_be_bytes(self.arp_data(start, end).try_into().unwrap())
    }

    pub fn sender_hardware_addr(&self) -> &[u8] {
        let (start, end) = self.sender_hardware_addr_range();
        self.arp_data(start, end)
    }

    pub fn sender_protocol_addr(&self) -> &[u8] {
        let (start, end) = self.sender_protocol_addr_range();
        self.arp_data(start, end)
    }

    pub fn target_hardware_addr(&self) -> &[u8] {
        let (start, end) = self.target_hardware_addr_range();
        self.arp_data(start, end)
    }

    pub fn target_protocol_addr(&self) -> &[u8] {
        let (start, end) = self.target_protocol_addr_range();
        self.arp_data(start, end)
    }

    /// True for Ethernet hardware addresses carrying IPv4 protocol addresses, the only
    /// combination the typed getters below understand.
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.hardware_type() == ArpHardwareType::Ethernet as u16
            && self.protocol_type() == IPV4_ETHER_TYPE
            && self.hardware_addr_len() == 6
            && self.protocol_addr_len() == 4
    }

    pub fn sender_mac_addr(&self) -> Option<MacAddr> {
        mac_addr(self.sender_hardware_addr())
    }

    pub fn sender_ipv4_addr(&self) -> Option<Ipv4Addr> {
        ipv4_addr(self.sender_protocol_addr())
    }

    pub fn target_mac_addr(&self) -> Option<MacAddr> {
        mac_addr(self.target_hardware_addr())
    }

    pub fn target_ipv4_addr(&self) -> Option<Ipv4Addr> {
        ipv4_addr(self.target_protocol_addr())
    }

    pub fn set_hardware_type(&mut self, htype: u16) {
        let (start, end) = HARDWARE_TYPE_RANGE;
        self.set_arp_data(&htype.to_be_bytes(), start, end);
    }

    pub fn set_protocol_type(&mut self, ptype: u16) {
        let (start, end) = PROTOCOL_TYPE_RANGE;
        self.set_arp_data(&ptype.to_be_bytes(), start, end);
    }

    pub fn set_hardware_addr_len(&mut self, len: u8) {
        let (start, end) = HARDWARE_ADDR_LEN_RANGE;
        self.set_arp_data(&[len], start, end);
    }

    pub fn set_protocol_addr_len(&mut self, len: u8) {
        let (start, end) = PROTOCOL_ADDR_LEN_RANGE;
        self.set_arp_data(&[len], start, end);
    }

    pub fn set_opcode(&mut self, code: u16) {
        let (start, end) = OPCODE_RANGE;
        self.set_arp_data(&code.to_be_bytes(), start, end);
    }

    pub fn set_sender_hardware_addr(&mut self, addr: MacAddr) {
        let (start, end) = self.sender_hardware_addr_range();
        self.set_arp_data(&addr.bytes, start, end);
    }

    pub fn set_sender_protocol_addr(&mut self, ip_addr: Ipv4Addr) {
        let (start, end) = self.sender_protocol_addr_range();
        self.set_arp_data(&ip_addr.octets(), start, end);
    }

    pub fn set_target_hardware_addr(&mut self, addr: MacAddr) {
        let (start, end) = self.target_hardware_addr_range();
        self.set_arp_data(&addr.bytes, start, end);
    }

    pub fn set_target_protocol_addr(&mut self, ip_addr: Ipv4Addr) {
        let (start, end) = self.target_protocol_addr_range();
        self.set_arp_data(&ip_addr.octets(), start, end);
    }

    pub fn frame(&self) -> &EthernetFrame {
        &self.frame
    }

    // Move ownership of the frame back to the caller
    pub fn into_frame(self) -> EthernetFrame {
        self.frame
    }

    // Returns the bytes in the ethernet frame between start and end, exclusive
    fn arp_data(&self, start: usize, end: usize) -> &[u8] {
        let frame_offset_start = self.frame.payload_offset + start;
        let frame_offset_end = self.frame.payload_offset + end;
        &self.frame.data[frame_offset_start..frame_offset_end]
    }

    // Panics if `bytes` is not exactly `end - start` long
    fn set_arp_data(&mut self, bytes: &[u8], start: usize, end: usize) {
        let frame_offset_start = self.frame.payload_offset + start;
        let frame_offset_end = self.frame.payload_offset + end;
        self.frame.data[frame_offset_start..frame_offset_end].copy_from_slice(bytes);
    }

    fn sender_hardware_addr_range(&self) -> (usize, usize) {
        let hlen = self.hardware_addr_len() as usize;

        let start = 8;
        let end = start + hlen;
        (start, end)
    }

    fn sender_protocol_addr_range(&self) -> (usize, usize) {
        let hlen = self.hardware_addr_len() as usize;
        let plen = self.protocol_addr_len() as usize;

        let start = 8 + hlen;
        let end = start + plen;
        (start, end)
    }

    fn target_hardware_addr_range(&self) -> (usize, usize) {
        let hlen = self.hardware_addr_len() as usize;
        let plen = self.protocol_addr_len() as usize;

        let start = 8 + hlen + plen;
        let end = start + hlen;
        (start, end)
    }

    fn target_protocol_addr_range(&self) -> (usize, usize) {
        let hlen = self.hardware_addr_len() as usize;
        let plen = self.protocol_addr_len() as usize;

        let start = 8 + (2 * hlen) + plen;
        let end = start + plen;
        (start, end)
    }
}

fn mac_addr(bytes: &[u8]) -> Option<MacAddr> {
    <[u8; 6]>::try_from(bytes).ok().map(MacAddr::new)
}

fn ipv4_addr(bytes: &[u8]) -> Option<Ipv4Addr> {
    <[u8; 4]>::try_from(bytes).ok().map(Ipv4Addr::from)
}

impl TryFrom<EthernetFrame> for ArpFrame {
    type Error = &'static str;

    ///
    /// Decorates the given EthernetFrame with ArpFrame getters/setters.
    /// Validates
    /// - The frame has an ARP ether type
    /// - The frame has a reasonable payload size given the hardware/protocol address lengths
    ///
    /// Link layer padding after the ARP fields is dropped.
    ///
    fn try_from(mut frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != ARP_ETHER_TYPE {
            return Err("Frame does not have ARP ether type.");
        };

        let payload_len = frame.payload().len();
        if payload_len < 8 {
            return Err("Frame payload is too small");
        }

        let hlen = frame.payload()[HARDWARE_ADDR_LEN_RANGE.0] as usize;
        let plen = frame.payload()[PROTOCOL_ADDR_LEN_RANGE.0] as usize;
        let arp_len = 8 + (2 * hlen) + (2 * plen);

        if payload_len < arp_len {
            return Err("Frame payload doesn't match address length fields");
        }

        frame.data.truncate(frame.payload_offset + arp_len);
        Ok(ArpFrame { frame })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_empty_arp_frame() {
        let arp_frame = ArpFrame::new(6, 4);
        assert_eq!(arp_frame.hardware_type(), 0);
        assert_eq!(arp_frame.protocol_type(), 0);
        assert_eq!(arp_frame.hardware_addr_len(), 6);
        assert_eq!(arp_frame.protocol_addr_len(), 4);
        assert_eq!(arp_frame.opcode(), 0);
        assert_eq!(arp_frame.sender_hardware_addr(), [0, 0, 0, 0, 0, 0]);
        assert_eq!(arp_frame.sender_protocol_addr(), [0, 0, 0, 0]);
        assert_eq!(arp_frame.target_hardware_addr(), [0, 0, 0, 0, 0, 0]);
        assert_eq!(arp_frame.target_protocol_addr(), [0, 0, 0, 0]);
        assert_eq!(arp_frame.frame().payload().len(), ARP_IPV4_PAYLOAD_LEN);
    }

    #[test]
    fn arp_frame_from_ethernet() -> Result<(), String> {
        let arp_payload: Vec<u8> = vec![
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 1, 2, 3, 4, 5, 6, 10, 0, 0, 1, 10, 9,
            8, 7, 6, 5, 10, 0, 0, 2,
        ];
        let mut ethernet_frame = EthernetFrame::empty();
        ethernet_frame.set_payload(&arp_payload);
        ethernet_frame.set_ether_type(ARP_ETHER_TYPE);

        let arp_frame = ArpFrame::try_from(ethernet_frame)?;
        assert!(arp_frame.is_ethernet_ipv4());
        assert_eq!(arp_frame.hardware_type(), 1);
        assert_eq!(arp_frame.protocol_type(), IPV4_ETHER_TYPE);
        assert_eq!(arp_frame.opcode(), ArpOp::Request as u16);
        assert_eq!(
            arp_frame.sender_mac_addr(),
            Some(MacAddr::new([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(arp_frame.sender_ipv4_addr(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(
            arp_frame.target_mac_addr(),
            Some(MacAddr::new([10, 9, 8, 7, 6, 5]))
        );
        assert_eq!(arp_frame.target_ipv4_addr(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        Ok(())
    }

    #[test]
    fn padded_frame_is_trimmed() {
        let mut payload = ArpFrame::new(6, 4).frame().payload().to_vec();
        payload.extend_from_slice(&[0; 18]);
        let mut ethernet_frame = EthernetFrame::empty();
        ethernet_frame.set_payload(&payload);
        ethernet_frame.set_ether_type(ARP_ETHER_TYPE);

        let arp_frame = ArpFrame::try_from(ethernet_frame).unwrap();
        assert_eq!(arp_frame.frame().payload().len(), ARP_IPV4_PAYLOAD_LEN);
    }

    #[test]
    fn rejects_short_payload() {
        let mut ethernet_frame = EthernetFrame::empty();
        ethernet_frame.set_payload(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 1, 2]);
        ethernet_frame.set_ether_type(ARP_ETHER_TYPE);
        assert!(ArpFrame::try_from(ethernet_frame.clone()).is_err());

        ethernet_frame.set_ether_type(IPV4_ETHER_TYPE);
        assert!(ArpFrame::try_from(ethernet_frame).is_err());
    }

    #[test]
    fn ipv4_request_is_broadcast() {
        let mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        let request = ArpFrame::ipv4(
            ArpOp::Request,
            mac,
            Ipv4Addr::new(10, 0, 1, 1),
            MacAddr::BROADCAST,
            Ipv4Addr::new(10, 0, 1, 100),
        );
        assert!(request.is_ethernet_ipv4());
        assert_eq!(request.opcode(), ArpOp::Request as u16);
        assert_eq!(request.frame().dest_mac(), MacAddr::BROADCAST);
        assert_eq!(request.frame().src_mac(), mac);
        assert_eq!(request.frame().ether_type(), ARP_ETHER_TYPE);
        assert_eq!(request.target_mac_addr(), Some(MacAddr::default()));
        assert_eq!(request.target_ipv4_addr(), Some(Ipv4Addr::new(10, 0, 1, 100)));
    }

    #[test]
    fn ipv4_reply_is_unicast() {
        let ours = MacAddr::new([2, 0, 0, 0, 0, 1]);
        let theirs = MacAddr::new([2, 0, 0, 0, 0, 2]);
        let reply = ArpFrame::ipv4(
            ArpOp::Reply,
            ours,
            Ipv4Addr::new(10, 0, 1, 1),
            theirs,
            Ipv4Addr::new(10, 0, 1, 100),
        );
        assert_eq!(reply.opcode(), ArpOp::Reply as u16);
        assert_eq!(reply.frame().dest_mac(), theirs);
        assert_eq!(reply.target_mac_addr(), Some(theirs));
        assert_eq!(reply.sender_mac_addr(), Some(ours));
    }
}
