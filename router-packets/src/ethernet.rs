use crate::*;
use std::convert::{TryFrom, TryInto};

pub const ETHERNET_HEADER_LEN: usize = 14;

#[derive(Clone, Debug)]
pub struct EthernetFrame {
    pub data: PacketData,
    pub payload_offset: usize,
}

impl EthernetFrame {
    pub fn from_buffer(frame: PacketData) -> Result<EthernetFrame, &'static str> {
        // Ethernet II frames must be at least the header, which is 14bytes
        // 0                    6                    12                      14
        // |---6 byte Dest_MAC--|---6 byte Src_MAC---|--2 Byte EtherType---|
        // 802.1Q tagged frames are not understood, their tag reads as the EtherType.
        if frame.len() < ETHERNET_HEADER_LEN {
            return Err("Frame is less than the minimum of 14 bytes");
        }

        Ok(EthernetFrame {
            data: frame,
            payload_offset: ETHERNET_HEADER_LEN,
        })
    }

    /// Returns an EthernetFrame with a zeroed header and no payload. This function allocates a
    /// new array to hold the header.
    pub fn empty() -> EthernetFrame {
        EthernetFrame {
            data: vec![0; ETHERNET_HEADER_LEN],
            payload_offset: ETHERNET_HEADER_LEN,
        }
    }

    /// Allocates a frame around a copy of `payload`.
    pub fn new(dest: MacAddr, src: MacAddr, ether_type: u16, payload: &[u8]) -> EthernetFrame {
        let mut frame = EthernetFrame::empty();
        frame.set_dest_mac(dest);
        frame.set_src_mac(src);
        frame.set_ether_type(ether_type);
        frame.set_payload(payload);
        frame
    }

    pub fn dest_mac(&self) -> MacAddr {
        let bytes = <[u8; 6]>::try_from(&self.data[0..6]).unwrap();
        MacAddr::new(bytes)
    }

    pub fn src_mac(&self) -> MacAddr {
        let bytes = <[u8; 6]>::try_from(&self.data[6..12]).unwrap();
        MacAddr::new(bytes)
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        self.data[..6].copy_from_slice(&mac.bytes);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.data[6..12].copy_from_slice(&mac.bytes);
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.data[12..=13].try_into().unwrap())
    }

    pub fn set_ether_type(&mut self, ether_type: u16) {
        self.data[12..=13].copy_from_slice(&ether_type.to_be_bytes());
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.payload_offset..]
    }

    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data.truncate(self.payload_offset);
        self.data.reserve_exact(payload.len());
        self.data.extend_from_slice(payload);
    }

    /// Wraps the IP datagram (header onward) in a new frame with the IPv4 EtherType.
    pub fn encap_ipv4(ipv4: &Ipv4Packet, dest: MacAddr, src: MacAddr) -> EthernetFrame {
        EthernetFrame::new(dest, src, IPV4_ETHER_TYPE, ipv4.datagram())
    }

    pub fn into_bytes(self) -> PacketData {
        self.data
    }
}

impl PartialEq for EthernetFrame {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for EthernetFrame {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn ethernet_frame() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0, 0];
        let frame = EthernetFrame::from_buffer(data).unwrap();
        assert_eq!(
            frame.dest_mac(),
            MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0xff, 0xff])
        );
        assert_eq!(frame.src_mac(), MacAddr::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(frame.ether_type(), 0);
        assert_eq!(frame.payload().len(), 0);
    }

    #[test]
    fn set_payload() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0, 0];
        let mut frame = EthernetFrame::from_buffer(data).unwrap();

        let new_payload: Vec<u8> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
        frame.set_payload(&new_payload);
        assert_eq!(frame.payload(), &new_payload[..]);
        assert_eq!(frame.data.len(), 14 + 9);

        frame.set_payload(&[0xaa]);
        assert_eq!(frame.payload(), &[0xaa]);
    }

    #[test]
    #[should_panic(expected = "Frame is less than the minimum of 14 bytes")]
    fn invalid_data_length() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6];
        let _frame = EthernetFrame::from_buffer(data).unwrap();
    }

    #[test]
    fn set_macs() {
        let data: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0, 0];
        let mut frame = EthernetFrame::from_buffer(data).unwrap();
        let new_dest = MacAddr::new([0x98, 0x88, 0x18, 0x12, 0xb4, 0xdf]);
        let new_src = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        frame.set_dest_mac(new_dest);
        frame.set_src_mac(new_src);
        assert_eq!(frame.dest_mac(), new_dest);
        assert_eq!(frame.src_mac(), new_src);
    }

    #[test]
    fn ether_type() {
        let data: Vec<u8> = vec![
            0xde, 0xad, 0xbe, 0xef, 0xff, 0xff, 1, 2, 3, 4, 5, 6, 0x08, 0x06,
        ];
        let frame = EthernetFrame::from_buffer(data).unwrap();
        assert_eq!(frame.ether_type(), ARP_ETHER_TYPE);
    }

    #[test]
    fn new_frame() {
        let frame = EthernetFrame::new(
            MacAddr::BROADCAST,
            MacAddr::new([1, 2, 3, 4, 5, 6]),
            IPV4_ETHER_TYPE,
            &[0x45, 0x00],
        );
        assert_eq!(frame.dest_mac(), MacAddr::BROADCAST);
        assert_eq!(frame.ether_type(), IPV4_ETHER_TYPE);
        assert_eq!(frame.payload(), &[0x45, 0x00]);
        assert_eq!(frame.payload_offset, 14);
    }
}
