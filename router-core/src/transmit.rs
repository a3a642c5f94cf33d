use crossbeam::channel::Sender;
use router_packets::PacketData;
use tracing::warn;

/// A complete Ethernet frame tagged with the interface it arrived on or leaves through
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnotatedFrame {
    pub interface: String,
    pub frame: PacketData,
}

impl AnnotatedFrame {
    pub fn new(interface: &str, frame: PacketData) -> Self {
        AnnotatedFrame {
            interface: String::from(interface),
            frame,
        }
    }
}

/// Puts frames on the wire. Fire and forget: the router never learns whether a frame left.
pub trait Transmit: Send + Sync {
    fn transmit(&self, interface: &str, frame: PacketData);
}

/// Hands every frame to a crossbeam channel, for an I/O thread or a test to drain.
#[derive(Clone)]
pub struct ChannelTransmitter {
    sender: Sender<AnnotatedFrame>,
}

impl ChannelTransmitter {
    pub fn new(sender: Sender<AnnotatedFrame>) -> Self {
        ChannelTransmitter { sender }
    }
}

impl Transmit for ChannelTransmitter {
    fn transmit(&self, interface: &str, frame: PacketData) {
        if let Err(err) = self.sender.send(AnnotatedFrame::new(interface, frame)) {
            warn!(%interface, len = err.0.frame.len(), "transmit: channel closed, frame lost");
        }
    }
}
