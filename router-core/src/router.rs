use crate::arp_cache::{ArpCache, QueuedFrame, Resolution};
use crate::icmp::IcmpGenerator;
use crate::interface::{Interface, InterfaceTable};
use crate::routing_table::RoutingTable;
use crate::transmit::Transmit;
use crate::{ConfigError, RouterConfig};
use router_packets::{
    ArpFrame, ArpOp, EthernetFrame, IcmpMessage, IcmpType, IpProtocol, Ipv4Packet, MacAddr,
    UnreachableCode, ARP_ETHER_TYPE, IPV4_ETHER_TYPE,
};
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, trace};

/// Current time on the tokio clock, which tests may pause and advance.
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Collects the pieces of a router and checks that they agree with each other.
pub struct RouterBuilder<T: Transmit> {
    interfaces: InterfaceTable,
    routes: RoutingTable,
    config: RouterConfig,
    transmitter: T,
}

impl<T: Transmit> RouterBuilder<T> {
    pub fn new(transmitter: T) -> Self {
        RouterBuilder {
            interfaces: InterfaceTable::default(),
            routes: RoutingTable::default(),
            config: RouterConfig::default(),
            transmitter,
        }
    }

    pub fn interfaces(self, interfaces: InterfaceTable) -> Self {
        RouterBuilder { interfaces, ..self }
    }

    pub fn routes(self, routes: RoutingTable) -> Self {
        RouterBuilder { routes, ..self }
    }

    pub fn config(self, config: RouterConfig) -> Self {
        RouterBuilder { config, ..self }
    }

    /// Fails if a route leaves through an interface the router does not have.
    pub fn build(self) -> Result<Router<T>, ConfigError> {
        for route in self.routes.iter() {
            if self.interfaces.get(&route.interface).is_none() {
                return Err(ConfigError::UnknownInterface {
                    prefix: route.prefix,
                    interface: route.interface.clone(),
                });
            }
        }

        Ok(Router {
            arp_cache: ArpCache::new(&self.config),
            icmp: IcmpGenerator::new(self.config.icmp_ttl),
            interfaces: self.interfaces,
            routes: self.routes,
            config: self.config,
            transmitter: self.transmitter,
        })
    }
}

/// A static IPv4 router. Everything but the ARP cache is fixed once built, so a shared
/// `Arc<Router>` may take frames from several threads while the sweep runs alongside.
pub struct Router<T: Transmit> {
    interfaces: InterfaceTable,
    routes: RoutingTable,
    arp_cache: ArpCache,
    icmp: IcmpGenerator,
    config: RouterConfig,
    transmitter: T,
}

impl<T: Transmit> Router<T> {
    pub fn arp_cache(&self) -> &ArpCache {
        &self.arp_cache
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Processes one Ethernet frame received on `interface`. Any number of frames, in reply or
    /// forwarded, may be transmitted before this returns; nothing is reported to the caller.
    pub fn handle_frame(&self, bytes: &[u8], interface: &str) {
        self.handle_frame_at(bytes, interface, now())
    }

    /// `handle_frame` with an explicit time for the ARP cache
    pub fn handle_frame_at(&self, bytes: &[u8], interface: &str, now: Instant) {
        let iface = match self.interfaces.get(interface) {
            Some(iface) => iface,
            None => {
                trace!(%interface, "router: frame from unknown interface");
                return;
            }
        };
        let frame = match EthernetFrame::from_buffer(bytes.to_vec()) {
            Ok(frame) => frame,
            Err(reason) => {
                trace!(%interface, reason, "router: dropping frame");
                return;
            }
        };

        match frame.ether_type() {
            ARP_ETHER_TYPE => self.handle_arp(frame, iface, now),
            IPV4_ETHER_TYPE => self.handle_ipv4(frame, iface, now),
            ether_type => trace!(%interface, ether_type, "router: unhandled ether type"),
        }
    }

    fn handle_arp(&self, frame: EthernetFrame, iface: &Interface, now: Instant) {
        let arp = match ArpFrame::try_from(frame) {
            Ok(arp) if arp.is_ethernet_ipv4() => arp,
            _ => {
                trace!(interface = %iface.name, "arp: not an Ethernet/IPv4 packet");
                return;
            }
        };
        let (sender_mac, sender_ip, target_ip) = match (
            arp.sender_mac_addr(),
            arp.sender_ipv4_addr(),
            arp.target_ipv4_addr(),
        ) {
            (Some(sender_mac), Some(sender_ip), Some(target_ip)) => {
                (sender_mac, sender_ip, target_ip)
            }
            _ => return,
        };

        match arp.opcode() {
            op if op == ArpOp::Request as u16 => {
                if target_ip != iface.ip {
                    trace!(interface = %iface.name, %target_ip, "arp: request for another host");
                    return;
                }
                // Probes from hosts without an address yet carry 0.0.0.0 and teach nothing
                if !sender_ip.is_unspecified() {
                    self.learn(sender_ip, sender_mac, now);
                }
                trace!(interface = %iface.name, %sender_ip, "arp: replying");
                let reply =
                    ArpFrame::ipv4(ArpOp::Reply, iface.mac, iface.ip, sender_mac, sender_ip);
                self.transmitter
                    .transmit(&iface.name, reply.into_frame().into_bytes());
            }
            op if op == ArpOp::Reply as u16 => self.learn(sender_ip, sender_mac, now),
            op => trace!(interface = %iface.name, op, "arp: unknown opcode"),
        }
    }

    /// Stores a binding and sends everything that was waiting on it
    fn learn(&self, ip: Ipv4Addr, mac: MacAddr, now: Instant) {
        for queued in self.arp_cache.record_reply(ip, mac, now) {
            self.send_resolved(queued, mac);
        }
    }

    fn send_resolved(&self, queued: QueuedFrame, mac: MacAddr) {
        if let Ok(mut frame) = EthernetFrame::from_buffer(queued.frame) {
            frame.set_dest_mac(mac);
            self.transmitter
                .transmit(&queued.out_interface, frame.into_bytes());
        }
    }

    fn send_arp_request(&self, out: &Interface, target_ip: Ipv4Addr) {
        trace!(interface = %out.name, %target_ip, "arp: sending request");
        let request = ArpFrame::ipv4(
            ArpOp::Request,
            out.mac,
            out.ip,
            MacAddr::default(),
            target_ip,
        );
        self.transmitter
            .transmit(&out.name, request.into_frame().into_bytes());
    }

    fn handle_ipv4(&self, frame: EthernetFrame, iface: &Interface, now: Instant) {
        let reply_mac = frame.src_mac();
        let packet = match Ipv4Packet::try_from(frame) {
            Ok(packet) => packet,
            Err(reason) => {
                trace!(interface = %iface.name, reason, "ipv4: dropping malformed datagram");
                return;
            }
        };
        if !packet.validate_checksum() {
            trace!(interface = %iface.name, src = %packet.src_addr(), "ipv4: bad header checksum");
            return;
        }

        if self.interfaces.owner_of(packet.dest_addr()).is_some() {
            self.deliver_locally(&packet, iface, reply_mac);
        } else {
            self.forward(&packet, iface, reply_mac, now);
        }
    }

    fn deliver_locally(&self, packet: &Ipv4Packet, iface: &Interface, reply_mac: MacAddr) {
        match packet.protocol() {
            IpProtocol::ICMP => {
                let is_echo_request = match IcmpMessage::try_from(packet.to_datagram()) {
                    Ok(message) => {
                        message.icmp_type() == IcmpType::EchoRequest && message.validate_checksum()
                    }
                    Err(_) => false,
                };
                if is_echo_request {
                    self.send_icmp(iface, reply_mac, self.icmp.echo_reply(packet));
                } else {
                    trace!(src = %packet.src_addr(), "icmp: ignoring message to the router");
                }
            }
            protocol => {
                debug!(src = %packet.src_addr(), ?protocol, "ipv4: no listener, port unreachable");
                let error = self
                    .icmp
                    .unreachable_error(iface.ip, packet, UnreachableCode::Port);
                self.send_icmp(iface, reply_mac, error);
            }
        }
    }

    fn forward(&self, packet: &Ipv4Packet, iface: &Interface, reply_mac: MacAddr, now: Instant) {
        let dest = packet.dest_addr();
        if packet.ttl() <= 1 {
            debug!(src = %packet.src_addr(), %dest, "ipv4: ttl exceeded");
            let error = self.icmp.ttl_exceeded_error(iface.ip, packet);
            self.send_icmp(iface, reply_mac, error);
            return;
        }

        let mut datagram = packet.to_datagram();
        datagram.set_ttl(packet.ttl() - 1);
        datagram.set_checksum();

        let (route, out) = match self
            .routes
            .lookup(dest)
            .and_then(|route| Some((route, self.interfaces.get(&route.interface)?)))
        {
            Some(found) => found,
            None => {
                debug!(src = %packet.src_addr(), %dest, "ipv4: no route, net unreachable");
                let error = self
                    .icmp
                    .unreachable_error(iface.ip, packet, UnreachableCode::Net);
                self.send_icmp(iface, reply_mac, error);
                return;
            }
        };

        let next_hop = route.next_hop(dest);
        let frame = EthernetFrame::encap_ipv4(&datagram, MacAddr::default(), out.mac);
        let queued = QueuedFrame {
            frame: frame.into_bytes(),
            out_interface: out.name.clone(),
            ingress_interface: iface.name.clone(),
            ingress_mac: reply_mac,
        };

        match self.arp_cache.resolve_or_queue(next_hop, queued, now) {
            Resolution::Resolved { mac, frame } => self.send_resolved(frame, mac),
            Resolution::Queued { send_request: true } => self.send_arp_request(out, next_hop),
            Resolution::Queued {
                send_request: false,
            } => trace!(%next_hop, "arp: frame queued behind pending request"),
            Resolution::Dropped => {}
        }
    }

    /// Encapsulates and sends a generated datagram back out `iface`. `None` means the generator
    /// chose to stay quiet.
    fn send_icmp(&self, iface: &Interface, dest_mac: MacAddr, datagram: Option<Ipv4Packet>) {
        match datagram {
            Some(datagram) => {
                let frame = EthernetFrame::encap_ipv4(&datagram, dest_mac, iface.mac);
                self.transmitter.transmit(&iface.name, frame.into_bytes());
            }
            None => trace!(interface = %iface.name, "icmp: error suppressed"),
        }
    }

    /// Runs the ARP cache maintenance, then re-sends the requests that are due and reports
    /// every frame behind an exhausted request as Host Unreachable to whoever sent it.
    pub fn sweep(&self, now: Instant) {
        let outcome = self.arp_cache.sweep(now);

        for retry in outcome.retries {
            if let Some(out) = self.interfaces.get(&retry.interface) {
                self.send_arp_request(out, retry.ip);
            }
        }

        for failed in outcome.failures {
            debug!(ip = %failed.ip, frames = failed.frames.len(), "arp: host unreachable");
            for queued in failed.frames {
                self.report_unreachable_host(queued);
            }
        }
    }

    fn report_unreachable_host(&self, queued: QueuedFrame) {
        let ingress = match self.interfaces.get(&queued.ingress_interface) {
            Some(ingress) => ingress,
            None => return,
        };
        let datagram = EthernetFrame::from_buffer(queued.frame)
            .and_then(Ipv4Packet::try_from);
        if let Ok(datagram) = datagram {
            let error = self
                .icmp
                .unreachable_error(ingress.ip, &datagram, UnreachableCode::Host);
            self.send_icmp(ingress, queued.ingress_mac, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing_table::RouteEntry;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransmitter {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Transmit for RecordingTransmitter {
        fn transmit(&self, interface: &str, frame: Vec<u8>) {
            self.sent
                .lock()
                .unwrap()
                .push((String::from(interface), frame));
        }
    }

    impl RecordingTransmitter {
        fn take(&self) -> Vec<(String, Vec<u8>)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    const ETH0_MAC: MacAddr = MacAddr {
        bytes: [2, 0, 0, 0, 0, 1],
    };
    const HOST_MAC: MacAddr = MacAddr {
        bytes: [2, 0, 0, 0, 0, 0x64],
    };

    fn interfaces() -> InterfaceTable {
        InterfaceTable::new(vec![
            Interface::new("eth0", ETH0_MAC, Ipv4Addr::new(10, 0, 1, 1)),
            Interface::new("eth1", MacAddr::new([2, 0, 0, 0, 0, 2]), Ipv4Addr::new(10, 0, 2, 1)),
        ])
        .unwrap()
    }

    fn router() -> Router<RecordingTransmitter> {
        RouterBuilder::new(RecordingTransmitter::default())
            .interfaces(interfaces())
            .routes(
                RoutingTable::new(vec![RouteEntry::new(
                    Ipv4Addr::new(10, 0, 2, 0),
                    Ipv4Addr::new(255, 255, 255, 0),
                    Ipv4Addr::UNSPECIFIED,
                    "eth1",
                )])
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn arp_request(target_ip: Ipv4Addr) -> Vec<u8> {
        ArpFrame::ipv4(
            ArpOp::Request,
            HOST_MAC,
            Ipv4Addr::new(10, 0, 1, 100),
            MacAddr::default(),
            target_ip,
        )
        .into_frame()
        .into_bytes()
    }

    #[test]
    fn route_through_unknown_interface_is_rejected() {
        let result = RouterBuilder::new(RecordingTransmitter::default())
            .interfaces(interfaces())
            .routes(
                RoutingTable::new(vec![RouteEntry::new(
                    Ipv4Addr::UNSPECIFIED,
                    Ipv4Addr::UNSPECIFIED,
                    Ipv4Addr::new(10, 0, 3, 254),
                    "eth3",
                )])
                .unwrap(),
            )
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::UnknownInterface { interface, .. }) if interface == "eth3"
        ));
    }

    #[test]
    fn arp_request_for_router_is_answered_and_learned() {
        let router = router();
        let now = Instant::now();
        router.handle_frame_at(&arp_request(Ipv4Addr::new(10, 0, 1, 1)), "eth0", now);

        let sent = router.transmitter().take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "eth0");
        let reply = ArpFrame::try_from(EthernetFrame::from_buffer(sent[0].1.clone()).unwrap())
            .unwrap();
        assert_eq!(reply.opcode(), ArpOp::Reply as u16);
        assert_eq!(reply.frame().dest_mac(), HOST_MAC);
        assert_eq!(reply.frame().src_mac(), ETH0_MAC);
        assert_eq!(reply.sender_mac_addr(), Some(ETH0_MAC));
        assert_eq!(reply.sender_ipv4_addr(), Some(Ipv4Addr::new(10, 0, 1, 1)));
        assert_eq!(reply.target_mac_addr(), Some(HOST_MAC));
        assert_eq!(reply.target_ipv4_addr(), Some(Ipv4Addr::new(10, 0, 1, 100)));

        assert_eq!(
            router.arp_cache().lookup(Ipv4Addr::new(10, 0, 1, 100), now),
            Some(HOST_MAC)
        );
    }

    #[test]
    fn arp_request_for_other_hosts_is_ignored() {
        let router = router();
        let now = Instant::now();
        // eth1's address asked on eth0 is not ours to answer there
        router.handle_frame_at(&arp_request(Ipv4Addr::new(10, 0, 2, 1)), "eth0", now);
        router.handle_frame_at(&arp_request(Ipv4Addr::new(10, 0, 1, 50)), "eth0", now);
        assert!(router.transmitter().take().is_empty());
        assert!(router.arp_cache().is_empty());
    }

    #[test]
    fn junk_is_dropped() {
        let router = router();
        let now = Instant::now();
        router.handle_frame_at(&[0; 10], "eth0", now);
        router.handle_frame_at(&arp_request(Ipv4Addr::new(10, 0, 1, 1)), "eth9", now);

        let mut unknown = EthernetFrame::new(HOST_MAC, ETH0_MAC, 0x86dd, &[0; 40]);
        router.handle_frame_at(&unknown.data, "eth0", now);
        unknown.set_ether_type(IPV4_ETHER_TYPE);
        router.handle_frame_at(&unknown.data, "eth0", now);

        assert!(router.transmitter().take().is_empty());
    }
}
