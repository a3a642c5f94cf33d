use crate::RouterConfig;
use router_packets::{MacAddr, PacketData};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A frame parked until its next hop resolves.
///
/// `frame` is a complete Ethernet frame whose source address is already the outgoing
/// interface's; only the destination is filled in on release. The ingress fields remember where
/// the original datagram came from so a failure can be reported back along the same path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueuedFrame {
    pub frame: PacketData,
    pub out_interface: String,
    pub ingress_interface: String,
    pub ingress_mac: MacAddr,
}

#[derive(Debug, Eq, PartialEq)]
pub enum Resolution {
    /// The next hop is cached; the frame is handed back for immediate transmission.
    Resolved { mac: MacAddr, frame: QueuedFrame },
    /// The frame now waits on a pending request. `send_request` is set when this call created
    /// the request, and the caller must broadcast the first ARP request.
    Queued { send_request: bool },
    /// The pending request's queue is full and the frame was discarded.
    Dropped,
}

/// An ARP request the sweep wants re-sent
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArpRetry {
    pub ip: Ipv4Addr,
    pub interface: String,
}

/// A request that ran out of retries, with every frame that was waiting on it
#[derive(Debug, Eq, PartialEq)]
pub struct FailedRequest {
    pub ip: Ipv4Addr,
    pub frames: Vec<QueuedFrame>,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct SweepOutcome {
    pub retries: Vec<ArpRetry>,
    pub failures: Vec<FailedRequest>,
}

struct CacheEntry {
    mac: MacAddr,
    created: Instant,
}

struct PendingRequest {
    ip: Ipv4Addr,
    interface: String,
    frames: Vec<QueuedFrame>,
    last_sent: Instant,
    times_sent: u32,
}

#[derive(Default)]
struct ArpState {
    entries: HashMap<Ipv4Addr, CacheEntry>,
    pending: Vec<PendingRequest>,
}

/// IP to MAC bindings and the requests in flight for unresolved addresses.
///
/// Shared between the frame path and the sweep task; every method takes the one internal lock
/// for its whole duration and releases it before returning, so callers transmit unlocked.
pub struct ArpCache {
    state: Mutex<ArpState>,
    ttl: Duration,
    retry_interval: Duration,
    max_requests: u32,
    max_queued: usize,
}

impl ArpCache {
    pub fn new(config: &RouterConfig) -> Self {
        ArpCache {
            state: Mutex::new(ArpState::default()),
            ttl: config.arp_cache_ttl,
            retry_interval: config.arp_retry_interval,
            max_requests: config.arp_max_requests,
            max_queued: config.arp_max_queued,
        }
    }

    fn state(&self) -> MutexGuard<'_, ArpState> {
        // The state stays consistent between statements, so a panic elsewhere does not poison it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created) >= self.ttl
    }

    /// Returns the cached address of `ip`, purging the entry if it has expired.
    pub fn lookup(&self, ip: Ipv4Addr, now: Instant) -> Option<MacAddr> {
        let mut state = self.state();
        self.lookup_locked(&mut state, ip, now)
    }

    fn lookup_locked(&self, state: &mut ArpState, ip: Ipv4Addr, now: Instant) -> Option<MacAddr> {
        let entry = state.entries.get(&ip)?;
        if !self.is_expired(entry, now) {
            return Some(entry.mac);
        }
        trace!(%ip, "arp: entry expired");
        state.entries.remove(&ip);
        None
    }

    /// Inserts or refreshes a binding without touching pending requests
    pub fn insert(&self, ip: Ipv4Addr, mac: MacAddr, now: Instant) {
        self.state()
            .entries
            .insert(ip, CacheEntry { mac, created: now });
    }

    /// Returns the frame with the next hop's address on a hit, otherwise takes ownership of the
    /// frame and parks it on the pending request for `ip`, creating the request if needed.
    pub fn resolve_or_queue(&self, ip: Ipv4Addr, frame: QueuedFrame, now: Instant) -> Resolution {
        let mut state = self.state();
        if let Some(mac) = self.lookup_locked(&mut state, ip, now) {
            return Resolution::Resolved { mac, frame };
        }

        if let Some(request) = state.pending.iter_mut().find(|request| request.ip == ip) {
            if request.frames.len() >= self.max_queued {
                debug!(%ip, queued = request.frames.len(), "arp: queue full, dropping frame");
                return Resolution::Dropped;
            }
            request.frames.push(frame);
            return Resolution::Queued {
                send_request: false,
            };
        }

        if self.max_queued == 0 {
            return Resolution::Dropped;
        }
        trace!(%ip, interface = %frame.out_interface, "arp: new pending request");
        state.pending.push(PendingRequest {
            ip,
            interface: frame.out_interface.clone(),
            frames: vec![frame],
            last_sent: now,
            times_sent: 1,
        });
        Resolution::Queued { send_request: true }
    }

    /// Stores the binding and releases, in the order they were queued, every frame waiting on
    /// `ip`. The pending request, if there was one, is gone afterwards.
    pub fn record_reply(&self, ip: Ipv4Addr, mac: MacAddr, now: Instant) -> Vec<QueuedFrame> {
        let mut state = self.state();
        state.entries.insert(ip, CacheEntry { mac, created: now });

        match state.pending.iter().position(|request| request.ip == ip) {
            Some(index) => {
                let request = state.pending.remove(index);
                trace!(%ip, %mac, released = request.frames.len(), "arp: resolved");
                request.frames
            }
            None => vec![],
        }
    }

    /// One pass of the periodic maintenance: drops expired bindings, then walks the pending
    /// requests whose last request is at least one retry interval old. Requests that have
    /// already been sent the maximum number of times fail and hand back their frames, the others
    /// are due for another request.
    pub fn sweep(&self, now: Instant) -> SweepOutcome {
        let mut state = self.state();
        let ttl = self.ttl;
        state
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.created) < ttl);

        let mut outcome = SweepOutcome::default();
        for mut request in std::mem::take(&mut state.pending) {
            if now.saturating_duration_since(request.last_sent) < self.retry_interval {
                state.pending.push(request);
            } else if request.times_sent >= self.max_requests {
                debug!(ip = %request.ip, sent = request.times_sent, "arp: giving up");
                outcome.failures.push(FailedRequest {
                    ip: request.ip,
                    frames: request.frames,
                });
            } else {
                request.times_sent += 1;
                request.last_sent = now;
                outcome.retries.push(ArpRetry {
                    ip: request.ip,
                    interface: request.interface.clone(),
                });
                state.pending.push(request);
            }
        }
        outcome
    }

    pub fn is_pending(&self, ip: Ipv4Addr) -> bool {
        self.state().pending.iter().any(|request| request.ip == ip)
    }

    /// Number of frames waiting on `ip`
    pub fn queued(&self, ip: Ipv4Addr) -> usize {
        self.state()
            .pending
            .iter()
            .find(|request| request.ip == ip)
            .map_or(0, |request| request.frames.len())
    }

    /// Number of bindings held, expired ones not yet purged included
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
