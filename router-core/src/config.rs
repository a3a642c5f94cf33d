use std::time::Duration;

/// Tunables for the resolver and the ICMP generator. The defaults are the classic values for a
/// small static router: bindings live 15 seconds, an unanswered ARP request is sent 5 times one
/// second apart before the waiting frames are bounced.
#[derive(Clone, Debug, PartialEq)]
pub struct RouterConfig {
    /// How long a learned IP to MAC binding stays valid
    pub arp_cache_ttl: Duration,
    /// Minimum spacing between two requests for the same address
    pub arp_retry_interval: Duration,
    /// Requests sent for one address, the first included, before giving up
    pub arp_max_requests: u32,
    /// Frames that may wait on one unresolved address; later ones are dropped
    pub arp_max_queued: usize,
    /// Period of the background sweep
    pub sweep_interval: Duration,
    /// TTL of every datagram the router originates
    pub icmp_ttl: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            arp_cache_ttl: Duration::from_secs(15),
            arp_retry_interval: Duration::from_secs(1),
            arp_max_requests: 5,
            arp_max_queued: 100,
            sweep_interval: Duration::from_secs(1),
            icmp_ttl: 64,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        RouterConfig::default()
    }

    pub fn arp_cache_ttl(self, arp_cache_ttl: Duration) -> Self {
        RouterConfig {
            arp_cache_ttl,
            ..self
        }
    }

    pub fn arp_retry_interval(self, arp_retry_interval: Duration) -> Self {
        RouterConfig {
            arp_retry_interval,
            ..self
        }
    }

    pub fn arp_max_requests(self, arp_max_requests: u32) -> Self {
        RouterConfig {
            arp_max_requests,
            ..self
        }
    }

    pub fn arp_max_queued(self, arp_max_queued: usize) -> Self {
        RouterConfig {
            arp_max_queued,
            ..self
        }
    }

    pub fn sweep_interval(self, sweep_interval: Duration) -> Self {
        RouterConfig {
            sweep_interval,
            ..self
        }
    }

    pub fn icmp_ttl(self, icmp_ttl: u8) -> Self {
        RouterConfig { icmp_ttl, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.arp_cache_ttl, Duration::from_secs(15));
        assert_eq!(config.arp_retry_interval, Duration::from_secs(1));
        assert_eq!(config.arp_max_requests, 5);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.icmp_ttl, 64);
    }

    #[test]
    fn setters_override_one_field() {
        let config = RouterConfig::new()
            .arp_max_queued(2)
            .icmp_ttl(255);
        assert_eq!(config.arp_max_queued, 2);
        assert_eq!(config.icmp_ttl, 255);
        assert_eq!(config.arp_max_requests, 5);
    }
}
