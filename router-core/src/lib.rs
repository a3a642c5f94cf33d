/// Errors raised while loading the interface and routing tables.
mod error;
pub use self::error::ConfigError;

/// Timers and limits of the ARP resolver and ICMP generator.
mod config;
pub use self::config::RouterConfig;

/// The interfaces the router owns, each with a link address and an IP address.
pub mod interface;

/// Static routes and longest prefix match.
pub mod routing_table;

/// IP to link address bindings, plus the frames waiting on unresolved addresses.
pub mod arp_cache;

/// Synthesis of ICMP replies and errors from an offending datagram.
pub mod icmp;

/// The boundary to the I/O layer that puts frames on the wire.
pub mod transmit;

/// The per-frame forwarding decision and the periodic ARP sweep.
pub mod router;
pub use self::router::{Router, RouterBuilder};

/// Helpers that drive a router from channels on a tokio runtime.
pub mod runner;
