use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("mask {0} is not a contiguous run of high order bits")]
    NonContiguousMask(std::net::Ipv4Addr),

    #[error("interface {0} is defined more than once")]
    DuplicateInterface(String),

    #[error("route to {prefix} uses unknown interface {interface}")]
    UnknownInterface {
        prefix: std::net::Ipv4Addr,
        interface: String,
    },
}
