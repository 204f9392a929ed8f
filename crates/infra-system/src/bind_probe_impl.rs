// TCP bind probe
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use tracing::debug;

use autocoder_core::port::BindProbe;

/// Checks that a port can actually be bound right now
///
/// Binds and immediately drops a listener on the configured host.
#[derive(Debug, Clone, Copy)]
pub struct TcpBindProbe {
    host: IpAddr,
}

impl TcpBindProbe {
    pub fn new(host: IpAddr) -> Self {
        Self { host }
    }

    /// Probe on 127.0.0.1
    pub fn localhost() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }
}

impl Default for TcpBindProbe {
    fn default() -> Self {
        Self::localhost()
    }
}

impl BindProbe for TcpBindProbe {
    fn is_bindable(&self, port: u16) -> bool {
        if port == 0 {
            return false;
        }
        match TcpListener::bind((self.host, port)) {
            Ok(_listener) => true,
            Err(e) => {
                debug!(host = %self.host, port = %port, error = %e, "Bind test failed");
                false
            }
        }
    }
}
