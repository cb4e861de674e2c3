//! Host identity reported in system-status announcements.

use std::net::{IpAddr, UdpSocket};

use iotsim_app::devices::HostIdentity;

/// Resolve the hostname and the outward-facing IP address.
///
/// Falls back to `localhost` / `127.0.0.1` when either cannot be found.
pub fn identity() -> HostIdentity {
    let fallback = HostIdentity::default();
    HostIdentity {
        hostname: hostname().unwrap_or(fallback.hostname),
        ip: local_ip().map_or(fallback.ip, |ip| ip.to_string()),
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// The address the OS would use to reach the internet.
///
/// Connecting a UDP socket sends no packet; it only selects a route.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
