//! Local address discovery.

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// Public resolver used only as a routing target; no packet is sent.
const ROUTE_TARGET: &str = "8.8.8.8:80";

/// Address of the interface the OS would use to reach the internet,
/// falling back to loopback when there is no route.
pub fn local_ip() -> IpAddr {
    match outbound_local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            debug!(error = %e, "Local address discovery failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn outbound_local_ip() -> io::Result<IpAddr> {
    // Connecting a UDP socket only selects a route
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(ROUTE_TARGET)?;
    Ok(socket.local_addr()?.ip())
}
