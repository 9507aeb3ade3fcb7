//! Local address discovery

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::{lookup_host, UdpSocket};

use rr_protocol::Address;

/// Local interface address the OS would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick a
/// route, whose source address is then read back.
pub async fn local_ip_for(target: &Address) -> io::Result<IpAddr> {
    let remote = lookup_host(target.socket_addr()).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", target.host()),
        )
    })?;

    let unspecified: SocketAddr = match remote {
        SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
        SocketAddr::V6(_) => ([0u16; 8], 0).into(),
    };
    let socket = UdpSocket::bind(unspecified).await?;
    socket.connect(remote).await?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_target_uses_loopback() {
        let ip = local_ip_for(&Address::new("127.0.0.1", 9876)).await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        assert!(local_ip_for(&Address::new("no such host", 9876)).await.is_err());
    }
}
