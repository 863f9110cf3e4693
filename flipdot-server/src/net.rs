//! UDP socket setup

use std::net::UdpSocket;

use flipdot_core::config::NetworkConfig;
use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::ServerError;

/// Create the server socket
///
/// Sets `SO_REUSEADDR` (if configured) before binding and installs the
/// receive timeout the receiver uses to poll for shutdown.
pub fn bind_udp(config: &NetworkConfig) -> Result<UdpSocket, ServerError> {
    let addr = config.bind_addr();

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(ServerError::Socket)?;

    if config.reuse_address {
        socket
            .set_reuse_address(true)
            .map_err(ServerError::Socket)?;
    }

    info!("Binding UDP socket to {}", addr);
    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind { addr, source })?;

    socket
        .set_read_timeout(Some(config.recv_timeout()))
        .map_err(ServerError::Socket)?;
    debug!("Receive timeout {:?}", config.recv_timeout());

    Ok(socket.into())
}
