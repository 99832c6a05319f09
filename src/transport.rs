use rosc::{OscMessage, OscPacket, OscType, encoder};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::info;

use crate::error::TransportError;

/// Outbound side of the bridge: one address, one integer.
pub trait OscSender {
    fn send(&mut self, address: &str, value: i32) -> Result<(), TransportError>;
}

/// Fire-and-forget OSC over UDP.
pub struct UdpOscClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpOscClient {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportError::Resolve(format!("{}:{}", host, port)))?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;

        info!(%target, "OSC client ready");
        Ok(UdpOscClient { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

pub fn encode_message(address: &str, value: i32) -> Result<Vec<u8>, TransportError> {
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: vec![OscType::Int(value)],
    });
    encoder::encode(&packet).map_err(|e| TransportError::Encode(e.to_string()))
}

impl OscSender for UdpOscClient {
    fn send(&mut self, address: &str, value: i32) -> Result<(), TransportError> {
        let buf = encode_message(address, value)?;
        self.socket.send_to(&buf, self.target)?;
        Ok(())
    }
}
