//! Short-lived STUN Binding client used for server-reflexive discovery.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::errors::StunError;
use crate::message::Message;
use crate::message_builder::MessageBuilder;
use crate::message_type::MessageType;

/// Large enough for any Binding response we expect.
const MAX_STUN_MESSAGE_SIZE: usize = 1500;

/// Default wait for a Binding response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends one Binding request from `socket` to `server` and returns the
/// XOR-MAPPED-ADDRESS of the matching success response.
///
/// Datagrams that are not a response to this transaction are skipped until
/// `timeout` elapses. The socket's read timeout is changed.
pub fn binding_request(
    socket: &UdpSocket,
    server: SocketAddr,
    timeout: Duration,
) -> Result<SocketAddr, StunError> {
    let request = MessageBuilder::new(MessageType::Request)
        .random_transaction_id()
        .fingerprint()
        .build()?;
    socket.send_to(&request.encode(), server)?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_STUN_MESSAGE_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(StunError::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        let (size, from) = socket.recv_from(&mut buf)?;
        if from != server {
            continue;
        }
        let Ok(response) = Message::decode(&buf[..size]) else {
            continue;
        };
        if response.transaction_id() != request.transaction_id() {
            continue;
        }
        if !response.message_type().is_success_response() {
            return Err(StunError::UnexpectedMessageType);
        }

        return response
            .xor_mapped_address()
            .ok_or(StunError::MissingAttribute("XOR-MAPPED-ADDRESS"));
    }
}

/// STUN client bound to its own socket.
pub struct StunClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    timeout: Duration,
}

impl StunClient {
    /// Binds `bind_addr` for queries against `server_addr`.
    pub fn new(bind_addr: SocketAddr, server_addr: SocketAddr) -> Result<Self, StunError> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_write_timeout(Some(DEFAULT_TIMEOUT))?;

        Ok(Self {
            socket,
            server_addr,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, StunError> {
        Ok(self.socket.local_addr()?)
    }

    /// Performs a Binding request to discover the reflexive address.
    pub fn get_reflexive_address(&self) -> Result<SocketAddr, StunError> {
        binding_request(&self.socket, self.server_addr, self.timeout)
    }

    /// Hands the socket back, e.g. to serve as the base of a reflexive candidate.
    pub fn into_socket(self) -> UdpSocket {
        self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Answers one Binding request the way a STUN server does.
    fn spawn_reflector() -> SocketAddr {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || {
            let mut buf = [0u8; 1500];
            let (n, from) = server.recv_from(&mut buf).unwrap();
            let request = Message::decode(&buf[..n]).unwrap();
            assert!(request.verify_fingerprint().is_ok());

            // noise first, then the real answer
            server.send_to(b"not stun", from).unwrap();
            let response = MessageBuilder::new(MessageType::Response)
                .transaction_id(request.transaction_id())
                .xor_mapped_address(from)
                .fingerprint()
                .build()
                .unwrap();
            server.send_to(&response.encode(), from).unwrap();
        });
        addr
    }

    #[test]
    fn test_reflexive_address_from_local_server() {
        let server = spawn_reflector();
        let client = StunClient::new("127.0.0.1:0".parse().unwrap(), server).unwrap();

        let mapped = client.get_reflexive_address().unwrap();
        assert_eq!(mapped, client.local_addr().unwrap());
    }

    #[test]
    fn test_timeout_without_server() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client = StunClient::new("127.0.0.1:0".parse().unwrap(), silent.local_addr().unwrap())
            .unwrap()
            .with_timeout(Duration::from_millis(100));

        assert_eq!(client.get_reflexive_address(), Err(StunError::Timeout));
    }
}
