//! Shared fixtures for undertow-core integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use undertow_core::engine::{Command, CommandId, StepContext};
use undertow_core::peers::{Peer, PeerConnector};

/// Connection command that only records that it ran.
pub struct RecordedConnect {
    id: CommandId,
    ran: Arc<Mutex<Vec<CommandId>>>,
}

impl Command for RecordedConnect {
    fn id(&self) -> CommandId {
        self.id
    }

    fn execute(&mut self, _ctx: &mut StepContext<'_>) -> bool {
        self.ran.lock().push(self.id);
        true
    }
}

/// Peer connector that records requested peers and the commands that ran.
#[derive(Default)]
pub struct RecordingConnector {
    pub requested: Mutex<Vec<(CommandId, SocketAddr)>>,
    pub ran: Arc<Mutex<Vec<CommandId>>>,
}

impl PeerConnector for RecordingConnector {
    fn create_connect_command(&self, id: CommandId, peer: Arc<Peer>) -> Box<dyn Command> {
        self.requested.lock().push((id, peer.addr()));
        Box::new(RecordedConnect {
            id,
            ran: Arc::clone(&self.ran),
        })
    }
}

/// Compact encoding of IPv4 peers.
pub fn compact_peers(peers: &[([u8; 4], u16)]) -> Vec<u8> {
    peers
        .iter()
        .flat_map(|(ip, port)| ip.iter().copied().chain(port.to_be_bytes()))
        .collect()
}

/// Bencoded announce response with the given interval and compact peers.
pub fn announce_body(interval: u32, peers: &[u8]) -> Vec<u8> {
    let mut body = format!("d8:intervali{interval}e5:peers{}:", peers.len()).into_bytes();
    body.extend_from_slice(peers);
    body.push(b'e');
    body
}

/// Serves a single HTTP response on a local port.
///
/// Returns the bound address and a handle yielding the request line.
pub async fn serve_once(status: &'static str, body: Vec<u8>) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&body).await.unwrap();
        stream.shutdown().await.unwrap();

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    (addr, handle)
}

/// HTTP client that never goes through a proxy.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
