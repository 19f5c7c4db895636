//! In-process Redis peers for cache tests

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

async fn accept_handshake_then_stall(mut socket: TcpStream) {
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        // answer the CLIENT SETINFO handshake, ignore every command after it
        for _ in 0..count(&buf[..n], b"SETINFO") {
            if socket.write_all(b"+OK\r\n").await.is_err() {
                return;
            }
        }
    }
}

/// A peer that completes the connection handshake and never answers a
/// command. Returns its `host:port`.
pub(crate) async fn stalled_server() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(accept_handshake_then_stall(socket));
        }
    });
    (addr.to_string(), handle)
}
