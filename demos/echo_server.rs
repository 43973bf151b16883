use std::env;
use std::io::{Read, Write};

use rtp::RtpSocket;

/// Minimal byte-stream smoke test: accepts one connection, echoes
/// everything it reads back to the sender until the peer disconnects.
fn main() {
    env_logger::init();

    let port: u16 = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(7878);

    let mut socket = RtpSocket::bind(port).expect("bind failed");
    log::info!("listening on port {port}");

    socket.accept().expect("handshake failed");
    log::info!("peer connected");

    let mut buf = [0u8; 4096];
    loop {
        match socket.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = socket.write_all(&buf[..n]) {
                    log::warn!("echo write failed: {e}");
                    break;
                }
            }
            Err(e) => {
                log::warn!("read failed: {e}");
                break;
            }
        }
    }

    log::info!("peer disconnected");
}
