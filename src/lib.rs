use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

mod config;
mod err;
mod packet;
mod pipeline;
mod stream;
mod tcb;
mod timers;
mod window;

pub use config::RtpConfig;
pub use err::Error;

use stream::chunk_payload;
use tcb::{Kind, Tcb};

/// A bound, single-peer reliable endpoint: one `bind(local_port)` call
/// produces one object that carries the whole `accept`/`connect`/`send`/
/// `receive`/`disconnect`/`close` API directly, since this protocol never
/// multiplexes more than one peer per endpoint.
pub struct RtpSocket {
    socket: Arc<UdpSocket>,
    tcb: Arc<Mutex<Tcb>>,
    cv: Arc<Condvar>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: RtpConfig,
    read_leftover: Mutex<VecDeque<u8>>,
}

impl RtpSocket {
    /// Binds a local UDP port with default tuning. See [`RtpConfig`] for
    /// what `bind_with_config` lets a caller override.
    pub fn bind(local_port: u16) -> Result<Self, Error> {
        Self::bind_with_config(local_port, RtpConfig::default())
    }

    pub fn bind_with_config(local_port: u16, config: RtpConfig) -> Result<Self, Error> {
        let socket = match UdpSocket::bind(("0.0.0.0", local_port)) {
            Ok(socket) => socket,
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                return Err(Error::PortInUse(local_port));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        socket.set_read_timeout(Some(
            config.packet_timeout.min(std::time::Duration::from_millis(10)),
        ))?;

        let socket = Arc::new(socket);
        let tcb = Arc::new(Mutex::new(Tcb::new(Kind::Passive, config)));
        let cv = Arc::new(Condvar::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = pipeline::spawn(socket.clone(), tcb.clone(), cv.clone(), running.clone());

        Ok(RtpSocket {
            socket,
            tcb,
            cv,
            running,
            worker: Mutex::new(Some(worker)),
            config,
            read_leftover: Mutex::new(VecDeque::new()),
        })
    }

    /// Blocks until a peer's handshake completes. Server side of the
    /// three-way handshake.
    pub fn accept(&self) -> Result<(), Error> {
        {
            let mut guard = self.tcb.lock().unwrap();
            guard.kind = Kind::Passive;
            guard.begin_listen();
        }

        let guard = self.tcb.lock().unwrap();
        let guard = self
            .cv
            .wait_while(guard, |t| !t.is_established() && self.running.load(Ordering::Acquire))
            .unwrap();

        if !guard.is_established() {
            return Err(Error::PeerUnreachable);
        }
        Ok(())
    }

    /// Blocks until the handshake with `(peer_addr, peer_port)` completes.
    /// Client side of the three-way handshake.
    pub fn connect(&self, peer_addr: IpAddr, peer_port: u16) -> Result<(), Error> {
        let target = SocketAddr::new(peer_addr, peer_port);

        let syn = {
            let mut guard = self.tcb.lock().unwrap();
            if !guard.is_closed() {
                return Err(Error::AlreadyConnected);
            }
            guard.kind = Kind::Active;
            guard.connect(target, Instant::now())
        };
        self.socket.send_to(&syn.serialize(), target)?;

        let guard = self.tcb.lock().unwrap();
        let guard = self
            .cv
            .wait_while(guard, |t| !t.is_established() && self.running.load(Ordering::Acquire))
            .unwrap();

        if !guard.is_established() {
            return Err(Error::PeerUnreachable);
        }
        Ok(())
    }

    /// Splits `data` into payload-sized chunks and enqueues them for
    /// transmission. Non-blocking; a no-op once the connection is closed.
    pub fn send(&self, data: &[u8]) {
        let mut guard = self.tcb.lock().unwrap();
        if guard.is_closed() {
            return;
        }
        for chunk in chunk_payload(data, self.config.payload_size()) {
            guard.send.enqueue(chunk);
        }
    }

    /// Blocks until at least one payload has been delivered, then drains
    /// and returns everything currently available. Returns `None` once the
    /// connection is closed and nothing remains to deliver.
    pub fn receive(&self) -> Option<Vec<u8>> {
        let guard = self.tcb.lock().unwrap();
        let mut guard = self
            .cv
            .wait_while(guard, |t| {
                !t.recv.has_delivered() && !t.is_closed() && self.running.load(Ordering::Acquire)
            })
            .unwrap();

        if !guard.recv.has_delivered() {
            return None;
        }

        let mut out = Vec::new();
        while let Some(chunk) = guard.recv.pop_delivered() {
            out.extend(chunk);
        }
        Some(out)
    }

    /// Graceful close: queues a FIN behind any data still pending
    /// transmission and blocks until the peer's FIN-ACK arrives or the
    /// teardown grace period elapses. The background pipeline sends the
    /// FIN once it is actually at the front of the send window, so it
    /// never jumps ahead of payloads already enqueued via `send`.
    pub fn disconnect(&self) {
        {
            let mut guard = self.tcb.lock().unwrap();
            if guard.is_closed() {
                return;
            }
            guard.disconnect(Instant::now());
        }

        let guard = self.tcb.lock().unwrap();
        let _ = self
            .cv
            .wait_while(guard, |t| !t.is_closed() && self.running.load(Ordering::Acquire));
    }

    /// Immediate shutdown: no FIN exchange. Stops the background pipeline
    /// and unblocks any waiter.
    pub fn close(&self) {
        self.running.store(false, Ordering::Release);
        self.tcb.lock().unwrap().force_close();
        self.cv.notify_all();

        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Updates the locally advertised receive window; takes effect on the
    /// next outbound packet. Non-blocking.
    pub fn set_receive_window(&self, n: u32) {
        self.tcb.lock().unwrap().recv.receive_window_size = n;
    }
}

impl Drop for RtpSocket {
    fn drop(&mut self) {
        self.close();
    }
}
