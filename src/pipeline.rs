use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, trace, warn};

use crate::packet::Packet;
use crate::tcb::Tcb;

/// The core scheduling loop: each tick does the receive phase, then the
/// send phase, then the timer phase, then checks the teardown deadline.
pub fn spawn(
    socket: Arc<UdpSocket>,
    tcb: Arc<Mutex<Tcb>>,
    cv: Arc<Condvar>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut recv_buf = vec![0u8; 65536];

        while running.load(Ordering::Acquire) {
            let mut woke = false;

            // --- Receive phase -------------------------------------------------
            match socket.recv_from(&mut recv_buf) {
                Ok((n, from)) => {
                    if let Some(pkt) = Packet::deserialize(&recv_buf[..n], from) {
                        trace!("recv seq={} ack={} handshake={} disconnect={} ack_flag={}",
                            pkt.seq_num, pkt.ack_num, pkt.is_handshake, pkt.is_disconnect, pkt.is_ack);

                        let now = Instant::now();
                        let mut guard = tcb.lock().unwrap();
                        let outbound = guard.on_packet(pkt, now);
                        let peer = guard.peer_addr.unwrap_or(from);
                        drop(guard);

                        for reply in outbound {
                            let _ = socket.send_to(&reply.serialize(), peer);
                        }
                        woke = true;
                    } else {
                        debug!("dropped malformed or corrupt packet from {from}");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!("socket read failed: {e}");
                }
            }

            // --- Send phase ------------------------------------------------------
            {
                let now = Instant::now();
                let mut guard = tcb.lock().unwrap();
                if let Some(peer) = guard.peer_addr {
                    let window_size = guard.recv.receive_window_size;
                    let piggyback = if guard.send.front_is_control() {
                        None
                    } else {
                        guard.recv.pop_pending_ack()
                    };
                    let sent = guard.send.transmit(piggyback, window_size, now);

                    match sent {
                        Some(pkt) => {
                            drop(guard);
                            let _ = socket.send_to(&pkt.serialize(), peer);
                        }
                        None => {
                            let standalone = piggyback.or_else(|| guard.recv.pop_pending_ack());
                            drop(guard);
                            if let Some(ack_num) = standalone {
                                let ack = Packet::standalone_ack(ack_num, window_size);
                                let _ = socket.send_to(&ack.serialize(), peer);
                            }
                        }
                    }
                }
            }

            // --- Timer phase -------------------------------------------------------
            {
                let now = Instant::now();
                let mut guard = tcb.lock().unwrap();
                if let Some(peer) = guard.peer_addr {
                    let retransmits = guard.send.timer_tick(now);
                    drop(guard);
                    for pkt in &retransmits {
                        warn!("retransmitting seq={}", pkt.seq_num);
                        let _ = socket.send_to(&pkt.serialize(), peer);
                    }
                }
            }

            // --- Teardown deadline --------------------------------------------------
            {
                let now = Instant::now();
                let mut guard = tcb.lock().unwrap();
                if guard.check_teardown_deadline(now) {
                    woke = true;
                }
            }

            if woke {
                cv.notify_all();
            }
        }
    })
}
