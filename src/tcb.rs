use std::net::SocketAddr;
use std::time::Instant;

use crate::config::RtpConfig;
use crate::packet::Packet;
use crate::window::{RecvWindow, SendWindow};

/// Which side of the handshake this endpoint plays: one that is
/// passively `LISTEN`ing for a peer, or one that actively opened the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Active,
    Passive,
}

/// The connection's handshake/teardown phase: the states this protocol's
/// 3-way handshake and single FIN/FIN-ACK teardown actually exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    Closing,
}

/// Per-connection control block: handshake/teardown state machine plus the
/// send and receive windows it drives.
#[derive(Debug)]
pub struct Tcb {
    pub state: ConnectionState,
    pub kind: Kind,
    pub peer_addr: Option<SocketAddr>,
    pub send: SendWindow,
    pub recv: RecvWindow,
    pub teardown_deadline: Option<Instant>,

    config: RtpConfig,
    /// Cached handshake reply, resent verbatim on a duplicate SYN/SYN-ACK
    /// so idempotent retransmission never re-advances state or burns a
    /// fresh sequence number.
    handshake_reply_cache: Option<Packet>,
}

impl Tcb {
    pub fn new(kind: Kind, config: RtpConfig) -> Self {
        Tcb {
            state: ConnectionState::Closed,
            kind,
            peer_addr: None,
            send: SendWindow::new(config.initial_send_window, config.packet_timeout),
            recv: RecvWindow::new(0, config.initial_receive_window),
            teardown_deadline: None,
            config,
            handshake_reply_cache: None,
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Arms passive-open listening, but only from `Closed`: a SYN (and
    /// potentially the whole handshake) may already have advanced this TCB
    /// before the application gets around to calling `accept()`, and that
    /// progress must not be clobbered back to `Listen`.
    pub fn begin_listen(&mut self) {
        if self.state == ConnectionState::Closed {
            self.state = ConnectionState::Listen;
        }
    }

    /// Client-side: send the initial SYN and move to `SynSent`.
    pub fn connect(&mut self, peer_addr: SocketAddr, now: Instant) -> Packet {
        self.peer_addr = Some(peer_addr);
        self.state = ConnectionState::SynSent;

        let template = Packet::syn(0, self.recv.receive_window_size);
        self.send.send_control(template, self.recv.receive_window_size, now)
    }

    /// Local disconnect request: move to `Closing` and enqueue a FIN
    /// behind any data still in the send queue, so it is stamped and
    /// transmitted only after everything queued ahead of it, never
    /// jumping the sequence counter over still-unsent payloads. Blocks
    /// (at the `RtpSocket` layer) until the peer's FIN-ACK arrives or the
    /// teardown grace period elapses.
    pub fn disconnect(&mut self, now: Instant) {
        self.state = ConnectionState::Closing;
        self.teardown_deadline = Some(now + self.config.teardown_grace);

        self.send.enqueue_control(Packet::fin(self.recv.receive_window_size));
    }

    /// Immediate shutdown: no FIN exchange, just mark the connection dead.
    pub fn force_close(&mut self) {
        self.state = ConnectionState::Closed;
        self.teardown_deadline = None;
    }

    /// Processes an inbound packet, applying ACK/handshake/teardown/data
    /// side effects, and returns any packets that must be sent in reply.
    pub fn on_packet(&mut self, pkt: Packet, now: Instant) -> Vec<Packet> {
        let mut outbound = Vec::new();

        if pkt.is_ack {
            self.send.on_ack(pkt.ack_num);
        }
        self.send.send_window_size = pkt.advertised_window;

        if pkt.is_handshake && !pkt.is_ack {
            self.handle_syn(&pkt, now, &mut outbound);
        } else if pkt.is_handshake && pkt.is_ack {
            self.handle_syn_ack(&pkt, &mut outbound);
        } else if pkt.is_disconnect && !pkt.is_ack {
            self.handle_fin(&pkt, now, &mut outbound);
        } else if pkt.is_disconnect && pkt.is_ack {
            self.handle_fin_ack();
        } else {
            // Final handshake ACK: a pure standalone ack (seq_num == 0)
            // arriving while the server is still waiting for it.
            if self.kind == Kind::Passive
                && self.state == ConnectionState::SynRcvd
                && pkt.is_ack
            {
                self.state = ConnectionState::Established;
            }

            if pkt.seq_num != 0 {
                self.recv.on_data(pkt.seq_num, pkt.payload);
            }
        }

        outbound
    }

    fn handle_syn(&mut self, pkt: &Packet, now: Instant, outbound: &mut Vec<Packet>) {
        if self.kind != Kind::Passive {
            return;
        }

        match self.state {
            ConnectionState::Closed | ConnectionState::Listen => {
                self.peer_addr = pkt.peer_addr.or(self.peer_addr);
                self.recv.reset(pkt.seq_num.wrapping_add(1));
                self.state = ConnectionState::SynRcvd;

                let template = Packet::syn_ack(0, pkt.seq_num, self.recv.receive_window_size);
                let stamped = self
                    .send
                    .send_control(template, self.recv.receive_window_size, now);
                self.handshake_reply_cache = Some(stamped.clone());
                outbound.push(stamped);
            }
            ConnectionState::SynRcvd | ConnectionState::Established => {
                if let Some(reply) = &self.handshake_reply_cache {
                    outbound.push(reply.clone());
                }
            }
            ConnectionState::SynSent | ConnectionState::Closing => {}
        }
    }

    fn handle_syn_ack(&mut self, pkt: &Packet, outbound: &mut Vec<Packet>) {
        if self.kind != Kind::Active {
            return;
        }

        match self.state {
            ConnectionState::SynSent => {
                self.recv.reset(pkt.seq_num.wrapping_add(1));
                self.state = ConnectionState::Established;

                let reply = Packet::standalone_ack(pkt.seq_num, self.recv.receive_window_size);
                self.handshake_reply_cache = Some(reply.clone());
                outbound.push(reply);
            }
            ConnectionState::Established => {
                if let Some(reply) = &self.handshake_reply_cache {
                    outbound.push(reply.clone());
                }
            }
            _ => {}
        }
    }

    fn handle_fin(&mut self, pkt: &Packet, now: Instant, outbound: &mut Vec<Packet>) {
        self.teardown_deadline = Some(now + self.config.teardown_grace);
        self.state = ConnectionState::Closing;

        outbound.push(Packet::fin_ack(pkt.seq_num, self.recv.receive_window_size));
    }

    fn handle_fin_ack(&mut self) {
        self.state = ConnectionState::Closed;
        self.teardown_deadline = None;
    }

    /// Transitions to `Closed` if the teardown grace period has elapsed
    /// with no confirming FIN-ACK. Returns whether a transition happened.
    pub fn check_teardown_deadline(&mut self, now: Instant) -> bool {
        if self.state == ConnectionState::Closing {
            if let Some(deadline) = self.teardown_deadline {
                if now >= deadline {
                    self.state = ConnectionState::Closed;
                    self.teardown_deadline = None;
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000)
    }

    #[test]
    fn three_way_handshake() {
        let now = Instant::now();
        let mut client = Tcb::new(Kind::Active, RtpConfig::default());
        let mut server = Tcb::new(Kind::Passive, RtpConfig::default());
        server.begin_listen();

        let mut syn = client.connect(addr(), now);
        syn.peer_addr = Some(addr());

        let server_out = server.on_packet(syn, now);
        assert_eq!(server_out.len(), 1);
        assert!(server_out[0].is_handshake && server_out[0].is_ack);
        assert_eq!(server.state, ConnectionState::SynRcvd);

        let client_out = client.on_packet(server_out[0].clone(), now);
        assert_eq!(client_out.len(), 1);
        assert!(client_out[0].is_ack && !client_out[0].is_handshake);
        assert!(client.is_established());

        let server_out2 = server.on_packet(client_out[0].clone(), now);
        assert!(server_out2.is_empty());
        assert!(server.is_established());
    }

    #[test]
    fn duplicate_syn_replays_cached_reply_without_reset() {
        let now = Instant::now();
        let mut server = Tcb::new(Kind::Passive, RtpConfig::default());
        server.begin_listen();

        let mut client = Tcb::new(Kind::Active, RtpConfig::default());
        let mut syn = client.connect(addr(), now);
        syn.peer_addr = Some(addr());

        let first = server.on_packet(syn.clone(), now);
        let second = server.on_packet(syn, now);

        assert_eq!(first, second, "duplicate SYN re-sends the identical SYN-ACK");
        assert_eq!(server.state, ConnectionState::SynRcvd);
    }

    #[test]
    fn graceful_teardown_to_closed() {
        let now = Instant::now();
        let mut initiator = Tcb::new(Kind::Active, RtpConfig::default());
        initiator.state = ConnectionState::Established;
        let mut peer = Tcb::new(Kind::Passive, RtpConfig::default());
        peer.state = ConnectionState::Established;

        initiator.disconnect(now);
        let fin = initiator
            .send
            .transmit(None, initiator.recv.receive_window_size, now)
            .expect("fin was queued for transmission");
        let reply = peer.on_packet(fin, now);

        assert_eq!(reply.len(), 1);
        assert!(reply[0].is_disconnect && reply[0].is_ack);
        assert_eq!(peer.state, ConnectionState::Closing);

        let outbound = initiator.on_packet(reply[0].clone(), now);
        assert!(outbound.is_empty());
        assert!(initiator.is_closed());
    }

    #[test]
    fn teardown_deadline_closes_without_finack() {
        let now = Instant::now();
        let mut initiator = Tcb::new(Kind::Active, RtpConfig::default());
        initiator.disconnect(now);

        assert!(!initiator.check_teardown_deadline(now));
        let later = now + Duration::from_secs(10);
        assert!(initiator.check_teardown_deadline(later));
        assert!(initiator.is_closed());
    }

    #[test]
    fn disconnect_does_not_jump_fin_ahead_of_queued_data() {
        let now = Instant::now();
        let mut initiator = Tcb::new(Kind::Active, RtpConfig::default());
        initiator.state = ConnectionState::Established;

        initiator.send.enqueue(b"one".to_vec());
        initiator.send.enqueue(b"two".to_vec());
        initiator.disconnect(now);

        let window = initiator.recv.receive_window_size;
        let first = initiator.send.transmit(None, window, now).unwrap();
        let second = initiator.send.transmit(None, window, now).unwrap();
        let third = initiator.send.transmit(None, window, now).unwrap();

        assert_eq!(first.payload, b"one");
        assert_eq!(second.payload, b"two");
        assert!(third.is_disconnect, "fin goes out only after queued data");
        assert_eq!(third.seq_num, 3, "fin gets the next sequence number in line, no gap");
    }

    #[test]
    fn syn_arriving_before_accept_is_not_clobbered_by_begin_listen() {
        let now = Instant::now();
        let mut server = Tcb::new(Kind::Passive, RtpConfig::default());

        // SYN shows up while the pipeline is already running but before the
        // application thread has called `accept()`.
        let mut client = Tcb::new(Kind::Active, RtpConfig::default());
        let mut syn = client.connect(addr(), now);
        syn.peer_addr = Some(addr());
        server.on_packet(syn, now);
        assert_eq!(server.state, ConnectionState::SynRcvd);

        // accept() now runs begin_listen(); it must not reset progress.
        server.begin_listen();
        assert_eq!(server.state, ConnectionState::SynRcvd);
    }
}
