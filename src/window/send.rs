use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::packet::Packet;
use crate::timers::TimerTable;

/// Selective-repeat sender: assigns sequence numbers, tracks unacknowledged
/// packets, advances `send_base` on ACKs. Sequence numbers here are plain
/// chunk indices, not byte offsets sharing space with control bits.
#[derive(Debug)]
pub struct SendWindow {
    next_seq_num: u32,
    send_base: u32,
    pub send_window_size: u32,
    packet_timeout: Duration,

    queue: VecDeque<Packet>,
    unacked: TimerTable,
}

impl SendWindow {
    pub fn new(send_window_size: u32, packet_timeout: Duration) -> Self {
        SendWindow {
            next_seq_num: 1,
            send_base: 1,
            send_window_size,
            packet_timeout,
            queue: VecDeque::new(),
            unacked: TimerTable::new(),
        }
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn next_seq_num(&self) -> u32 {
        self.next_seq_num
    }

    pub fn in_flight(&self) -> usize {
        self.unacked.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.next_seq_num < self.send_base + self.send_window_size
    }

    /// Non-blocking: append a payload-bearing packet to the send queue.
    pub fn enqueue(&mut self, payload: Vec<u8>) {
        self.queue.push_back(Packet::data(payload));
    }

    /// Non-blocking: append a pre-built control packet (e.g. FIN) to the
    /// back of the send queue so `transmit()` stamps it with a sequence
    /// number only after any data already queued ahead of it, instead of
    /// jumping it ahead of `next_seq_num` and leaving a gap.
    pub fn enqueue_control(&mut self, packet: Packet) {
        self.queue.push_back(packet);
    }

    /// Whether the next packet `transmit()` would pop is a handshake or
    /// disconnect control packet. The caller uses this to withhold an
    /// opportunistic piggyback ack from a FIN: a FIN that also carries
    /// `is_ack` would be misread by the peer as the FIN-ACK reply.
    pub fn front_is_control(&self) -> bool {
        self.queue
            .front()
            .is_some_and(|p| p.is_handshake || p.is_disconnect)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Attempts one transmit tick: pops a queued packet if the window has
    /// capacity, stamps it with a sequence number and (optionally) a
    /// piggybacked ack, and places it in the unacked table.
    pub fn transmit(
        &mut self,
        piggyback_ack: Option<u32>,
        advertised_window: u32,
        now: Instant,
    ) -> Option<Packet> {
        if !self.has_capacity() || self.queue.is_empty() {
            return None;
        }

        let mut packet = self.queue.pop_front()?;
        packet.seq_num = self.next_seq_num;
        packet.advertised_window = advertised_window;

        if let Some(ack_num) = piggyback_ack {
            packet.is_ack = true;
            packet.ack_num = ack_num;
        }

        let deadline = now + self.packet_timeout;
        packet.deadline = Some(deadline);
        self.unacked.insert(packet.seq_num, packet.clone(), deadline);

        self.next_seq_num += 1;

        Some(packet)
    }

    /// Immediately stamps and transmits a handshake control packet (SYN or
    /// SYN-ACK), outside the normal send-queue ordering and bypassing
    /// window-capacity checks, since these carry no payload, are sent
    /// before any data can have been queued, and must go out right away.
    /// Inserted into the unacked table so it shares the same timer-driven
    /// retransmission path as ordinary data packets. FIN does *not* use
    /// this path: it goes through [`enqueue_control`](Self::enqueue_control)
    /// so it is ordered after any data already queued.
    pub fn send_control(&mut self, mut packet: Packet, advertised_window: u32, now: Instant) -> Packet {
        packet.seq_num = self.next_seq_num;
        packet.advertised_window = advertised_window;

        let deadline = now + self.packet_timeout;
        packet.deadline = Some(deadline);
        self.unacked.insert(packet.seq_num, packet.clone(), deadline);

        self.next_seq_num += 1;

        packet
    }

    /// Processes an ACK for sequence number `a`. Returns `true` if it
    /// caused any state change (i.e. wasn't a stale duplicate).
    pub fn on_ack(&mut self, a: u32) -> bool {
        if !(self.send_base <= a && a < self.send_base + self.send_window_size) {
            return false;
        }

        if self.unacked.remove(a).is_none() {
            return false;
        }

        if a == self.send_base {
            let mut b = self.send_base + 1;
            while b < self.next_seq_num && !self.unacked.contains(b) {
                b += 1;
            }
            self.send_base = b;
        }

        true
    }

    /// Walks the unacked table oldest-first, retransmitting and
    /// re-deadlining every entry whose deadline has already passed.
    pub fn timer_tick(&mut self, now: Instant) -> Vec<Packet> {
        let expired = self.unacked.expired(now);
        let mut retransmits = Vec::with_capacity(expired.len());

        for seq in expired {
            let packet = self.unacked.packet(seq).cloned().expect("scanned entry must exist");
            let new_deadline = now + self.packet_timeout;
            self.unacked.renew(seq, new_deadline);
            retransmits.push(packet);
        }

        retransmits
    }

    pub fn reset(&mut self) {
        self.next_seq_num = 1;
        self.send_base = 1;
        self.queue.clear();
        self.unacked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SendWindow {
        SendWindow::new(4, Duration::from_secs(1))
    }

    #[test]
    fn transmit_respects_window_capacity() {
        let mut w = window();
        let now = Instant::now();

        for i in 0..6 {
            w.enqueue(vec![i]);
        }

        let mut sent = Vec::new();
        while let Some(p) = w.transmit(None, 16, now) {
            sent.push(p.seq_num);
        }

        assert_eq!(sent, vec![1, 2, 3, 4]);
        assert_eq!(w.queue_len(), 2);
        assert_eq!(w.in_flight(), 4);
    }

    #[test]
    fn ack_advances_base_and_skips_gaps() {
        let mut w = window();
        let now = Instant::now();
        for i in 0..4 {
            w.enqueue(vec![i]);
        }
        while w.transmit(None, 16, now).is_some() {}

        assert!(w.on_ack(2));
        assert_eq!(w.send_base(), 1, "base doesn't move until seq 1 is acked");

        assert!(w.on_ack(1));
        assert_eq!(w.send_base(), 3, "base skips over already-acked seq 2");

        assert!(w.on_ack(4));
        assert_eq!(w.send_base(), 3, "seq 3 still outstanding blocks further advance");

        assert!(w.on_ack(3));
        assert_eq!(w.send_base(), 5);
    }

    #[test]
    fn duplicate_ack_is_ignored() {
        let mut w = window();
        let now = Instant::now();
        w.enqueue(vec![1]);
        w.transmit(None, 16, now);

        assert!(w.on_ack(1));
        assert!(!w.on_ack(1), "second ack for the same seq is a no-op");
    }

    #[test]
    fn expired_packets_are_retransmitted_and_rescheduled() {
        let mut w = window();
        let now = Instant::now();
        w.enqueue(vec![9]);
        w.transmit(None, 16, now);

        let past = now + Duration::from_secs(2);
        let retransmits = w.timer_tick(past);
        assert_eq!(retransmits.len(), 1);
        assert_eq!(retransmits[0].seq_num, 1);

        // not expired again immediately after renewal
        assert!(w.timer_tick(past).is_empty());
    }
}
