use std::collections::{HashMap, VecDeque};

/// Selective-repeat receiver: stages out-of-order packets, releases the
/// contiguous prefix, and records which sequence numbers need acking. The
/// conjunctive window-membership checks below are deliberate: a naive
/// disjunction of the two range tests would double-count sequence numbers
/// that satisfy both.
#[derive(Debug)]
pub struct RecvWindow {
    rcv_base: u32,
    pub receive_window_size: u32,

    staging: HashMap<u32, Vec<u8>>,
    delivered: VecDeque<Vec<u8>>,
    pending_acks: VecDeque<u32>,
}

impl RecvWindow {
    pub fn new(initial_rcv_base: u32, receive_window_size: u32) -> Self {
        RecvWindow {
            rcv_base: initial_rcv_base,
            receive_window_size,
            staging: HashMap::new(),
            delivered: VecDeque::new(),
            pending_acks: VecDeque::new(),
        }
    }

    pub fn rcv_base(&self) -> u32 {
        self.rcv_base
    }

    pub fn pop_pending_ack(&mut self) -> Option<u32> {
        self.pending_acks.pop_front()
    }

    pub fn has_pending_acks(&self) -> bool {
        !self.pending_acks.is_empty()
    }

    pub fn pop_delivered(&mut self) -> Option<Vec<u8>> {
        self.delivered.pop_front()
    }

    pub fn has_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }

    /// Handles an inbound data-bearing packet with sequence number `s`.
    pub fn on_data(&mut self, s: u32, payload: Vec<u8>) {
        let window_floor = self.rcv_base.saturating_sub(self.receive_window_size);

        if window_floor <= s && s < self.rcv_base {
            // Duplicate below the window: peer likely lost our ACK.
            self.pending_acks.push_back(s);
            return;
        }

        if self.rcv_base <= s && s < self.rcv_base + self.receive_window_size {
            self.pending_acks.push_back(s);
            self.staging.entry(s).or_insert(payload);

            if s == self.rcv_base {
                self.release_contiguous();
            }
            return;
        }

        // Out of range entirely: drop without acking.
    }

    fn release_contiguous(&mut self) {
        while let Some(payload) = self.staging.remove(&self.rcv_base) {
            self.delivered.push_back(payload);
            self.rcv_base += 1;
        }
    }

    pub fn reset(&mut self, initial_rcv_base: u32) {
        self.rcv_base = initial_rcv_base;
        self.staging.clear();
        self.delivered.clear();
        self.pending_acks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_delivery() {
        let mut w = RecvWindow::new(1, 4);
        w.on_data(1, b"a".to_vec());
        w.on_data(2, b"b".to_vec());

        assert_eq!(w.pop_delivered(), Some(b"a".to_vec()));
        assert_eq!(w.pop_delivered(), Some(b"b".to_vec()));
        assert_eq!(w.pop_delivered(), None);
    }

    #[test]
    fn reordering_stages_then_releases() {
        let mut w = RecvWindow::new(1, 4);
        w.on_data(2, b"b".to_vec());
        assert!(w.pop_delivered().is_none(), "seq 2 waits for seq 1");

        w.on_data(3, b"c".to_vec());
        w.on_data(1, b"a".to_vec());

        assert_eq!(w.pop_delivered(), Some(b"a".to_vec()));
        assert_eq!(w.pop_delivered(), Some(b"b".to_vec()));
        assert_eq!(w.pop_delivered(), Some(b"c".to_vec()));
        assert_eq!(w.rcv_base(), 4);
    }

    #[test]
    fn duplicate_below_window_reacks_without_redelivery() {
        let mut w = RecvWindow::new(1, 4);
        for s in 1..=5u32 {
            w.on_data(s, vec![s as u8]);
        }
        while w.pop_delivered().is_some() {}
        while w.pop_pending_ack().is_some() {}

        w.on_data(3, vec![99]);

        assert_eq!(w.pop_pending_ack(), Some(3));
        assert!(w.pop_delivered().is_none());
    }

    #[test]
    fn out_of_range_is_dropped_silently() {
        let mut w = RecvWindow::new(1, 4);
        w.on_data(100, b"nope".to_vec());

        assert!(w.pop_pending_ack().is_none());
        assert!(w.pop_delivered().is_none());
    }

    #[test]
    fn duplicate_in_window_is_not_staged_twice() {
        let mut w = RecvWindow::new(1, 4);
        w.on_data(2, b"first".to_vec());
        w.on_data(2, b"second".to_vec());
        w.on_data(1, b"a".to_vec());

        assert_eq!(w.pop_delivered(), Some(b"a".to_vec()));
        assert_eq!(w.pop_delivered(), Some(b"first".to_vec()));
    }
}
