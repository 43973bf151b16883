use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::packet::Packet;

/// Insertion-ordered map of in-flight packets keyed by sequence number,
/// each with a retransmission deadline. A `HashMap` gives O(1)
/// lookup/removal by sequence number; a parallel `VecDeque` of keys
/// preserves send order so the oldest-first timer scan is O(k).
#[derive(Debug, Default)]
pub struct TimerTable {
    packets: HashMap<u32, (Packet, Instant)>,
    order: VecDeque<u32>,
}

impl TimerTable {
    pub fn new() -> Self {
        TimerTable {
            packets: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, seq_num: u32, packet: Packet, deadline: Instant) {
        if self.packets.insert(seq_num, (packet, deadline)).is_none() {
            self.order.push_back(seq_num);
        }
    }

    pub fn remove(&mut self, seq_num: u32) -> Option<Packet> {
        let (packet, _) = self.packets.remove(&seq_num)?;
        self.order.retain(|s| *s != seq_num);
        Some(packet)
    }

    pub fn contains(&self, seq_num: u32) -> bool {
        self.packets.contains_key(&seq_num)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Sequence numbers whose deadline has already passed, oldest first.
    pub fn expired(&self, now: Instant) -> Vec<u32> {
        self.order
            .iter()
            .copied()
            .filter(|seq| self.packets[seq].1 <= now)
            .collect()
    }

    pub fn packet(&self, seq_num: u32) -> Option<&Packet> {
        self.packets.get(&seq_num).map(|(p, _)| p)
    }

    /// Refreshes an entry's deadline and moves it to the tail of the scan
    /// order, so a forward scan is fair across repeated timeouts.
    pub fn renew(&mut self, seq_num: u32, new_deadline: Instant) {
        if let Some(entry) = self.packets.get_mut(&seq_num) {
            entry.1 = new_deadline;
            self.order.retain(|s| *s != seq_num);
            self.order.push_back(seq_num);
        }
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pkt() -> Packet {
        Packet::data(Vec::new())
    }

    #[test]
    fn insert_and_remove_once() {
        let mut table = TimerTable::new();
        let now = Instant::now();
        table.insert(1, pkt(), now + Duration::from_secs(1));

        assert!(table.contains(1));
        assert_eq!(table.len(), 1);
        assert!(table.remove(1).is_some());
        assert!(table.remove(1).is_none());
        assert!(!table.contains(1));
    }

    #[test]
    fn expired_scans_oldest_first() {
        let mut table = TimerTable::new();
        let now = Instant::now();
        table.insert(3, pkt(), now - Duration::from_millis(10));
        table.insert(1, pkt(), now - Duration::from_millis(5));
        table.insert(2, pkt(), now + Duration::from_secs(5));

        assert_eq!(table.expired(now), vec![3, 1]);
    }

    #[test]
    fn renew_moves_to_tail() {
        let mut table = TimerTable::new();
        let now = Instant::now();
        table.insert(1, pkt(), now - Duration::from_millis(10));
        table.insert(2, pkt(), now - Duration::from_millis(10));

        assert_eq!(table.expired(now), vec![1, 2]);
        table.renew(1, now + Duration::from_secs(5));
        assert_eq!(table.expired(now), vec![2]);
    }
}
