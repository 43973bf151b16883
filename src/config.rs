use std::time::Duration;

pub const HEADER_SIZE: usize = 56;

/// Tunables for an [`RtpSocket`](crate::RtpSocket): the fixed constants a
/// connection is configured with at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpConfig {
    /// Maximum size of a datagram the endpoint emits, header plus payload.
    pub mtu: usize,
    /// Fixed retransmission timeout for an in-flight packet.
    pub packet_timeout: Duration,
    /// Initial/fixed size of the send window (no congestion control).
    pub initial_send_window: u32,
    /// Initial size of the locally advertised receive window.
    pub initial_receive_window: u32,
    /// Grace period to wait for a FIN-ACK before declaring the peer gone.
    pub teardown_grace: Duration,
}

impl RtpConfig {
    pub fn payload_size(&self) -> usize {
        self.mtu - HEADER_SIZE
    }
}

impl Default for RtpConfig {
    fn default() -> Self {
        RtpConfig {
            mtu: 1000,
            packet_timeout: Duration::from_secs(1),
            initial_send_window: 16,
            initial_receive_window: 16,
            teardown_grace: Duration::from_secs(5),
        }
    }
}
