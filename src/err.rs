#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("socket is not connected")]
    NotConnected,

    #[error("socket is already connected")]
    AlreadyConnected,

    #[error("port {0} already in use")]
    PortInUse(u16),

    #[error("handshake with peer timed out")]
    HandshakeTimedOut,

    #[error("peer is unreachable")]
    PeerUnreachable,
}
