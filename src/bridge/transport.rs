pub use crate::error::TransportError;
use crate::types::PeerId;

/// Delivery mode for an outgoing packet. SPAWN and DESPAWN always travel
/// reliably; SYNC is lossy and travels unreliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Reliable,
    Unreliable,
}

/// The packet transport the core sends through. The transport is assumed
/// to buffer packets without blocking; when it rejects, the error surfaces
/// to the caller unchanged.
///
/// The core always sends on channel 0, and the transport guarantees
/// in-order delivery of reliable packets on a channel.
pub trait Transport {
    fn set_target(&mut self, peer: PeerId);

    fn set_channel(&mut self, channel: u8);

    fn set_mode(&mut self, mode: TransferMode);

    fn put_packet(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}
