use thiserror::Error;

use crate::types::PeerId;

/// Errors surfaced by the replication core.
///
/// The core never retries: every operation returns a result and the
/// surrounding engine decides whether to drop the connection, log, or try
/// again. Receive-path errors mean the offending packet was dropped; the
/// core remains usable afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplicationError {
    /// An API was called with a malformed argument (untracked object,
    /// double registration, zero MTU, ...).
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: &'static str },

    /// An operation needed state that is not set up yet (no transport
    /// attached, spawn parent unresolved, NetID required but unallocated).
    #[error("not configured: {reason}")]
    Unconfigured { reason: &'static str },

    /// A received packet was malformed: too short, a length field overruns
    /// the buffer, or the node name fails validation.
    #[error("malformed packet: {reason}")]
    InvalidData { reason: String },

    /// A SPAWN or SYNC arrived from a peer that is not the legitimate
    /// authority for the referenced object.
    #[error("peer {peer} is not the authority for the referenced object")]
    Unauthorized { peer: PeerId },

    /// An object-cache lookup failed for the referenced ID.
    #[error("no cached object for peer {peer} under id {id}")]
    DoesNotExist { peer: PeerId, id: u32 },

    /// An internal invariant was violated. Should never reach the user.
    #[error("internal invariant violated: {reason}")]
    Bug { reason: &'static str },

    /// The transport peer rejected a packet.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ReplicationError {
    pub(crate) fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidData {
            reason: reason.into(),
        }
    }
}

/// Errors produced by the transport seam. The core surfaces these to the
/// caller without retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The transport refused to buffer an outgoing packet.
    #[error("transport refused a {size} byte packet: {reason}")]
    PacketRefused { size: usize, reason: String },
}
