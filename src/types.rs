/// Identifier of a connected peer. `0` is reserved as the broadcast
/// sentinel meaning "all connected peers" on the authority-side API.
pub type PeerId = i32;

/// Broadcast sentinel accepted by the visibility/reconciliation API.
pub const BROADCAST_PEER: PeerId = 0;

/// Time tag carried by SYNC batches, compared with wrap-aware ordering.
pub type SyncTime = u16;

/// Opaque stable handle to a tracked scene node, valid for the node's
/// lifetime. The core never constructs nodes; it holds these handles and
/// resolves them through the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Network identifier for a replicated object.
///
/// The high bit encodes the ID scheme: clear for authority-assigned IDs
/// (allocated when an object first becomes visible to any peer, carried in
/// SPAWN), set for path-based IDs (object-cache path ID OR `0x80000000`,
/// used by statically-placed synchronizers that never get a SPAWN).
/// `0` is the "unallocated" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetId(u32);

impl NetId {
    pub const UNSET: NetId = NetId(0);

    const PATH_SCHEME_BIT: u32 = 0x8000_0000;

    /// Wraps an authority-assigned ID. The allocator only hands out 31-bit
    /// values, so the scheme bit is always clear here.
    pub fn assigned(value: u32) -> Self {
        Self(value)
    }

    /// Forms a path-based ID from an object-cache path ID.
    pub fn from_path_id(path_id: u32) -> Self {
        Self(path_id | Self::PATH_SCHEME_BIT)
    }

    /// Reconstructs an ID from its wire representation.
    pub fn from_wire(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }

    pub fn is_path_based(&self) -> bool {
        self.0 & Self::PATH_SCHEME_BIT != 0
    }

    /// The object-cache path ID embedded in a path-based ID.
    pub fn path_id(&self) -> u32 {
        self.0 & !Self::PATH_SCHEME_BIT
    }
}
