use crate::types::{ObjectId, PeerId};

/// The object-cache service mapping long-lived component references to
/// per-peer integer path IDs.
pub trait ObjectCache {
    /// Registers an object on the authority side and returns its path ID.
    fn make_object_cache(&mut self, object: ObjectId) -> u32;

    /// Ensures the given peer has been told about the object. Returns the
    /// path ID together with whether the peer has confirmed it yet.
    fn send_object_cache(&mut self, object: ObjectId, peer: PeerId) -> (u32, bool);

    /// Receiver-side lookup of the object a peer referenced by path ID.
    fn get_cached_object(&self, peer: PeerId, path_id: u32) -> Option<ObjectId>;
}
