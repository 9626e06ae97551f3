use crate::bridge::variant::Variant;
use crate::error::ReplicationError;
use crate::types::{ObjectId, PeerId};

/// A property path into the synchronized node, as configured in the
/// synchronizer's replication profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(String);

impl PropertyPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The replication configuration of a synchronizer: two ordered lists of
/// property paths, one captured at spawn time and one sampled every sync.
#[derive(Debug, Clone, Default)]
pub struct ReplicationProfile {
    spawn_properties: Vec<PropertyPath>,
    sync_properties: Vec<PropertyPath>,
}

impl ReplicationProfile {
    pub fn new(spawn_properties: Vec<PropertyPath>, sync_properties: Vec<PropertyPath>) -> Self {
        Self {
            spawn_properties,
            sync_properties,
        }
    }

    pub fn spawn_properties(&self) -> &[PropertyPath] {
        &self.spawn_properties
    }

    pub fn sync_properties(&self) -> &[PropertyPath] {
        &self.sync_properties
    }
}

/// A synchronizer component: per-object visibility predicate, replication
/// profile, and property access on the node it targets.
pub trait Synchronizer {
    /// Stable handle of the synchronizer component itself, used for
    /// path-based identification of statically-placed objects.
    fn object_id(&self) -> ObjectId;

    fn authority(&self) -> PeerId;

    /// Visibility predicate. Peer `0` asks "visible to all peers".
    fn is_visible_to(&self, peer: PeerId) -> bool;

    fn replication_profile(&self) -> &ReplicationProfile;

    /// Resolves the synchronizer's root path to the node it targets.
    fn root_object(&self) -> Option<ObjectId>;

    /// Minimum milliseconds between two sync emissions for this object.
    /// Zero means every network tick.
    fn replication_interval_msec(&self) -> u64;

    /// Reads the listed properties off the target node.
    fn get_state(&self, properties: &[PropertyPath]) -> Result<Vec<Variant>, ReplicationError>;

    /// Writes decoded values onto the target node, pairing them with the
    /// listed properties in order.
    fn set_state(
        &self,
        properties: &[PropertyPath],
        values: Vec<Variant>,
    ) -> Result<(), ReplicationError>;
}
