//! # Scene Replication
//! Core of a scene-graph replication engine: propagates dynamic object
//! lifetimes (spawn/despawn) and periodic state snapshots (sync) from an
//! authoritative peer to remote peers over an unreliable, ordered-by-channel
//! packet transport.
//!
//! The scene graph, variant serialization, the transport peer, the
//! object-cache service, and the spawner/synchronizer components are
//! external collaborators, consumed through the contracts in [`bridge`].

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub mod bridge;
pub mod interface;
pub mod protocol;
pub mod state;

mod error;
mod options;
mod types;
mod wrapping_number;

pub use bridge::context::MultiplayerContext;
pub use bridge::object_cache::ObjectCache;
pub use bridge::scene::{is_valid_node_name, sanitize_node_name, ReplicationStart, Scene};
pub use bridge::spawner::{Spawner, CUSTOM_SPAWN_SCENE_ID};
pub use bridge::synchronizer::{PropertyPath, ReplicationProfile, Synchronizer};
pub use bridge::transport::{TransferMode, Transport};
pub use bridge::variant::{Variant, VariantCodec};
pub use error::{ReplicationError, TransportError};
pub use interface::SceneReplicationInterface;
pub use options::ReplicationOptions;
pub use state::ReplicationState;
pub use types::{NetId, ObjectId, PeerId, SyncTime, BROADCAST_PEER};
pub use wrapping_number::{sequence_greater_than, sequence_less_than};
