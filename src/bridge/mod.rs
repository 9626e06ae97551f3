//! Contracts consumed by the replication core.
//!
//! The scene graph, the variant serializer, the transport peer, the
//! object-cache service, and the spawner/synchronizer components all live
//! outside this crate. The core only sees them through the traits below,
//! which keeps it testable against mocks.

pub mod context;
pub mod object_cache;
pub mod scene;
pub mod spawner;
pub mod synchronizer;
pub mod transport;
pub mod variant;
