//! Bit-exact wire codec for the three replication packet kinds.
//!
//! All integer fields are little-endian. Variant payloads are opaque here;
//! they delegate to the external variant codec.

pub mod command;
pub mod despawn;
pub mod encoding;
pub mod spawn;
pub mod sync;
