use crate::bridge::object_cache::ObjectCache;
use crate::bridge::scene::Scene;
use crate::bridge::transport::Transport;
use crate::bridge::variant::VariantCodec;
use crate::types::PeerId;

/// Everything the replication core needs from the surrounding multiplayer
/// runtime, injected at construction.
///
/// The core is single-threaded cooperative on the engine's main tick, so
/// accessors hand out plain mutable borrows; nothing here is shared across
/// threads.
pub trait MultiplayerContext {
    /// The unique ID of the local peer.
    fn local_peer(&self) -> PeerId;

    /// The attached transport peer, if any. `None` means the session is not
    /// connected and send paths fail with `Unconfigured`.
    fn transport(&mut self) -> Option<&mut dyn Transport>;

    fn object_cache(&mut self) -> &mut dyn ObjectCache;

    fn scene(&mut self) -> &mut dyn Scene;

    fn codec(&self) -> &dyn VariantCodec;

    /// Milliseconds elapsed since an arbitrary fixed origin, used for
    /// per-object send-rate gating.
    fn ticks_msec(&self) -> u64;
}
