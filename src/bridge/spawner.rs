use crate::bridge::variant::Variant;
use crate::types::{ObjectId, PeerId};

/// Catalog index carried in SPAWN when the object was produced by a custom
/// spawn rather than an entry of the spawner's spawnable-scene catalog.
pub const CUSTOM_SPAWN_SCENE_ID: u8 = 0xFF;

/// A spawner component: the authority-side catalog of spawnable scenes and
/// the receiver-side factory for remotely spawned nodes.
pub trait Spawner {
    /// Stable handle of the spawner component itself, used for object-cache
    /// registration.
    fn object_id(&self) -> ObjectId;

    /// The peer whose value for this spawner's objects is canonical.
    fn authority(&self) -> PeerId;

    /// Catalog index for the scene the object was instantiated from, or
    /// [`CUSTOM_SPAWN_SCENE_ID`] for custom spawns.
    fn find_spawnable_scene_index_from_object(&self, object: ObjectId) -> u8;

    /// The custom spawn argument for an object (meaningful only for custom
    /// spawns).
    fn get_spawn_argument(&self, object: ObjectId) -> Variant;

    /// Instantiates the catalog entry at `scene_id` into a new node.
    fn instantiate_scene(&self, scene_id: u8) -> Option<ObjectId>;

    /// Instantiates a node from a decoded custom spawn argument.
    fn instantiate_custom(&self, argument: &Variant) -> Option<ObjectId>;

    /// The parent node remotely spawned children are attached under.
    fn get_spawn_parent(&self) -> Option<ObjectId>;

    /// Visibility predicate used when the object has no synchronizer.
    fn is_visible_to(&self, peer: PeerId) -> bool;
}
