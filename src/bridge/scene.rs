use std::rc::Rc;

use crate::bridge::spawner::Spawner;
use crate::bridge::synchronizer::Synchronizer;
use crate::types::ObjectId;

/// Characters a node name may not contain. Autogenerated names (which use
/// `@`) stay valid.
const INVALID_NODE_NAME_CHARACTERS: [char; 4] = ['.', '/', ':', '"'];

/// Strips invalid characters out of a node name. A received name is only
/// accepted when it equals its own sanitized form.
pub fn sanitize_node_name(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_NODE_NAME_CHARACTERS.contains(c))
        .collect()
}

pub fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty() && sanitize_node_name(name) == name
}

/// A synchronizer registration that fired while a node was being parented.
///
/// Remotely spawned scenes may carry a synchronizer; its registration
/// happens during the child-added event, and the core must apply pending
/// spawn state through it before the node's readiness callback runs.
pub struct ReplicationStart {
    pub node: ObjectId,
    pub synchronizer: Rc<dyn Synchronizer>,
}

/// The scene graph, seen through stable object handles. The scene owns the
/// nodes; the core only holds [`ObjectId`]s and resolves them here.
pub trait Scene {
    fn node_name(&self, node: ObjectId) -> Option<String>;

    fn set_node_name(&mut self, node: ObjectId, name: &str);

    fn has_child_named(&self, parent: ObjectId, name: &str) -> bool;

    /// Attaches `child` under `parent` and reports the synchronizer
    /// registrations that fired during the child-added event, in order.
    fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Vec<ReplicationStart>;

    fn remove_from_parent(&mut self, node: ObjectId);

    /// Queues a node for deletion at the end of the engine frame.
    fn queue_delete(&mut self, node: ObjectId);

    /// Resolves a spawner component by its handle.
    fn spawner_at(&self, object: ObjectId) -> Option<Rc<dyn Spawner>>;

    /// Resolves a synchronizer component by its handle.
    fn synchronizer_at(&self, object: ObjectId) -> Option<Rc<dyn Synchronizer>>;
}
