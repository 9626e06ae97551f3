use std::rc::Rc;

use crate::bridge::spawner::Spawner;
use crate::bridge::synchronizer::Synchronizer;
use crate::types::{NetId, SyncTime};

/// Registry entry for one tracked scene node. An object can be tracked for
/// spawn, for sync, or both; the entry lives as long as either side does.
pub(crate) struct TrackedObject {
    pub(crate) net_id: NetId,
    pub(crate) spawner: Option<Rc<dyn Spawner>>,
    pub(crate) synchronizer: Option<Rc<dyn Synchronizer>>,
    /// Authority side: when this object's state last went out.
    pub(crate) last_sync_send_msec: u64,
    /// Receiver side: newest time tag whose state was applied.
    pub(crate) last_applied_time: SyncTime,
    pub(crate) has_applied_time: bool,
}

impl TrackedObject {
    pub(crate) fn new() -> Self {
        Self {
            net_id: NetId::UNSET,
            spawner: None,
            synchronizer: None,
            last_sync_send_msec: 0,
            last_applied_time: 0,
            has_applied_time: false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.spawner.is_none() && self.synchronizer.is_none()
    }
}
