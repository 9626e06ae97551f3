use std::collections::HashMap;
use std::rc::Rc;

use crate::bridge::spawner::Spawner;
use crate::bridge::synchronizer::Synchronizer;
use crate::error::ReplicationError;
use crate::state::peer_record::PeerRecord;
use crate::state::tracked_object::TrackedObject;
use crate::types::{NetId, ObjectId, PeerId, SyncTime, BROADCAST_PEER};
use crate::wrapping_number::sequence_greater_than;

/// The replication registry.
///
/// Tracks, per process: the spawn-tracked and sync-tracked object sets
/// with their component handles, one [`PeerRecord`] per connected peer,
/// and the assigned-NetID allocator. All lookups key off the stable
/// [`ObjectId`] handle; nodes themselves are owned by the scene.
pub struct ReplicationState {
    tracked: HashMap<ObjectId, TrackedObject>,
    peers: HashMap<PeerId, PeerRecord>,
    next_net_id: u32,
}

impl Default for ReplicationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationState {
    pub fn new() -> Self {
        Self {
            tracked: HashMap::new(),
            peers: HashMap::new(),
            next_net_id: 1,
        }
    }

    // Spawn / sync tracking

    pub fn track_spawn(
        &mut self,
        node: ObjectId,
        spawner: Rc<dyn Spawner>,
    ) -> Result<(), ReplicationError> {
        let entry = self.tracked.entry(node).or_insert_with(TrackedObject::new);
        if entry.spawner.is_some() {
            return Err(ReplicationError::InvalidParameter {
                reason: "object is already tracked for spawn",
            });
        }
        entry.spawner = Some(spawner);
        Ok(())
    }

    pub fn untrack_spawn(&mut self, node: ObjectId) -> Result<(), ReplicationError> {
        let entry = self
            .tracked
            .get_mut(&node)
            .filter(|entry| entry.spawner.is_some())
            .ok_or(ReplicationError::InvalidParameter {
                reason: "object is not tracked for spawn",
            })?;
        entry.spawner = None;
        let drop_entry = entry.is_empty();
        if drop_entry {
            self.tracked.remove(&node);
        }
        for record in self.peers.values_mut() {
            record.spawned.remove(&node);
        }
        Ok(())
    }

    pub fn track_sync(
        &mut self,
        node: ObjectId,
        synchronizer: Rc<dyn Synchronizer>,
    ) -> Result<(), ReplicationError> {
        let entry = self.tracked.entry(node).or_insert_with(TrackedObject::new);
        if entry.synchronizer.is_some() {
            return Err(ReplicationError::InvalidParameter {
                reason: "object is already tracked for sync",
            });
        }
        entry.synchronizer = Some(synchronizer);
        Ok(())
    }

    pub fn untrack_sync(&mut self, node: ObjectId) -> Result<(), ReplicationError> {
        let entry = self
            .tracked
            .get_mut(&node)
            .filter(|entry| entry.synchronizer.is_some())
            .ok_or(ReplicationError::InvalidParameter {
                reason: "object is not tracked for sync",
            })?;
        entry.synchronizer = None;
        let drop_entry = entry.is_empty();
        if drop_entry {
            self.tracked.remove(&node);
        }
        for record in self.peers.values_mut() {
            record.synced.remove(&node);
        }
        Ok(())
    }

    pub fn is_spawned_object(&self, node: ObjectId) -> bool {
        self.tracked
            .get(&node)
            .is_some_and(|entry| entry.spawner.is_some())
    }

    pub fn is_synced_object(&self, node: ObjectId) -> bool {
        self.tracked
            .get(&node)
            .is_some_and(|entry| entry.synchronizer.is_some())
    }

    pub fn spawned_objects(&self) -> Vec<ObjectId> {
        self.tracked
            .iter()
            .filter(|(_, entry)| entry.spawner.is_some())
            .map(|(node, _)| *node)
            .collect()
    }

    pub fn synced_objects(&self) -> Vec<ObjectId> {
        self.tracked
            .iter()
            .filter(|(_, entry)| entry.synchronizer.is_some())
            .map(|(node, _)| *node)
            .collect()
    }

    pub fn get_spawner(&self, node: ObjectId) -> Option<Rc<dyn Spawner>> {
        self.tracked.get(&node)?.spawner.clone()
    }

    pub fn get_synchronizer(&self, node: ObjectId) -> Option<Rc<dyn Synchronizer>> {
        self.tracked.get(&node)?.synchronizer.clone()
    }

    // Peer membership

    pub fn peer_connected(&mut self, peer: PeerId) -> Result<(), ReplicationError> {
        if peer == BROADCAST_PEER {
            return Err(ReplicationError::InvalidParameter {
                reason: "the broadcast sentinel cannot connect",
            });
        }
        // Re-connecting an already present peer keeps its record.
        self.peers.entry(peer).or_insert_with(PeerRecord::new);
        Ok(())
    }

    pub fn peer_disconnected(&mut self, peer: PeerId) -> Result<(), ReplicationError> {
        if peer == BROADCAST_PEER {
            return Err(ReplicationError::InvalidParameter {
                reason: "the broadcast sentinel cannot disconnect",
            });
        }
        self.peers.remove(&peer);
        Ok(())
    }

    pub fn has_peer(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    // Per-peer presence bits

    pub fn is_peer_spawn(&self, peer: PeerId, node: ObjectId) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|record| record.spawned.contains(&node))
    }

    pub fn peer_add_spawn(&mut self, peer: PeerId, node: ObjectId) -> Result<(), ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        if !record.spawned.insert(node) {
            return Err(ReplicationError::Bug {
                reason: "object already spawned on peer",
            });
        }
        Ok(())
    }

    pub fn peer_del_spawn(&mut self, peer: PeerId, node: ObjectId) -> Result<(), ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        if !record.spawned.remove(&node) {
            return Err(ReplicationError::Bug {
                reason: "object was not spawned on peer",
            });
        }
        Ok(())
    }

    pub fn is_peer_sync(&self, peer: PeerId, node: ObjectId) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|record| record.synced.contains(&node))
    }

    pub fn peer_add_sync(&mut self, peer: PeerId, node: ObjectId) -> Result<(), ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        if !record.synced.insert(node) {
            return Err(ReplicationError::Bug {
                reason: "object already synced on peer",
            });
        }
        Ok(())
    }

    pub fn peer_del_sync(&mut self, peer: PeerId, node: ObjectId) -> Result<(), ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        if !record.synced.remove(&node) {
            return Err(ReplicationError::Bug {
                reason: "object was not synced on peer",
            });
        }
        Ok(())
    }

    pub fn peer_synced_objects(&self, peer: PeerId) -> Vec<ObjectId> {
        self.peers
            .get(&peer)
            .map(|record| record.synced.iter().copied().collect())
            .unwrap_or_default()
    }

    // Remote table

    pub fn peer_add_remote(
        &mut self,
        peer: PeerId,
        net_id: NetId,
        node: ObjectId,
    ) -> Result<(), ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        if record.remote.insert(net_id.value(), node).is_some() {
            return Err(ReplicationError::InvalidData {
                reason: format!("duplicate spawn for net id {}", net_id.value()),
            });
        }
        Ok(())
    }

    pub fn peer_get_remote(&self, peer: PeerId, net_id: NetId) -> Option<ObjectId> {
        self.peers.get(&peer)?.remote.get(&net_id.value()).copied()
    }

    pub fn peer_del_remote(
        &mut self,
        peer: PeerId,
        net_id: NetId,
    ) -> Result<ObjectId, ReplicationError> {
        let record = self.peer_record_mut(peer)?;
        record
            .remote
            .remove(&net_id.value())
            .ok_or(ReplicationError::DoesNotExist {
                peer,
                id: net_id.value(),
            })
    }

    pub fn peer_remotes(&self, peer: PeerId) -> Vec<ObjectId> {
        self.peers
            .get(&peer)
            .map(|record| record.remote.values().copied().collect())
            .unwrap_or_default()
    }

    // Identity allocation

    /// Returns the object's assigned NetID, allocating the next 31-bit
    /// value on first use. Assigned IDs are never reused within a session.
    pub fn ensure_net_id(&mut self, node: ObjectId) -> Result<NetId, ReplicationError> {
        let entry = self
            .tracked
            .get_mut(&node)
            .ok_or(ReplicationError::Bug {
                reason: "net id requested for untracked object",
            })?;
        if entry.net_id.is_unset() {
            entry.net_id = NetId::assigned(self.next_net_id);
            self.next_net_id += 1;
        }
        Ok(entry.net_id)
    }

    pub fn get_net_id(&self, node: ObjectId) -> NetId {
        self.tracked
            .get(&node)
            .map(|entry| entry.net_id)
            .unwrap_or(NetId::UNSET)
    }

    pub fn set_net_id(&mut self, node: ObjectId, net_id: NetId) -> Result<(), ReplicationError> {
        let entry = self.tracked.get_mut(&node).ok_or(ReplicationError::Bug {
            reason: "net id set for untracked object",
        })?;
        entry.net_id = net_id;
        Ok(())
    }

    // Sync pacing and ordering

    /// Send-rate gating: true when the object's send period has elapsed,
    /// stamping the new send time. An interval of zero sends every tick.
    pub fn update_outbound_sync_time(&mut self, node: ObjectId, now_msec: u64) -> bool {
        let Some(entry) = self.tracked.get_mut(&node) else {
            return false;
        };
        let Some(synchronizer) = entry.synchronizer.as_ref() else {
            return false;
        };
        let interval = synchronizer.replication_interval_msec();
        if interval > 0 && now_msec.saturating_sub(entry.last_sync_send_msec) < interval {
            return false;
        }
        entry.last_sync_send_msec = now_msec;
        true
    }

    /// Stamps the outgoing batch tag for a peer, advancing it.
    pub fn next_sync_time(&mut self, peer: PeerId) -> Result<SyncTime, ReplicationError> {
        Ok(self.peer_record_mut(peer)?.take_out_time())
    }

    pub fn record_inbound_sync_time(&mut self, peer: PeerId, time: SyncTime) {
        if let Some(record) = self.peers.get_mut(&peer) {
            record.record_in_time(time);
        }
    }

    pub fn peer_last_in_time(&self, peer: PeerId) -> Option<SyncTime> {
        self.peers.get(&peer)?.last_in_time()
    }

    /// Per-object stale rejection: true when `time` is newer than the last
    /// applied tag under wrap-aware ordering, recording it.
    pub fn update_last_applied_time(&mut self, node: ObjectId, time: SyncTime) -> bool {
        let Some(entry) = self.tracked.get_mut(&node) else {
            return false;
        };
        if entry.has_applied_time && !sequence_greater_than(time, entry.last_applied_time) {
            return false;
        }
        entry.last_applied_time = time;
        entry.has_applied_time = true;
        true
    }

    /// Drops every table. The NetID allocator keeps running so IDs stay
    /// unique across the whole session.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.peers.clear();
    }

    fn peer_record_mut(&mut self, peer: PeerId) -> Result<&mut PeerRecord, ReplicationError> {
        self.peers.get_mut(&peer).ok_or(ReplicationError::Bug {
            reason: "peer record does not exist",
        })
    }
}
