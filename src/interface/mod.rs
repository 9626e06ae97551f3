//! The replication interface: lifecycle hooks invoked by the surrounding
//! engine, visibility reconciliation, and periodic sync emission.

use std::rc::Rc;

use log::{info, warn};

use crate::bridge::context::MultiplayerContext;
use crate::bridge::scene::is_valid_node_name;
use crate::bridge::spawner::{Spawner, CUSTOM_SPAWN_SCENE_ID};
use crate::bridge::synchronizer::Synchronizer;
use crate::bridge::transport::TransferMode;
use crate::error::ReplicationError;
use crate::options::ReplicationOptions;
use crate::protocol::sync::{SyncBatcher, SyncPush, SyncRecordReader, RECORD_HEADER_LEN};
use crate::protocol::{despawn, spawn, sync};
use crate::state::ReplicationState;
use crate::types::{NetId, ObjectId, PeerId, BROADCAST_PEER};

/// Spawn state received ahead of the node's sync registration, applied
/// once the registration fires during parenting.
struct PendingSpawn {
    node: ObjectId,
    state: Vec<u8>,
}

/// Propagates dynamic object lifetimes and periodic state snapshots from
/// the authority to remote peers, and applies both on the receiving side.
///
/// Single-threaded cooperative: every hook completes synchronously before
/// control returns to the engine.
pub struct SceneReplicationInterface<C: MultiplayerContext> {
    ctx: C,
    state: ReplicationState,
    options: ReplicationOptions,
    /// Packet-assembly scratch, grown on demand and reused across packets.
    packet_cache: Vec<u8>,
    pending_spawn: Option<PendingSpawn>,
}

impl<C: MultiplayerContext> SceneReplicationInterface<C> {
    pub fn new(ctx: C, options: ReplicationOptions) -> Result<Self, ReplicationError> {
        options.validate()?;
        Ok(Self {
            ctx,
            state: ReplicationState::new(),
            options,
            packet_cache: Vec::new(),
            pending_spawn: None,
        })
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn state(&self) -> &ReplicationState {
        &self.state
    }

    // Lifecycle hooks

    pub fn on_peer_change(&mut self, peer: PeerId, connected: bool) -> Result<(), ReplicationError> {
        if connected {
            self.state.peer_connected(peer)?;
            info!("peer {peer} connected, reconciling visibility");
            for node in self.state.spawned_objects() {
                if let Err(err) = self.update_spawn_visibility(peer, node) {
                    warn!("spawn reconciliation for peer {peer} failed: {err}");
                }
            }
            for node in self.state.synced_objects() {
                let Some(synchronizer) = self.state.get_synchronizer(node) else {
                    continue;
                };
                if !self.is_local_authority(synchronizer.authority()) {
                    continue;
                }
                if let Err(err) = self.update_sync_visibility(peer, node) {
                    warn!("sync reconciliation for peer {peer} failed: {err}");
                }
            }
        } else {
            info!("peer {peer} disconnected, releasing its remote nodes");
            self.free_remotes(peer);
            self.state.peer_disconnected(peer)?;
        }
        Ok(())
    }

    pub fn on_reset(&mut self) {
        for peer in self.state.peers() {
            self.free_remotes(peer);
        }
        self.state.reset();
        self.pending_spawn = None;
    }

    pub fn on_network_process(&mut self) {
        let now_msec = self.ctx.ticks_msec();
        for peer in self.state.peers() {
            if let Err(err) = self.send_sync(peer, now_msec) {
                warn!("sync emission to peer {peer} failed: {err}");
            }
        }
    }

    /// Registers an object for spawn replication. On the authority this
    /// immediately reconciles visibility against every connected peer.
    pub fn on_spawn(
        &mut self,
        node: ObjectId,
        spawner: Rc<dyn Spawner>,
    ) -> Result<(), ReplicationError> {
        let authority = spawner.authority();
        self.state.track_spawn(node, spawner)?;
        if self.has_transport() && self.is_local_authority(authority) {
            self.state.ensure_net_id(node)?;
            self.update_spawn_visibility(BROADCAST_PEER, node)?;
        }
        Ok(())
    }

    /// Deregisters a spawn-tracked object, despawning it on every peer
    /// that currently knows it.
    pub fn on_despawn(
        &mut self,
        node: ObjectId,
        spawner: Rc<dyn Spawner>,
    ) -> Result<(), ReplicationError> {
        let tracked = self
            .state
            .get_spawner(node)
            .ok_or(ReplicationError::InvalidParameter {
                reason: "object is not tracked for spawn",
            })?;
        if !Rc::ptr_eq(&tracked, &spawner) {
            return Err(ReplicationError::InvalidParameter {
                reason: "spawner does not match the tracked registration",
            });
        }
        let known_to: Vec<PeerId> = self
            .state
            .peers()
            .into_iter()
            .filter(|peer| self.state.is_peer_spawn(*peer, node))
            .collect();
        if !known_to.is_empty() {
            let net_id = self.state.get_net_id(node);
            if net_id.is_unset() {
                return Err(ReplicationError::Bug {
                    reason: "object known to peers has no net id",
                });
            }
            despawn::encode(&mut self.packet_cache, net_id);
            for peer in known_to {
                if let Err(err) =
                    Self::send_raw(&mut self.ctx, &self.packet_cache, peer, TransferMode::Reliable)
                {
                    warn!("despawn to peer {peer} failed: {err}");
                }
            }
        }
        self.state.untrack_spawn(node)
    }

    /// Registers an object for sync replication. Applies pending spawn
    /// state if this registration fired while the node was being parented
    /// from a received SPAWN.
    pub fn on_replication_start(
        &mut self,
        node: ObjectId,
        synchronizer: Rc<dyn Synchronizer>,
    ) -> Result<(), ReplicationError> {
        let authority = synchronizer.authority();
        self.state.track_sync(node, synchronizer.clone())?;
        if self.has_transport() && self.is_local_authority(authority) {
            self.update_sync_visibility(BROADCAST_PEER, node)?;
        }
        if let Some(pending) = self.pending_spawn.take() {
            if pending.node == node {
                let properties = synchronizer.replication_profile().spawn_properties();
                let values = self
                    .ctx
                    .codec()
                    .decode_variants(&pending.state, properties.len())?;
                synchronizer.set_state(properties, values)?;
            } else {
                self.pending_spawn = Some(pending);
            }
        }
        Ok(())
    }

    pub fn on_replication_stop(
        &mut self,
        node: ObjectId,
        synchronizer: Rc<dyn Synchronizer>,
    ) -> Result<(), ReplicationError> {
        let tracked =
            self.state
                .get_synchronizer(node)
                .ok_or(ReplicationError::InvalidParameter {
                    reason: "object is not tracked for sync",
                })?;
        if !Rc::ptr_eq(&tracked, &synchronizer) {
            return Err(ReplicationError::InvalidParameter {
                reason: "synchronizer does not match the tracked registration",
            });
        }
        self.state.untrack_sync(node)
    }

    /// Re-evaluates an object's visibility after its predicate changed.
    /// Peer `0` reconciles against every connected peer.
    pub fn visibility_changed(&mut self, peer: PeerId, node: ObjectId) {
        if self.state.is_spawned_object(node) {
            if let Err(err) = self.update_spawn_visibility(peer, node) {
                warn!("spawn reconciliation for object {node:?} failed: {err}");
            }
        }
        if self.state.is_synced_object(node) {
            if let Err(err) = self.update_sync_visibility(peer, node) {
                warn!("sync reconciliation for object {node:?} failed: {err}");
            }
        }
    }

    // Receive paths

    pub fn on_spawn_receive(&mut self, from: PeerId, bytes: &[u8]) -> Result<(), ReplicationError> {
        let packet = spawn::decode(bytes)?;
        let spawner_object = self
            .ctx
            .object_cache()
            .get_cached_object(from, packet.path_id)
            .ok_or(ReplicationError::DoesNotExist {
                peer: from,
                id: packet.path_id,
            })?;
        let spawner =
            self.ctx
                .scene()
                .spawner_at(spawner_object)
                .ok_or(ReplicationError::DoesNotExist {
                    peer: from,
                    id: packet.path_id,
                })?;
        if spawner.authority() != from {
            return Err(ReplicationError::Unauthorized { peer: from });
        }
        if !is_valid_node_name(packet.name) {
            return Err(ReplicationError::invalid_data(format!(
                "invalid node name received: '{}'",
                packet.name
            )));
        }
        let parent = spawner
            .get_spawn_parent()
            .ok_or(ReplicationError::Unconfigured {
                reason: "spawner has no spawn parent",
            })?;
        if self.ctx.scene().has_child_named(parent, packet.name) {
            return Err(ReplicationError::invalid_data(format!(
                "a node named '{}' already exists under the spawn parent",
                packet.name
            )));
        }
        let node = match packet.custom_arg {
            Some(arg_bytes) => {
                let argument = self.ctx.codec().decode_variant(arg_bytes)?;
                spawner.instantiate_custom(&argument)
            }
            None => spawner.instantiate_scene(packet.scene_id),
        }
        .ok_or_else(|| {
            ReplicationError::invalid_data("spawner could not instantiate the requested scene")
        })?;
        self.ctx.scene().set_node_name(node, packet.name);
        self.state.peer_add_remote(from, packet.net_id, node)?;
        // Initial state applies during the sync registration that fires
        // while parenting, before the node's readiness callback.
        if !packet.state.is_empty() {
            self.pending_spawn = Some(PendingSpawn {
                node,
                state: packet.state.to_vec(),
            });
        }
        let starts = self.ctx.scene().add_child(parent, node);
        let mut result = Ok(());
        for start in starts {
            if let Err(err) = self.on_replication_start(start.node, start.synchronizer) {
                result = Err(err);
                break;
            }
        }
        self.pending_spawn = None;
        result
    }

    pub fn on_despawn_receive(
        &mut self,
        from: PeerId,
        bytes: &[u8],
    ) -> Result<(), ReplicationError> {
        let net_id = despawn::decode(bytes)?;
        let node = self.state.peer_del_remote(from, net_id)?;
        let scene = self.ctx.scene();
        scene.remove_from_parent(node);
        scene.queue_delete(node);
        Ok(())
    }

    pub fn on_sync_receive(&mut self, from: PeerId, bytes: &[u8]) -> Result<(), ReplicationError> {
        let (time, records) = sync::decode_header(bytes)?;
        self.state.record_inbound_sync_time(from, time);
        let mut reader = SyncRecordReader::new(records);
        while let Some(record) = reader.next_record() {
            let (net_id, payload) = record?;
            let node = if net_id.is_path_based() {
                // Statically-placed synchronizer, identified by cached path.
                let path_id = net_id.path_id();
                let sync_object = self
                    .ctx
                    .object_cache()
                    .get_cached_object(from, path_id)
                    .ok_or(ReplicationError::DoesNotExist {
                        peer: from,
                        id: path_id,
                    })?;
                let synchronizer = self.ctx.scene().synchronizer_at(sync_object).ok_or(
                    ReplicationError::DoesNotExist {
                        peer: from,
                        id: path_id,
                    },
                )?;
                if synchronizer.authority() != from {
                    return Err(ReplicationError::Unauthorized { peer: from });
                }
                match synchronizer.root_object() {
                    Some(node) => node,
                    None => {
                        warn!("synchronizer root path does not resolve, skipping sync record");
                        continue;
                    }
                }
            } else {
                match self.state.peer_get_remote(from, net_id) {
                    Some(node) => node,
                    // Spawn not received yet.
                    None => continue,
                }
            };
            let Some(synchronizer) = self.state.get_synchronizer(node) else {
                warn!("sync state for an object with no registered synchronizer, skipping");
                continue;
            };
            if !self.state.update_last_applied_time(node, time) {
                // State is too old.
                continue;
            }
            let properties = synchronizer.replication_profile().sync_properties();
            let values = self.ctx.codec().decode_variants(payload, properties.len())?;
            synchronizer.set_state(properties, values)?;
        }
        Ok(())
    }

    // Visibility reconciliation

    fn update_spawn_visibility(
        &mut self,
        peer: PeerId,
        node: ObjectId,
    ) -> Result<(), ReplicationError> {
        let spawner = self.state.get_spawner(node).ok_or(ReplicationError::Bug {
            reason: "spawn visibility for an untracked object",
        })?;
        if !self.is_local_authority(spawner.authority()) {
            return Err(ReplicationError::Bug {
                reason: "spawn visibility on a non-authority peer",
            });
        }
        // The synchronizer's predicate supersedes the spawner's when both
        // components track the object.
        let synchronizer = self.state.get_synchronizer(node);
        let visible_to = |peer: PeerId| match &synchronizer {
            Some(sync) => sync.is_visible_to(peer),
            None => spawner.is_visible_to(peer),
        };

        let mut to_spawn = Vec::new();
        let mut to_despawn = Vec::new();
        if peer == BROADCAST_PEER {
            let visible_to_all = visible_to(BROADCAST_PEER);
            for connected in self.state.peers() {
                let visible = visible_to_all || visible_to(connected);
                if visible == self.state.is_peer_spawn(connected, node) {
                    continue;
                }
                if visible {
                    to_spawn.push(connected);
                } else {
                    to_despawn.push(connected);
                }
            }
        } else {
            let visible = visible_to(peer);
            if visible == self.state.is_peer_spawn(peer, node) {
                return Ok(());
            }
            if visible {
                to_spawn.push(peer);
            } else {
                to_despawn.push(peer);
            }
        }

        if !to_spawn.is_empty() {
            self.state.ensure_net_id(node)?;
            self.make_spawn_packet(node)?;
            let spawner_object = spawner.object_id();
            for peer in to_spawn {
                self.ctx.object_cache().send_object_cache(spawner_object, peer);
                if let Err(err) =
                    Self::send_raw(&mut self.ctx, &self.packet_cache, peer, TransferMode::Reliable)
                {
                    warn!("spawn to peer {peer} failed: {err}");
                    continue;
                }
                self.state.peer_add_spawn(peer, node)?;
            }
        }
        if !to_despawn.is_empty() {
            let net_id = self.state.get_net_id(node);
            if net_id.is_unset() {
                return Err(ReplicationError::Bug {
                    reason: "object known to peers has no net id",
                });
            }
            despawn::encode(&mut self.packet_cache, net_id);
            for peer in to_despawn {
                self.state.peer_del_spawn(peer, node)?;
                if let Err(err) =
                    Self::send_raw(&mut self.ctx, &self.packet_cache, peer, TransferMode::Reliable)
                {
                    warn!("despawn to peer {peer} failed: {err}");
                }
            }
        }
        Ok(())
    }

    fn update_sync_visibility(
        &mut self,
        peer: PeerId,
        node: ObjectId,
    ) -> Result<(), ReplicationError> {
        let synchronizer = self
            .state
            .get_synchronizer(node)
            .ok_or(ReplicationError::Bug {
                reason: "sync visibility for an untracked object",
            })?;
        if !self.is_local_authority(synchronizer.authority()) {
            return Err(ReplicationError::Bug {
                reason: "sync visibility on a non-authority peer",
            });
        }
        if peer == BROADCAST_PEER {
            let visible_to_all = synchronizer.is_visible_to(BROADCAST_PEER);
            for connected in self.state.peers() {
                let visible = visible_to_all || synchronizer.is_visible_to(connected);
                if visible == self.state.is_peer_sync(connected, node) {
                    continue;
                }
                if visible {
                    self.state.peer_add_sync(connected, node)?;
                } else {
                    self.state.peer_del_sync(connected, node)?;
                }
            }
            Ok(())
        } else {
            let visible = synchronizer.is_visible_to(peer);
            if visible == self.state.is_peer_sync(peer, node) {
                return Ok(());
            }
            if visible {
                self.state.peer_add_sync(peer, node)
            } else {
                self.state.peer_del_sync(peer, node)
            }
        }
    }

    // Periodic sync emission

    fn send_sync(&mut self, peer: PeerId, now_msec: u64) -> Result<(), ReplicationError> {
        let to_sync = self.state.peer_synced_objects(peer);
        if to_sync.is_empty() {
            return Ok(());
        }
        let time = self.state.next_sync_time(peer)?;
        let mut batcher = SyncBatcher::new(&mut self.packet_cache, self.options.sync_mtu, time);
        for node in to_sync {
            if !self.state.update_outbound_sync_time(node, now_msec) {
                // Nothing to sync yet for this object.
                continue;
            }
            let Some(synchronizer) = self.state.get_synchronizer(node) else {
                warn!("synced object lost its synchronizer, skipping");
                continue;
            };
            let mut net_id = self.state.get_net_id(node);
            if net_id.is_unset() || net_id.is_path_based() {
                let (path_id, verified) = self
                    .ctx
                    .object_cache()
                    .send_object_cache(synchronizer.object_id(), peer);
                if net_id.is_unset() {
                    // First time, fall back to the path-based scheme.
                    net_id = NetId::from_path_id(path_id);
                    self.state.set_net_id(node, net_id)?;
                }
                if !verified {
                    // The peer has not confirmed the path yet.
                    continue;
                }
            }
            let properties = synchronizer.replication_profile().sync_properties();
            let values = match synchronizer.get_state(properties) {
                Ok(values) => values,
                Err(err) => {
                    warn!("unable to retrieve sync state: {err}");
                    continue;
                }
            };
            let payload = match self.ctx.codec().encode_variants(&values) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("unable to encode sync state: {err}");
                    continue;
                }
            };
            if payload.is_empty() {
                continue;
            }
            match batcher.push(net_id, &payload) {
                SyncPush::Appended => {}
                SyncPush::Flushed(packet) => {
                    Self::send_raw(&mut self.ctx, &packet, peer, TransferMode::Unreliable)?;
                }
                SyncPush::RecordTooLarge => {
                    warn!(
                        "sync state bigger than the mtu will not be sent ({} > {})",
                        RECORD_HEADER_LEN + payload.len(),
                        self.options.sync_mtu
                    );
                }
            }
        }
        if let Some(packet) = batcher.finish() {
            Self::send_raw(&mut self.ctx, &packet, peer, TransferMode::Unreliable)?;
        }
        Ok(())
    }

    // Packet assembly and sending

    fn make_spawn_packet(&mut self, node: ObjectId) -> Result<(), ReplicationError> {
        let spawner = self.state.get_spawner(node).ok_or(ReplicationError::Bug {
            reason: "spawn packet for an untracked object",
        })?;
        let net_id = self.state.get_net_id(node);
        if net_id.is_unset() {
            return Err(ReplicationError::Unconfigured {
                reason: "spawned object has no assigned net id",
            });
        }
        let scene_id = spawner.find_spawnable_scene_index_from_object(node);
        let custom_arg = if scene_id == CUSTOM_SPAWN_SCENE_ID {
            let argument = spawner.get_spawn_argument(node);
            Some(self.ctx.codec().encode_variant(&argument)?)
        } else {
            None
        };
        let state = match self.state.get_synchronizer(node) {
            Some(synchronizer) => {
                let properties = synchronizer.replication_profile().spawn_properties();
                let values = synchronizer.get_state(properties)?;
                self.ctx.codec().encode_variants(&values)?
            }
            None => Vec::new(),
        };
        let name = self
            .ctx
            .scene()
            .node_name(node)
            .ok_or(ReplicationError::Bug {
                reason: "spawned node is missing from the scene",
            })?;
        let path_id = self.ctx.object_cache().make_object_cache(spawner.object_id());
        spawn::encode(
            &mut self.packet_cache,
            &spawn::SpawnPacket {
                scene_id,
                path_id,
                net_id,
                name: &name,
                custom_arg: custom_arg.as_deref(),
                state: &state,
            },
        );
        Ok(())
    }

    fn send_raw(
        ctx: &mut C,
        bytes: &[u8],
        peer: PeerId,
        mode: TransferMode,
    ) -> Result<(), ReplicationError> {
        if bytes.is_empty() {
            return Err(ReplicationError::InvalidParameter {
                reason: "refusing to send an empty packet",
            });
        }
        let transport = ctx.transport().ok_or(ReplicationError::Unconfigured {
            reason: "no transport peer attached",
        })?;
        transport.set_target(peer);
        transport.set_channel(0);
        transport.set_mode(mode);
        transport.put_packet(bytes)?;
        Ok(())
    }

    fn has_transport(&mut self) -> bool {
        self.ctx.transport().is_some()
    }

    fn is_local_authority(&self, authority: PeerId) -> bool {
        authority == self.ctx.local_peer()
    }

    fn free_remotes(&mut self, peer: PeerId) {
        for node in self.state.peer_remotes(peer) {
            self.ctx.scene().queue_delete(node);
        }
    }
}
