//! Shared mock collaborators for the integration tests: a recording
//! transport, a stub object cache, an in-memory scene store, and a tagged
//! byte codec for variants.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use scene_replication::{
    MultiplayerContext, NetId, ObjectCache, ObjectId, PeerId, PropertyPath, ReplicationError,
    ReplicationOptions, ReplicationProfile, ReplicationStart, Scene, SceneReplicationInterface,
    Spawner, Synchronizer, TransferMode, Transport, TransportError, Variant, VariantCodec,
};

// Transport

pub struct SentPacket {
    pub peer: PeerId,
    pub channel: u8,
    pub mode: TransferMode,
    pub bytes: Vec<u8>,
}

pub struct RecordingTransport {
    target: PeerId,
    channel: u8,
    mode: TransferMode,
    pub refuse_packets: bool,
    pub sent: Vec<SentPacket>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            target: 0,
            channel: 0,
            mode: TransferMode::Reliable,
            refuse_packets: false,
            sent: Vec::new(),
        }
    }
}

impl Transport for RecordingTransport {
    fn set_target(&mut self, peer: PeerId) {
        self.target = peer;
    }

    fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    fn set_mode(&mut self, mode: TransferMode) {
        self.mode = mode;
    }

    fn put_packet(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.refuse_packets {
            return Err(TransportError::PacketRefused {
                size: bytes.len(),
                reason: "transport closed".to_string(),
            });
        }
        self.sent.push(SentPacket {
            peer: self.target,
            channel: self.channel,
            mode: self.mode,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

// Object cache

#[derive(Default)]
pub struct StubObjectCache {
    next_path_id: u32,
    path_ids: HashMap<ObjectId, u32>,
    confirmed: HashSet<(ObjectId, PeerId)>,
    published: HashMap<(PeerId, u32), ObjectId>,
}

impl StubObjectCache {
    /// Pins the path ID the authority side will hand out for an object.
    pub fn set_path_id(&mut self, object: ObjectId, path_id: u32) {
        self.path_ids.insert(object, path_id);
    }

    /// Marks a peer as having confirmed the object's path.
    pub fn confirm(&mut self, object: ObjectId, peer: PeerId) {
        self.confirmed.insert((object, peer));
    }

    /// Receiver-side: exposes an object under a sender's path ID.
    pub fn publish(&mut self, peer: PeerId, path_id: u32, object: ObjectId) {
        self.published.insert((peer, path_id), object);
    }
}

impl ObjectCache for StubObjectCache {
    fn make_object_cache(&mut self, object: ObjectId) -> u32 {
        if let Some(id) = self.path_ids.get(&object) {
            return *id;
        }
        self.next_path_id += 1;
        self.path_ids.insert(object, self.next_path_id);
        self.next_path_id
    }

    fn send_object_cache(&mut self, object: ObjectId, peer: PeerId) -> (u32, bool) {
        let path_id = self.make_object_cache(object);
        (path_id, self.confirmed.contains(&(object, peer)))
    }

    fn get_cached_object(&self, peer: PeerId, path_id: u32) -> Option<ObjectId> {
        self.published.get(&(peer, path_id)).copied()
    }
}

// Scene store

struct NodeRecord {
    name: String,
    parent: Option<ObjectId>,
    deleted: bool,
}

#[derive(Default)]
pub struct SceneStore {
    nodes: HashMap<ObjectId, NodeRecord>,
    spawners: HashMap<ObjectId, Rc<MockSpawner>>,
    synchronizers: HashMap<ObjectId, Rc<MockSynchronizer>>,
    /// Synchronizer registrations that fire when the node is parented.
    pending_starts: HashMap<ObjectId, Rc<MockSynchronizer>>,
    next_node: u64,
}

impl SceneStore {
    pub fn insert_node(&mut self, node: ObjectId, name: &str) {
        self.nodes.insert(
            node,
            NodeRecord {
                name: name.to_string(),
                parent: None,
                deleted: false,
            },
        );
    }

    fn alloc_node(&mut self) -> ObjectId {
        self.next_node += 1;
        let node = ObjectId::new(5000 + self.next_node);
        self.insert_node(node, "");
        node
    }

    pub fn register_spawner(&mut self, spawner: Rc<MockSpawner>) {
        self.spawners.insert(spawner.object, spawner);
    }

    pub fn register_synchronizer(&mut self, synchronizer: Rc<MockSynchronizer>) {
        self.synchronizers.insert(synchronizer.object, synchronizer);
    }

    pub fn node_exists(&self, node: ObjectId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_deleted(&self, node: ObjectId) -> bool {
        self.nodes.get(&node).is_some_and(|record| record.deleted)
    }

    pub fn parent_of(&self, node: ObjectId) -> Option<ObjectId> {
        self.nodes.get(&node)?.parent
    }

    pub fn child_named(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.nodes
            .iter()
            .find(|(_, record)| record.parent == Some(parent) && record.name == name)
            .map(|(node, _)| *node)
    }

    pub fn synchronizer_for_node(&self, node: ObjectId) -> Option<Rc<MockSynchronizer>> {
        self.synchronizers
            .values()
            .find(|sync| sync.root == Some(node))
            .cloned()
    }
}

/// `Scene` facade over the shared store.
pub struct SceneHandle(pub Rc<RefCell<SceneStore>>);

impl Scene for SceneHandle {
    fn node_name(&self, node: ObjectId) -> Option<String> {
        self.0.borrow().nodes.get(&node).map(|n| n.name.clone())
    }

    fn set_node_name(&mut self, node: ObjectId, name: &str) {
        if let Some(record) = self.0.borrow_mut().nodes.get_mut(&node) {
            record.name = name.to_string();
        }
    }

    fn has_child_named(&self, parent: ObjectId, name: &str) -> bool {
        self.0.borrow().child_named(parent, name).is_some()
    }

    fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Vec<ReplicationStart> {
        let mut store = self.0.borrow_mut();
        if let Some(record) = store.nodes.get_mut(&child) {
            record.parent = Some(parent);
        }
        match store.pending_starts.remove(&child) {
            Some(synchronizer) => vec![ReplicationStart {
                node: child,
                synchronizer,
            }],
            None => Vec::new(),
        }
    }

    fn remove_from_parent(&mut self, node: ObjectId) {
        if let Some(record) = self.0.borrow_mut().nodes.get_mut(&node) {
            record.parent = None;
        }
    }

    fn queue_delete(&mut self, node: ObjectId) {
        if let Some(record) = self.0.borrow_mut().nodes.get_mut(&node) {
            record.deleted = true;
        }
    }

    fn spawner_at(&self, object: ObjectId) -> Option<Rc<dyn Spawner>> {
        let spawner = self.0.borrow().spawners.get(&object).cloned()?;
        Some(spawner)
    }

    fn synchronizer_at(&self, object: ObjectId) -> Option<Rc<dyn Synchronizer>> {
        let synchronizer = self.0.borrow().synchronizers.get(&object).cloned()?;
        Some(synchronizer)
    }
}

// Spawner / synchronizer mocks

/// Synchronizer attached to nodes this spawner instantiates, mirroring a
/// spawnable scene that carries one.
pub struct SyncTemplate {
    pub authority: PeerId,
    pub spawn_properties: Vec<&'static str>,
    pub sync_properties: Vec<&'static str>,
}

pub struct MockSpawner {
    pub object: ObjectId,
    pub authority: PeerId,
    pub scene: Rc<RefCell<SceneStore>>,
    pub spawn_parent: ObjectId,
    pub catalog: RefCell<HashMap<ObjectId, u8>>,
    pub custom_args: RefCell<HashMap<ObjectId, Variant>>,
    pub template: RefCell<Option<SyncTemplate>>,
    pub visible: RefCell<HashMap<PeerId, bool>>,
    pub default_visible: Cell<bool>,
    pub instantiated_scenes: RefCell<Vec<u8>>,
    pub instantiated_custom: RefCell<Vec<Variant>>,
}

impl MockSpawner {
    pub fn new(
        object: ObjectId,
        authority: PeerId,
        spawn_parent: ObjectId,
        scene: Rc<RefCell<SceneStore>>,
    ) -> Self {
        Self {
            object,
            authority,
            scene,
            spawn_parent,
            catalog: RefCell::new(HashMap::new()),
            custom_args: RefCell::new(HashMap::new()),
            template: RefCell::new(None),
            visible: RefCell::new(HashMap::new()),
            default_visible: Cell::new(true),
            instantiated_scenes: RefCell::new(Vec::new()),
            instantiated_custom: RefCell::new(Vec::new()),
        }
    }

    pub fn set_visible_to(&self, peer: PeerId, visible: bool) {
        self.visible.borrow_mut().insert(peer, visible);
    }

    fn spawn_node(&self) -> ObjectId {
        let mut store = self.scene.borrow_mut();
        let node = store.alloc_node();
        if let Some(template) = &*self.template.borrow() {
            let component = ObjectId::new(node.value() + 10_000);
            let synchronizer = Rc::new(MockSynchronizer::new(
                component,
                template.authority,
                Some(node),
                profile(&template.spawn_properties, &template.sync_properties),
            ));
            store.synchronizers.insert(component, synchronizer.clone());
            store.pending_starts.insert(node, synchronizer);
        }
        node
    }
}

impl Spawner for MockSpawner {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn authority(&self) -> PeerId {
        self.authority
    }

    fn find_spawnable_scene_index_from_object(&self, object: ObjectId) -> u8 {
        if self.custom_args.borrow().contains_key(&object) {
            return scene_replication::CUSTOM_SPAWN_SCENE_ID;
        }
        self.catalog.borrow().get(&object).copied().unwrap_or(0)
    }

    fn get_spawn_argument(&self, object: ObjectId) -> Variant {
        self.custom_args
            .borrow()
            .get(&object)
            .cloned()
            .unwrap_or(Variant::Nil)
    }

    fn instantiate_scene(&self, scene_id: u8) -> Option<ObjectId> {
        self.instantiated_scenes.borrow_mut().push(scene_id);
        Some(self.spawn_node())
    }

    fn instantiate_custom(&self, argument: &Variant) -> Option<ObjectId> {
        self.instantiated_custom.borrow_mut().push(argument.clone());
        Some(self.spawn_node())
    }

    fn get_spawn_parent(&self) -> Option<ObjectId> {
        Some(self.spawn_parent)
    }

    fn is_visible_to(&self, peer: PeerId) -> bool {
        self.visible
            .borrow()
            .get(&peer)
            .copied()
            .unwrap_or(self.default_visible.get())
    }
}

pub fn profile(spawn_properties: &[&str], sync_properties: &[&str]) -> ReplicationProfile {
    ReplicationProfile::new(
        spawn_properties.iter().copied().map(PropertyPath::new).collect(),
        sync_properties.iter().copied().map(PropertyPath::new).collect(),
    )
}

pub struct MockSynchronizer {
    pub object: ObjectId,
    pub authority: PeerId,
    pub root: Option<ObjectId>,
    pub profile: ReplicationProfile,
    pub interval_msec: Cell<u64>,
    pub visible: RefCell<HashMap<PeerId, bool>>,
    pub default_visible: Cell<bool>,
    pub values: RefCell<HashMap<String, Variant>>,
}

impl MockSynchronizer {
    pub fn new(
        object: ObjectId,
        authority: PeerId,
        root: Option<ObjectId>,
        profile: ReplicationProfile,
    ) -> Self {
        Self {
            object,
            authority,
            root,
            profile,
            interval_msec: Cell::new(0),
            visible: RefCell::new(HashMap::new()),
            default_visible: Cell::new(true),
            values: RefCell::new(HashMap::new()),
        }
    }

    pub fn set_visible_to(&self, peer: PeerId, visible: bool) {
        self.visible.borrow_mut().insert(peer, visible);
    }

    pub fn set_value(&self, property: &str, value: Variant) {
        self.values.borrow_mut().insert(property.to_string(), value);
    }

    pub fn value(&self, property: &str) -> Option<Variant> {
        self.values.borrow().get(property).cloned()
    }
}

impl Synchronizer for MockSynchronizer {
    fn object_id(&self) -> ObjectId {
        self.object
    }

    fn authority(&self) -> PeerId {
        self.authority
    }

    fn is_visible_to(&self, peer: PeerId) -> bool {
        self.visible
            .borrow()
            .get(&peer)
            .copied()
            .unwrap_or(self.default_visible.get())
    }

    fn replication_profile(&self) -> &ReplicationProfile {
        &self.profile
    }

    fn root_object(&self) -> Option<ObjectId> {
        self.root
    }

    fn replication_interval_msec(&self) -> u64 {
        self.interval_msec.get()
    }

    fn get_state(&self, properties: &[PropertyPath]) -> Result<Vec<Variant>, ReplicationError> {
        let values = self.values.borrow();
        Ok(properties
            .iter()
            .map(|path| values.get(path.as_str()).cloned().unwrap_or(Variant::Nil))
            .collect())
    }

    fn set_state(
        &self,
        properties: &[PropertyPath],
        values: Vec<Variant>,
    ) -> Result<(), ReplicationError> {
        let mut store = self.values.borrow_mut();
        for (path, value) in properties.iter().zip(values) {
            store.insert(path.as_str().to_string(), value);
        }
        Ok(())
    }
}

// Variant codec

/// Tagged little-endian byte format, one tag byte per variant.
pub struct TagCodec;

const TAG_NIL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_F64: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_BYTES: u8 = 5;

impl TagCodec {
    fn write(buf: &mut Vec<u8>, value: &Variant) {
        match value {
            Variant::Nil => buf.push(TAG_NIL),
            Variant::Bool(v) => {
                buf.push(TAG_BOOL);
                buf.push(*v as u8);
            }
            Variant::I64(v) => {
                buf.push(TAG_I64);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Variant::F64(v) => {
                buf.push(TAG_F64);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Variant::Str(v) => {
                buf.push(TAG_STR);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                buf.extend_from_slice(v.as_bytes());
            }
            Variant::Bytes(v) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                buf.extend_from_slice(v);
            }
        }
    }

    fn read(bytes: &[u8], ofs: &mut usize) -> Result<Variant, ReplicationError> {
        let malformed = || ReplicationError::InvalidData {
            reason: "malformed variant payload".to_string(),
        };
        let tag = *bytes.get(*ofs).ok_or_else(malformed)?;
        *ofs += 1;
        let take = |ofs: &mut usize, len: usize| -> Result<Vec<u8>, ReplicationError> {
            let slice = bytes.get(*ofs..*ofs + len).ok_or_else(malformed)?;
            *ofs += len;
            Ok(slice.to_vec())
        };
        match tag {
            TAG_NIL => Ok(Variant::Nil),
            TAG_BOOL => Ok(Variant::Bool(take(ofs, 1)?[0] != 0)),
            TAG_I64 => {
                let raw = take(ofs, 8)?;
                Ok(Variant::I64(i64::from_le_bytes(raw.try_into().unwrap())))
            }
            TAG_F64 => {
                let raw = take(ofs, 8)?;
                Ok(Variant::F64(f64::from_le_bytes(raw.try_into().unwrap())))
            }
            TAG_STR => {
                let len = u32::from_le_bytes(take(ofs, 4)?.try_into().unwrap()) as usize;
                let raw = take(ofs, len)?;
                String::from_utf8(raw).map(Variant::Str).map_err(|_| malformed())
            }
            TAG_BYTES => {
                let len = u32::from_le_bytes(take(ofs, 4)?.try_into().unwrap()) as usize;
                Ok(Variant::Bytes(take(ofs, len)?))
            }
            _ => Err(malformed()),
        }
    }
}

impl VariantCodec for TagCodec {
    fn encode_variant(&self, value: &Variant) -> Result<Vec<u8>, ReplicationError> {
        let mut buf = Vec::new();
        Self::write(&mut buf, value);
        Ok(buf)
    }

    fn decode_variant(&self, bytes: &[u8]) -> Result<Variant, ReplicationError> {
        let mut ofs = 0;
        let value = Self::read(bytes, &mut ofs)?;
        if ofs != bytes.len() {
            return Err(ReplicationError::InvalidData {
                reason: "trailing bytes after variant".to_string(),
            });
        }
        Ok(value)
    }

    fn encode_variants(&self, values: &[Variant]) -> Result<Vec<u8>, ReplicationError> {
        let mut buf = Vec::new();
        for value in values {
            Self::write(&mut buf, value);
        }
        Ok(buf)
    }

    fn decode_variants(
        &self,
        bytes: &[u8],
        count: usize,
    ) -> Result<Vec<Variant>, ReplicationError> {
        let mut ofs = 0;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(Self::read(bytes, &mut ofs)?);
        }
        if ofs != bytes.len() {
            return Err(ReplicationError::InvalidData {
                reason: "trailing bytes after variant vector".to_string(),
            });
        }
        Ok(values)
    }
}

// Context and harness

pub struct TestContext {
    pub local_peer: PeerId,
    pub transport: Option<RecordingTransport>,
    pub cache: StubObjectCache,
    pub scene: SceneHandle,
    pub codec: TagCodec,
    pub now_msec: u64,
}

impl MultiplayerContext for TestContext {
    fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        self.transport.as_mut().map(|t| t as &mut dyn Transport)
    }

    fn object_cache(&mut self) -> &mut dyn ObjectCache {
        &mut self.cache
    }

    fn scene(&mut self) -> &mut dyn Scene {
        &mut self.scene
    }

    fn codec(&self) -> &dyn VariantCodec {
        &self.codec
    }

    fn ticks_msec(&self) -> u64 {
        self.now_msec
    }
}

/// A context with empty collaborators, for constructor-level tests.
pub fn bare_context(local_peer: PeerId) -> TestContext {
    TestContext {
        local_peer,
        transport: Some(RecordingTransport::new()),
        cache: StubObjectCache::default(),
        scene: SceneHandle(Rc::new(RefCell::new(SceneStore::default()))),
        codec: TagCodec,
        now_msec: 0,
    }
}

pub struct Harness {
    pub iface: SceneReplicationInterface<TestContext>,
    pub scene: Rc<RefCell<SceneStore>>,
}

impl Harness {
    /// A core whose local peer is `local_peer`, with a transport attached.
    pub fn new(local_peer: PeerId) -> Self {
        Self::with_options(local_peer, ReplicationOptions::default())
    }

    pub fn with_options(local_peer: PeerId, options: ReplicationOptions) -> Self {
        let scene = Rc::new(RefCell::new(SceneStore::default()));
        let ctx = TestContext {
            local_peer,
            transport: Some(RecordingTransport::new()),
            cache: StubObjectCache::default(),
            scene: SceneHandle(scene.clone()),
            codec: TagCodec,
            now_msec: 0,
        };
        let iface = SceneReplicationInterface::new(ctx, options).unwrap();
        Self { iface, scene }
    }

    /// A core with no transport peer attached yet.
    pub fn without_transport(local_peer: PeerId) -> Self {
        let mut harness = Self::new(local_peer);
        harness.iface.context_mut().transport = None;
        harness
    }

    pub fn attach_transport(&mut self) {
        self.iface.context_mut().transport = Some(RecordingTransport::new());
    }

    pub fn sent(&self) -> &[SentPacket] {
        &self
            .iface
            .context()
            .transport
            .as_ref()
            .expect("transport attached")
            .sent
    }

    pub fn clear_sent(&mut self) {
        self.iface
            .context_mut()
            .transport
            .as_mut()
            .expect("transport attached")
            .sent
            .clear();
    }

    pub fn cache(&mut self) -> &mut StubObjectCache {
        &mut self.iface.context_mut().cache
    }

    pub fn advance_time(&mut self, delta_msec: u64) {
        self.iface.context_mut().now_msec += delta_msec;
    }

    /// Shorthand: a node plus a spawner that tracks it, registered in the
    /// scene.
    pub fn add_spawner(&mut self, spawner_object: ObjectId, authority: PeerId) -> Rc<MockSpawner> {
        let parent = ObjectId::new(1);
        if !self.scene.borrow().node_exists(parent) {
            self.scene.borrow_mut().insert_node(parent, "Root");
        }
        let spawner = Rc::new(MockSpawner::new(
            spawner_object,
            authority,
            parent,
            self.scene.clone(),
        ));
        self.scene.borrow_mut().register_spawner(spawner.clone());
        spawner
    }
}

pub fn net_id_bytes(net_id: NetId) -> [u8; 4] {
    net_id.value().to_le_bytes()
}
