use std::collections::{HashMap, HashSet};

use crate::types::{ObjectId, SyncTime};
use crate::wrapping_number::sequence_greater_than;

/// What one connected peer currently knows: which objects it has seen a
/// SPAWN for, which it is subscribed to for SYNC, its outgoing/incoming
/// time tags, and the nodes it instantiated from our SPAWN packets.
pub(crate) struct PeerRecord {
    pub(crate) spawned: HashSet<ObjectId>,
    pub(crate) synced: HashSet<ObjectId>,
    /// Monotone tag stamped on the next outgoing SYNC batch.
    next_out_time: SyncTime,
    /// Highest time tag received from this peer so far.
    last_in_time: SyncTime,
    has_in_time: bool,
    /// Incoming net ID to the locally instantiated node.
    pub(crate) remote: HashMap<u32, ObjectId>,
}

impl PeerRecord {
    pub(crate) fn new() -> Self {
        Self {
            spawned: HashSet::new(),
            synced: HashSet::new(),
            next_out_time: 0,
            last_in_time: 0,
            has_in_time: false,
            remote: HashMap::new(),
        }
    }

    /// Returns the tag for the batch about to go out, then advances.
    pub(crate) fn take_out_time(&mut self) -> SyncTime {
        let time = self.next_out_time;
        self.next_out_time = self.next_out_time.wrapping_add(1);
        time
    }

    /// Records an incoming batch tag, keeping the newest under wrap-aware
    /// ordering.
    pub(crate) fn record_in_time(&mut self, time: SyncTime) {
        if !self.has_in_time || sequence_greater_than(time, self.last_in_time) {
            self.last_in_time = time;
            self.has_in_time = true;
        }
    }

    pub(crate) fn last_in_time(&self) -> Option<SyncTime> {
        self.has_in_time.then_some(self.last_in_time)
    }
}
