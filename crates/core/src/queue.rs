//! Change queue with coalescing rules and update logs
//!
//! One [`ChangeQueue`] exists per adapter. A single mutex guards the pending
//! change sets, the charge record outbox, and the two update logs; every
//! exposed operation acquires it internally. The lock is held only for
//! in-memory work, never across a network call.
//!
//! ## Coalescing rules
//! - An addition subsumes pending and future updates for the same entity:
//!   the create push carries full entity data.
//! - A removal of a still-pending addition cancels both, including status
//!   tuples and logged field changes for that entity.
//! - Status updates are last-write-wins per (entity, kind) across the fast
//!   and delayed lists.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;
use roamsync_domain::{ChargeRecord, EvseId, FieldChange, StatusKind, StatusUpdate};
use tracing::{debug, instrument};

/// Number of pending items per queue class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub additions: usize,
    pub updates: usize,
    pub removals: usize,
    pub fast_status: usize,
    pub delayed_status: usize,
    pub records: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.additions
            + self.updates
            + self.removals
            + self.fast_status
            + self.delayed_status
            + self.records
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Snapshot taken atomically by a full flush.
///
/// Once drained the batch is private to the flush cycle; concurrent enqueues
/// land in the emptied live collections.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub to_add: Vec<EvseId>,
    pub to_update: Vec<EvseId>,
    pub to_remove: Vec<EvseId>,
    pub fast_status: Vec<StatusUpdate>,
    pub delayed_status: Vec<StatusUpdate>,
    /// Field-level changes recorded since the previous flush, per entity.
    pub property_updates: BTreeMap<EvseId, Vec<FieldChange>>,
    /// Audit trail of every status enqueue since the previous flush.
    pub status_log: Vec<StatusUpdate>,
}

impl ChangeBatch {
    /// True when no collection carries transmittable work. The logs are
    /// passengers of the snapshot and do not count.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_update.is_empty()
            && self.to_remove.is_empty()
            && self.fast_status.is_empty()
            && self.delayed_status.is_empty()
    }

    /// Delayed and fast tuples merged, deduplicated newest-per-(entity, kind).
    ///
    /// Enqueue already maintains uniqueness across both lists; this re-checks
    /// defensively so a flush never transmits a superseded tuple.
    pub fn coalesced_statuses(&self) -> Vec<StatusUpdate> {
        coalesce_statuses(self.delayed_status.iter().chain(self.fast_status.iter()))
    }
}

/// Keeps the newest update per (entity, kind), preserving first-seen order.
fn coalesce_statuses<'a>(updates: impl Iterator<Item = &'a StatusUpdate>) -> Vec<StatusUpdate> {
    let mut kept: Vec<StatusUpdate> = Vec::new();
    let mut index: HashMap<(EvseId, StatusKind), usize> = HashMap::new();

    for update in updates {
        let key = (update.evse.clone(), update.kind());
        match index.get(&key) {
            Some(&pos) => {
                if update.recorded_at >= kept[pos].recorded_at {
                    kept[pos] = update.clone();
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(update.clone());
            }
        }
    }

    kept
}

#[derive(Debug, Default)]
struct QueueState {
    to_add: BTreeSet<EvseId>,
    to_update: BTreeSet<EvseId>,
    to_remove: BTreeSet<EvseId>,
    fast_status: Vec<StatusUpdate>,
    delayed_status: Vec<StatusUpdate>,
    outbox: VecDeque<ChargeRecord>,
    property_log: BTreeMap<EvseId, Vec<FieldChange>>,
    status_log: Vec<StatusUpdate>,
}

impl QueueState {
    fn depths(&self) -> QueueDepths {
        QueueDepths {
            additions: self.to_add.len(),
            updates: self.to_update.len(),
            removals: self.to_remove.len(),
            fast_status: self.fast_status.len(),
            delayed_status: self.delayed_status.len(),
            records: self.outbox.len(),
        }
    }

    /// Drop the pending tuple for (entity, kind) from both status lists.
    fn purge_status(&mut self, evse: &EvseId, kind: StatusKind) {
        self.fast_status
            .retain(|u| !(u.evse == *evse && u.kind() == kind));
        self.delayed_status
            .retain(|u| !(u.evse == *evse && u.kind() == kind));
    }

    /// Drop every pending trace of an entity except the audit logs.
    fn purge_entity(&mut self, evse: &EvseId) {
        self.to_update.remove(evse);
        self.fast_status.retain(|u| u.evse != *evse);
        self.delayed_status.retain(|u| u.evse != *evse);
        self.property_log.remove(evse);
    }

    fn has_status(&self, evse: &EvseId, kind: StatusKind) -> bool {
        self.fast_status
            .iter()
            .chain(self.delayed_status.iter())
            .any(|u| u.evse == *evse && u.kind() == kind)
    }
}

/// Internally synchronized change queue.
///
/// Callers never hold the lock; every method is a complete atomic operation.
pub struct ChangeQueue {
    state: Mutex<QueueState>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
        }
    }

    // ------------------------------------------------------------------
    // Enqueue operations
    // ------------------------------------------------------------------

    /// Queue an entity for creation at the partner.
    #[instrument(skip(self), fields(evse = %evse))]
    pub fn enqueue_addition(&self, evse: EvseId) -> QueueDepths {
        let mut state = self.state.lock();
        state.to_remove.remove(&evse);
        state.to_update.remove(&evse);
        state.to_add.insert(evse);
        debug!("addition enqueued");
        state.depths()
    }

    /// Queue an entity for a data update and log its field changes.
    ///
    /// Skipped entirely when a removal is pending; folded into the pending
    /// addition when one exists (the create carries full data).
    #[instrument(skip(self, changes), fields(evse = %evse, changes = changes.len()))]
    pub fn enqueue_update(&self, evse: EvseId, changes: Vec<FieldChange>) -> QueueDepths {
        let mut state = self.state.lock();
        if state.to_remove.contains(&evse) {
            debug!("update skipped, removal pending");
            return state.depths();
        }

        let add_pending = state.to_add.contains(&evse);
        if !add_pending {
            state.to_update.insert(evse.clone());
        }
        state.property_log.entry(evse).or_default().extend(changes);
        debug!(add_pending, "update enqueued");
        state.depths()
    }

    /// Queue an entity for deletion at the partner.
    ///
    /// When the entity is still awaiting creation the addition and the
    /// removal cancel out and nothing is transmitted.
    #[instrument(skip(self), fields(evse = %evse))]
    pub fn enqueue_removal(&self, evse: EvseId) -> QueueDepths {
        let mut state = self.state.lock();
        if state.to_add.remove(&evse) {
            state.purge_entity(&evse);
            debug!("removal cancelled pending addition");
            return state.depths();
        }

        state.purge_entity(&evse);
        state.to_remove.insert(evse);
        debug!("removal enqueued");
        state.depths()
    }

    /// Queue a status update on the fast or delayed list.
    ///
    /// Last-write-wins per (entity, kind): the superseded tuple is discarded
    /// whichever list it sits on. Every call is recorded in the status log,
    /// including tuples dropped because a removal is pending.
    #[instrument(skip(self, update), fields(evse = %update.evse, kind = %update.kind(), fast))]
    pub fn enqueue_status(&self, update: StatusUpdate, fast: bool) -> QueueDepths {
        let mut state = self.state.lock();
        state.status_log.push(update.clone());

        if state.to_remove.contains(&update.evse) {
            debug!("status dropped, removal pending");
            return state.depths();
        }

        state.purge_status(&update.evse, update.kind());
        if fast {
            state.fast_status.push(update);
        } else {
            state.delayed_status.push(update);
        }
        debug!("status enqueued");
        state.depths()
    }

    /// Append a charge record to the outbox.
    #[instrument(skip(self, record), fields(session = %record.session_id))]
    pub fn submit_record(&self, record: ChargeRecord) -> QueueDepths {
        let mut state = self.state.lock();
        state.outbox.push_back(record);
        debug!("charge record enqueued");
        state.depths()
    }

    // ------------------------------------------------------------------
    // Drain operations
    // ------------------------------------------------------------------

    /// Atomically take everything: the five collections and both logs.
    ///
    /// The live collections are left empty; enqueues arriving after this call
    /// belong to the next cycle.
    #[instrument(skip(self))]
    pub fn drain_all(&self) -> ChangeBatch {
        let mut state = self.state.lock();
        let batch = ChangeBatch {
            to_add: std::mem::take(&mut state.to_add).into_iter().collect(),
            to_update: std::mem::take(&mut state.to_update).into_iter().collect(),
            to_remove: std::mem::take(&mut state.to_remove).into_iter().collect(),
            fast_status: std::mem::take(&mut state.fast_status),
            delayed_status: std::mem::take(&mut state.delayed_status),
            property_updates: std::mem::take(&mut state.property_log),
            status_log: std::mem::take(&mut state.status_log),
        };
        debug!(
            additions = batch.to_add.len(),
            updates = batch.to_update.len(),
            removals = batch.to_remove.len(),
            statuses = batch.fast_status.len() + batch.delayed_status.len(),
            "full snapshot drained"
        );
        batch
    }

    /// Take the fast status list, holding back entities that are still
    /// awaiting creation.
    ///
    /// A status-only update for an entity the partner does not know yet
    /// cannot succeed; those tuples move to the delayed list and ride with
    /// the full flush that carries the addition.
    #[instrument(skip(self))]
    pub fn drain_fast_status(&self) -> Vec<StatusUpdate> {
        let mut state = self.state.lock();
        let fast = std::mem::take(&mut state.fast_status);
        let (held_back, ready): (Vec<_>, Vec<_>) = fast
            .into_iter()
            .partition(|update| state.to_add.contains(&update.evse));

        if !held_back.is_empty() {
            debug!(held_back = held_back.len(), "statuses deferred behind pending additions");
            state.delayed_status.extend(held_back);
        }

        coalesce_statuses(ready.iter())
    }

    /// Take the whole outbox in submission order.
    #[instrument(skip(self))]
    pub fn drain_records(&self) -> Vec<ChargeRecord> {
        let mut state = self.state.lock();
        state.outbox.drain(..).collect()
    }

    // ------------------------------------------------------------------
    // Restore operations (retry path)
    // ------------------------------------------------------------------
    //
    // Restores re-apply the coalescing invariants against whatever was
    // enqueued while the flush ran, and never touch the audit logs.

    /// Return additions whose create call failed with a retryable error.
    pub fn restore_additions(&self, entities: Vec<EvseId>) {
        let mut state = self.state.lock();
        for evse in entities {
            // A removal enqueued during the flush is newer and wins.
            if state.to_remove.contains(&evse) {
                continue;
            }
            state.to_update.remove(&evse);
            state.to_add.insert(evse);
        }
    }

    /// Return updates whose push failed with a retryable error.
    pub fn restore_updates(&self, entities: Vec<EvseId>) {
        let mut state = self.state.lock();
        for evse in entities {
            if state.to_add.contains(&evse) || state.to_remove.contains(&evse) {
                continue;
            }
            state.to_update.insert(evse);
        }
    }

    /// Return removals whose delete call failed with a retryable error.
    pub fn restore_removals(&self, entities: Vec<EvseId>) {
        let mut state = self.state.lock();
        for evse in entities {
            // An addition enqueued during the flush cancels the removal.
            if state.to_add.remove(&evse) {
                state.purge_entity(&evse);
                continue;
            }
            state.purge_entity(&evse);
            state.to_remove.insert(evse);
        }
    }

    /// Return failed status tuples to the delayed list.
    ///
    /// A tuple enqueued during the flush for the same (entity, kind) is newer
    /// and keeps precedence.
    pub fn restore_statuses(&self, updates: Vec<StatusUpdate>) {
        let mut state = self.state.lock();
        for update in updates {
            if state.to_remove.contains(&update.evse) {
                continue;
            }
            if state.has_status(&update.evse, update.kind()) {
                continue;
            }
            state.delayed_status.push(update);
        }
    }

    /// Put undelivered records back at the front of the outbox, preserving
    /// their original order.
    pub fn restore_records(&self, records: Vec<ChargeRecord>) {
        let mut state = self.state.lock();
        for record in records.into_iter().rev() {
            state.outbox.push_front(record);
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn depths(&self) -> QueueDepths {
        self.state.lock().depths()
    }

    pub fn is_empty(&self) -> bool {
        self.depths().is_empty()
    }
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}
