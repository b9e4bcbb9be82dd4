//! Bounded process list
//!
//! A bounded number of slots shared by two regions: the *active* region holds
//! entries awaiting the caller's disposition, the *kill list* holds entries
//! being terminated. Only removing an entry from either region frees a slot;
//! finishing does not.
//!
//! The list is driven by a single thread. Child exits are observed only when
//! the caller polls with [`ProcessList::reap_available`].

mod kill;
mod launch;
mod reap;
mod summary;

use crate::core::{split_command, EntryId, EntryState, NotifyReason, ProcessEntry};
use crate::error::{WardenError, WardenResult};
use crate::logging::debug;
use crate::platform::{DefaultBackend, GroupMode, ProcessBackend};

/// Callback fired synchronously on entry transitions. It must not touch the list.
pub type Notifier = Box<dyn FnMut(NotifyReason, &ProcessEntry) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessListOptions {
    /// Maximum number of entries across the active region and the kill list.
    pub capacity: usize,
    pub group_mode: GroupMode,
}

impl ProcessListOptions {
    pub fn new(capacity: usize, group_mode: GroupMode) -> Self {
        Self {
            capacity,
            group_mode,
        }
    }
}

struct Slot {
    generation: u64,
    entry: Option<ProcessEntry>,
}

#[derive(Debug, Clone, Copy)]
struct KillItem {
    id: EntryId,
    /// Index into the escalation table for the next signal.
    level: usize,
}

pub struct ProcessList<B: ProcessBackend = DefaultBackend> {
    options: ProcessListOptions,
    backend: B,
    slots: Vec<Slot>,
    active: Vec<EntryId>,
    kill_list: Vec<KillItem>,
    notify: Option<Notifier>,
}

impl ProcessList<DefaultBackend> {
    /// List over real child processes.
    pub fn new(options: ProcessListOptions) -> Self {
        Self::with_backend(options, DefaultBackend::new())
    }
}

impl<B: ProcessBackend> ProcessList<B> {
    /// Slots are allocated on demand, so `capacity` is only an upper bound.
    pub fn with_backend(options: ProcessListOptions, backend: B) -> Self {
        Self {
            options,
            backend,
            slots: Vec::new(),
            active: Vec::new(),
            kill_list: Vec::new(),
            notify: None,
        }
    }

    /// Install the transition callback. Any user context is captured by the closure.
    pub fn with_notify<F>(mut self, notify: F) -> Self
    where
        F: FnMut(NotifyReason, &ProcessEntry) + Send + 'static,
    {
        self.notify = Some(Box::new(notify));
        self
    }

    pub fn options(&self) -> ProcessListOptions {
        self.options
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Register `command` under `name` as a new `Initialized` entry.
    ///
    /// Fails without touching the list when every slot is taken or when the
    /// command does not split.
    pub fn register(&mut self, name: &str, command: &str) -> WardenResult<&ProcessEntry> {
        let slot = self.claim_slot().ok_or(WardenError::CapacityExceeded {
            capacity: self.options.capacity,
        })?;
        let argv = split_command(command)?;

        let id = EntryId {
            slot,
            generation: self.slots[slot].generation,
        };
        debug(format!("registered '{}' as {:?}: {:?}", name, id, argv));
        self.active.push(id);
        let entry: &ProcessEntry = self.slots[slot].entry.insert(ProcessEntry::new(
            id,
            name.to_string(),
            command.to_string(),
            argv,
        ));
        Ok(entry)
    }

    /// Look up an entry; `None` once it has been removed from the list.
    pub fn entry(&self, id: EntryId) -> Option<&ProcessEntry> {
        lookup(&self.slots, id)
    }

    /// Active entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &ProcessEntry> + '_ {
        self.active.iter().filter_map(|id| self.entry(*id))
    }

    /// Kill-list entries in the order they were moved there.
    pub fn kill_list_entries(&self) -> impl Iterator<Item = &ProcessEntry> + '_ {
        self.kill_list.iter().filter_map(|item| self.entry(item.id))
    }

    /// Entries held in both regions.
    pub fn len(&self) -> usize {
        self.active.len() + self.kill_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn kill_list_len(&self) -> usize {
        self.kill_list.len()
    }

    /// Active entries whose process is still running.
    pub fn running_count(&self) -> usize {
        self.entries()
            .filter(|entry| entry.state() == EntryState::Running)
            .count()
    }

    /// Drop every entry and start over with the same options.
    ///
    /// Processes that are still alive are not signalled or waited for; they
    /// keep running outside the supervisor's control.
    pub fn clear(&mut self) {
        let ids: Vec<EntryId> = self
            .active
            .drain(..)
            .chain(self.kill_list.drain(..).map(|item| item.id))
            .collect();
        for id in ids {
            let Some(entry) = self.release(id) else {
                continue;
            };
            if let (Some(pid), false) = (entry.pid(), entry.is_finished()) {
                debug(format!("leaving pid {} of '{}' running", pid, entry.name()));
            }
        }
    }

    /// Index of an empty slot, allocating one while under capacity.
    fn claim_slot(&mut self) -> Option<usize> {
        if self.len() >= self.options.capacity {
            return None;
        }
        if let Some(index) = self.slots.iter().position(|slot| slot.entry.is_none()) {
            return Some(index);
        }
        self.slots.push(Slot {
            generation: 0,
            entry: None,
        });
        Some(self.slots.len() - 1)
    }

    /// Free the slot behind `id`. Callers remove `id` from its region first.
    fn release(&mut self, id: EntryId) -> Option<ProcessEntry> {
        let slot = self
            .slots
            .get_mut(id.slot)
            .filter(|slot| slot.generation == id.generation)?;
        slot.generation += 1;
        slot.entry.take()
    }

    fn notify(&mut self, reason: NotifyReason, id: EntryId) {
        let Some(callback) = self.notify.as_mut() else {
            return;
        };
        if let Some(entry) = lookup(&self.slots, id) {
            callback(reason, entry);
        }
    }
}

fn lookup(slots: &[Slot], id: EntryId) -> Option<&ProcessEntry> {
    slots
        .get(id.slot)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.entry.as_ref())
}

/// Generation-checked mutable lookup that borrows only the slots, leaving the
/// backend free for the caller.
fn lookup_mut(slots: &mut [Slot], id: EntryId) -> Option<&mut ProcessEntry> {
    slots
        .get_mut(id.slot)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.entry.as_mut())
}
