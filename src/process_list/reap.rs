use super::{lookup, lookup_mut, ProcessList};
use crate::core::{EntryId, EntryState, NotifyReason};
use crate::error::{WardenError, WardenResult};
use crate::logging::debug;
use crate::platform::ProcessBackend;

impl<B: ProcessBackend> ProcessList<B> {
    /// Collect exit statuses of running entries in both regions without blocking.
    ///
    /// Every entry that exited becomes `Finished` and fires the finished
    /// notification. Kill-list entries that finished are then removed and their
    /// slots freed. Returns how many entries finished during this sweep.
    pub fn reap_available(&mut self) -> WardenResult<usize> {
        let mut reaped = 0;
        let active: Vec<EntryId> = self.active.clone();
        for id in active {
            if self.poll_entry(id)? {
                reaped += 1;
            }
        }
        reaped += self.reap_kill_list()?;
        Ok(reaped)
    }

    /// Same sweep restricted to the kill list.
    pub(super) fn reap_kill_list(&mut self) -> WardenResult<usize> {
        let mut reaped = 0;
        let ids: Vec<EntryId> = self.kill_list.iter().map(|item| item.id).collect();
        let mut outcome = Ok(());
        for id in ids {
            match self.poll_entry(id) {
                Ok(true) => reaped += 1,
                Ok(false) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.release_finished_kill_items();
        outcome.map(|()| reaped)
    }

    /// Returns whether the entry finished just now.
    fn poll_entry(&mut self, id: EntryId) -> WardenResult<bool> {
        let Some(entry) = lookup_mut(&mut self.slots, id) else {
            return Ok(false);
        };
        if entry.state() != EntryState::Running {
            return Ok(false);
        }
        let Some(pid) = entry.pid() else {
            return Ok(false);
        };

        let result = match self.backend.try_wait(pid) {
            Ok(Some(result)) => result,
            Ok(None) => return Ok(false),
            Err(source) => return Err(WardenError::ReapQuery { pid, source }),
        };

        debug(format!("'{}' pid={} {}", entry.name(), pid, result));
        entry.mark_finished(result);
        self.notify(NotifyReason::Finished, id);
        Ok(true)
    }

    fn release_finished_kill_items(&mut self) {
        let (finished, alive): (Vec<_>, Vec<_>) = self
            .kill_list
            .drain(..)
            .partition(|item| {
                lookup(&self.slots, item.id)
                    .map(|entry| entry.is_finished())
                    .unwrap_or(true)
            });
        self.kill_list = alive;
        for item in finished {
            self.release(item.id);
        }
    }
}
