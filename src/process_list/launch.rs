use super::{lookup_mut, ProcessList};
use crate::core::{EntryId, EntryState, ExitResult, NotifyReason};
use crate::error::{WardenError, WardenResult};
use crate::logging::{debug, warn};
use crate::platform::{ProcessBackend, SpawnError};

impl<B: ProcessBackend> ProcessList<B> {
    /// Start every `Initialized` entry of the active region.
    ///
    /// A command that cannot be started is finished on the spot with
    /// [`ExitResult::LaunchFailed`] and counts as both executed and finished.
    /// Only a system-wide shortage of resources aborts the batch; entries
    /// dispatched before it keep their state. Returns how many entries left
    /// `Initialized`.
    pub fn launch_all_initialized(&mut self) -> WardenResult<usize> {
        let pending: Vec<EntryId> = self
            .entries()
            .filter(|entry| entry.state() == EntryState::Initialized)
            .map(|entry| entry.id())
            .collect();

        let mut dispatched = 0;
        for id in pending {
            self.launch_one(id)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn launch_one(&mut self, id: EntryId) -> WardenResult<()> {
        let group_mode = self.options.group_mode;
        let Some(entry) = lookup_mut(&mut self.slots, id) else {
            return Ok(());
        };

        match self.backend.spawn(entry.argv(), group_mode) {
            Ok(pid) => {
                entry.mark_running(pid);
                debug(format!("started '{}' pid={}", entry.name(), pid));
                self.notify(NotifyReason::Executed, id);
            }
            Err(SpawnError::Launch(err)) => {
                warn(format!("failed to start '{}': {}", entry.name(), err));
                entry.mark_finished(ExitResult::LaunchFailed {
                    reason: err.to_string(),
                });
                self.notify(NotifyReason::Executed, id);
                self.notify(NotifyReason::Finished, id);
            }
            Err(SpawnError::Resources(err)) => return Err(WardenError::Io(err)),
        }
        Ok(())
    }
}
