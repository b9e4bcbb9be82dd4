use super::{KillItem, ProcessList};
use crate::config::{KILLALL_ATTEMPTS, MIN_KILLALL_PAUSE};
use crate::core::EntryState;
use crate::logging::{debug, info, warn};
use crate::platform::{KillSignal, ProcessBackend, SignalError};
use std::thread;
use std::time::{Duration, Instant};

/// Signal sent at each escalation level; levels past the end repeat the last one.
const ESCALATION: [KillSignal; 2] = [KillSignal::Terminate, KillSignal::Kill];

fn signal_for_level(level: usize) -> KillSignal {
    ESCALATION[level.min(ESCALATION.len() - 1)]
}

impl<B: ProcessBackend> ProcessList<B> {
    /// Hand the whole active region over to the kill path.
    ///
    /// Entries with no live process (finished, or never launched) are removed
    /// on the spot and free their slots. `Running` entries move to the kill
    /// list in order and keep their slots. Returns how many entries were moved.
    pub fn move_active_to_kill_list(&mut self) -> usize {
        let active = std::mem::take(&mut self.active);
        let mut moved = 0;
        for id in active {
            let running = self
                .entry(id)
                .map(|entry| entry.state() == EntryState::Running)
                .unwrap_or(false);
            if running {
                self.kill_list.push(KillItem { id, level: 0 });
                moved += 1;
            } else {
                self.release(id);
            }
        }
        if moved > 0 {
            debug(format!("{} entries moved to kill list", moved));
        }
        moved
    }

    /// Apply one escalation step to every entry left in the kill list.
    ///
    /// Running entries receive the signal of their current level, then the
    /// level goes up. A reap sweep follows and removes whatever exited. Never
    /// fails; returns the number of entries still in the kill list.
    pub fn process_kill_list(&mut self) -> usize {
        self.sweep_kill_list();

        let group_mode = self.options.group_mode;
        for index in 0..self.kill_list.len() {
            let KillItem { id, level } = self.kill_list[index];
            let Some(entry) = self.entry(id) else {
                continue;
            };
            let (EntryState::Running, Some(pid)) = (entry.state(), entry.pid()) else {
                continue;
            };

            let signal = signal_for_level(level);
            debug(format!("sending {:?} to '{}' pid={}", signal, entry.name(), pid));
            match self.backend.signal(pid, signal, group_mode) {
                Ok(()) => {}
                Err(SignalError::NoSuchProcess) => {
                    debug(format!("pid {} already gone", pid));
                }
                Err(err) => warn(format!("signalling pid {}: {}", pid, err)),
            }
            self.kill_list[index].level = level + 1;
        }

        self.sweep_kill_list();
        self.kill_list.len()
    }

    /// Move everything to the kill list and escalate until it is empty or
    /// `timeout` has elapsed. Returns the number of entries left behind.
    pub fn killall(&mut self, timeout: Duration) -> usize {
        self.move_active_to_kill_list();
        if self.kill_list.is_empty() {
            return 0;
        }

        let started = Instant::now();
        let pause = (timeout / KILLALL_ATTEMPTS).max(MIN_KILLALL_PAUSE);
        loop {
            let remaining = self.process_kill_list();
            if remaining == 0 {
                info(format!("kill list drained in {:?}", started.elapsed()));
                return 0;
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn(format!(
                    "{} entries still alive after {:?}",
                    remaining, timeout
                ));
                return remaining;
            }
            thread::sleep(pause.min(timeout - elapsed));
        }
    }

    fn sweep_kill_list(&mut self) {
        if let Err(err) = self.reap_kill_list() {
            warn(format!("kill list sweep: {}", err));
        }
    }

    #[cfg(test)]
    pub(crate) fn kill_level(&self, id: crate::core::EntryId) -> Option<usize> {
        self.kill_list
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.level)
    }
}
