use super::{GroupMode, KillSignal, ProcessBackend, SignalError, SpawnError};
use crate::core::ExitResult;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

/// Record of delivered signals, shared so it outlives the backend.
pub type SignalJournal = Arc<Mutex<Vec<(u32, KillSignal, GroupMode)>>>;

/// In-memory backend whose children only exit when told to.
///
/// Programs can be declared missing (spawn fails), exhausting (spawn fails
/// for lack of resources), instantly exiting, or immune to particular signals.
/// Every signal delivered is recorded for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    next_pid: u32,
    children: BTreeMap<u32, ScriptedChild>,
    missing: HashSet<String>,
    exhausting: HashSet<String>,
    instant_exits: HashMap<String, i32>,
    immunities: HashMap<String, HashSet<KillSignal>>,
    signals: SignalJournal,
    query_failure: Option<QueryFailure>,
}

#[derive(Debug, Clone, Copy)]
struct QueryFailure {
    errno: i32,
    /// `None` fails every query until cleared.
    remaining: Option<usize>,
}

#[derive(Debug)]
struct ScriptedChild {
    program: String,
    exit: Option<ExitResult>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            next_pid: 1000,
            ..Self::default()
        }
    }

    /// Spawning `program` fails as if it did not exist.
    pub fn with_missing_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Spawning `program` fails as if the system ran out of processes.
    pub fn with_exhausted_program(mut self, program: &str) -> Self {
        self.exhausting.insert(program.to_string());
        self
    }

    /// Children running `program` exit with `code` right after starting.
    pub fn with_instant_exit(mut self, program: &str, code: i32) -> Self {
        self.instant_exits.insert(program.to_string(), code);
        self
    }

    /// Children running `program` survive `signal`.
    pub fn with_immunity(mut self, program: &str, signal: KillSignal) -> Self {
        self.immunities
            .entry(program.to_string())
            .or_default()
            .insert(signal);
        self
    }

    /// Make `pid` exit with `code`; it becomes visible to the next `try_wait`.
    pub fn exit(&mut self, pid: u32, code: i32) {
        if let Some(child) = self.children.get_mut(&pid) {
            child.exit.get_or_insert(ExitResult::Exited { code });
        }
    }

    /// Make every live child of `program` exit with `code`.
    pub fn exit_program(&mut self, program: &str, code: i32) {
        for child in self.children.values_mut() {
            if child.program == program {
                child.exit.get_or_insert(ExitResult::Exited { code });
            }
        }
    }

    /// Make every exit query fail with the given OS error until cleared.
    pub fn fail_queries(&mut self, errno: Option<i32>) {
        self.query_failure = errno.map(|errno| QueryFailure {
            errno,
            remaining: None,
        });
    }

    /// Make only the next `count` exit queries fail with `errno`.
    pub fn fail_next_queries(mut self, errno: i32, count: usize) -> Self {
        self.query_failure = (count > 0).then_some(QueryFailure {
            errno,
            remaining: Some(count),
        });
        self
    }

    /// Pids that were spawned and not yet reaped.
    pub fn live_pids(&self) -> Vec<u32> {
        self.children.keys().copied().collect()
    }

    /// Handle to the signal record that stays readable after the backend is gone.
    pub fn journal(&self) -> SignalJournal {
        Arc::clone(&self.signals)
    }

    pub fn signals(&self) -> Vec<(u32, KillSignal, GroupMode)> {
        self.signals
            .lock()
            .map(|signals| signals.clone())
            .unwrap_or_default()
    }

    pub fn signals_for(&self, pid: u32) -> Vec<KillSignal> {
        self.signals()
            .into_iter()
            .filter(|(target, _, _)| *target == pid)
            .map(|(_, signal, _)| signal)
            .collect()
    }
}

impl ProcessBackend for ScriptedBackend {
    fn spawn(&mut self, argv: &[String], _group: GroupMode) -> Result<u32, SpawnError> {
        let program = argv
            .first()
            .ok_or_else(|| SpawnError::Launch(io::Error::new(io::ErrorKind::InvalidInput, "empty argv")))?;
        if self.missing.contains(program) {
            return Err(SpawnError::Launch(io::Error::from(io::ErrorKind::NotFound)));
        }
        if self.exhausting.contains(program) {
            return Err(SpawnError::Resources(io::Error::from_raw_os_error(libc::EAGAIN)));
        }

        self.next_pid += 1;
        let pid = self.next_pid;
        self.children.insert(
            pid,
            ScriptedChild {
                program: program.clone(),
                exit: self
                    .instant_exits
                    .get(program)
                    .map(|&code| ExitResult::Exited { code }),
            },
        );
        Ok(pid)
    }

    fn try_wait(&mut self, pid: u32) -> io::Result<Option<ExitResult>> {
        if let Some(failure) = self.query_failure {
            self.query_failure = match failure.remaining {
                None => Some(failure),
                Some(remaining) if remaining <= 1 => None,
                Some(remaining) => Some(QueryFailure {
                    remaining: Some(remaining - 1),
                    ..failure
                }),
            };
            return Err(io::Error::from_raw_os_error(failure.errno));
        }

        let finished = self
            .children
            .get(&pid)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such child"))?
            .exit
            .is_some();
        if !finished {
            return Ok(None);
        }
        Ok(self.children.remove(&pid).and_then(|child| child.exit))
    }

    fn signal(&mut self, pid: u32, signal: KillSignal, group: GroupMode) -> Result<(), SignalError> {
        let child = self
            .children
            .get_mut(&pid)
            .ok_or(SignalError::NoSuchProcess)?;
        if let Ok(mut signals) = self.signals.lock() {
            signals.push((pid, signal, group));
        }

        let immune = self
            .immunities
            .get(&child.program)
            .map(|signals| signals.contains(&signal))
            .unwrap_or(false);
        if !immune {
            child.exit.get_or_insert(ExitResult::Signaled {
                signal: signal.as_raw(),
            });
        }
        Ok(())
    }
}
