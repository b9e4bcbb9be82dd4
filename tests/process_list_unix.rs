#![cfg(unix)]

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use process_warden::{
    EntryState, ExitResult, GroupMode, NotifyReason, ProcessList, ProcessListOptions, Verdict,
    WardenError,
};
use serial_test::serial;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const WAIT_STEP: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Counters {
    executed: AtomicUsize,
    finished: AtomicUsize,
}

impl Counters {
    fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

fn new_list(capacity: usize) -> (ProcessList, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let sink = counters.clone();
    let list = ProcessList::new(ProcessListOptions::new(capacity, GroupMode::OwnGroup))
        .with_notify(move |reason, _entry| match reason {
            NotifyReason::Executed => {
                sink.executed.fetch_add(1, Ordering::SeqCst);
            }
            NotifyReason::Finished => {
                sink.finished.fetch_add(1, Ordering::SeqCst);
            }
        });
    (list, counters)
}

fn exec_path(name: &str) -> String {
    which::which(name)
        .unwrap_or_else(|_| panic!("{name} must be installed"))
        .to_string_lossy()
        .into_owned()
}

/// Reap until the running count and kill-list size match.
fn wait_for(list: &mut ProcessList, running: usize, in_kill_list: usize) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        list.reap_available().expect("reap should succeed");
        if list.running_count() == running && list.kill_list_len() == in_kill_list {
            return true;
        }
        thread::sleep(WAIT_STEP);
    }
    false
}

fn wait_for_file(path: &Path) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        thread::sleep(WAIT_STEP);
    }
}

/// A shell loop that ignores `signals` and touches `marker` once the trap is set.
fn stubborn_command(signals: &str, marker: &Path) -> String {
    format!(
        "sh -c \"trap '' {signals}; touch {}; while true; do sleep 1; done\"",
        marker.display()
    )
}

struct Stubborn {
    _dir: TempDir,
    int_marker: PathBuf,
    int_term_marker: PathBuf,
}

impl Stubborn {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        Self {
            int_marker: dir.path().join("ignore-int"),
            int_term_marker: dir.path().join("ignore-int-term"),
            _dir: dir,
        }
    }

    fn ignore_int(&self) -> String {
        stubborn_command("INT", &self.int_marker)
    }

    fn ignore_int_term(&self) -> String {
        stubborn_command("INT TERM", &self.int_term_marker)
    }

    fn wait_ready(&self) {
        wait_for_file(&self.int_marker);
        wait_for_file(&self.int_term_marker);
    }
}

#[test]
fn empty_list_is_trivially_successful() {
    let (mut list, counters) = new_list(10);
    assert_eq!(list.launch_all_initialized().unwrap(), 0);
    assert_eq!(counters.executed(), 0);
    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(counters.finished(), 0);
    assert_eq!(list.summary_result(), Verdict::Success);
    assert_eq!(list.summary_result_short(), Verdict::Success);
}

#[test]
fn true_and_false_fail_together() {
    let (mut list, counters) = new_list(10);
    list.register("true", &exec_path("true")).unwrap();
    list.register("false", &exec_path("false")).unwrap();

    list.launch_all_initialized().unwrap();
    assert_eq!(counters.executed(), 2);
    assert_eq!(list.running_count(), 2);

    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(counters.finished(), 2);
    assert_eq!(list.summary_result(), Verdict::Failure);
    assert_eq!(list.summary_result_short(), Verdict::Failure);
}

#[test]
fn missing_executable_is_a_failed_check() {
    let (mut list, counters) = new_list(10);
    list.register("true", &exec_path("true")).unwrap();
    let missing = list
        .register("missing", "/nonexistingdir/nonexistingfile")
        .unwrap()
        .id();

    list.launch_all_initialized().unwrap();
    assert_eq!(counters.executed(), 2);
    assert!(matches!(
        list.entry(missing).unwrap().exit_result(),
        Some(ExitResult::LaunchFailed { .. })
    ));

    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(counters.finished(), 2);
    assert_eq!(list.summary_result(), Verdict::Failure);
    assert_eq!(list.summary_result_short(), Verdict::Failure);
}

#[test]
fn capacity_three_runs_three_successes() {
    let (mut list, counters) = new_list(3);
    let true_path = exec_path("true");
    for name in ["true", "true2", "true3"] {
        list.register(name, &true_path).unwrap();
    }
    let err = list.register("true4", &true_path).unwrap_err();
    assert!(matches!(err, WardenError::CapacityExceeded { capacity: 3 }));

    list.launch_all_initialized().unwrap();
    assert_eq!(counters.executed(), 3);
    assert_eq!(list.running_count(), 3);

    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(counters.finished(), 3);
    assert_eq!(list.summary_result(), Verdict::Success);
    assert_eq!(list.summary_result_short(), Verdict::Success);
    assert_eq!(list.running_count(), 0);
}

#[test]
#[serial]
fn blocking_process_goes_through_kill_list() {
    let (mut list, counters) = new_list(10);
    list.register("true", &exec_path("true")).unwrap();
    let cat = list
        .register("cat", &format!("{} /dev/zero", exec_path("cat")))
        .unwrap()
        .id();

    list.launch_all_initialized().unwrap();
    assert!(wait_for(&mut list, 1, 0));
    assert_eq!(counters.finished(), 1);
    assert_eq!(list.summary_result(), Verdict::Indeterminate);
    assert_eq!(list.summary_result_short(), Verdict::Indeterminate);

    assert_eq!(list.move_active_to_kill_list(), 1);
    assert_eq!(list.entry(cat).unwrap().state(), EntryState::Running);
    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 0));
    assert!(list.entry(cat).is_none());
    assert_eq!(list.process_kill_list(), 0);
}

#[test]
#[serial]
fn escalation_needs_second_step_for_term_ignoring_process() {
    let stubborn = Stubborn::new();
    let (mut list, counters) = new_list(10);
    list.register("ignoresig1", &stubborn.ignore_int()).unwrap();
    list.register("ignoresig2", &stubborn.ignore_int_term()).unwrap();

    list.launch_all_initialized().unwrap();
    assert_eq!(counters.executed(), 2);
    stubborn.wait_ready();

    thread::sleep(Duration::from_millis(500));
    list.reap_available().unwrap();
    assert_eq!(list.running_count(), 2);
    assert_eq!(counters.finished(), 0);
    assert_eq!(list.summary_result(), Verdict::Indeterminate);

    list.move_active_to_kill_list();
    assert!(wait_for(&mut list, 0, 2));

    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 1));

    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 0));
}

#[test]
#[serial]
fn kill_list_shares_capacity_with_active_region() {
    let stubborn = Stubborn::new();
    let true_path = exec_path("true");
    let (mut list, _counters) = new_list(3);

    for name in ["true", "true2", "true3"] {
        list.register(name, &true_path).unwrap();
    }
    assert!(list.register("true4", &true_path).is_err());
    list.launch_all_initialized().unwrap();
    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(list.summary_result(), Verdict::Success);

    // All finished, so moving frees every slot.
    assert_eq!(list.move_active_to_kill_list(), 0);
    list.register("true", &true_path).unwrap();
    list.register("ignoresig1", &stubborn.ignore_int()).unwrap();
    list.register("ignoresig2", &stubborn.ignore_int_term()).unwrap();
    assert!(list.register("true4", &true_path).is_err());

    list.launch_all_initialized().unwrap();
    stubborn.wait_ready();
    assert!(wait_for(&mut list, 2, 0));
    assert_eq!(list.summary_result(), Verdict::Indeterminate);
    assert_eq!(list.summary_result_short(), Verdict::Indeterminate);
    assert!(list.register("true4", &true_path).is_err());

    // The finished entry frees its slot; the two live ones keep theirs.
    list.move_active_to_kill_list();
    list.register("true4", &true_path).unwrap();
    assert!(list.register("true5", &true_path).is_err());

    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 1));
    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 0));

    // `true4` was never launched, so moving it frees its slot right away.
    assert_eq!(list.move_active_to_kill_list(), 0);
    assert_eq!(list.kill_list_len(), 0);
    assert_eq!(list.summary_result(), Verdict::Success);
    for name in ["true", "true2", "true3"] {
        list.register(name, &true_path).unwrap();
    }
    assert!(list.register("true4", &true_path).is_err());
}

#[test]
fn never_launched_entry_does_not_hold_capacity_after_move() {
    let (mut list, counters) = new_list(1);
    let true_path = exec_path("true");
    let pending = list.register("pending", &true_path).unwrap().id();

    assert_eq!(list.move_active_to_kill_list(), 0);
    assert_eq!(list.kill_list_len(), 0);
    assert!(list.entry(pending).is_none());

    list.register("next", &true_path).unwrap();
    list.launch_all_initialized().unwrap();
    assert!(wait_for(&mut list, 0, 0));
    assert_eq!(counters.executed(), 1);
    assert_eq!(list.summary_result(), Verdict::Success);
}

#[test]
#[serial]
fn short_circuit_differs_from_full_summary() {
    let (mut list, counters) = new_list(3);
    list.register("true", &exec_path("true")).unwrap();
    list.register("false", &exec_path("false")).unwrap();
    list.register("loop", "sh -c \"while true; do sleep 1; done\"")
        .unwrap();

    list.launch_all_initialized().unwrap();
    assert_eq!(counters.executed(), 3);
    assert!(wait_for(&mut list, 1, 0));
    assert_eq!(counters.finished(), 2);
    assert_eq!(list.summary_result(), Verdict::Indeterminate);
    assert_eq!(list.summary_result_short(), Verdict::Failure);

    list.move_active_to_kill_list();
    list.process_kill_list();
    assert!(wait_for(&mut list, 0, 0));
}

#[test]
#[serial]
fn killall_reclaims_stubborn_processes_within_budget() {
    let stubborn = Stubborn::new();
    let (mut list, counters) = new_list(10);
    list.register("ignoresig1", &stubborn.ignore_int()).unwrap();
    list.register("ignoresig2", &stubborn.ignore_int_term()).unwrap();

    list.launch_all_initialized().unwrap();
    stubborn.wait_ready();
    thread::sleep(Duration::from_millis(500));
    list.reap_available().unwrap();
    assert_eq!(list.running_count(), 2);
    assert_eq!(counters.finished(), 0);

    assert_eq!(list.killall(Duration::from_secs(2)), 0);
    assert_eq!(list.kill_list_len(), 0);
    assert!(list.is_empty());
}

#[test]
fn killall_on_empty_list_succeeds() {
    let (mut list, _counters) = new_list(10);
    let started = Instant::now();
    assert_eq!(list.killall(Duration::from_secs(2)), 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
#[serial]
fn clear_leaves_processes_running() {
    let (mut list, _counters) = new_list(1);
    let id = list
        .register("sleep", &format!("{} 30", exec_path("sleep")))
        .unwrap()
        .id();
    list.launch_all_initialized().unwrap();
    let pid = list.entry(id).unwrap().pid().unwrap();

    list.clear();
    assert!(list.is_empty());
    let target = Pid::from_raw(pid as i32);
    assert!(kill(target, None::<Signal>).is_ok(), "child should still exist");

    // Clean up the orphan ourselves.
    kill(target, Signal::SIGKILL).unwrap();
    waitpid(target, None).unwrap();
}
