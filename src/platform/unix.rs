use super::{GroupMode, KillSignal, ProcessBackend, SignalError, SpawnError};
use crate::core::ExitResult;
use crate::logging::debug;
use crate::signal;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::io;
use std::process::{Command, Stdio};

/// Backend over real child processes.
///
/// Children are created with `std::process::Command` and reaped with
/// `waitpid(pid, WNOHANG)`, never with a wildcard wait, so unrelated children
/// of the host program are left alone.
#[derive(Debug)]
pub struct UnixBackend {
    _private: (),
}

impl UnixBackend {
    pub fn new() -> Self {
        if let Err(err) = signal::reset_child_disposition() {
            debug(format!("could not reset SIGCHLD disposition: {}", err));
        }
        Self { _private: () }
    }
}

impl Default for UnixBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend for UnixBackend {
    fn spawn(&mut self, argv: &[String], group: GroupMode) -> Result<u32, SpawnError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SpawnError::Launch(io::Error::new(io::ErrorKind::InvalidInput, "empty argv")))?;

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        prepare_command(&mut command, group);

        let child = command.spawn().map_err(classify_spawn_error)?;
        let pid = child.id();
        // Dropping `Child` neither waits nor kills; the pid is reaped via `try_wait`.
        drop(child);
        Ok(pid)
    }

    fn try_wait(&mut self, pid: u32) -> io::Result<Option<ExitResult>> {
        let target = Pid::from_raw(pid as libc::pid_t);
        loop {
            match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(Some(ExitResult::Exited { code })),
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    return Ok(Some(ExitResult::Signaled { signal: sig as i32 }))
                }
                Ok(_) => return Ok(None),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(io::Error::from(errno)),
            }
        }
    }

    fn signal(&mut self, pid: u32, signal: KillSignal, group: GroupMode) -> Result<(), SignalError> {
        let target = Pid::from_raw(pid as libc::pid_t);
        let sig = match signal {
            KillSignal::Terminate => Signal::SIGTERM,
            KillSignal::Kill => Signal::SIGKILL,
        };

        let result = match group {
            GroupMode::OwnGroup => killpg(target, sig),
            GroupMode::Inherit => kill(target, sig),
        };

        match result {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(SignalError::NoSuchProcess),
            Err(errno) => Err(SignalError::Os(io::Error::from(errno))),
        }
    }
}

/// Put the child into its own process group when asked to.
fn prepare_command(cmd: &mut Command, group: GroupMode) {
    use std::os::unix::process::CommandExt;

    if group == GroupMode::OwnGroup {
        unsafe {
            cmd.pre_exec(|| {
                if set_process_group() != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }
}

/// Safely set process group ID
///
/// Encapsulates unsafe setpgid call
unsafe fn set_process_group() -> libc::c_int {
    unsafe { libc::setpgid(0, 0) }
}

fn classify_spawn_error(err: io::Error) -> SpawnError {
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::ENOMEM) => SpawnError::Resources(err),
        _ => SpawnError::Launch(err),
    }
}
