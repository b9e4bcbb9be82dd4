//! Signal dispositions the supervisor depends on

use std::io;

/// Restore the default `SIGCHLD` disposition.
///
/// A supervisor started with `SIGCHLD` ignored would have its children
/// auto-reaped by the kernel, and every exit query would then fail with
/// `ECHILD`. Runs at most once per process.
pub fn reset_child_disposition() -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::sync::OnceLock;

        static RESULT: OnceLock<Option<i32>> = OnceLock::new();

        let errno = RESULT.get_or_init(|| unsafe { set_default_sigchld() });
        if let Some(code) = errno {
            return Err(io::Error::from_raw_os_error(*code));
        }
    }

    Ok(())
}

#[cfg(unix)]
/// Encapsulates the unsafe sigaction call; returns the errno on failure.
unsafe fn set_default_sigchld() -> Option<i32> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();

        action.sa_flags = libc::SA_RESTART;
        action.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut action.sa_mask as *mut libc::sigset_t);

        if libc::sigaction(libc::SIGCHLD, &action, std::ptr::null_mut()) != 0 {
            return io::Error::last_os_error().raw_os_error();
        }
    }
    None
}
