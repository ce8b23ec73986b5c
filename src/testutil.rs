//! Running credential-changing code in a forked child.

use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use std::panic::{self, AssertUnwindSafe};

#[derive(PartialEq, Eq, Debug)]
pub enum ChildStatus {
    Aborted,
    Signaled(Signal),
    Other,
}

/// Run `f` in a forked child and report how it ended: `Ok(code)` for a
/// normal exit with `f`'s return value, 101 if `f` panicked.
///
/// The child must stick to simple code: only the forking thread survives.
pub fn in_child<F: FnOnce() -> i32>(f: F) -> Result<i32, ChildStatus> {
    match unsafe { fork() }.expect("fork failed") {
        ForkResult::Child => {
            let no_core = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            unsafe { libc::setrlimit(libc::RLIMIT_CORE, &no_core) };
            let code = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(101);
            unsafe { libc::_exit(code) }
        }
        ForkResult::Parent { child } => match waitpid(child, None).expect("waitpid failed") {
            WaitStatus::Exited(_, code) => Ok(code),
            WaitStatus::Signaled(_, Signal::SIGABRT, _) => Err(ChildStatus::Aborted),
            WaitStatus::Signaled(_, signal, _) => Err(ChildStatus::Signaled(signal)),
            _ => Err(ChildStatus::Other),
        },
    }
}
