use crate::errors::*;
use nix::unistd::{self, Gid, Uid};
use std::fmt;

/// Primitive used to set the real, effective and saved IDs
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum IdentitySyscallFamily {
    /// `setresuid()`/`setresgid()`: all three slots in one call
    CombinedAtomic,
    /// `setreuid()`/`setregid()`: real and effective, saved follows effective
    PairedRealEffective,
    /// `setuid()`+`seteuid()`, `setgid()`+`setegid()`
    SingleUid,
}

impl IdentitySyscallFamily {
    /// Family compiled in for the host OS
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    ))]
    pub const NATIVE: IdentitySyscallFamily = IdentitySyscallFamily::CombinedAtomic;

    /// Family compiled in for the host OS
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "netbsd",
        target_os = "solaris",
        target_os = "illumos"
    ))]
    pub const NATIVE: IdentitySyscallFamily = IdentitySyscallFamily::PairedRealEffective;

    /// Family compiled in for the host OS
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd",
        target_os = "macos",
        target_os = "ios",
        target_os = "netbsd",
        target_os = "solaris",
        target_os = "illumos"
    )))]
    pub const NATIVE: IdentitySyscallFamily = IdentitySyscallFamily::SingleUid;
}

impl fmt::Display for IdentitySyscallFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentitySyscallFamily::CombinedAtomic => "setresuid/setresgid",
            IdentitySyscallFamily::PairedRealEffective => "setreuid/setregid",
            IdentitySyscallFamily::SingleUid => "setuid/seteuid/setgid/setegid",
        })
    }
}

/// Where the process stands in its one-way privilege lifecycle
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Lifecycle {
    /// Root in some slot, or slots that disagree (e.g. right after a
    /// set-user-ID exec)
    Privileged,
    /// Every slot holds the same non-root identity. Nothing in this crate
    /// leaves this state.
    Unprivileged,
}

/// Snapshot of the process credentials, as reported by the kernel
///
/// Snapshots are never cached: call `ProcessIdentity::current()` whenever
/// the answer matters. Saved IDs are `None` where the host cannot report them.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct ProcessIdentity {
    /// User who started the process
    pub real_uid: Uid,
    /// User most permission checks are made against
    pub effective_uid: Uid,
    /// User the process could switch its effective UID back to
    pub saved_uid: Option<Uid>,
    /// Primary group of the user who started the process
    pub real_gid: Gid,
    /// Group most permission checks are made against
    pub effective_gid: Gid,
    /// Group the process could switch its effective GID back to
    pub saved_gid: Option<Gid>,
}

impl ProcessIdentity {
    /// Query the kernel for the current credentials
    ///
    /// Saved IDs are left out if the kernel refuses to report them.
    pub fn current() -> ProcessIdentity {
        ProcessIdentity::query().unwrap_or_else(|_| ProcessIdentity::without_saved_ids())
    }

    /// Query the kernel for every slot it can report, failing instead of
    /// leaving saved IDs out
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    ))]
    pub(crate) fn query() -> Result<ProcessIdentity, PrivDropError> {
        let uids = unistd::getresuid()?;
        let gids = unistd::getresgid()?;
        Ok(ProcessIdentity {
            real_uid: uids.real,
            effective_uid: uids.effective,
            saved_uid: Some(uids.saved),
            real_gid: gids.real,
            effective_gid: gids.effective,
            saved_gid: Some(gids.saved),
        })
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    )))]
    pub(crate) fn query() -> Result<ProcessIdentity, PrivDropError> {
        Ok(ProcessIdentity::without_saved_ids())
    }

    fn without_saved_ids() -> ProcessIdentity {
        ProcessIdentity {
            real_uid: unistd::getuid(),
            effective_uid: unistd::geteuid(),
            saved_uid: None,
            real_gid: unistd::getgid(),
            effective_gid: unistd::getegid(),
            saved_gid: None,
        }
    }

    /// `true` if every UID slot is `uid` and every GID slot is `gid`
    pub fn is_settled_at(&self, uid: Uid, gid: Gid) -> bool {
        self.real_uid == uid
            && self.effective_uid == uid
            && self.saved_uid.map_or(true, |saved| saved == uid)
            && self.real_gid == gid
            && self.effective_gid == gid
            && self.saved_gid.map_or(true, |saved| saved == gid)
    }

    /// `Unprivileged` once every slot holds the same non-root identity
    pub fn lifecycle(&self) -> Lifecycle {
        if !self.real_uid.is_root() && self.is_settled_at(self.real_uid, self.real_gid) {
            Lifecycle::Unprivileged
        } else {
            Lifecycle::Privileged
        }
    }

    fn mismatch(&self, uid: Uid, gid: Gid) -> Option<&'static str> {
        if self.real_uid != uid {
            Some("real UID differs from the invoking user")
        } else if self.effective_uid != uid {
            Some("effective UID was not reset")
        } else if self.saved_uid.map_or(false, |saved| saved != uid) {
            Some("saved UID was not reset")
        } else if self.real_gid != gid {
            Some("real GID differs from the invoking group")
        } else if self.effective_gid != gid {
            Some("effective GID was not reset")
        } else if self.saved_gid.map_or(false, |saved| saved != gid) {
            Some("saved GID was not reset")
        } else {
            None
        }
    }
}

/// The OS calls IdentityReset is made of
pub(crate) trait IdentitySyscalls {
    fn family(&self) -> IdentitySyscallFamily;

    /// Real UID and GID, i.e. the invoking user
    fn real_ids(&self) -> (Uid, Gid);

    /// Set every GID slot to `gid`
    fn set_gids(&self, gid: Gid) -> Result<(), PrivDropError>;

    /// Set every UID slot to `uid`
    fn set_uids(&self, uid: Uid) -> Result<(), PrivDropError>;

    /// Every slot the kernel can report. A failing query is an error, not
    /// a partial snapshot.
    fn current(&self) -> Result<ProcessIdentity, PrivDropError>;
}

/// The host's own identity syscalls
#[derive(Default, Clone, Copy, Debug)]
pub(crate) struct NativeIdentity;

impl IdentitySyscalls for NativeIdentity {
    fn family(&self) -> IdentitySyscallFamily {
        IdentitySyscallFamily::NATIVE
    }

    fn real_ids(&self) -> (Uid, Gid) {
        (unistd::getuid(), unistd::getgid())
    }

    fn set_gids(&self, gid: Gid) -> Result<(), PrivDropError> {
        native::set_gids(gid)
    }

    fn set_uids(&self, uid: Uid) -> Result<(), PrivDropError> {
        native::set_uids(uid)
    }

    fn current(&self) -> Result<ProcessIdentity, PrivDropError> {
        ProcessIdentity::query()
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd"
))]
mod native {
    use crate::errors::*;
    use nix::unistd::{self, Gid, Uid};

    pub fn set_gids(gid: Gid) -> Result<(), PrivDropError> {
        unistd::setresgid(gid, gid, gid)?;
        Ok(())
    }

    pub fn set_uids(uid: Uid) -> Result<(), PrivDropError> {
        unistd::setresuid(uid, uid, uid)?;
        Ok(())
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos"
))]
mod native {
    use crate::errors::*;
    use libc::{c_int, gid_t, uid_t};
    use nix::errno::Errno;
    use nix::unistd::{Gid, Uid};

    extern "C" {
        fn setreuid(ruid: uid_t, euid: uid_t) -> c_int;
        fn setregid(rgid: gid_t, egid: gid_t) -> c_int;
    }

    // Setting the real ID also moves the saved ID to the new effective ID.
    pub fn set_gids(gid: Gid) -> Result<(), PrivDropError> {
        Errno::result(unsafe { setregid(gid.as_raw(), gid.as_raw()) })?;
        Ok(())
    }

    pub fn set_uids(uid: Uid) -> Result<(), PrivDropError> {
        Errno::result(unsafe { setreuid(uid.as_raw(), uid.as_raw()) })?;
        Ok(())
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "macos",
    target_os = "ios",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos"
)))]
mod native {
    use crate::errors::*;
    use nix::unistd::{self, Gid, Uid};

    pub fn set_gids(gid: Gid) -> Result<(), PrivDropError> {
        unistd::setgid(gid)?;
        unistd::setegid(gid)?;
        Ok(())
    }

    pub fn set_uids(uid: Uid) -> Result<(), PrivDropError> {
        unistd::setuid(uid)?;
        unistd::seteuid(uid)?;
        Ok(())
    }
}

/// Reset real, effective and saved IDs to the invoking user's, then check
/// that the kernel agrees.
///
/// GIDs go first: once the UID is lowered the process may no longer be
/// allowed to touch its GIDs.
pub(crate) fn reset_identity<S: IdentitySyscalls + ?Sized>(
    sys: &S,
) -> Result<ProcessIdentity, PrivDropError> {
    log::debug!("Cleaning up privileges using {}", sys.family());
    let (uid, gid) = sys.real_ids();
    sys.set_gids(gid)?;
    sys.set_uids(uid)?;
    let identity = sys.current()?;
    if let Some(description) = identity.mismatch(uid, gid) {
        return Err(PrivDropError::from((
            ErrorKind::IdentityMismatch,
            description,
        )));
    }
    log::debug!("Running as UID {} and GID {}", uid, gid);
    Ok(identity)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Simulated kernel credentials
    pub(crate) struct FakeIdentity {
        pub identity: RefCell<ProcessIdentity>,
        pub fail_set_uids: bool,
        pub ignore_set_uids: bool,
        pub fail_query: bool,
        pub calls: RefCell<Vec<&'static str>>,
        pub set_count: Cell<usize>,
    }

    impl FakeIdentity {
        /// Credentials after a set-user-ID-root exec by `uid`/`gid`
        pub fn elevated(uid: u32, gid: u32) -> FakeIdentity {
            FakeIdentity::with(ProcessIdentity {
                real_uid: Uid::from_raw(uid),
                effective_uid: Uid::from_raw(0),
                saved_uid: Some(Uid::from_raw(0)),
                real_gid: Gid::from_raw(gid),
                effective_gid: Gid::from_raw(gid),
                saved_gid: Some(Gid::from_raw(gid)),
            })
        }

        /// Credentials of a process started by root directly
        pub fn root() -> FakeIdentity {
            FakeIdentity::with(ProcessIdentity {
                real_uid: Uid::from_raw(0),
                effective_uid: Uid::from_raw(0),
                saved_uid: Some(Uid::from_raw(0)),
                real_gid: Gid::from_raw(0),
                effective_gid: Gid::from_raw(0),
                saved_gid: Some(Gid::from_raw(0)),
            })
        }

        fn with(identity: ProcessIdentity) -> FakeIdentity {
            FakeIdentity {
                identity: RefCell::new(identity),
                fail_set_uids: false,
                ignore_set_uids: false,
                fail_query: false,
                calls: RefCell::new(Vec::new()),
                set_count: Cell::new(0),
            }
        }
    }

    impl IdentitySyscalls for FakeIdentity {
        fn family(&self) -> IdentitySyscallFamily {
            IdentitySyscallFamily::CombinedAtomic
        }

        fn real_ids(&self) -> (Uid, Gid) {
            let identity = self.identity.borrow();
            (identity.real_uid, identity.real_gid)
        }

        fn set_gids(&self, gid: Gid) -> Result<(), PrivDropError> {
            self.calls.borrow_mut().push("set_gids");
            self.set_count.set(self.set_count.get() + 1);
            let mut identity = self.identity.borrow_mut();
            identity.real_gid = gid;
            identity.effective_gid = gid;
            identity.saved_gid = Some(gid);
            Ok(())
        }

        fn set_uids(&self, uid: Uid) -> Result<(), PrivDropError> {
            self.calls.borrow_mut().push("set_uids");
            self.set_count.set(self.set_count.get() + 1);
            if self.fail_set_uids {
                return Err(nix::errno::Errno::EPERM.into());
            }
            if !self.ignore_set_uids {
                let mut identity = self.identity.borrow_mut();
                identity.real_uid = uid;
                identity.effective_uid = uid;
                identity.saved_uid = Some(uid);
            }
            Ok(())
        }

        fn current(&self) -> Result<ProcessIdentity, PrivDropError> {
            if self.fail_query {
                return Err(nix::errno::Errno::EFAULT.into());
            }
            Ok(self.snapshot())
        }
    }

    impl FakeIdentity {
        pub fn snapshot(&self) -> ProcessIdentity {
            *self.identity.borrow()
        }
    }

    #[test]
    fn reset_settles_every_slot_on_the_invoking_user() {
        let sys = FakeIdentity::elevated(1000, 100);
        let identity = reset_identity(&sys).unwrap();
        assert!(identity.is_settled_at(Uid::from_raw(1000), Gid::from_raw(100)));
        assert_eq!(identity.lifecycle(), Lifecycle::Unprivileged);
    }

    #[test]
    fn gids_are_reset_before_uids() {
        let sys = FakeIdentity::elevated(1000, 100);
        reset_identity(&sys).unwrap();
        assert_eq!(*sys.calls.borrow(), vec!["set_gids", "set_uids"]);
    }

    #[test]
    fn failing_syscall_is_reported() {
        let mut sys = FakeIdentity::elevated(1000, 100);
        sys.fail_set_uids = true;
        let err = reset_identity(&sys).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SysError);
    }

    #[test]
    fn silently_ignored_syscall_fails_verification() {
        let mut sys = FakeIdentity::elevated(1000, 100);
        sys.ignore_set_uids = true;
        let err = reset_identity(&sys).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityMismatch);
        assert_eq!(
            err.to_string(),
            "Privilege drop error: effective UID was not reset"
        );
    }

    #[test]
    fn unreadable_identity_fails_the_check() {
        let mut sys = FakeIdentity::elevated(1000, 100);
        sys.fail_query = true;
        let err = reset_identity(&sys).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SysError);
    }

    #[test]
    fn second_reset_is_a_no_op() {
        let sys = FakeIdentity::elevated(1000, 100);
        let first = reset_identity(&sys).unwrap();
        let second = reset_identity(&sys).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn lifecycle_of_a_set_user_id_process_is_privileged() {
        let sys = FakeIdentity::elevated(1000, 100);
        assert_eq!(sys.snapshot().lifecycle(), Lifecycle::Privileged);
        assert_eq!(FakeIdentity::root().snapshot().lifecycle(), Lifecycle::Privileged);
    }

    #[test]
    fn missing_saved_ids_do_not_block_settling() {
        let identity = ProcessIdentity {
            real_uid: Uid::from_raw(1000),
            effective_uid: Uid::from_raw(1000),
            saved_uid: None,
            real_gid: Gid::from_raw(100),
            effective_gid: Gid::from_raw(100),
            saved_gid: None,
        };
        assert!(identity.is_settled_at(Uid::from_raw(1000), Gid::from_raw(100)));
        assert_eq!(identity.lifecycle(), Lifecycle::Unprivileged);
    }

    #[test]
    fn current_identity_matches_plain_queries() {
        let identity = ProcessIdentity::current();
        assert_eq!(identity.real_uid, unistd::getuid());
        assert_eq!(identity.effective_uid, unistd::geteuid());
        assert_eq!(identity.real_gid, unistd::getgid());
        assert_eq!(identity.effective_gid, unistd::getegid());
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    ))]
    #[test]
    fn query_reports_saved_ids() {
        let identity = ProcessIdentity::query().unwrap();
        assert!(identity.saved_uid.is_some());
        assert!(identity.saved_gid.is_some());
        assert_eq!(identity, ProcessIdentity::current());
    }
}
