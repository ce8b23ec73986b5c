//! Capability and privilege set reduction.
//!
//! Exactly one backend is compiled in as `NativeBackend`:
//!
//! - `LinuxCaps` on Linux with the `capabilities` feature (default)
//! - `NamedPrivilegeSet` on Solaris and illumos
//! - `Unsupported` everywhere else

use crate::errors::*;
use std::fmt;
use std::io;

#[cfg(all(target_os = "linux", feature = "capabilities"))]
mod linux;
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
mod solaris;

#[cfg(all(target_os = "linux", feature = "capabilities"))]
pub(crate) use self::linux::LinuxCaps;
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub(crate) use self::solaris::NamedPrivilegeSet;

/// A way to shrink the privileges of the running process.
///
/// Crate-private: outside callers only get `drop_caps()`, which aborts
/// instead of handing back an error.
pub(crate) trait CapabilityBackend {
    /// Reduce the process privileges. An `Err` means the process must not
    /// keep running.
    fn restrict(&self) -> Result<(), PrivDropError>;
}

/// Backend compiled in for the host
#[cfg(all(target_os = "linux", feature = "capabilities"))]
pub(crate) type NativeBackend = LinuxCaps;

/// Backend compiled in for the host
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub(crate) type NativeBackend = NamedPrivilegeSet;

/// Backend compiled in for the host
#[cfg(not(any(
    all(target_os = "linux", feature = "capabilities"),
    target_os = "solaris",
    target_os = "illumos"
)))]
pub(crate) type NativeBackend = Unsupported;

/// The backend `drop_root()` and `drop_caps()` go through
pub(crate) fn native_backend() -> NativeBackend {
    NativeBackend::default()
}

/// Backend for hosts without a supported privilege model: nothing is
/// dropped and a warning says so.
#[cfg_attr(all(target_os = "linux", feature = "capabilities"), allow(dead_code))]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Unsupported {
    message: &'static str,
}

#[cfg_attr(all(target_os = "linux", feature = "capabilities"), allow(dead_code))]
impl Unsupported {
    /// Text of the warning logged by `restrict()`
    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl Default for Unsupported {
    #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
    fn default() -> Self {
        Unsupported {
            message: "FreeBSD cannot drop extra capabilities, implementation needed.",
        }
    }

    #[cfg(not(any(target_os = "freebsd", target_os = "dragonfly")))]
    fn default() -> Self {
        Unsupported {
            message: "Normally all extra capabilities would be dropped now, but that's \
                      impossible because this program was built without capabilities support.",
        }
    }
}

impl CapabilityBackend for Unsupported {
    fn restrict(&self) -> Result<(), PrivDropError> {
        log::warn!("{}", self.message());
        Ok(())
    }
}

/// Base set every `MINIMAL_WORKING_SET` starts from
pub const BASE_PRIVILEGE_SET: &str = "basic";

/// Privileges kept on top of the base set for real-time processing
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Privilege {
    /// Exceed resource limits, mainly the open file count.
    ///
    /// Maps to `sys_resource`, which lifts every resource limit of the
    /// process, not just the number of open files.
    MultipleOpen,
    /// High resolution timers
    ClockHighRes,
    /// Raise process priority
    PriorityRaise,
    /// Change process scheduling class
    SchedClassChange,
}

impl Privilege {
    /// Kernel name of the privilege
    pub fn name(self) -> &'static str {
        match self {
            Privilege::MultipleOpen => "sys_resource",
            Privilege::ClockHighRes => "proc_clock_highres",
            Privilege::PriorityRaise => "proc_prioup",
            Privilege::SchedClassChange => "proc_priocntl",
        }
    }
}

/// Privileges added to `BASE_PRIVILEGE_SET` by the Solaris and illumos backend
pub const MINIMAL_WORKING_SET: [Privilege; 4] = [
    Privilege::MultipleOpen,
    Privilege::ClockHighRes,
    Privilege::PriorityRaise,
    Privilege::SchedClassChange,
];

/// Privilege sets the minimal working set is installed into
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum PrivilegeFacet {
    /// Upper bound of the effective set
    Permitted,
    /// Upper bound of every set, for the process and its children
    Limit,
    /// Passed on across `exec()`
    Inheritable,
}

impl PrivilegeFacet {
    /// Install order
    pub const ALL: [PrivilegeFacet; 3] = [
        PrivilegeFacet::Permitted,
        PrivilegeFacet::Limit,
        PrivilegeFacet::Inheritable,
    ];

    /// Kernel name of the set
    pub fn name(self) -> &'static str {
        match self {
            PrivilegeFacet::Permitted => "Permitted",
            PrivilegeFacet::Limit => "Limit",
            PrivilegeFacet::Inheritable => "Inheritable",
        }
    }

    #[cfg_attr(
        not(any(target_os = "solaris", target_os = "illumos")),
        allow(dead_code)
    )]
    fn failure(self) -> &'static str {
        match self {
            PrivilegeFacet::Permitted => "Unable to set permitted privileges",
            PrivilegeFacet::Limit => "Unable to set privileges limits",
            PrivilegeFacet::Inheritable => "Unable to set inheritable privileges",
        }
    }
}

impl fmt::Display for PrivilegeFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Install into every facet in order. A failing facet is logged and the
/// next one is still attempted. Returns the number of failures.
#[cfg_attr(
    not(any(target_os = "solaris", target_os = "illumos")),
    allow(dead_code)
)]
pub(crate) fn install_each_facet<F>(mut install: F) -> usize
where
    F: FnMut(PrivilegeFacet) -> io::Result<()>,
{
    let mut failures = 0;
    for facet in PrivilegeFacet::ALL.iter().copied() {
        if let Err(e) = install(facet) {
            log::error!("{}: {}", facet.failure(), e);
            failures += 1;
        }
    }
    failures
}
