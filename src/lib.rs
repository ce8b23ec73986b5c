/*!
# capdrop

One-way privilege reduction for daemons that may be started set-user-ID root.

## Overview

A daemon installed set-user-ID root starts with root as its effective user,
but its workload should run as the user who launched it. This crate gives
that privilege up for good, in two steps:

- Resetting the real, effective and saved user and group IDs to the invoking
  user's
- Clearing (Linux) or shrinking (Solaris, illumos) the capability set, so
  that only what real-time audio processing needs remains

Both steps are meant to run exactly once, early at startup, after any
privileged setup such as opening devices, and before any other thread or
listener is started.

## Failure policy

There is no error to handle. A process that cannot reset its IDs, or that
cannot clear its Linux capabilities, is aborted: continuing would leave it
running with root power while it believes it is unprivileged. On Solaris
and illumos each privilege set that cannot be installed is logged and the
next one is still tried. Hosts without a supported privilege model only get
a warning.

The capability backends are internal, so no privilege-reducing step can be
reached in a way that returns an error:

```compile_fail
use capdrop::CapabilityBackend;

capdrop::native_backend().restrict().ok();
```

Diagnostics go through the `log` facade; installing a logger is up to the
daemon.

## Example

```no_run
fn main() {
    // Privileged setup goes here.

    capdrop::drop_root();

    assert_eq!(
        capdrop::ProcessIdentity::current().lifecycle(),
        capdrop::Lifecycle::Unprivileged
    );
    // Continue running as the invoking user...
}
```

## Build-time configuration

- The capability backend follows the target OS. On Linux it requires the
  `capabilities` feature (enabled by default); without it Linux builds only
  log a warning.
- The syscalls used to reset IDs also follow the target OS: see
  `IdentitySyscallFamily::NATIVE`.
*/

pub use self::identity::{IdentitySyscallFamily, Lifecycle, ProcessIdentity};
pub use self::privdrop::*;
pub use self::restrict::*;

mod errors;
mod identity;
mod privdrop;
mod restrict;

#[cfg(test)]
mod testlog;
#[cfg(test)]
mod testutil;

/// Reexported dependencies for use in consuming crates.
///
/// - `libc`: Low-level bindings to the C standard library
/// - `nix`: Rust friendly bindings to *nix APIs, with the user feature
/// - `caps`: Linux capabilities, on Linux builds with the `capabilities` feature
pub mod reexports {
    pub use {libc, nix};

    #[cfg(all(target_os = "linux", feature = "capabilities"))]
    pub use caps;
}
