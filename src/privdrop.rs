use crate::errors::*;
use crate::identity::{reset_identity, IdentitySyscalls, NativeIdentity};
use crate::restrict::{native_backend, CapabilityBackend};

/// Drop root rights when running set-user-ID root
///
/// Real, effective and saved user and group IDs are all reset to the
/// invoking user's. If that user is not root, capabilities are then dropped
/// as well with `drop_caps()`.
///
/// Must be called once, before any other thread is spawned. There is no
/// way to get the privileges back afterwards.
///
/// The process aborts if the IDs cannot be reset.
///
/// # Example
/// ```no_run
/// // open privileged devices first...
/// capdrop::drop_root();
/// // ...then run as the invoking user
/// ```
pub fn drop_root() {
    enforce(drop_root_with(&NativeIdentity, &native_backend()))
}

/// Reduce the capability or privilege set of the process
///
/// On Linux every capability is cleared, and the process aborts if that
/// fails. On Solaris and illumos only the basic set and a few real-time
/// privileges are kept; failures there are only logged. Other hosts just
/// log a warning.
pub fn drop_caps() {
    enforce(native_backend().restrict())
}

pub(crate) fn drop_root_with<S, B>(sys: &S, backend: &B) -> Result<(), PrivDropError>
where
    S: IdentitySyscalls + ?Sized,
    B: CapabilityBackend + ?Sized,
{
    let identity = reset_identity(sys)?;
    if identity.real_uid.is_root() {
        log::debug!("Started as root, keeping capabilities");
        return Ok(());
    }
    backend.restrict()
}

/// Abort on any error: a half-dropped process must not keep running.
pub(crate) fn enforce(result: Result<(), PrivDropError>) {
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::abort();
    }
}
