use super::{install_each_facet, CapabilityBackend, BASE_PRIVILEGE_SET, MINIMAL_WORKING_SET};
use crate::errors::*;
use libc::{c_char, c_int};
use std::ffi::CString;
use std::io;
use std::ptr;

#[allow(non_camel_case_types)]
enum priv_set_t {}

// priv_op_t
const PRIV_SET: c_int = 2;

extern "C" {
    fn priv_str_to_set(
        buf: *const c_char,
        sep: *const c_char,
        endptr: *mut *const c_char,
    ) -> *mut priv_set_t;
    fn priv_addset(sp: *mut priv_set_t, privilege: *const c_char) -> c_int;
    fn priv_freeset(sp: *mut priv_set_t);
    fn setppriv(op: c_int, which: *const c_char, set: *const priv_set_t) -> c_int;
}

/// Kernel privilege set, freed on drop
struct PrivSet(*mut priv_set_t);

impl PrivSet {
    fn parse(names: &str) -> Result<PrivSet, PrivDropError> {
        let names = CString::new(names).map_err(|_| {
            PrivDropError::from((ErrorKind::CapabilityError, "Invalid privilege set name"))
        })?;
        let sep = b",\0".as_ptr() as *const c_char;
        let sp = unsafe { priv_str_to_set(names.as_ptr(), sep, ptr::null_mut()) };
        if sp.is_null() {
            return Err(PrivDropError::from((
                ErrorKind::CapabilityError,
                "Unable to build the basic privilege set",
            )));
        }
        Ok(PrivSet(sp))
    }

    fn add(&mut self, name: &str) -> io::Result<()> {
        let name =
            CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if unsafe { priv_addset(self.0, name.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn install(&self, which: &str) -> io::Result<()> {
        let which =
            CString::new(which).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if unsafe { setppriv(PRIV_SET, which.as_ptr(), self.0) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for PrivSet {
    fn drop(&mut self) {
        unsafe { priv_freeset(self.0) }
    }
}

/// Installs the basic set plus the real-time privileges as the permitted,
/// limit and inheritable sets.
///
/// Installation is best effort: every failing set is logged and the next
/// one is still attempted.
#[derive(Default, Clone, Copy, Debug)]
pub struct NamedPrivilegeSet;

impl CapabilityBackend for NamedPrivilegeSet {
    fn restrict(&self) -> Result<(), PrivDropError> {
        let mut set = PrivSet::parse(BASE_PRIVILEGE_SET)?;
        for privilege in MINIMAL_WORKING_SET.iter() {
            if let Err(e) = set.add(privilege.name()) {
                log::error!("Unable to add privilege {}: {}", privilege.name(), e);
            }
        }
        let failures = install_each_facet(|facet| set.install(facet.name()));
        if failures == 0 {
            log::debug!("Restricted privileges to the minimal working set");
        }
        Ok(())
    }
}
