use super::CapabilityBackend;
use crate::errors::*;
use ::caps::{CapSet, CapsHashSet};

/// Clears every POSIX capability of the calling thread.
///
/// Capabilities are per thread on Linux, so this has to run before any
/// other thread is spawned.
#[derive(Default, Clone, Copy, Debug)]
pub struct LinuxCaps;

// Effective must stay a subset of permitted after every single step.
const CLEAR_ORDER: [CapSet; 3] = [CapSet::Effective, CapSet::Inheritable, CapSet::Permitted];

impl CapabilityBackend for LinuxCaps {
    fn restrict(&self) -> Result<(), PrivDropError> {
        let mut held = 0;
        for set in CLEAR_ORDER.iter() {
            held += ::caps::read(None, *set)?.len();
        }
        log::debug!("Dropping {} capabilities", held);

        let empty = CapsHashSet::new();
        for set in CLEAR_ORDER.iter() {
            ::caps::set(None, *set, &empty)?;
        }
        for set in CLEAR_ORDER.iter() {
            if !::caps::read(None, *set)?.is_empty() {
                return Err(PrivDropError::from((
                    ErrorKind::CapabilityError,
                    "capability set is not empty after clearing it",
                )));
            }
        }
        Ok(())
    }
}
