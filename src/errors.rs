use std::error::Error;
use std::fmt;

/// Types of errors that can occur while dropping privileges
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// System-level error when interacting with OS privileges
    SysError,
    /// The kernel reports an identity other than the one that was requested
    IdentityMismatch,
    /// The capability or privilege set could not be reduced
    CapabilityError,
}

/// Internal representation of privilege dropping errors
#[derive(Debug)]
enum ErrorRepr {
    /// Error from the nix crate
    FromNix(nix::Error),
    /// Error from the caps crate
    #[cfg(all(target_os = "linux", feature = "capabilities"))]
    FromCaps(caps::errors::CapsError),
    /// Error with a static description
    WithDescription(ErrorKind, &'static str),
}

/// Error type for privilege dropping operations
///
/// These never leave the crate: the public operations turn them into a
/// diagnostic followed by an abort.
#[derive(Debug)]
pub struct PrivDropError {
    repr: ErrorRepr,
}

impl PrivDropError {
    /// The kind of failure
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::FromNix(_) => ErrorKind::SysError,
            #[cfg(all(target_os = "linux", feature = "capabilities"))]
            ErrorRepr::FromCaps(_) => ErrorKind::CapabilityError,
            ErrorRepr::WithDescription(kind, _) => kind,
        }
    }
}

impl Error for PrivDropError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.repr {
            ErrorRepr::FromNix(ref e) => Some(e),
            #[cfg(all(target_os = "linux", feature = "capabilities"))]
            ErrorRepr::FromCaps(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for PrivDropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::FromNix(ref e) => write!(f, "Privilege drop error: {}", e),
            #[cfg(all(target_os = "linux", feature = "capabilities"))]
            ErrorRepr::FromCaps(ref e) => write!(f, "Capability drop error: {}", e),
            ErrorRepr::WithDescription(_, description) => {
                write!(f, "Privilege drop error: {}", description)
            }
        }
    }
}

impl From<nix::Error> for PrivDropError {
    fn from(e: nix::Error) -> PrivDropError {
        PrivDropError {
            repr: ErrorRepr::FromNix(e),
        }
    }
}

#[cfg(all(target_os = "linux", feature = "capabilities"))]
impl From<caps::errors::CapsError> for PrivDropError {
    fn from(e: caps::errors::CapsError) -> PrivDropError {
        PrivDropError {
            repr: ErrorRepr::FromCaps(e),
        }
    }
}

impl From<(ErrorKind, &'static str)> for PrivDropError {
    fn from((kind, description): (ErrorKind, &'static str)) -> PrivDropError {
        PrivDropError {
            repr: ErrorRepr::WithDescription(kind, description),
        }
    }
}
