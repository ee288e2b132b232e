//! Unified error type for the iremitter-lib crate.
//!
//! [`IremitterError`] wraps module-specific errors (`UvcError`,
//! `CaptureError`, `ProbeError`, `SearchError`) and domain-specific error
//! kinds (`Config`, `Driver`). `From` impls allow `?` to propagate across
//! module boundaries seamlessly.

use std::fmt;

use crate::capture::CaptureError;
use crate::probe::ProbeError;
use crate::search::SearchError;
use crate::uvc::UvcError;

/// Unified error type for iremitter-lib operations.
#[derive(Debug)]
pub enum IremitterError {
    /// UVC extension-unit query error.
    Uvc(UvcError),
    /// Video capture error (open, stream, frame read).
    Capture(CaptureError),
    /// Emitter probe error.
    Probe(ProbeError),
    /// Driver search outcome other than success.
    Search(SearchError),
    /// Standard I/O error (file read/write, persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Saved-driver error (missing or unreadable record).
    Driver(String),
}

impl fmt::Display for IremitterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IremitterError::Uvc(e) => write!(f, "{e}"),
            IremitterError::Capture(e) => write!(f, "{e}"),
            IremitterError::Probe(e) => write!(f, "{e}"),
            IremitterError::Search(e) => write!(f, "{e}"),
            IremitterError::Io(e) => write!(f, "I/O error: {e}"),
            IremitterError::Config(e) => write!(f, "Config error: {e}"),
            IremitterError::Driver(e) => write!(f, "Driver error: {e}"),
        }
    }
}

impl std::error::Error for IremitterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IremitterError::Uvc(e) => Some(e),
            IremitterError::Capture(e) => Some(e),
            IremitterError::Probe(e) => Some(e),
            IremitterError::Search(e) => Some(e),
            IremitterError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UvcError> for IremitterError {
    fn from(e: UvcError) -> Self {
        IremitterError::Uvc(e)
    }
}

impl From<CaptureError> for IremitterError {
    fn from(e: CaptureError) -> Self {
        IremitterError::Capture(e)
    }
}

impl From<ProbeError> for IremitterError {
    fn from(e: ProbeError) -> Self {
        IremitterError::Probe(e)
    }
}

impl From<SearchError> for IremitterError {
    fn from(e: SearchError) -> Self {
        IremitterError::Search(e)
    }
}

impl From<std::io::Error> for IremitterError {
    fn from(e: std::io::Error) -> Self {
        IremitterError::Io(e)
    }
}

/// Crate-level Result alias using [`IremitterError`].
pub type Result<T> = std::result::Result<T, IremitterError>;

/// True when the error means the camera itself became unreachable — the one
/// failure class callers should surface differently from "nothing worked"
/// (check for a competing reader, check permissions on the video node).
pub fn is_device_unavailable(e: &IremitterError) -> bool {
    match e {
        IremitterError::Uvc(UvcError::Unavailable(_)) => true,
        IremitterError::Capture(CaptureError::Unavailable(_)) => true,
        IremitterError::Probe(ProbeError::Unavailable(_)) => true,
        IremitterError::Search(SearchError::DeviceUnavailable { .. }) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_uvc_error() {
        let e: IremitterError = UvcError::Failed("no such control".into()).into();
        assert!(matches!(e, IremitterError::Uvc(UvcError::Failed(_))));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: IremitterError = io_err.into();
        assert!(matches!(e, IremitterError::Io(_)));
    }

    #[test]
    fn display_config_error() {
        let e = IremitterError::Config("sample_size must be at least 2".into());
        assert_eq!(
            e.to_string(),
            "Config error: sample_size must be at least 2"
        );
    }

    #[test]
    fn source_chains_uvc_error() {
        let e = IremitterError::Uvc(UvcError::Unavailable("gone".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("gone"));
    }

    #[test]
    fn source_none_for_string_variants() {
        let e = IremitterError::Driver("none saved".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_uvc_to_iremitter() {
        fn inner() -> crate::uvc::Result<()> {
            Err(UvcError::Unavailable("unplugged".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(err, IremitterError::Uvc(UvcError::Unavailable(_))));
    }

    #[test]
    fn unavailable_classification() {
        assert!(is_device_unavailable(&IremitterError::Uvc(
            UvcError::Unavailable("x".into())
        )));
        assert!(is_device_unavailable(&IremitterError::Search(
            SearchError::DeviceUnavailable {
                reason: "x".into(),
                pair: None,
            }
        )));
        assert!(!is_device_unavailable(&IremitterError::Search(
            SearchError::NotFound
        )));
        assert!(!is_device_unavailable(&IremitterError::Uvc(
            UvcError::Failed("x".into())
        )));
    }
}
