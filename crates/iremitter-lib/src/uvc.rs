//! UVC extension-unit queries over `UVCIOC_CTRL_QUERY`.
//!
//! Vendor controls on a UVC camera are addressed by an (extension unit,
//! selector) pair. For each pair the device reports a control size, a
//! current value, a maximum value and a step size, and accepts new values
//! through `SET_CUR` — all through a single ioctl on the video node.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

// ── Error type ──

/// UVC query errors.
///
/// The two variants are the whole protocol contract: [`UvcError::Failed`]
/// is the expected per-control outcome (most selectors simply do not exist)
/// and callers skip the candidate; [`UvcError::Unavailable`] means the
/// camera itself is gone and aborts whatever operation is in flight.
#[derive(Debug)]
pub enum UvcError {
    /// The query was rejected for this (unit, selector) — skip and continue.
    Failed(String),
    /// The device cannot be reached at all — fatal, never retried.
    Unavailable(String),
}

impl fmt::Display for UvcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UvcError::Failed(e) => write!(f, "UVC query failed: {e}"),
            UvcError::Unavailable(e) => write!(f, "Camera unavailable: {e}"),
        }
    }
}

impl std::error::Error for UvcError {}

pub type Result<T> = std::result::Result<T, UvcError>;

// ── Trait ──

/// The query surface of one UVC device.
///
/// `size` is the control length reported by [`query_length`](Self::query_length)
/// and fixes the byte count of every vector exchanged for that pair.
pub trait UvcQuery {
    fn query_length(&self, unit: u8, selector: u8) -> Result<u16>;
    fn query_current(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>>;
    fn query_maximum(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>>;
    fn query_resolution(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>>;
    fn set_current(&self, unit: u8, selector: u8, values: &[u8]) -> Result<()>;
}

// ── Linux ioctl plumbing ──

/// Query codes from `linux/uvcvideo.h`.
const UVC_SET_CUR: u8 = 0x01;
const UVC_GET_CUR: u8 = 0x81;
const UVC_GET_MAX: u8 = 0x83;
const UVC_GET_RES: u8 = 0x84;
const UVC_GET_LEN: u8 = 0x85;

#[cfg(target_os = "linux")]
mod ioctl {
    /// `struct uvc_xu_control_query` from `linux/uvcvideo.h`.
    #[repr(C)]
    pub struct UvcXuControlQuery {
        pub unit: u8,
        pub selector: u8,
        pub query: u8,
        pub size: u16,
        pub data: *mut u8,
    }

    // UVCIOC_CTRL_QUERY = _IOWR('u', 0x21, struct uvc_xu_control_query)
    nix::ioctl_readwrite!(uvc_xu_ctrl_query, b'u', 0x21, UvcXuControlQuery);
}

// ── Device ──

/// One opened UVC video node.
///
/// The file descriptor is held for the lifetime of the value; the search
/// engine treats the camera as exclusively owned for the duration of a run.
#[derive(Debug)]
pub struct UvcDevice {
    file: File,
    path: PathBuf,
}

impl UvcDevice {
    /// Open a video node read-write for control queries.
    ///
    /// Failure to open is the fatal [`UvcError::Unavailable`] class: without
    /// a file descriptor nothing else can proceed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| UvcError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The video node this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(target_os = "linux")]
    fn query(&self, unit: u8, selector: u8, query: u8, data: &mut [u8]) -> Result<()> {
        use std::os::fd::AsRawFd;

        let mut q = ioctl::UvcXuControlQuery {
            unit,
            selector,
            query,
            size: data.len() as u16,
            data: data.as_mut_ptr(),
        };
        // SAFETY: `q.data` points into `data`, which outlives the call and
        // is exactly `q.size` bytes long.
        match unsafe { ioctl::uvc_xu_ctrl_query(self.file.as_raw_fd(), &mut q) } {
            Ok(_) => Ok(()),
            Err(nix::errno::Errno::ENODEV) => Err(UvcError::Unavailable(format!(
                "{}: device disappeared mid-query",
                self.path.display()
            ))),
            Err(e) => Err(UvcError::Failed(format!(
                "unit {unit} selector {selector}: {e}"
            ))),
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn query(&self, _unit: u8, _selector: u8, _query: u8, _data: &mut [u8]) -> Result<()> {
        Err(UvcError::Unavailable(
            "UVC extension-unit queries are only supported on Linux".into(),
        ))
    }

    fn get(&self, unit: u8, selector: u8, query: u8, size: u16) -> Result<Vec<u8>> {
        let mut data = vec![0u8; size as usize];
        self.query(unit, selector, query, &mut data)?;
        Ok(data)
    }
}

impl UvcQuery for UvcDevice {
    fn query_length(&self, unit: u8, selector: u8) -> Result<u16> {
        let mut data = [0u8; 2];
        self.query(unit, selector, UVC_GET_LEN, &mut data)?;
        Ok(u16::from_le_bytes(data))
    }

    fn query_current(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>> {
        self.get(unit, selector, UVC_GET_CUR, size)
    }

    fn query_maximum(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>> {
        self.get(unit, selector, UVC_GET_MAX, size)
    }

    fn query_resolution(&self, unit: u8, selector: u8, size: u16) -> Result<Vec<u8>> {
        self.get(unit, selector, UVC_GET_RES, size)
    }

    fn set_current(&self, unit: u8, selector: u8, values: &[u8]) -> Result<()> {
        // The ioctl wants a mutable pointer even for SET_CUR.
        let mut data = values.to_vec();
        self.query(unit, selector, UVC_SET_CUR, &mut data)
    }
}

impl fmt::Display for UvcDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UVC device {}", self.path.display())
    }
}

// ── Mock device for testing ──

/// In-memory mock device for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Scripted behavior for one (unit, selector) pair.
    #[derive(Debug, Clone)]
    pub struct MockControl {
        pub current: Vec<u8>,
        pub maximum: Vec<u8>,
        /// `None` simulates hardware with no resolution query.
        pub resolution: Option<Vec<u8>>,
        /// When false, every `set_current` on the pair fails.
        pub writable: bool,
        /// When true, any query on the pair reports the device gone.
        pub unavailable: bool,
    }

    impl MockControl {
        pub fn new(current: Vec<u8>, maximum: Vec<u8>, resolution: Option<Vec<u8>>) -> Self {
            MockControl {
                current,
                maximum,
                resolution,
                writable: true,
                unavailable: false,
            }
        }
    }

    /// Scripted UVC device. Pairs without an entry behave like the vast
    /// majority of the 256-wide selector space: every query fails.
    #[derive(Debug, Default)]
    pub struct MockUvc {
        controls: RefCell<HashMap<(u8, u8), MockControl>>,
        /// Recorded `query_length` calls, in order.
        pub length_queries: RefCell<Vec<(u8, u8)>>,
        /// Recorded `set_current` calls: (unit, selector, values).
        pub set_calls: RefCell<Vec<(u8, u8, Vec<u8>)>>,
    }

    impl MockUvc {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_control(&self, unit: u8, selector: u8, control: MockControl) {
            self.controls.borrow_mut().insert((unit, selector), control);
        }

        /// `set_current` values recorded for one pair.
        pub fn sets_for(&self, unit: u8, selector: u8) -> Vec<Vec<u8>> {
            self.set_calls
                .borrow()
                .iter()
                .filter(|(u, s, _)| *u == unit && *s == selector)
                .map(|(_, _, v)| v.clone())
                .collect()
        }

        fn with_control<T>(
            &self,
            unit: u8,
            selector: u8,
            f: impl FnOnce(&MockControl) -> T,
        ) -> Result<T> {
            let controls = self.controls.borrow();
            let Some(control) = controls.get(&(unit, selector)) else {
                return Err(UvcError::Failed(format!(
                    "unit {unit} selector {selector}: no such control"
                )));
            };
            if control.unavailable {
                return Err(UvcError::Unavailable("mock: device gone".into()));
            }
            Ok(f(control))
        }
    }

    impl UvcQuery for MockUvc {
        fn query_length(&self, unit: u8, selector: u8) -> Result<u16> {
            self.length_queries.borrow_mut().push((unit, selector));
            self.with_control(unit, selector, |c| c.current.len() as u16)
        }

        fn query_current(&self, unit: u8, selector: u8, _size: u16) -> Result<Vec<u8>> {
            self.with_control(unit, selector, |c| c.current.clone())
        }

        fn query_maximum(&self, unit: u8, selector: u8, _size: u16) -> Result<Vec<u8>> {
            self.with_control(unit, selector, |c| c.maximum.clone())
        }

        fn query_resolution(&self, unit: u8, selector: u8, _size: u16) -> Result<Vec<u8>> {
            self.with_control(unit, selector, |c| c.resolution.clone())?
                .ok_or_else(|| {
                    UvcError::Failed(format!(
                        "unit {unit} selector {selector}: resolution not supported"
                    ))
                })
        }

        fn set_current(&self, unit: u8, selector: u8, values: &[u8]) -> Result<()> {
            let writable = self.with_control(unit, selector, |c| c.writable)?;
            if !writable {
                return Err(UvcError::Failed(format!(
                    "unit {unit} selector {selector}: control is read-only"
                )));
            }
            self.set_calls
                .borrow_mut()
                .push((unit, selector, values.to_vec()));
            Ok(())
        }
    }
}
