//! Video frame capture and per-frame intensity statistics.
//!
//! The emitter check needs one number per frame: the variance of pixel
//! intensity. Infrared illumination bouncing back into a grayscale-capable
//! sensor raises that variance measurably, which is what the automatic
//! confirmation strategy tests for.
//!
//! Capture is strictly open → read → release on every sample: the video
//! node is a single exclusively-owned resource and most UVC drivers
//! misbehave when it is streamed from twice at once.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ── Error type ──

/// Capture errors.
///
/// There is only one class: the camera could not be opened or stopped
/// delivering frames. This is never a "not working" answer — a probe that
/// cannot see the sensor must abort, not report a negative.
#[derive(Debug)]
pub enum CaptureError {
    Unavailable(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Unavailable(e) => write!(f, "Camera unavailable: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}

pub type Result<T> = std::result::Result<T, CaptureError>;

// ── Trait ──

/// A source of frame-variance samples.
pub trait FrameSource {
    /// Open the capture device, read `count` decodable frames and return
    /// the pixel-intensity variance of each, then release the device.
    fn sample_variances(&mut self, count: usize) -> Result<Vec<f64>>;
}

/// Variance of the byte intensities of one raw frame.
pub fn frame_variance(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &b in data {
        let v = f64::from(b);
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    sum_sq / n - mean * mean
}

// ── V4L2 implementation ──

/// Frame source over a V4L2 capture node, streaming in whatever format the
/// device currently has negotiated.
#[derive(Debug)]
pub struct V4lFrameSource {
    path: PathBuf,
}

impl V4lFrameSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Empty frames tolerated from a cold stream before giving up.
#[cfg(target_os = "linux")]
const EMPTY_FRAME_BUDGET: usize = 5;

impl FrameSource for V4lFrameSource {
    #[cfg(target_os = "linux")]
    fn sample_variances(&mut self, count: usize) -> Result<Vec<f64>> {
        use v4l::buffer::Type;
        use v4l::io::traits::CaptureStream;

        let unavailable =
            |e: std::io::Error| CaptureError::Unavailable(format!("{}: {e}", self.path.display()));

        let device = v4l::Device::with_path(&self.path).map_err(unavailable)?;
        let mut stream = v4l::io::mmap::Stream::with_buffers(&device, Type::VideoCapture, 4)
            .map_err(unavailable)?;

        let mut variances = Vec::with_capacity(count);
        let mut empty_budget = EMPTY_FRAME_BUDGET;
        while variances.len() < count {
            let (buffer, meta) = stream.next().map_err(unavailable)?;
            let used = (meta.bytesused as usize).min(buffer.len());
            if used == 0 {
                if empty_budget == 0 {
                    return Err(CaptureError::Unavailable(format!(
                        "{}: no decodable frame delivered",
                        self.path.display()
                    )));
                }
                empty_budget -= 1;
                continue;
            }
            variances.push(frame_variance(&buffer[..used]));
        }
        Ok(variances)
        // device and stream drop here, releasing the node
    }

    #[cfg(not(target_os = "linux"))]
    fn sample_variances(&mut self, _count: usize) -> Result<Vec<f64>> {
        Err(CaptureError::Unavailable(format!(
            "{}: video capture is only supported on Linux",
            self.path.display()
        )))
    }
}

// ── Device listing ──

/// A video capture node with its driver-reported card name.
#[derive(Debug, Clone, Serialize)]
pub struct VideoDeviceInfo {
    pub path: PathBuf,
    pub card: String,
}

/// List `/dev/video*` capture nodes, numerically ordered.
///
/// Nodes that cannot be opened or lack the capture capability are skipped.
/// Always returns an empty list on non-Linux hosts.
pub fn list_video_devices() -> Vec<VideoDeviceInfo> {
    #[cfg(target_os = "linux")]
    {
        list_video_devices_linux()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn list_video_devices_linux() -> Vec<VideoDeviceInfo> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    let mut nodes: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| video_node_index(n).is_some())
        })
        .collect();
    nodes.sort_by_key(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .and_then(video_node_index)
            .unwrap_or(u32::MAX)
    });

    nodes
        .into_iter()
        .filter_map(|path| {
            let device = v4l::Device::with_path(&path).ok()?;
            let caps = device.query_caps().ok()?;
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                return None;
            }
            Some(VideoDeviceInfo {
                path,
                card: caps.card,
            })
        })
        .collect()
}

/// Numeric suffix of a `videoN` node name, `None` for anything else.
fn video_node_index(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

// ── Mock source for testing ──

/// Scripted frame source for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Pops one pre-scripted variance sample per call; errors when the
    /// script runs dry so tests catch unexpected extra sampling.
    #[derive(Debug, Default)]
    pub struct ScriptFrames {
        samples: RefCell<VecDeque<Vec<f64>>>,
        /// Count of completed sampling calls.
        pub calls: RefCell<usize>,
    }

    impl ScriptFrames {
        pub fn new(samples: Vec<Vec<f64>>) -> Self {
            ScriptFrames {
                samples: RefCell::new(samples.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl FrameSource for ScriptFrames {
        fn sample_variances(&mut self, count: usize) -> Result<Vec<f64>> {
            let Some(mut sample) = self.samples.borrow_mut().pop_front() else {
                return Err(CaptureError::Unavailable("mock: out of samples".into()));
            };
            sample.truncate(count);
            *self.calls.borrow_mut() += 1;
            Ok(sample)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_of_empty_frame_is_zero() {
        assert_eq!(frame_variance(&[]), 0.0);
    }

    #[test]
    fn variance_of_constant_frame_is_zero() {
        assert_eq!(frame_variance(&[7; 64]), 0.0);
    }

    #[test]
    fn variance_of_two_point_frame() {
        // Half zeros, half 10s: mean 5, variance 25.
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&[10; 8]);
        let v = frame_variance(&data);
        assert!((v - 25.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn variance_grows_with_spread() {
        let narrow = frame_variance(&[100, 101, 99, 100, 101, 99]);
        let wide = frame_variance(&[0, 200, 10, 190, 5, 195]);
        assert!(wide > narrow);
    }

    #[test]
    fn video_node_index_parses_suffix() {
        assert_eq!(video_node_index("video0"), Some(0));
        assert_eq!(video_node_index("video12"), Some(12));
        assert_eq!(video_node_index("video"), None);
        assert_eq!(video_node_index("video2a"), None);
        assert_eq!(video_node_index("media0"), None);
    }

    #[test]
    fn script_frames_pops_in_order() {
        let mut source = mock::ScriptFrames::new(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(source.sample_variances(2).unwrap(), vec![1.0, 2.0]);
        assert_eq!(source.sample_variances(2).unwrap(), vec![3.0]);
        assert!(source.sample_variances(2).is_err());
        assert_eq!(*source.calls.borrow(), 2);
    }

    #[test]
    fn script_frames_truncates_to_requested_count() {
        let mut source = mock::ScriptFrames::new(vec![vec![1.0, 2.0, 3.0]]);
        assert_eq!(source.sample_variances(2).unwrap(), vec![1.0, 2.0]);
    }
}
