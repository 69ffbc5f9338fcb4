//! well-hw — webcam capture and host load probing.
//!
//! Provides a V4L2 frame source that releases the camera between
//! captures, `sysinfo`-based load sampling, and pointer-based idle
//! detection.

pub mod activity;
pub mod camera;
pub mod frame;
pub mod probe;

pub use activity::{ActivityTracker, NoPointer, PointerSource};
pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat, WebcamSource};
pub use probe::SystemProbe;

#[cfg(feature = "pointer")]
pub use activity::EnigoPointer;
