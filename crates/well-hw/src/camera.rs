//! V4L2 webcam capture via the `v4l` crate.

use crate::frame::{self, FrameError};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;
use well_core::{CollabError, Frame, FrameSource};

/// Buffers queued on the mmap stream.
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera at {0}")]
    Missing(String),
    #[error("camera {0} is in use by another process")]
    Busy(String),
    #[error("cannot open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("{0} is not a video capture device")]
    NotCapture(String),
    #[error("unsupported pixel format {0} (want MJPG, YUYV, GREY or Y16)")]
    UnsupportedFormat(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error(transparent)]
    Convert(#[from] FrameError),
}

impl CameraError {
    /// Errors worth retrying on a later cycle: the device may be plugged
    /// back in, released by another app, or deliver a clean frame.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::Missing(_)
                | CameraError::Busy(_)
                | CameraError::Stream(_)
                | CameraError::Convert(_)
        )
    }
}

/// A capture-capable V4L2 node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One JPEG image per buffer.
    Mjpeg,
    /// Packed 4:2:2; luma on even bytes.
    Yuyv,
    Grey,
    /// 16-bit little-endian luma.
    Y16,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Some(match &fourcc.repr {
            b"MJPG" => PixelFormat::Mjpeg,
            b"YUYV" => PixelFormat::Yuyv,
            b"GREY" => PixelFormat::Grey,
            b"Y16 " | b"Y16\0" => PixelFormat::Y16,
            _ => return None,
        })
    }

    fn to_luma(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
        match self {
            PixelFormat::Mjpeg => frame::mjpeg_to_grayscale(buf, width, height),
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, width, height),
            PixelFormat::Grey => frame::grey_to_grayscale(buf, width, height),
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, width, height),
        }
    }
}

/// An open V4L2 device with a negotiated format.
pub struct Camera {
    device: Device,
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Camera {
    /// Open `path` asking for `width`x`height` MJPG. The driver may answer
    /// with another size or format; both are taken as negotiated.
    pub fn open(path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !Path::new(path).exists() {
            return Err(CameraError::Missing(path.to_string()));
        }

        let device = Device::with_path(path).map_err(|e| {
            if e.raw_os_error() == Some(16) || e.to_string().contains("busy") {
                CameraError::Busy(path.to_string())
            } else {
                CameraError::Open {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let caps = device.query_caps().map_err(|e| CameraError::Open {
            path: path.to_string(),
            reason: format!("query capabilities: {e}"),
        })?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CameraError::NotCapture(path.to_string()));
        }

        let negotiated = device
            .format()
            .and_then(|mut wanted| {
                wanted.fourcc = FourCC::new(b"MJPG");
                wanted.width = width;
                wanted.height = height;
                device.set_format(&wanted)
            })
            .map_err(|e| CameraError::Open {
                path: path.to_string(),
                reason: format!("set format: {e}"),
            })?;

        let format = PixelFormat::from_fourcc(negotiated.fourcc)
            .ok_or_else(|| CameraError::UnsupportedFormat(format!("{:?}", negotiated.fourcc)))?;

        tracing::debug!(
            device = path,
            card = %caps.card,
            format = ?format,
            width = negotiated.width,
            height = negotiated.height,
            "camera opened"
        );

        Ok(Self {
            device,
            path: path.to_string(),
            width: negotiated.width,
            height: negotiated.height,
            format,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Start streaming, drop `warmup` frames while exposure settles, and
    /// return the next one as 8-bit luma.
    pub fn capture_frame(&self, warmup: usize) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::Stream(format!("mmap: {e}")))?;

        for _ in 0..warmup {
            stream
                .next()
                .map_err(|e| CameraError::Stream(format!("warmup dequeue: {e}")))?;
        }

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::Stream(format!("dequeue: {e}")))?;
        // Some drivers leave bytesused at 0 for uncompressed formats.
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };

        Ok(Frame {
            data: self.format.to_luma(&buf[..used], self.width, self.height)?,
            width: self.width,
            height: self.height,
            timestamp: Instant::now(),
            sequence: meta.sequence,
        })
    }

    /// Capture-capable devices among `/dev/video0` through `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

/// Frame source that opens the webcam per capture, so the device (and its
/// indicator light) is released between cycles.
#[derive(Debug, Clone)]
pub struct WebcamSource {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub warmup_frames: usize,
}

impl WebcamSource {
    pub fn new(device_path: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            device_path: device_path.into(),
            width: 640,
            height: 480,
            warmup_frames,
        }
    }
}

impl FrameSource for WebcamSource {
    fn capture(&mut self) -> Result<Option<Frame>, CollabError> {
        let frame = Camera::open(&self.device_path, self.width, self.height)
            .and_then(|camera| camera.capture_frame(self.warmup_frames));

        match frame {
            // Dim but lit frames go on to the quality gate.
            Ok(frame) if frame::is_blank(&frame.data) => {
                tracing::debug!(seq = frame.sequence, "blank frame; treating as absent");
                Ok(None)
            }
            Ok(frame) => Ok(Some(frame)),
            Err(e) if e.is_transient() => {
                tracing::debug!(device = %self.device_path, error = %e, "capture unavailable");
                Ok(None)
            }
            Err(e) => Err(CollabError::Unavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), Some(PixelFormat::Mjpeg));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y16 ")), Some(PixelFormat::Y16));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"H264")), None);
    }

    #[test]
    fn test_grey_to_luma_passthrough() {
        let luma = PixelFormat::Grey.to_luma(&[1, 2, 3, 4], 2, 2).unwrap();
        assert_eq!(luma, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_device_is_absent() {
        let mut source = WebcamSource::new("/dev/does-not-exist-video99", 0);
        assert!(matches!(source.capture(), Ok(None)));
    }

    #[test]
    fn test_transient_errors() {
        assert!(CameraError::Busy("/dev/video0".into()).is_transient());
        assert!(!CameraError::NotCapture("/dev/video1".into()).is_transient());
        assert!(!CameraError::UnsupportedFormat("H264".into()).is_transient());
    }
}
