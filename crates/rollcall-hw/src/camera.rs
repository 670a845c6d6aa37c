//! V4L2 camera capture via the `v4l` crate.

use crate::convert;
use rollcall_core::{Frame, FrameSource, SourceError};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
    #[error("camera is not open")]
    NotOpen,
}

impl From<CameraError> for SourceError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::Timeout(d) => SourceError::Timeout(d),
            CameraError::CaptureFailed(msg) => SourceError::ReadFailed(msg),
            other => SourceError::DeviceUnavailable(other.to_string()),
        }
    }
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion-JPEG, one JPEG per buffer.
    Mjpeg,
    /// Packed RGB24.
    Rgb3,
    /// 8-bit grayscale, replicated into RGB.
    Grey,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"MJPG" => Some(PixelFormat::Mjpeg),
            b"RGB3" => Some(PixelFormat::Rgb3),
            b"GREY" => Some(PixelFormat::Grey),
            _ => None,
        }
    }
}

struct OpenDevice {
    // Declared before `device` so the stream is dropped first.
    stream: MmapStream<'static>,
    _device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

/// V4L2 webcam. Opened lazily through [`FrameSource::open`].
pub struct Camera {
    device_path: String,
    read_timeout: Duration,
    width: u32,
    height: u32,
    open: Option<OpenDevice>,
}

impl Camera {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            read_timeout: Duration::from_secs(5),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            open: None,
        }
    }

    /// Bound each frame read; a timed-out read counts as a failed read.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Requested capture resolution; the driver may negotiate another.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn open_device(&self) -> Result<OpenDevice, CameraError> {
        let path = self.device_path.as_str();
        if !Path::new(path).exists() {
            return Err(CameraError::DeviceNotFound(path.to_string()));
        }

        let device = Device::with_path(path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        tracing::info!(device = path, driver = %caps.driver, card = %caps.card, "opened camera");

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; accept whatever supported format the driver settles on.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = self.width;
        fmt.height = self.height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;
        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV, MJPG, RGB3 or GREY)",
                negotiated.fourcc
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let mut stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        stream.set_timeout(self.read_timeout);

        Ok(OpenDevice {
            stream,
            _device: device,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }

    /// Capture and convert a single frame.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let timeout = self.read_timeout;
        let dev = self.open.as_mut().ok_or(CameraError::NotOpen)?;

        let (buf, meta) = dev.stream.next().map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                CameraError::Timeout(timeout)
            } else {
                CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
            }
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };
        let image = match dev.pixel_format {
            PixelFormat::Yuyv => convert::yuyv_to_rgb(data, dev.width, dev.height),
            PixelFormat::Grey => convert::grey_to_rgb(data, dev.width, dev.height),
            PixelFormat::Rgb3 => convert::rgb24_to_rgb(data, dev.width, dev.height),
            PixelFormat::Mjpeg => convert::mjpeg_to_rgb(data),
        }
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        Ok(Frame::new(image, meta.sequence))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl FrameSource for Camera {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.open.is_none() {
            self.open = Some(self.open_device()?);
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(Some(self.capture_frame()?))
    }

    fn release(&mut self) {
        if self.open.take().is_some() {
            tracing::info!(device = %self.device_path, "camera released");
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}
