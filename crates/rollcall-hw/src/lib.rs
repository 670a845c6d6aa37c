//! rollcall-hw — Frame sources for the attendance flows.
//!
//! Provides V4L2 webcam capture and a directory replay source, both
//! implementing [`rollcall_core::FrameSource`].

pub mod camera;
pub mod convert;
pub mod replay;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use replay::ReplaySource;
