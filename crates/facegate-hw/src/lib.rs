//! facegate-hw: camera capture and image decoding.
//!
//! V4L2 capture converted to 8-bit grayscale, plus decoding of still
//! profile photos into the same frame type.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
