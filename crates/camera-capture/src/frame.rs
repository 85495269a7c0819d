//! Captured video frame

use std::time::Duration;

use image::RgbImage;

use crate::CameraError;

/// Raw RGB frame handed over by the capture source
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp relative to stream start (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a frame from raw RGB data, checking the buffer size
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Black frame, used when only landmark traces are replayed
    pub fn blank(width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Capture time as a stream-relative duration
    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }

    /// Get pixel at (x, y); `None` when out of bounds or the buffer is short
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        match self.data.get(idx..idx + 3)? {
            &[r, g, b] => Some([r, g, b]),
            _ => None,
        }
    }

    /// Copy into an `image` buffer for drawing
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or(CameraError::Buffer)
    }
}
