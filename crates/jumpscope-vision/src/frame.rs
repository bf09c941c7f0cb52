//! Decoded frames and time-bounded frame windows.
//!
//! Frames are raw RGB24 buffers so every analytic stage downstream of the
//! decoder is a pure function of bytes, independent of OpenCV.

use jumpscope_models::BoundingBox;

/// Hard cap on frames per extracted window, bounds memory per interval.
pub const MAX_WINDOW_FRAMES: usize = 120;

/// One decoded video frame in RGB24 layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Interleaved RGB pixel data, `width * height * 3` bytes
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Timestamp in seconds within the source video
    pub timestamp: f64,
}

impl Frame {
    /// Create a frame from raw RGB data.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, timestamp: f64) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            timestamp,
        })
    }

    /// Create a solid-color frame. Useful for synthetic test videos.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], timestamp: f64) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    /// RGB triple at pixel coordinates.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// BT.601 luma plane as f32 values in [0, 255].
    pub fn luma_plane(&self) -> Vec<f32> {
        self.data
            .chunks_exact(3)
            .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
            .collect()
    }

    /// Zero all pixels inside the box, clipped to the frame.
    ///
    /// Produces the "background only" frame used for comparisons that must
    /// ignore the subject.
    pub fn zero_region(&mut self, bbox: &BoundingBox) {
        let clipped = bbox.clip(self.width, self.height);
        let x1 = clipped.x as usize;
        let y1 = clipped.y as usize;
        let x2 = clipped.x2() as usize;
        let y2 = clipped.y2() as usize;

        for y in y1..y2 {
            let row = y * self.width as usize * 3;
            self.data[row + x1 * 3..row + x2 * 3].fill(0);
        }
    }
}

/// An ordered, time-bounded run of decoded frames.
///
/// May be shorter than requested when the source ends early or decoding
/// fails mid-stream; emptiness is a valid state, not an error.
#[derive(Debug, Clone, Default)]
pub struct FrameWindow {
    /// Frames in decode order
    pub frames: Vec<Frame>,
    /// Frame rate the window was produced at
    pub fps: f64,
}

impl FrameWindow {
    /// Create a window from frames and the source frame rate.
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self { frames, fps }
    }

    /// An empty window at the given frame rate.
    pub fn empty(fps: f64) -> Self {
        Self {
            frames: Vec::new(),
            fps,
        }
    }

    /// Number of frames in the window.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the window holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_length_check() {
        assert!(Frame::from_rgb(vec![0; 12], 2, 2, 0.0).is_some());
        assert!(Frame::from_rgb(vec![0; 11], 2, 2, 0.0).is_none());
    }

    #[test]
    fn test_solid_pixel() {
        let frame = Frame::solid(4, 2, [200, 30, 40], 0.5);
        assert_eq!(frame.pixel(3, 1), [200, 30, 40]);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_luma_plane_gray() {
        let frame = Frame::solid(2, 2, [100, 100, 100], 0.0);
        let luma = frame.luma_plane();
        assert_eq!(luma.len(), 4);
        for value in luma {
            assert!((value - 100.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_zero_region_clips_to_frame() {
        let mut frame = Frame::solid(10, 10, [255, 255, 255], 0.0);
        frame.zero_region(&BoundingBox::new(5.0, 5.0, 100.0, 100.0));

        assert_eq!(frame.pixel(4, 4), [255, 255, 255]);
        assert_eq!(frame.pixel(5, 5), [0, 0, 0]);
        assert_eq!(frame.pixel(9, 9), [0, 0, 0]);
    }

    #[test]
    fn test_empty_window() {
        let window = FrameWindow::empty(25.0);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert_eq!(window.fps, 25.0);
    }
}
