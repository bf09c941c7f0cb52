//! Test doubles shared across module tests.

use jumpscope_models::BoundingBox;

use crate::detector::{Detection, PersonDetector};
use crate::error::VisionResult;
use crate::frame::Frame;

/// Stub detector that reports the bounding box of bright pixels
/// (luma > 128) as a single person detection.
///
/// Synthetic frames drawn with [`frame_with_block`] drive it
/// deterministically: move the block between frames and the tracker sees
/// motion; draw no block and detection is absent.
pub(crate) struct BlockDetector {
    extra: Vec<Detection>,
}

impl BlockDetector {
    pub(crate) fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Also report the given fixed detections on every frame.
    pub(crate) fn with_extra(extra: Vec<Detection>) -> Self {
        Self { extra }
    }
}

impl PersonDetector for BlockDetector {
    fn infer(&self, frame: &Frame) -> VisionResult<Vec<Detection>> {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for y in 0..frame.height {
            for x in 0..frame.width {
                let [r, g, b] = frame.pixel(x, y);
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                if luma > 128.0 {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                    found = true;
                }
            }
        }

        let mut detections = self.extra.clone();
        if found {
            detections.push(Detection {
                bbox: BoundingBox::from_corners(
                    min_x as f64,
                    min_y as f64,
                    (max_x + 1) as f64,
                    (max_y + 1) as f64,
                ),
                class_id: 0,
                confidence: 0.9,
            });
        }
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "block-stub"
    }
}

/// Dim gray frame with one white block at the given position.
pub(crate) fn frame_with_block(
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    block_width: u32,
    block_height: u32,
) -> Frame {
    let mut frame = Frame::solid(width, height, [40, 40, 40], 0.0);
    for by in y..(y + block_height).min(height) {
        for bx in x..(x + block_width).min(width) {
            let idx = (by as usize * width as usize + bx as usize) * 3;
            frame.data[idx..idx + 3].fill(255);
        }
    }
    frame
}
