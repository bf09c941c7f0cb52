//! Sample-frame rendering for visual verification.
//!
//! Draws the detected subject box and a jump-index label on a frame, then
//! encodes it as a base64 PNG for embedding in the report.

use base64::{engine::general_purpose::STANDARD, Engine};

#[cfg(feature = "opencv")]
use opencv::{
    core::{Mat, Point, Rect, Scalar, Vector},
    imgcodecs, imgproc,
    prelude::*,
};

use jumpscope_models::BoundingBox;

use crate::error::VisionResult;
use crate::frame::Frame;
#[cfg(feature = "opencv")]
use crate::error::VisionError;

/// Indices of the sample frames drawn from a jump window:
/// start/middle/end, or every frame when fewer than three exist.
pub fn sample_indices(len: usize) -> Vec<usize> {
    if len >= 3 {
        vec![0, len / 2, len - 1]
    } else {
        (0..len).collect()
    }
}

/// Convert an RGB frame to a BGR `Mat` for drawing and encoding.
#[cfg(feature = "opencv")]
fn frame_to_bgr_mat(frame: &Frame) -> VisionResult<Mat> {
    let flat = Mat::from_slice(&frame.data)
        .map_err(|e| VisionError::Annotation(format!("Mat from frame data: {e}")))?;
    let shaped = flat
        .reshape(3, frame.height as i32)
        .map_err(|e| VisionError::Annotation(format!("Mat reshape: {e}")))?;
    let rgb = shaped
        .try_clone()
        .map_err(|e| VisionError::Annotation(format!("Mat clone: {e}")))?;

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)
        .map_err(|e| VisionError::Annotation(format!("RGB2BGR failed: {e}")))?;
    Ok(bgr)
}

/// Render one annotated sample frame as a base64 PNG.
///
/// When a subject box is present it is drawn in green with the label above
/// it; otherwise the frame is encoded as-is.
#[cfg(feature = "opencv")]
pub fn render_sample(
    frame: &Frame,
    bbox: Option<&BoundingBox>,
    label: &str,
) -> VisionResult<String> {
    let mut canvas = frame_to_bgr_mat(frame)?;
    let green = Scalar::new(0.0, 255.0, 0.0, 0.0);

    if let Some(bbox) = bbox {
        let rect = Rect::new(
            bbox.x.round() as i32,
            bbox.y.round() as i32,
            bbox.width.round() as i32,
            bbox.height.round() as i32,
        );
        imgproc::rectangle(&mut canvas, rect, green, 3, imgproc::LINE_8, 0)
            .map_err(|e| VisionError::Annotation(format!("Rectangle failed: {e}")))?;

        imgproc::put_text(
            &mut canvas,
            label,
            Point::new(rect.x, (rect.y - 10).max(0)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            green,
            2,
            imgproc::LINE_AA,
            false,
        )
        .map_err(|e| VisionError::Annotation(format!("Label failed: {e}")))?;
    }

    let mut buffer = Vector::<u8>::new();
    imgcodecs::imencode(".png", &canvas, &mut buffer, &Vector::<i32>::new())
        .map_err(|e| VisionError::Annotation(format!("PNG encode failed: {e}")))?;

    Ok(STANDARD.encode(buffer.as_slice()))
}

/// Fallback PNG encoding when OpenCV is unavailable: no overlays, raw frame.
#[cfg(not(feature = "opencv"))]
pub fn render_sample(
    frame: &Frame,
    _bbox: Option<&BoundingBox>,
    _label: &str,
) -> VisionResult<String> {
    use crate::error::VisionError;
    use image::{ImageBuffer, Rgb};

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| VisionError::Annotation("Frame buffer size mismatch".to_string()))?;

    let mut png = std::io::Cursor::new(Vec::new());
    buffer
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .map_err(|e| VisionError::Annotation(format!("PNG encode failed: {e}")))?;

    Ok(STANDARD.encode(png.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_indices_long_window() {
        assert_eq!(sample_indices(10), vec![0, 5, 9]);
        assert_eq!(sample_indices(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_sample_indices_short_window() {
        assert_eq!(sample_indices(2), vec![0, 1]);
        assert_eq!(sample_indices(1), vec![0]);
        assert!(sample_indices(0).is_empty());
    }
}
