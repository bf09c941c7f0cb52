//! Frame window extraction from video files.
//!
//! Opens one `VideoCapture` per call; the handle is dropped on every exit
//! path, including decode failure. Video sources support multiple
//! independent handles, so concurrent extraction each open their own.

use std::path::Path;

use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::frame::{Frame, FrameWindow, MAX_WINDOW_FRAMES};

/// Open a video file, failing when the container cannot be read.
pub fn open_capture(path: impl AsRef<Path>) -> VisionResult<VideoCapture> {
    let path = path.as_ref();
    let path_str = path.to_str().unwrap_or("");

    let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)
        .map_err(|e| VisionError::VideoOpen(e.to_string()))?;

    let opened = capture
        .is_opened()
        .map_err(|e| VisionError::VideoOpen(e.to_string()))?;
    if !opened {
        return Err(VisionError::VideoOpen(format!(
            "Could not open video: {}",
            path.display()
        )));
    }

    Ok(capture)
}

/// Frame rate of an open capture, falling back to 25 when unreported.
pub fn capture_fps(capture: &VideoCapture) -> f64 {
    match capture.get(videoio::CAP_PROP_FPS) {
        Ok(fps) if fps > 0.0 => fps,
        _ => 25.0,
    }
}

/// Convert a decoded BGR `Mat` into an RGB [`Frame`].
pub fn mat_to_frame(mat: &Mat, timestamp: f64) -> VisionResult<Frame> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| VisionError::decode(format!("Color conversion failed: {e}")))?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb
        .data_bytes()
        .map_err(|e| VisionError::decode(format!("Failed to read frame data: {e}")))?;

    Frame::from_rgb(data.to_vec(), width, height, timestamp)
        .ok_or_else(|| VisionError::decode("Frame buffer size mismatch"))
}

/// Extract the frames covering `[start_sec, end_sec]`.
///
/// Seeks to `start_sec` and decodes sequentially until the stream position
/// reaches `end_sec`, decoding ends, or [`MAX_WINDOW_FRAMES`] is hit. A
/// source that ends early or fails mid-stream yields a shorter window,
/// never an error; callers decide how to treat emptiness.
pub fn extract_window(path: impl AsRef<Path>, start_sec: f64, end_sec: f64) -> VisionResult<FrameWindow> {
    let mut capture = open_capture(path)?;
    let fps = capture_fps(&capture);

    if capture
        .set(videoio::CAP_PROP_POS_MSEC, start_sec * 1000.0)
        .is_err()
    {
        return Ok(FrameWindow::empty(fps));
    }

    let mut frames = Vec::new();
    let mut mat = Mat::default();

    loop {
        let pos_ms = capture.get(videoio::CAP_PROP_POS_MSEC).unwrap_or(f64::MAX);
        if pos_ms >= end_sec * 1000.0 {
            break;
        }

        match capture.read(&mut mat) {
            Ok(true) if !mat.empty() => {}
            _ => break,
        }

        match mat_to_frame(&mat, pos_ms / 1000.0) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                debug!(error = %e, "Frame conversion failed mid-stream, truncating window");
                break;
            }
        }
        if frames.len() >= MAX_WINDOW_FRAMES {
            debug!(
                start_sec,
                end_sec, "Frame cap reached, truncating window"
            );
            break;
        }
    }

    Ok(FrameWindow::new(frames, fps))
}
