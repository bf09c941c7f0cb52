#![deny(unreachable_patterns)]
//! Figure-skating jump analysis over decoded video.
//!
//! This crate provides:
//! - Frame window extraction around jump intervals (OpenCV decode)
//! - Shot boundary segmentation via color histogram comparison
//! - Per-frame scene features (brightness, edge energy, color entropy)
//! - YOLO-based skater detection and bounding-box body tracking
//! - Contrastive pre/jump/post analysis with annotated sample frames
//!
//! Decoding and rendering live behind the default-on `opencv` feature; the
//! analytics cores operate on raw RGB buffers and carry no native
//! dependencies, so they stay testable everywhere.

pub mod analyzer;
pub mod annotate;
#[cfg(feature = "opencv")]
pub mod decode;
pub mod detector;
pub mod error;
pub mod frame;
pub mod probe;
pub mod scene;
pub mod shots;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;

#[cfg(feature = "opencv")]
pub use analyzer::VideoFileSource;
pub use analyzer::{AnalyzerConfig, JumpAnalyzer, WindowSource};
pub use annotate::{render_sample, sample_indices};
#[cfg(feature = "opencv")]
pub use decode::extract_window;
pub use detector::{
    Detection, PersonDetector, SubjectBox, SubjectDetector, YoloConfig, YoloDetector,
};
pub use error::{VisionError, VisionResult};
pub use frame::{Frame, FrameWindow, MAX_WINDOW_FRAMES};
pub use probe::probe_video;
pub use scene::{extract_scene_features, SceneFeatureSeries};
pub use shots::{ShotSegmenter, ShotSegmenterConfig};
pub use tracker::{BodyFeatureSummary, BodyObservation, SubjectTracker};
