//! Jump contrastive analysis.
//!
//! For each caller-supplied jump interval, extracts pre/jump/post frame
//! windows, computes scene and body features on each, and turns the raw
//! series into per-metric before/during/after comparisons plus annotated
//! sample frames. Failures are isolated per interval; only invalid input
//! or an unreadable source aborts a batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use jumpscope_models::{
    AnalysisResponse, ComparisonMetric, FrameCounts, JumpReport, MetricCategory, TimeInterval,
    VideoMetadata,
};

use crate::annotate::{render_sample, sample_indices};
use crate::detector::{PersonDetector, SubjectDetector};
use crate::error::VisionResult;
use crate::frame::FrameWindow;
use crate::scene::{extract_scene_features, SceneFeatureSeries};
use crate::tracker::{BodyFeatureSummary, SubjectTracker};

/// Supplier of time-bounded frame windows from one video.
///
/// The decode seam of the analyzer: the batch loop is a pure function of
/// whatever implements this, so its contracts hold independent of the
/// container format or decoder backend.
pub trait WindowSource {
    /// Extract the frames covering `[start_sec, end_sec]`.
    fn window(&self, start_sec: f64, end_sec: f64) -> VisionResult<FrameWindow>;
}

/// File-backed [`WindowSource`] decoding through OpenCV.
///
/// Each `window` call opens its own capture handle, so one source may be
/// shared across parallel interval workers.
#[cfg(feature = "opencv")]
pub struct VideoFileSource {
    path: std::path::PathBuf,
}

#[cfg(feature = "opencv")]
impl VideoFileSource {
    /// Create a source over a video file path.
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "opencv")]
impl WindowSource for VideoFileSource {
    fn window(&self, start_sec: f64, end_sec: f64) -> VisionResult<FrameWindow> {
        crate::decode::extract_window(&self.path, start_sec, end_sec)
    }
}

/// Configuration for jump analysis.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Seconds of context extracted before and after each jump.
    pub context_window: f64,
    /// Jump windows with fewer frames are skipped as insufficient evidence.
    pub min_jump_frames: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            context_window: 3.0,
            min_jump_frames: 3,
        }
    }
}

/// Orchestrates per-interval contrastive analysis.
///
/// The detection model is injected and constructed once by the caller; the
/// analyzer holds no state across intervals.
pub struct JumpAnalyzer {
    detector: Arc<dyn PersonDetector>,
    config: AnalyzerConfig,
}

impl JumpAnalyzer {
    /// Create an analyzer over an injected detection model.
    pub fn new(detector: Arc<dyn PersonDetector>) -> Self {
        Self::with_config(detector, AnalyzerConfig::default())
    }

    /// Create with explicit configuration.
    pub fn with_config(detector: Arc<dyn PersonDetector>, config: AnalyzerConfig) -> Self {
        Self { detector, config }
    }

    /// Analyze a batch of jump intervals in one video file.
    ///
    /// Always returns a response: batch-fatal errors (invalid intervals,
    /// unreadable source) produce `success: false` with nothing computed,
    /// while per-interval failures surface as error-only reports inside a
    /// successful response.
    #[cfg(feature = "opencv")]
    pub async fn analyze(
        &self,
        video_path: impl AsRef<std::path::Path>,
        intervals: &[TimeInterval],
    ) -> AnalysisResponse {
        let video_path = video_path.as_ref();
        let result = match crate::probe::probe_video(video_path).await {
            Ok(video_info) => self.run(&VideoFileSource::new(video_path), video_info, intervals),
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Jump analysis failed");
                AnalysisResponse::failed(e.to_string())
            }
        }
    }

    /// Run the batch loop over an already-probed source.
    ///
    /// Reports come out in input interval order; a failed interval yields
    /// an error-only report and the loop continues, while batch-fatal
    /// errors propagate. Skipped intervals (too few jump frames) produce
    /// no report at all.
    pub fn run(
        &self,
        source: &dyn WindowSource,
        video_info: VideoMetadata,
        intervals: &[TimeInterval],
    ) -> VisionResult<AnalysisResponse> {
        TimeInterval::validate_all(intervals)?;
        info!(
            intervals = intervals.len(),
            fps = video_info.fps,
            duration = video_info.duration,
            "Starting jump analysis"
        );

        let mut reports = Vec::new();
        for (index, interval) in intervals.iter().enumerate() {
            let jump_number = index + 1;
            match self.analyze_interval(source, jump_number, *interval) {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {
                    warn!(jump = jump_number, "Too few frames in jump window, skipping");
                }
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => {
                    error!(jump = jump_number, error = %e, "Interval analysis failed");
                    reports.push(JumpReport::failed(jump_number, *interval, e.to_string()));
                }
            }
        }

        Ok(AnalysisResponse::completed(
            video_info,
            intervals.to_vec(),
            reports,
        ))
    }

    /// Analyze one interval; `None` means the jump window was too short.
    fn analyze_interval(
        &self,
        source: &dyn WindowSource,
        jump_number: usize,
        interval: TimeInterval,
    ) -> VisionResult<Option<JumpReport>> {
        let jump = source.window(interval.start, interval.end)?;
        if jump.len() < self.config.min_jump_frames {
            return Ok(None);
        }

        let pre_start = (interval.start - self.config.context_window).max(0.0);
        let pre = source.window(pre_start, interval.start)?;
        let post = source.window(interval.end, interval.end + self.config.context_window)?;

        let detector = SubjectDetector::new(Arc::clone(&self.detector));
        let tracker = SubjectTracker::new(SubjectDetector::new(Arc::clone(&self.detector)));

        let jump_scene = extract_scene_features(&jump);
        let pre_scene = extract_scene_features(&pre);
        let post_scene = extract_scene_features(&post);

        let jump_body = tracker.summarize(&jump.frames, jump.fps)?;
        let pre_body = tracker.summarize(&pre.frames, pre.fps)?;
        let post_body = tracker.summarize(&post.frames, post.fps)?;

        let comparison = build_comparison(
            [&jump_scene, &pre_scene, &post_scene],
            [jump_body.as_ref(), pre_body.as_ref(), post_body.as_ref()],
        );

        let label = format!("Jump {jump_number}");
        let mut sample_frames = Vec::new();
        for index in sample_indices(jump.len()) {
            let frame = &jump.frames[index];
            let subject = detector.locate(frame)?;
            sample_frames.push(render_sample(
                frame,
                subject.as_ref().map(|s| &s.padded),
                &label,
            )?);
        }

        let frame_counts = FrameCounts {
            pre: pre.len(),
            jump: jump.len(),
            post: post.len(),
        };

        Ok(Some(JumpReport::completed(
            jump_number,
            interval,
            comparison,
            sample_frames,
            frame_counts,
        )))
    }
}

/// The fixed scene metric set: key, display name, series accessor.
const SCENE_METRICS: [(&str, &str, fn(&SceneFeatureSeries) -> &[f64]); 3] = [
    ("brightness", "Brightness", |s| &s.brightness),
    ("edges", "Edge energy", |s| &s.edges),
    ("color_entropy", "Color entropy", |s| &s.color_entropy),
];

/// The fixed body metric set: key, display name, summary accessor.
const BODY_METRICS: [(&str, &str, fn(&BodyFeatureSummary) -> f64); 7] = [
    ("height_max", "Max height", |s| s.height_max),
    ("vertical_velocity_max", "Max vertical velocity", |s| {
        s.vertical_velocity_max
    }),
    ("vertical_acceleration_max", "Max vertical acceleration", |s| {
        s.vertical_acceleration_max
    }),
    ("aspect_ratio_mean", "Mean aspect ratio", |s| s.aspect_ratio_mean),
    ("angle_mean", "Torso angle (deg)", |s| s.angle_mean),
    ("hands_open_ratio", "Hands open ratio", |s| s.hands_open_ratio),
    ("legs_apart_ratio", "Legs apart ratio", |s| s.legs_apart_ratio),
];

/// Mean of a series, 0 when empty.
pub fn safe_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Landing stability: inverse coefficient of variation of body height.
///
/// 1 means perfectly steady height; a missing summary or non-positive mean
/// height yields 0.
pub fn landing_stability(summary: Option<&BodyFeatureSummary>) -> f64 {
    match summary {
        Some(s) if s.height_mean > 0.0 => 1.0 - s.height_std / s.height_mean,
        _ => 0.0,
    }
}

/// Assemble the full comparison map from per-window scene series and body
/// summaries, ordered `[jump, pre, post]`.
///
/// Missing body summaries contribute 0 for every body metric; an empty
/// summary means "no data", and the contrastive baseline treats that as a
/// zero baseline via the degenerate percent-change rule.
pub fn build_comparison(
    scene: [&SceneFeatureSeries; 3],
    body: [Option<&BodyFeatureSummary>; 3],
) -> BTreeMap<String, ComparisonMetric> {
    let [jump_scene, pre_scene, post_scene] = scene;
    let [jump_body, pre_body, post_body] = body;

    let mut comparison = BTreeMap::new();

    for (key, name, accessor) in SCENE_METRICS {
        comparison.insert(
            key.to_string(),
            ComparisonMetric::contrast(
                name,
                MetricCategory::Scene,
                safe_mean(accessor(jump_scene)),
                safe_mean(accessor(pre_scene)),
                safe_mean(accessor(post_scene)),
            ),
        );
    }

    for (key, name, accessor) in BODY_METRICS {
        comparison.insert(
            key.to_string(),
            ComparisonMetric::contrast(
                name,
                MetricCategory::Body,
                jump_body.map(accessor).unwrap_or(0.0),
                pre_body.map(accessor).unwrap_or(0.0),
                post_body.map(accessor).unwrap_or(0.0),
            ),
        );
    }

    comparison.insert(
        "landing_stability".to_string(),
        ComparisonMetric::contrast(
            "Landing stability",
            MetricCategory::Stability,
            landing_stability(jump_body),
            landing_stability(pre_body),
            landing_stability(post_body),
        ),
    );

    comparison
}
