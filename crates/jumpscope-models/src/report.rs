//! Jump analysis reports and the response envelope.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::interval::TimeInterval;

/// Analysis method identifier echoed in every response.
pub const ANALYSIS_METHOD: &str = "jump_contrastive";

/// Round to 4 decimal places (reported metric values).
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Round to 2 decimal places (percents and timestamps).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Category of a comparison metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MetricCategory {
    /// Global visual appearance of the frame
    Scene,
    /// Tracked body geometry
    Body,
    /// Landing stability scores
    Stability,
}

/// One named metric compared across the pre/jump/post windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComparisonMetric {
    /// Human-readable metric name
    pub name: String,
    /// Metric category for grouping in the UI
    pub category: MetricCategory,
    /// Mean value over the jump window
    pub jump: f64,
    /// Mean value over the pre-jump context window
    pub pre: f64,
    /// Mean value over the post-jump context window
    pub post: f64,
    /// `jump - pre`
    pub difference: f64,
    /// `difference / pre * 100`, or `jump * 100` when `pre` is exactly zero
    pub percent_change: f64,
    /// Delta against the pre window (same as `difference`)
    pub jump_vs_pre: f64,
    /// Delta against the post window
    pub jump_vs_post: f64,
    /// Percent change against the pre window (same as `percent_change`)
    pub jump_vs_pre_pct: f64,
}

impl ComparisonMetric {
    /// Build a metric from raw pre/jump/post values.
    ///
    /// When the pre-window baseline is exactly zero the percent change
    /// degenerates to `jump * 100` instead of dividing by zero.
    pub fn contrast(
        name: impl Into<String>,
        category: MetricCategory,
        jump: f64,
        pre: f64,
        post: f64,
    ) -> Self {
        let difference = jump - pre;
        let percent_change = if pre != 0.0 {
            difference / pre * 100.0
        } else {
            jump * 100.0
        };

        Self {
            name: name.into(),
            category,
            jump: round4(jump),
            pre: round4(pre),
            post: round4(post),
            difference: round4(difference),
            percent_change: round2(percent_change),
            jump_vs_pre: round4(jump - pre),
            jump_vs_post: round4(jump - post),
            jump_vs_pre_pct: round2(percent_change),
        }
    }
}

/// Number of frames extracted for each analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameCounts {
    pub pre: usize,
    pub jump: usize,
    pub post: usize,
}

/// Per-interval analysis result.
///
/// A failed interval carries only `jump_index`, `time_interval` and `error`;
/// the remaining fields are empty. Failures are scoped to one interval and
/// never abort the batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JumpReport {
    /// 1-based index of the jump in the request order
    pub jump_index: usize,
    /// Requested interval, seconds rounded to 2 decimals
    pub time_interval: TimeInterval,
    /// Interval duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump_duration: Option<f64>,
    /// Metric key -> contrastive comparison
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comparison: BTreeMap<String, ComparisonMetric>,
    /// Base64-encoded annotated PNG frames (window start/middle/end)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_frames: Vec<String>,
    /// Frames extracted per window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_counts: Option<FrameCounts>,
    /// Failure description for this interval only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JumpReport {
    /// Create a successful report.
    pub fn completed(
        jump_index: usize,
        interval: TimeInterval,
        comparison: BTreeMap<String, ComparisonMetric>,
        sample_frames: Vec<String>,
        frame_counts: FrameCounts,
    ) -> Self {
        Self {
            jump_index,
            time_interval: TimeInterval::new(round2(interval.start), round2(interval.end)),
            jump_duration: Some(round2(interval.duration())),
            comparison,
            sample_frames,
            frame_counts: Some(frame_counts),
            error: None,
        }
    }

    /// Create an error-only report for a failed interval.
    pub fn failed(jump_index: usize, interval: TimeInterval, error: impl Into<String>) -> Self {
        Self {
            jump_index,
            time_interval: interval,
            jump_duration: None,
            comparison: BTreeMap::new(),
            sample_frames: Vec::new(),
            frame_counts: None,
            error: Some(error.into()),
        }
    }

    /// Whether this interval failed.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate metadata of the analyzed video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Frames per second (fallback 25 when unreported)
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Total frame count
    pub total_frames: u64,
}

/// Top-level response for one analysis call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResponse {
    /// Whether the batch ran; per-interval failures still report `true`
    pub success: bool,
    /// Video metadata, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_info: Option<VideoMetadata>,
    /// Echo of the caller-supplied intervals; always serialized so the
    /// envelope shape is stable even when every interval was skipped
    #[serde(default)]
    pub manual_jump_intervals: Vec<TimeInterval>,
    /// Ordered per-interval reports; always serialized, possibly empty
    #[serde(default)]
    pub jump_analysis: Vec<JumpReport>,
    /// Analysis method identifier
    pub analysis_method: String,
    /// Human-readable failure message when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResponse {
    /// Build a successful response.
    pub fn completed(
        video_info: VideoMetadata,
        intervals: Vec<TimeInterval>,
        reports: Vec<JumpReport>,
    ) -> Self {
        Self {
            success: true,
            video_info: Some(VideoMetadata {
                fps: round2(video_info.fps),
                duration: round2(video_info.duration),
                total_frames: video_info.total_frames,
            }),
            manual_jump_intervals: intervals,
            jump_analysis: reports,
            analysis_method: ANALYSIS_METHOD.to_string(),
            error: None,
        }
    }

    /// Build a failed response; nothing was computed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            video_info: None,
            manual_jump_intervals: Vec::new(),
            jump_analysis: Vec::new(),
            analysis_method: ANALYSIS_METHOD.to_string(),
            error: Some(error.into()),
        }
    }
}
