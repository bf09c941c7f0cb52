//! Body geometry tracking over frame windows.
//!
//! Runs subject detection on every frame and derives per-frame body
//! geometry plus first-difference velocity and acceleration proxies.
//! Frames where no subject is found are typed gaps (`None`), not zero-filled
//! records. Velocity and acceleration are computed against the previous
//! *valid* observation; gaps are not interpolated, so motion magnitude
//! across a lost-detection frame can be understated.

use jumpscope_models::BoundingBox;
use tracing::debug;

use crate::detector::SubjectDetector;
use crate::error::VisionResult;
use crate::frame::Frame;

/// Aspect ratio above which the arms are assumed extended.
const HANDS_OPEN_ASPECT: f64 = 1.2;

/// Height below this fraction of sqrt(area) flags spread legs.
const LEGS_APART_FACTOR: f64 = 0.7;

/// Per-frame record of the tracked subject's body geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyObservation {
    /// Raw detector box
    pub bbox: BoundingBox,
    /// Box center (cx, cy)
    pub center: (f64, f64),
    /// Box height in pixels
    pub height: f64,
    /// Box width in pixels
    pub width: f64,
    /// Box area in pixels
    pub area: f64,
    /// Width/height ratio
    pub aspect_ratio: f64,
    /// Coarse torso-angle proxy in degrees, derived from box geometry
    pub angle: f64,
    /// Arms-extended heuristic: aspect ratio > 1.2
    pub hands_open: bool,
    /// Spread-legs heuristic: height < 0.7 * sqrt(area)
    pub legs_apart: bool,
    /// Center delta against the previous valid observation
    pub velocity: (f64, f64),
    /// Velocity delta against the previous valid observation
    pub acceleration: (f64, f64),
    /// Frame timestamp within the window, seconds
    pub time: f64,
}

/// Aggregate statistics over the valid observations of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyFeatureSummary {
    pub height_mean: f64,
    pub height_std: f64,
    pub height_max: f64,
    pub height_min: f64,
    pub angle_mean: f64,
    pub angle_std: f64,
    pub vertical_velocity_mean: f64,
    pub vertical_velocity_max: f64,
    pub vertical_acceleration_mean: f64,
    pub vertical_acceleration_max: f64,
    pub aspect_ratio_mean: f64,
    /// Fraction of valid frames with `hands_open`
    pub hands_open_ratio: f64,
    /// Fraction of valid frames with `legs_apart`
    pub legs_apart_ratio: f64,
    /// Number of valid observations aggregated
    pub frames_count: usize,
}

/// Tracks the subject's body geometry across a window.
pub struct SubjectTracker {
    detector: SubjectDetector,
}

impl SubjectTracker {
    /// Create a tracker over a subject detector.
    pub fn new(detector: SubjectDetector) -> Self {
        Self { detector }
    }

    /// Apply detection to every frame, producing an observation or a gap.
    ///
    /// Fewer than two frames yield no observations; there is nothing to
    /// difference against.
    pub fn track(&self, frames: &[Frame], fps: f64) -> VisionResult<Vec<Option<BodyObservation>>> {
        if frames.len() < 2 {
            return Ok(Vec::new());
        }
        let fps = if fps > 0.0 { fps } else { 25.0 };

        let mut observations = Vec::with_capacity(frames.len());
        let mut previous: Option<((f64, f64), (f64, f64))> = None;

        for (index, frame) in frames.iter().enumerate() {
            let Some(subject) = self.detector.locate(frame)? else {
                observations.push(None);
                continue;
            };

            let observation =
                observe(&subject.bbox, previous, index as f64 / fps);
            previous = Some((observation.center, observation.velocity));
            observations.push(Some(observation));
        }

        debug!(
            frames = frames.len(),
            valid = observations.iter().filter(|o| o.is_some()).count(),
            "Body tracking complete"
        );
        Ok(observations)
    }

    /// Track a window and aggregate into summary statistics.
    ///
    /// Zero valid observations yield `None`: no comparison possible, which
    /// is distinct from a window of zeros.
    pub fn summarize(&self, frames: &[Frame], fps: f64) -> VisionResult<Option<BodyFeatureSummary>> {
        let observations = self.track(frames, fps)?;
        Ok(summarize_observations(&observations))
    }
}

/// Derive one observation from a detector box and the previous valid state.
///
/// `previous` is the (center, velocity) of the last valid observation; the
/// first valid observation has zero velocity and acceleration by convention.
pub fn observe(
    bbox: &BoundingBox,
    previous: Option<((f64, f64), (f64, f64))>,
    time: f64,
) -> BodyObservation {
    let center = (bbox.cx(), bbox.cy());
    let height = bbox.height;
    let width = bbox.width;
    let area = bbox.area();
    let aspect_ratio = bbox.aspect_ratio();

    // Box-geometry torso proxy: offset of the box center from the vertical
    // midpoint between the top edge and the center, scaled to degrees.
    let angle = if height > 0.0 {
        let head_offset = (center.1 - bbox.y) / height;
        (0.5 - head_offset) * 180.0
    } else {
        0.0
    };

    let (velocity, acceleration) = match previous {
        Some((prev_center, prev_velocity)) => {
            let velocity = (center.0 - prev_center.0, center.1 - prev_center.1);
            let acceleration = (velocity.0 - prev_velocity.0, velocity.1 - prev_velocity.1);
            (velocity, acceleration)
        }
        None => ((0.0, 0.0), (0.0, 0.0)),
    };

    BodyObservation {
        bbox: *bbox,
        center,
        height,
        width,
        area,
        aspect_ratio,
        angle,
        hands_open: aspect_ratio > HANDS_OPEN_ASPECT,
        legs_apart: height < LEGS_APART_FACTOR * area.sqrt(),
        velocity,
        acceleration,
        time,
    }
}

/// Aggregate valid observations into a summary; `None` when there are none.
pub fn summarize_observations(
    observations: &[Option<BodyObservation>],
) -> Option<BodyFeatureSummary> {
    let valid: Vec<&BodyObservation> = observations.iter().flatten().collect();
    if valid.is_empty() {
        return None;
    }

    let heights: Vec<f64> = valid.iter().map(|o| o.height).collect();
    let angles: Vec<f64> = valid.iter().map(|o| o.angle).collect();
    let velocities: Vec<f64> = valid.iter().map(|o| o.velocity.1).collect();
    let accelerations: Vec<f64> = valid.iter().map(|o| o.acceleration.1).collect();
    let aspect_ratios: Vec<f64> = valid.iter().map(|o| o.aspect_ratio).collect();

    Some(BodyFeatureSummary {
        height_mean: mean(&heights),
        height_std: std_dev(&heights),
        height_max: max(&heights),
        height_min: min(&heights),
        angle_mean: mean(&angles),
        angle_std: std_dev(&angles),
        vertical_velocity_mean: mean(&velocities),
        vertical_velocity_max: max(&velocities),
        vertical_acceleration_mean: mean(&accelerations),
        vertical_acceleration_max: max(&accelerations),
        aspect_ratio_mean: mean(&aspect_ratios),
        hands_open_ratio: ratio(valid.iter().map(|o| o.hands_open)),
        legs_apart_ratio: ratio(valid.iter().map(|o| o.legs_apart)),
        frames_count: valid.len(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn ratio(flags: impl Iterator<Item = bool>) -> f64 {
    let mut total = 0usize;
    let mut set = 0usize;
    for flag in flags {
        total += 1;
        if flag {
            set += 1;
        }
    }
    set as f64 / total as f64
}
