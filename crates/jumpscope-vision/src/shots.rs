//! Shot boundary segmentation using color histogram dissimilarity.
//!
//! Each frame is downsampled to a fixed small resolution, summarized as
//! concatenated per-channel color histograms, and compared to the previous
//! frame with two independent measures: histogram correlation and chi-square
//! distance. A single metric is brittle to lighting and motion noise; the
//! OR-combination with a cool-down window trades recall for precision
//! against false positives from camera motion.

use tracing::{debug, info};

use crate::frame::Frame;

/// Downsample target used for signature computation.
const SIGNATURE_WIDTH: u32 = 320;
const SIGNATURE_HEIGHT: u32 = 180;

/// Histogram bins per color channel.
const BINS_PER_CHANNEL: usize = 32;

/// Configuration for shot boundary segmentation.
#[derive(Debug, Clone)]
pub struct ShotSegmenterConfig {
    /// Correlation threshold; correlation below it signals a boundary.
    /// Chi-square above `(1 - threshold) * 100` signals one too.
    pub threshold: f64,

    /// Minimum seconds between declared boundaries (cool-down).
    pub min_shot_duration: f64,

    /// Hard cap on declared boundaries; segmentation stops early once hit.
    pub max_shots: usize,
}

impl Default for ShotSegmenterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            min_shot_duration: 2.0,
            max_shots: 50,
        }
    }
}

impl ShotSegmenterConfig {
    /// Set the correlation threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the minimum shot duration in seconds.
    pub fn with_min_shot_duration(mut self, seconds: f64) -> Self {
        self.min_shot_duration = seconds;
        self
    }

    /// Set the maximum number of declared boundaries.
    pub fn with_max_shots(mut self, max_shots: usize) -> Self {
        self.max_shots = max_shots;
        self
    }
}

/// Shot boundary segmenter.
///
/// The pure core operates on per-frame color signatures; the whole-video
/// entry point decodes and feeds it.
#[derive(Debug, Clone, Default)]
pub struct ShotSegmenter {
    config: ShotSegmenterConfig,
}

impl ShotSegmenter {
    /// Create a segmenter with the given configuration.
    pub fn new(config: ShotSegmenterConfig) -> Self {
        Self { config }
    }

    /// Compute the color signature of one frame.
    ///
    /// The frame is downsampled to a fixed small resolution, then each
    /// channel is histogrammed into [`BINS_PER_CHANNEL`] bins normalized to
    /// unit sum, and the three histograms are concatenated.
    pub fn compute_signature(&self, frame: &Frame) -> Vec<f64> {
        let mut histograms = [[0.0f64; BINS_PER_CHANNEL]; 3];
        let mut samples = 0usize;

        for ty in 0..SIGNATURE_HEIGHT {
            let sy = (ty as u64 * frame.height as u64 / SIGNATURE_HEIGHT as u64) as u32;
            for tx in 0..SIGNATURE_WIDTH {
                let sx = (tx as u64 * frame.width as u64 / SIGNATURE_WIDTH as u64) as u32;
                let px = frame.pixel(sx, sy);
                for (channel, &value) in px.iter().enumerate() {
                    let bin = (value as usize * BINS_PER_CHANNEL) / 256;
                    histograms[channel][bin] += 1.0;
                }
                samples += 1;
            }
        }

        let mut signature = Vec::with_capacity(3 * BINS_PER_CHANNEL);
        for histogram in &histograms {
            for &count in histogram {
                signature.push(count / samples as f64);
            }
        }
        signature
    }

    /// Segment from precomputed per-frame signatures.
    ///
    /// Returns boundary timestamps in seconds: strictly increasing, always
    /// starting at 0.0, capped at `max_shots` additional boundaries.
    pub fn segment_signatures(&self, signatures: &[Vec<f64>], fps: f64) -> Vec<f64> {
        let fps = if fps > 0.0 { fps } else { 25.0 };
        let chi_square_threshold = (1.0 - self.config.threshold) * 100.0;

        let mut boundaries = vec![0.0];
        let mut last_boundary_time = 0.0;
        let mut declared = 0usize;

        for i in 1..signatures.len() {
            if declared >= self.config.max_shots {
                break;
            }

            let correlation = histogram_correlation(&signatures[i - 1], &signatures[i]);
            let chi_square = chi_square_distance(&signatures[i - 1], &signatures[i]);
            let current_time = i as f64 / fps;

            let significant_change =
                correlation < self.config.threshold || chi_square > chi_square_threshold;
            let cooled_down = current_time - last_boundary_time >= self.config.min_shot_duration;

            // Timestamps are reported at 2 decimals; a candidate that
            // rounds onto the previous boundary is dropped so the list
            // stays strictly increasing even when min_shot_duration is
            // below the rounding step.
            let rounded = (current_time * 100.0).round() / 100.0;
            if significant_change && cooled_down && rounded > *boundaries.last().unwrap_or(&0.0) {
                debug!(
                    frame = i,
                    correlation = format!("{correlation:.3}"),
                    chi_square = format!("{chi_square:.3}"),
                    "Shot boundary declared"
                );
                boundaries.push(rounded);
                last_boundary_time = current_time;
                declared += 1;
            }
        }

        info!(
            shots = boundaries.len(),
            frames = signatures.len(),
            "Shot segmentation complete"
        );
        boundaries
    }

    /// Segment a whole video file.
    #[cfg(feature = "opencv")]
    pub fn segment_video(&self, path: impl AsRef<std::path::Path>) -> crate::error::VisionResult<Vec<f64>> {
        use opencv::core::Mat;
        use opencv::prelude::*;

        use crate::decode::{capture_fps, mat_to_frame, open_capture};

        let mut capture = open_capture(path)?;
        let fps = capture_fps(&capture);

        let mut signatures = Vec::new();
        let mut mat = Mat::default();
        loop {
            match capture.read(&mut mat) {
                Ok(true) if !mat.empty() => {}
                _ => break,
            }
            let frame = match mat_to_frame(&mat, signatures.len() as f64 / fps) {
                Ok(frame) => frame,
                Err(_) => break,
            };
            signatures.push(self.compute_signature(&frame));
        }

        Ok(self.segment_signatures(&signatures, fps))
    }
}

/// Pearson correlation between two histograms.
///
/// Returns 1.0 for degenerate (constant) inputs, treating them as identical.
pub fn histogram_correlation(h1: &[f64], h2: &[f64]) -> f64 {
    if h1.len() != h2.len() || h1.is_empty() {
        return 0.0;
    }

    let n = h1.len() as f64;
    let mean1 = h1.iter().sum::<f64>() / n;
    let mean2 = h2.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var1 = 0.0;
    let mut var2 = 0.0;
    for (a, b) in h1.iter().zip(h2.iter()) {
        let da = a - mean1;
        let db = b - mean2;
        covariance += da * db;
        var1 += da * da;
        var2 += db * db;
    }

    let denominator = (var1 * var2).sqrt();
    if denominator > 0.0 {
        covariance / denominator
    } else {
        1.0
    }
}

/// Chi-square distance between two histograms.
///
/// `sum((h1 - h2)^2 / h1)` over bins where `h1 > 0`.
pub fn chi_square_distance(h1: &[f64], h2: &[f64]) -> f64 {
    if h1.len() != h2.len() {
        return f64::MAX;
    }

    h1.iter()
        .zip(h2.iter())
        .filter(|(a, _)| **a > 0.0)
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff / a
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signatures_for(frames: &[Frame]) -> Vec<Vec<f64>> {
        let segmenter = ShotSegmenter::default();
        frames.iter().map(|f| segmenter.compute_signature(f)).collect()
    }

    #[test]
    fn test_signature_unit_sum_per_channel() {
        let segmenter = ShotSegmenter::default();
        let signature = segmenter.compute_signature(&Frame::solid(8, 8, [255, 0, 0], 0.0));
        assert_eq!(signature.len(), 3 * BINS_PER_CHANNEL);

        for channel in 0..3 {
            let sum: f64 = signature[channel * BINS_PER_CHANNEL..(channel + 1) * BINS_PER_CHANNEL]
                .iter()
                .sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_correlation_identical() {
        let h = vec![0.25, 0.25, 0.25, 0.25];
        assert!((histogram_correlation(&h, &h) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_disjoint() {
        let h1 = vec![1.0, 0.0, 0.0, 0.0];
        let h2 = vec![0.0, 0.0, 0.0, 1.0];
        assert!(histogram_correlation(&h1, &h2) < 0.0);
    }

    #[test]
    fn test_chi_square_identical_is_zero() {
        let h = vec![0.5, 0.25, 0.25];
        assert!(chi_square_distance(&h, &h).abs() < 1e-12);
    }

    #[test]
    fn test_chi_square_skips_empty_reference_bins() {
        let h1 = vec![1.0, 0.0];
        let h2 = vec![0.0, 1.0];
        // Only the first bin contributes: (1-0)^2/1 = 1
        assert!((chi_square_distance(&h1, &h2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solid_color_cut_detected() {
        // 10 red frames then 10 blue frames at 25fps: boundary at frame 10
        // (0.4s). The default 2.0s cool-down would veto a cut this early,
        // so it is relaxed below the boundary time.
        let mut frames = Vec::new();
        for i in 0..10 {
            frames.push(Frame::solid(16, 16, [255, 0, 0], i as f64 / 25.0));
        }
        for i in 10..20 {
            frames.push(Frame::solid(16, 16, [0, 0, 255], i as f64 / 25.0));
        }

        let segmenter =
            ShotSegmenter::new(ShotSegmenterConfig::default().with_min_shot_duration(0.2));
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 25.0);
        assert_eq!(shots, vec![0.0, 0.4]);
    }

    #[test]
    fn test_uniform_video_single_shot() {
        let frames: Vec<Frame> = (0..30)
            .map(|i| Frame::solid(16, 16, [80, 80, 80], i as f64 / 25.0))
            .collect();
        let segmenter =
            ShotSegmenter::new(ShotSegmenterConfig::default().with_min_shot_duration(0.0));
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 25.0);
        assert_eq!(shots, vec![0.0]);
    }

    #[test]
    fn test_cooldown_vetoes_early_cut() {
        let mut frames = Vec::new();
        for i in 0..10 {
            frames.push(Frame::solid(16, 16, [255, 0, 0], i as f64 / 25.0));
        }
        for i in 10..20 {
            frames.push(Frame::solid(16, 16, [0, 0, 255], i as f64 / 25.0));
        }

        // Default 2.0s minimum shot duration; the 0.4s cut is suppressed.
        let segmenter = ShotSegmenter::default();
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 25.0);
        assert_eq!(shots, vec![0.0]);
    }

    #[test]
    fn test_max_shots_cap() {
        // Alternate colors every frame so every comparison is a cut.
        let frames: Vec<Frame> = (0..40)
            .map(|i| {
                let color = if i % 2 == 0 { [255, 0, 0] } else { [0, 0, 255] };
                Frame::solid(16, 16, color, i as f64 / 25.0)
            })
            .collect();

        let segmenter = ShotSegmenter::new(
            ShotSegmenterConfig::default()
                .with_min_shot_duration(0.0)
                .with_max_shots(3),
        );
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 25.0);
        // Initial 0.0 plus at most 3 declared boundaries
        assert_eq!(shots.len(), 4);
        assert_eq!(shots[0], 0.0);
    }

    #[test]
    fn test_boundaries_strictly_increasing() {
        let frames: Vec<Frame> = (0..60)
            .map(|i| {
                let color = match (i / 10) % 3 {
                    0 => [255, 0, 0],
                    1 => [0, 255, 0],
                    _ => [0, 0, 255],
                };
                Frame::solid(16, 16, color, i as f64 / 25.0)
            })
            .collect();

        let segmenter =
            ShotSegmenter::new(ShotSegmenterConfig::default().with_min_shot_duration(0.1));
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 25.0);
        assert!(shots.len() > 2);
        for pair in shots.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_rounding_never_duplicates_boundaries() {
        // At 1000fps every frame is a cut candidate, and frames 1..=4
        // all round to 0.00s, colliding with the initial boundary.
        let frames: Vec<Frame> = (0..10)
            .map(|i| {
                let color = if i % 2 == 0 { [255, 0, 0] } else { [0, 0, 255] };
                Frame::solid(16, 16, color, i as f64 / 1000.0)
            })
            .collect();

        let segmenter =
            ShotSegmenter::new(ShotSegmenterConfig::default().with_min_shot_duration(0.0));
        let shots = segmenter.segment_signatures(&signatures_for(&frames), 1000.0);

        assert_eq!(shots, vec![0.0, 0.01]);
        for pair in shots.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_empty_input() {
        let segmenter = ShotSegmenter::default();
        assert_eq!(segmenter.segment_signatures(&[], 25.0), vec![0.0]);
    }
}
