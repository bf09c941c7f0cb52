//! Per-frame scene feature extraction.
//!
//! Computes scalar descriptors of global visual appearance over a frame
//! window: brightness (mean luma), edge energy (mean Sobel gradient
//! magnitude) and color entropy (Shannon entropy of the hue histogram).
//! Pure function of the window; frames are independent and computed in
//! parallel with order preserved.

use rayon::prelude::*;

use crate::frame::{Frame, FrameWindow};

/// Number of hue histogram bins for color entropy.
const HUE_BINS: usize = 256;

/// Additive floor avoiding the zero-probability singularity in entropy.
const ENTROPY_FLOOR: f64 = 1e-10;

/// Per-window arrays of scene descriptors, one scalar per frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneFeatureSeries {
    /// Mean luma per frame
    pub brightness: Vec<f64>,
    /// Mean gradient magnitude per frame
    pub edges: Vec<f64>,
    /// Hue histogram entropy per frame
    pub color_entropy: Vec<f64>,
}

impl SceneFeatureSeries {
    /// Number of frames the series covers.
    pub fn len(&self) -> usize {
        self.brightness.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.brightness.is_empty()
    }
}

/// Compute the scene feature series for a window.
///
/// An empty window yields empty arrays.
pub fn extract_scene_features(window: &FrameWindow) -> SceneFeatureSeries {
    let triples: Vec<(f64, f64, f64)> = window
        .frames
        .par_iter()
        .map(|frame| {
            let luma = frame.luma_plane();
            (
                mean_luma(&luma),
                mean_gradient_magnitude(&luma, frame.width as usize, frame.height as usize),
                hue_entropy(frame),
            )
        })
        .collect();

    let mut series = SceneFeatureSeries::default();
    for (brightness, edges, entropy) in triples {
        series.brightness.push(brightness);
        series.edges.push(edges);
        series.color_entropy.push(entropy);
    }
    series
}

/// Mean of the luma plane.
fn mean_luma(luma: &[f32]) -> f64 {
    if luma.is_empty() {
        return 0.0;
    }
    luma.iter().map(|&v| v as f64).sum::<f64>() / luma.len() as f64
}

/// Mean Euclidean norm of the two orthogonal 3x3 Sobel responses.
///
/// Border pixels use replicated edge values.
fn mean_gradient_magnitude(luma: &[f32], width: usize, height: usize) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }

    let at = |x: i64, y: i64| -> f64 {
        let x = x.clamp(0, width as i64 - 1) as usize;
        let y = y.clamp(0, height as i64 - 1) as usize;
        luma[y * width + x] as f64
    };

    let mut total = 0.0;
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let gx = -at(x - 1, y - 1) + at(x + 1, y - 1) - 2.0 * at(x - 1, y)
                + 2.0 * at(x + 1, y)
                - at(x - 1, y + 1)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2.0 * at(x, y + 1)
                + at(x + 1, y + 1);
            total += (gx * gx + gy * gy).sqrt();
        }
    }

    total / (width * height) as f64
}

/// Shannon entropy (natural log) of the normalized hue histogram.
fn hue_entropy(frame: &Frame) -> f64 {
    let mut histogram = [0.0f64; HUE_BINS];
    let mut pixels = 0usize;

    for px in frame.data.chunks_exact(3) {
        let (h, _s, _v) = rgb_to_hsv(
            px[0] as f64 / 255.0,
            px[1] as f64 / 255.0,
            px[2] as f64 / 255.0,
        );
        let bin = ((h / 360.0) * HUE_BINS as f64).min(HUE_BINS as f64 - 1.0) as usize;
        histogram[bin] += 1.0;
        pixels += 1;
    }

    if pixels == 0 {
        return 0.0;
    }

    // Normalize, apply the floor, renormalize, then sum -p*ln(p)
    let floored: Vec<f64> = histogram
        .iter()
        .map(|count| count / pixels as f64 + ENTROPY_FLOOR)
        .collect();
    let total: f64 = floored.iter().sum();

    -floored
        .iter()
        .map(|&p| {
            let p = p / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Convert RGB to HSV color space.
///
/// Inputs in [0, 1]; returns (H, S, V) with H in [0, 360), S and V in [0, 1].
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { delta / max };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameWindow;

    #[test]
    fn test_empty_window() {
        let series = extract_scene_features(&FrameWindow::empty(25.0));
        assert!(series.is_empty());
        assert!(series.brightness.is_empty());
        assert!(series.edges.is_empty());
        assert!(series.color_entropy.is_empty());
    }

    #[test]
    fn test_identical_frames_identical_triples() {
        let frames: Vec<Frame> = (0..5)
            .map(|i| Frame::solid(16, 16, [40, 120, 200], i as f64 / 25.0))
            .collect();
        let series = extract_scene_features(&FrameWindow::new(frames, 25.0));

        assert_eq!(series.len(), 5);
        for i in 1..5 {
            assert_eq!(series.brightness[i], series.brightness[0]);
            assert_eq!(series.edges[i], series.edges[0]);
            assert_eq!(series.color_entropy[i], series.color_entropy[0]);
        }
    }

    #[test]
    fn test_brightness_is_mean_luma() {
        let frame = Frame::solid(8, 8, [100, 100, 100], 0.0);
        let series = extract_scene_features(&FrameWindow::new(vec![frame], 25.0));
        assert!((series.brightness[0] - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_solid_frame_has_no_edges() {
        let frame = Frame::solid(8, 8, [10, 200, 60], 0.0);
        let series = extract_scene_features(&FrameWindow::new(vec![frame], 25.0));
        assert!(series.edges[0].abs() < 1e-9);
    }

    #[test]
    fn test_vertical_step_has_edges() {
        // Left half black, right half white
        let width = 8u32;
        let height = 8u32;
        let mut data = Vec::new();
        for _y in 0..height {
            for x in 0..width {
                let v = if x < width / 2 { 0u8 } else { 255u8 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let frame = Frame::from_rgb(data, width, height, 0.0).unwrap();
        let series = extract_scene_features(&FrameWindow::new(vec![frame], 25.0));
        assert!(series.edges[0] > 1.0);
    }

    #[test]
    fn test_entropy_orders_by_color_diversity() {
        let solid = Frame::solid(8, 8, [255, 0, 0], 0.0);

        // Four distinct hues in equal proportion
        let mut mixed_data = Vec::new();
        let hues: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
        for i in 0..64 {
            mixed_data.extend_from_slice(&hues[i % 4]);
        }
        let mixed = Frame::from_rgb(mixed_data, 8, 8, 0.0).unwrap();

        let series = extract_scene_features(&FrameWindow::new(vec![solid, mixed], 25.0));
        assert!(series.color_entropy[1] > series.color_entropy[0]);
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(1.0, 0.0, 0.0);
        assert!(h.abs() < 1.0 && (s - 1.0).abs() < 0.01 && (v - 1.0).abs() < 0.01);

        let (h, _, _) = rgb_to_hsv(0.0, 1.0, 0.0);
        assert!((h - 120.0).abs() < 1.0);

        let (h, _, _) = rgb_to_hsv(0.0, 0.0, 1.0);
        assert!((h - 240.0).abs() < 1.0);

        let (_, s, v) = rgb_to_hsv(0.5, 0.5, 0.5);
        assert!(s.abs() < 0.01 && (v - 0.5).abs() < 0.01);
    }
}
