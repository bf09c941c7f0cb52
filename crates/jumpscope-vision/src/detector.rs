//! Subject detection using a YOLOv8 ONNX model.
//!
//! Provides pluggable person detection with GPU acceleration support:
//! - CUDA on Linux with NVIDIA GPU
//! - CoreML on macOS with Apple Silicon
//! - CPU fallback on all platforms
//!
//! The skater is assumed to be the dominant subject in frame, so among
//! multiple person detections the largest box wins. This heuristic carries
//! no identity tracking: a second person entering frame with a larger box
//! will be misattributed. Acceptable for single-skater single-shot clips.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageBuffer, Rgb};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use jumpscope_models::BoundingBox;

use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// Box padding applied around the detected subject, in pixels.
pub const SUBJECT_PADDING: f64 = 15.0;

/// COCO class ID for "person".
pub const PERSON_CLASS_ID: usize = 0;

/// Detected object with bounding box and classification.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box in pixel coordinates, clipped to the frame
    pub bbox: BoundingBox,
    /// COCO class ID (0 = person)
    pub class_id: usize,
    /// Detection confidence [0, 1]
    pub confidence: f32,
}

impl Detection {
    /// Check if this is a person detection.
    pub fn is_person(&self) -> bool {
        self.class_id == PERSON_CLASS_ID
    }
}

/// Detection model capability interface.
///
/// Any pretrained detector producing categorized boxes is substitutable;
/// inference is a pure function per call, so one instance may be shared
/// read-only across workers.
pub trait PersonDetector: Send + Sync {
    /// Run the model on one frame.
    fn infer(&self, frame: &Frame) -> VisionResult<Vec<Detection>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

/// The dominant subject of a frame: raw detector box plus the padded box
/// used for masking and annotation.
#[derive(Debug, Clone, Copy)]
pub struct SubjectBox {
    /// Raw detector box, drives body geometry
    pub bbox: BoundingBox,
    /// Box expanded by [`SUBJECT_PADDING`], clamped to the frame
    pub padded: BoundingBox,
    /// Detector confidence for the chosen box
    pub confidence: f32,
}

/// Isolates the dominant person in each frame.
pub struct SubjectDetector {
    detector: Arc<dyn PersonDetector>,
}

impl SubjectDetector {
    /// Create a subject detector over an injected detection model.
    pub fn new(detector: Arc<dyn PersonDetector>) -> Self {
        Self { detector }
    }

    /// Locate the dominant subject: person detections only, largest box.
    ///
    /// `None` is the normal "absent subject" case, not an error.
    pub fn locate(&self, frame: &Frame) -> VisionResult<Option<SubjectBox>> {
        let detections = self.detector.infer(frame)?;

        let subject = detections
            .into_iter()
            .filter(Detection::is_person)
            .max_by(|a, b| {
                a.bbox
                    .area()
                    .partial_cmp(&b.bbox.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        Ok(subject.map(|detection| SubjectBox {
            bbox: detection.bbox,
            padded: detection
                .bbox
                .pad(SUBJECT_PADDING)
                .clip(frame.width, frame.height),
            confidence: detection.confidence,
        }))
    }

    /// Locate the subject and produce the background-only frame.
    ///
    /// The padded subject box is zeroed out of the returned frame so
    /// background comparisons ignore the skater. With no detection the
    /// frame is returned unmodified alongside no box.
    pub fn detect(&self, frame: &Frame) -> VisionResult<(Frame, Option<SubjectBox>)> {
        let subject = self.locate(frame)?;
        let mut background = frame.clone();
        if let Some(subject) = &subject {
            background.zero_region(&subject.padded);
        }
        Ok((background, subject))
    }
}

/// Configuration for the YOLOv8 detector.
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Person detector backed by a YOLOv8 ONNX model.
///
/// Uses ONNX Runtime with automatic execution provider selection. The
/// session holds no cross-call state beyond device placement; construct
/// once and inject wherever detection is needed.
pub struct YoloDetector {
    session: Mutex<Session>,
    config: YoloConfig,
}

impl YoloDetector {
    /// Load the model from config.
    ///
    /// Returns an error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: YoloConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "Person detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &YoloConfig {
        &self.config
    }

    /// Preprocess a frame for inference.
    ///
    /// Resize to the model input size, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, frame: &Frame) -> VisionResult<Value> {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
                .ok_or_else(|| VisionError::internal("Failed to create image buffer"))?;
        let img = DynamicImage::ImageRgb8(buffer);

        let input_size = self.config.input_size;
        let resized = img.resize_exact(input_size, input_size, image::imageops::FilterType::Triangle);
        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        // HWC -> CHW with normalization to [0, 1]
        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::internal(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference.
    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::internal(format!("ONNX inference failed: {}", e)))?;

        // YOLOv8 output is [1, 84, 8400]
        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::internal("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::internal(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Postprocess YOLOv8 output into pixel-space detections.
    ///
    /// Output format: [1, 84, 8400] with 84 = 4 bbox (cx, cy, w, h)
    /// + 80 class scores, over 8400 candidates.
    fn postprocess(
        &self,
        outputs: &[f32],
        orig_width: u32,
        orig_height: u32,
    ) -> VisionResult<Vec<Detection>> {
        let num_classes = 80;
        let num_boxes = 8400;
        let num_features = 84;

        if outputs.len() != num_features * num_boxes {
            return Err(VisionError::internal(format!(
                "Unexpected output size: expected {}, got {}",
                num_features * num_boxes,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| VisionError::internal(format!("Failed to reshape output: {}", e)))?;
        let transposed = output_array.t(); // [8400, 84]

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates: Vec<Detection> = Vec::new();
        for i in 0..num_boxes {
            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.confidence_threshold {
                continue;
            }

            // Center format to corner format, scaled to source pixels
            let x1 = ((cx - w / 2.0) * scale_w) as f64;
            let y1 = ((cy - h / 2.0) * scale_h) as f64;
            let x2 = ((cx + w / 2.0) * scale_w) as f64;
            let y2 = ((cy + h / 2.0) * scale_h) as f64;

            candidates.push(Detection {
                bbox: BoundingBox::from_corners(x1, y1, x2, y2).clip(orig_width, orig_height),
                class_id: best_class,
                confidence: best_score,
            });
        }

        let filtered = non_maximum_suppression(candidates, self.config.nms_threshold);
        Ok(filtered)
    }
}

impl PersonDetector for YoloDetector {
    fn infer(&self, frame: &Frame) -> VisionResult<Vec<Detection>> {
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(&outputs, frame.width, frame.height)?;

        debug!(count = detections.len(), "Detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yolov8"
    }
}

/// Apply Non-Maximum Suppression to remove overlapping detections.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    // Sort by confidence (descending)
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }

            // Only suppress same class
            if detections[i].class_id != detections[j].class_id {
                continue;
            }

            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold as f64 {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| VisionError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| VisionError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {}", e)))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for person detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for person detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    // CPU fallback
    info!("Using CPU execution provider for person detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::BlockDetector;

    #[test]
    fn test_yolo_config_default() {
        let config = YoloConfig::default();
        assert_eq!(config.input_size, 640);
        assert!((config.confidence_threshold - 0.25).abs() < 0.001);
        assert!((config.nms_threshold - 0.45).abs() < 0.001);
    }

    #[test]
    fn test_missing_model_errors() {
        let err = YoloDetector::new(YoloConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, VisionError::ModelNotFound(_)));
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let detections = vec![
            Detection {
                bbox: BoundingBox::new(0.0, 0.0, 100.0, 100.0),
                class_id: 0,
                confidence: 0.9,
            },
            Detection {
                bbox: BoundingBox::new(5.0, 5.0, 100.0, 100.0),
                class_id: 0,
                confidence: 0.8,
            },
            Detection {
                bbox: BoundingBox::new(300.0, 300.0, 50.0, 50.0),
                class_id: 0,
                confidence: 0.7,
            },
        ];

        let kept = non_maximum_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_nms_keeps_different_classes() {
        let detections = vec![
            Detection {
                bbox: BoundingBox::new(0.0, 0.0, 100.0, 100.0),
                class_id: 0,
                confidence: 0.9,
            },
            Detection {
                bbox: BoundingBox::new(0.0, 0.0, 100.0, 100.0),
                class_id: 36, // skateboard
                confidence: 0.8,
            },
        ];

        let kept = non_maximum_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_locate_picks_largest_person() {
        let detector = SubjectDetector::new(Arc::new(BlockDetector::with_extra(vec![
            Detection {
                bbox: BoundingBox::new(0.0, 0.0, 5.0, 5.0),
                class_id: 0,
                confidence: 0.95,
            },
            Detection {
                bbox: BoundingBox::new(0.0, 0.0, 200.0, 200.0),
                class_id: 36,
                confidence: 0.99,
            },
        ])));

        // A bright 20x30 block dwarfs the extra 5x5 person; the 200x200
        // non-person detection is filtered before area selection.
        let frame = crate::testutil::frame_with_block(320, 240, 100, 50, 20, 30);
        let subject = detector.locate(&frame).unwrap().unwrap();
        assert_eq!(subject.bbox, BoundingBox::new(100.0, 50.0, 20.0, 30.0));
    }

    #[test]
    fn test_locate_pads_and_clamps() {
        let detector = SubjectDetector::new(Arc::new(BlockDetector::new()));
        let frame = crate::testutil::frame_with_block(100, 100, 0, 0, 20, 20);

        let subject = detector.locate(&frame).unwrap().unwrap();
        assert_eq!(subject.padded.x, 0.0);
        assert_eq!(subject.padded.y, 0.0);
        assert_eq!(subject.padded.x2(), 35.0);
        assert_eq!(subject.padded.y2(), 35.0);
    }

    #[test]
    fn test_detect_absent_subject_returns_frame_unmodified() {
        let detector = SubjectDetector::new(Arc::new(BlockDetector::new()));
        let frame = Frame::solid(64, 64, [0, 0, 0], 0.0);

        let (background, subject) = detector.detect(&frame).unwrap();
        assert!(subject.is_none());
        assert_eq!(background, frame);
    }

    #[test]
    fn test_detect_zeroes_subject_region() {
        let detector = SubjectDetector::new(Arc::new(BlockDetector::new()));
        let frame = crate::testutil::frame_with_block(100, 100, 40, 40, 20, 20);

        let (background, subject) = detector.detect(&frame).unwrap();
        let subject = subject.unwrap();
        assert_eq!(subject.bbox, BoundingBox::new(40.0, 40.0, 20.0, 20.0));

        // Inside the padded box everything is zeroed, corners survive
        assert_eq!(background.pixel(50, 50), [0, 0, 0]);
        assert_eq!(background.pixel(30, 30), [0, 0, 0]); // padded reach
        assert_eq!(background.pixel(0, 0), frame.pixel(0, 0));
    }
}
