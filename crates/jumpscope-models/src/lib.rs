//! Shared data models for the jumpscope backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jump intervals and bounding boxes
//! - Per-metric contrastive comparisons
//! - Jump analysis reports and the response envelope

pub mod interval;
pub mod rect;
pub mod report;

// Re-export common types
pub use interval::{IntervalError, TimeInterval};
pub use rect::BoundingBox;
pub use report::{
    AnalysisResponse, ComparisonMetric, FrameCounts, JumpReport, MetricCategory, VideoMetadata,
    ANALYSIS_METHOD,
};
