//! Real-time HRV feature extraction, phase-space trajectory dynamics,
//! soft-mode classification, and movement-aware autonomic state inference.
//!
//! The pipeline itself has no fatal error class: insufficient data and
//! degenerate numerics are normalized into defined sentinel outputs rather
//! than raised. See [`pipeline::Pipeline`] for the entry point.

pub mod emit;
pub mod hrv;
pub mod hysteresis;
pub mod movement;
pub mod phase;
pub mod pipeline;
pub mod rr_buffer;
pub mod sink;
pub mod soft_mode;
pub mod types;

pub use emit::{session_header, StepRecord, SCHEMA_VERSION};
pub use pipeline::{Pipeline, PipelineConfig};
pub use sink::{EmissionSink, IngestError, InboundSample, InputSink, JsonLinesEmissionSink, JsonLinesInputSink};
pub use types::Mode;
