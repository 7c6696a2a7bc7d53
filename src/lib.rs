// src/lib.rs
pub mod codec;
pub mod config;
pub mod framing;
mod handler;
pub mod lambda;
pub mod proto;
mod transform;

// Re-export for the binary and tests
pub use handler::{
    process_batch, process_record, transform_payload, RecordError, RecordOutput, RecordStatus,
};
pub use transform::{
    inject, summary_points, ShapeError, SummaryPoint, CUSTOM_METRIC_NAME, CUSTOM_METRIC_UNIT,
    FUNCTION_NAME_LABEL,
};
