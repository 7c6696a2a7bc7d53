mod inject;
mod walk;

pub use inject::{inject, CUSTOM_METRIC_NAME, CUSTOM_METRIC_UNIT, FUNCTION_NAME_LABEL};
pub use walk::{summary_points, ShapeError, SummaryPoint};
