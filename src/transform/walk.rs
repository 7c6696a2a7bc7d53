//! Read-only traversal of the resource → library → metric → data point tree.

use crate::proto::collector::ExportMetricsServiceRequest;
use crate::proto::metrics::{metric::Data, DoubleSummaryDataPoint, Metric, ResourceMetrics};

/// One summary data point together with its surrounding context.
///
/// The indices address the owning resource block and instrumentation library
/// block inside the request, so a caller holding a mutable request can append
/// to the right metric list after the traversal ends.
#[derive(Debug)]
pub struct SummaryPoint<'a> {
    pub resource: &'a ResourceMetrics,
    pub metric: &'a Metric,
    pub point: &'a DoubleSummaryDataPoint,
    pub resource_index: usize,
    pub library_index: usize,
}

/// A metric whose data is not the statistical-summary shape CloudWatch
/// Metric Streams emits.
///
/// The summary-only invariant is a producer guarantee, not a structural one.
/// When it breaks, the traversal reports it instead of skipping the metric:
/// a silent skip would look like a successful but incomplete transform.
#[derive(Debug)]
pub enum ShapeError {
    UnexpectedShape {
        metric: String,
        shape: &'static str,
    },
    MissingData {
        metric: String,
    },
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::UnexpectedShape { metric, shape } => write!(
                f,
                "metric {:?} carries {} data, expected double_summary",
                metric, shape
            ),
            ShapeError::MissingData { metric } => {
                write!(f, "metric {:?} carries no data", metric)
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Walk every summary data point of the request in stored order: resource
/// blocks, then library blocks, then metrics, then data points.
///
/// Lazy, single pass, allocates no message objects. A metric in a shape other
/// than `DoubleSummary` yields an error item.
pub fn summary_points(
    request: &ExportMetricsServiceRequest,
) -> impl Iterator<Item = Result<SummaryPoint<'_>, ShapeError>> {
    request
        .resource_metrics
        .iter()
        .enumerate()
        .flat_map(|(resource_index, rm)| {
            rm.instrumentation_library_metrics
                .iter()
                .enumerate()
                .flat_map(move |(library_index, ilm)| {
                    ilm.metrics
                        .iter()
                        .flat_map(move |metric| points_of(rm, metric, resource_index, library_index))
                })
        })
}

fn points_of<'a>(
    resource: &'a ResourceMetrics,
    metric: &'a Metric,
    resource_index: usize,
    library_index: usize,
) -> Box<dyn Iterator<Item = Result<SummaryPoint<'a>, ShapeError>> + 'a> {
    match &metric.data {
        Some(Data::DoubleSummary(summary)) => {
            Box::new(summary.data_points.iter().map(move |point| {
                Ok(SummaryPoint {
                    resource,
                    metric,
                    point,
                    resource_index,
                    library_index,
                })
            }))
        }
        Some(other) => Box::new(std::iter::once(Err(ShapeError::UnexpectedShape {
            metric: metric.name.clone(),
            shape: shape_name(other),
        }))),
        None => Box::new(std::iter::once(Err(ShapeError::MissingData {
            metric: metric.name.clone(),
        }))),
    }
}

fn shape_name(data: &Data) -> &'static str {
    match data {
        Data::IntGauge(_) => "int_gauge",
        Data::DoubleGauge(_) => "double_gauge",
        Data::IntSum(_) => "int_sum",
        Data::DoubleSum(_) => "double_sum",
        Data::IntHistogram(_) => "int_histogram",
        Data::DoubleHistogram(_) => "double_histogram",
        Data::DoubleSummary(_) => "double_summary",
    }
}
