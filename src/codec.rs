//! Encode/decode for a single export request message.

use prost::Message;

use crate::proto::collector::ExportMetricsServiceRequest;

/// The bytes between two length prefixes did not parse as an export request.
#[derive(Debug)]
pub struct DecodeError(prost::DecodeError);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid export request: {}", self.0)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Decode one framed message into an export request.
pub fn decode(buf: &[u8]) -> Result<ExportMetricsServiceRequest, DecodeError> {
    ExportMetricsServiceRequest::decode(buf).map_err(DecodeError)
}

/// Encode an export request back into message bytes. Total for any
/// well-formed in-memory request.
pub fn encode(request: &ExportMetricsServiceRequest) -> Vec<u8> {
    request.encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::common::StringKeyValue;
    use crate::proto::metrics::double_summary_data_point::ValueAtQuantile;
    use crate::proto::metrics::{
        metric::Data, DoubleSummary, DoubleSummaryDataPoint, InstrumentationLibraryMetrics,
        Metric, ResourceMetrics,
    };

    fn summary_metric(name: &str, points: usize) -> Metric {
        let data_points = (0..points)
            .map(|i| DoubleSummaryDataPoint {
                labels: vec![StringKeyValue {
                    key: "FunctionName".to_string(),
                    value: format!("fn-{}", i),
                }],
                start_time_unix_nano: 1_700_000_000_000_000_000,
                time_unix_nano: 1_700_000_060_000_000_000,
                count: 3,
                sum: 12.5,
                quantile_values: vec![
                    ValueAtQuantile {
                        quantile: 0.0,
                        value: 1.0,
                    },
                    ValueAtQuantile {
                        quantile: 1.0,
                        value: 9.0,
                    },
                ],
            })
            .collect();
        Metric {
            name: name.to_string(),
            description: String::new(),
            unit: "{Count}".to_string(),
            data: Some(Data::DoubleSummary(DoubleSummary { data_points })),
        }
    }

    fn request(blocks: usize, metrics: usize, points: usize) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: (0..blocks)
                .map(|_| ResourceMetrics {
                    resource: None,
                    instrumentation_library_metrics: vec![InstrumentationLibraryMetrics {
                        instrumentation_library: None,
                        metrics: (0..metrics)
                            .map(|m| summary_metric(&format!("metric-{}", m), points))
                            .collect(),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn round_trip_preserves_structure_and_content() {
        let original = request(3, 2, 4);
        let decoded = decode(&encode(&original)).unwrap();

        assert_eq!(decoded.resource_metrics.len(), 3);
        for rm in &decoded.resource_metrics {
            let ilm = &rm.instrumentation_library_metrics[0];
            assert_eq!(ilm.metrics.len(), 2);
            for metric in &ilm.metrics {
                let Some(Data::DoubleSummary(summary)) = &metric.data else {
                    panic!("expected double_summary data");
                };
                assert_eq!(summary.data_points.len(), 4);
            }
        }
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trip_of_empty_request() {
        let original = ExportMetricsServiceRequest {
            resource_metrics: vec![],
        };
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        // A field tag with wire type 7 is never valid
        let result = decode(&[0x0f, 0xff, 0xff]);
        assert!(result.is_err());
    }
}
