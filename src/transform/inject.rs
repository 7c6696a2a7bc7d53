//! Selective injection of the synthetic "custom" summary metric.

use std::collections::HashSet;

use tracing::info;

use crate::config::EnrichmentRule;
use crate::proto::collector::ExportMetricsServiceRequest;
use crate::proto::common::{any_value, KeyValue, StringKeyValue};
use crate::proto::metrics::double_summary_data_point::ValueAtQuantile;
use crate::proto::metrics::{metric::Data, DoubleSummary, DoubleSummaryDataPoint, Metric};

use super::walk::{summary_points, ShapeError, SummaryPoint};

/// Name of the injected metric, mimicking the naming of the standard
/// AWS Lambda metrics in the stream.
pub const CUSTOM_METRIC_NAME: &str = "amazonaws.com/AWS/Lambda/Custom";

/// Unit of the injected metric.
pub const CUSTOM_METRIC_UNIT: &str = "{Count}";

/// Per the AWS OTel 0.7.0 mapping, metric dimensions are translated to labels.
pub const FUNCTION_NAME_LABEL: &str = "FunctionName";

struct MatchSite {
    resource_index: usize,
    library_index: usize,
    function_name: String,
    time_unix_nano: u64,
}

/// Append one custom summary metric per matched target function to the metric
/// list of the library block the match was found in. Existing metrics and
/// data points are never touched; with zero matches the request re-encodes to
/// the same bytes it decoded from.
///
/// Returns the number of injected metrics.
pub fn inject(
    request: &mut ExportMetricsServiceRequest,
    rule: &EnrichmentRule,
) -> Result<usize, ShapeError> {
    // Collect match sites first: the walk borrows the request immutably.
    // One injection per (library block, function name), like repeated data
    // points for the same function in one batch.
    let mut seen: HashSet<(usize, usize, String)> = HashSet::new();
    let mut sites: Vec<MatchSite> = Vec::new();
    for entry in summary_points(request) {
        let found = entry?;
        let Some(function_name) = function_name_of(&found) else {
            continue;
        };
        if !rule.is_target(function_name) {
            continue;
        }
        if !seen.insert((
            found.resource_index,
            found.library_index,
            function_name.to_string(),
        )) {
            continue;
        }
        sites.push(MatchSite {
            resource_index: found.resource_index,
            library_index: found.library_index,
            function_name: function_name.to_string(),
            time_unix_nano: found.point.time_unix_nano,
        });
    }

    for site in &sites {
        info!(
            function_name = %site.function_name,
            "match found, appending custom summary metric"
        );
        let metric = custom_summary_metric(&site.function_name, site.time_unix_nano, rule);
        request.resource_metrics[site.resource_index].instrumentation_library_metrics
            [site.library_index]
            .metrics
            .push(metric);
    }
    Ok(sites.len())
}

/// The function name dimension of a summary point: the `FunctionName` data
/// point label, or failing that a string-valued `FunctionName` resource
/// attribute.
fn function_name_of<'a>(found: &SummaryPoint<'a>) -> Option<&'a str> {
    found
        .point
        .labels
        .iter()
        .find(|label| label.key == FUNCTION_NAME_LABEL)
        .map(|label| label.value.as_str())
        .or_else(|| {
            found
                .resource
                .resource
                .as_ref()?
                .attributes
                .iter()
                .find(|attr| attr.key == FUNCTION_NAME_LABEL)
                .and_then(string_attribute)
        })
}

fn string_attribute(attr: &KeyValue) -> Option<&str> {
    match attr.value.as_ref()?.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Build the synthetic metric: a presence signal, not a real statistic.
/// count=1, sum=1, and quantiles 0.0/1.0 (min/max) both at 1. Timestamps are
/// copied from the data point that triggered the match.
fn custom_summary_metric(function_name: &str, time_unix_nano: u64, rule: &EnrichmentRule) -> Metric {
    let labels = vec![
        StringKeyValue {
            key: "Namespace".to_string(),
            value: "AWS/Lambda".to_string(),
        },
        StringKeyValue {
            key: "MetricName".to_string(),
            value: "Custom".to_string(),
        },
        StringKeyValue {
            key: FUNCTION_NAME_LABEL.to_string(),
            value: function_name.to_string(),
        },
        StringKeyValue {
            key: rule.attribute_key().to_string(),
            value: rule.attribute_value().to_string(),
        },
    ];

    let data_point = DoubleSummaryDataPoint {
        labels,
        start_time_unix_nano: time_unix_nano,
        time_unix_nano,
        count: 1,
        sum: 1.0,
        quantile_values: vec![
            ValueAtQuantile {
                quantile: 0.0,
                value: 1.0,
            },
            ValueAtQuantile {
                quantile: 1.0,
                value: 1.0,
            },
        ],
    };

    Metric {
        name: CUSTOM_METRIC_NAME.to_string(),
        description: String::new(),
        unit: CUSTOM_METRIC_UNIT.to_string(),
        data: Some(Data::DoubleSummary(DoubleSummary {
            data_points: vec![data_point],
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::proto::common::AnyValue;
    use crate::proto::metrics::{InstrumentationLibraryMetrics, ResourceMetrics};
    use crate::proto::resource::Resource;

    fn rule() -> EnrichmentRule {
        EnrichmentRule::new(["target-fn"], "env", "dev")
    }

    fn summary_metric(function_name: &str, time_unix_nano: u64) -> Metric {
        Metric {
            name: "amazonaws.com/AWS/Lambda/Duration".to_string(),
            description: String::new(),
            unit: "ms".to_string(),
            data: Some(Data::DoubleSummary(DoubleSummary {
                data_points: vec![DoubleSummaryDataPoint {
                    labels: vec![
                        StringKeyValue {
                            key: "Namespace".to_string(),
                            value: "AWS/Lambda".to_string(),
                        },
                        StringKeyValue {
                            key: FUNCTION_NAME_LABEL.to_string(),
                            value: function_name.to_string(),
                        },
                    ],
                    start_time_unix_nano: time_unix_nano - 60_000_000_000,
                    time_unix_nano,
                    count: 5,
                    sum: 1234.5,
                    quantile_values: vec![
                        ValueAtQuantile {
                            quantile: 0.0,
                            value: 101.0,
                        },
                        ValueAtQuantile {
                            quantile: 1.0,
                            value: 450.0,
                        },
                    ],
                }],
            })),
        }
    }

    fn request_for(function_name: &str) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                resource: Some(Resource {
                    attributes: vec![KeyValue {
                        key: "cloud.provider".to_string(),
                        value: Some(AnyValue {
                            value: Some(any_value::Value::StringValue("aws".to_string())),
                        }),
                    }],
                    dropped_attributes_count: 0,
                }),
                instrumentation_library_metrics: vec![InstrumentationLibraryMetrics {
                    instrumentation_library: None,
                    metrics: vec![summary_metric(function_name, 1_700_000_000_000_000_000)],
                }],
            }],
        }
    }

    #[test]
    fn match_appends_exactly_one_custom_metric() {
        let mut request = request_for("target-fn");
        let injected = inject(&mut request, &rule()).unwrap();
        assert_eq!(injected, 1);

        let metrics = &request.resource_metrics[0].instrumentation_library_metrics[0].metrics;
        assert_eq!(metrics.len(), 2);

        let custom = &metrics[1];
        assert_eq!(custom.name, CUSTOM_METRIC_NAME);
        assert_eq!(custom.unit, CUSTOM_METRIC_UNIT);
        let Some(Data::DoubleSummary(summary)) = &custom.data else {
            panic!("expected double_summary data");
        };
        assert_eq!(summary.data_points.len(), 1);

        let point = &summary.data_points[0];
        assert_eq!(point.count, 1);
        assert_eq!(point.sum, 1.0);
        assert_eq!(point.time_unix_nano, 1_700_000_000_000_000_000);
        assert_eq!(point.start_time_unix_nano, 1_700_000_000_000_000_000);
        assert_eq!(point.quantile_values.len(), 2);
        assert_eq!(point.quantile_values[0].quantile, 0.0);
        assert_eq!(point.quantile_values[0].value, 1.0);
        assert_eq!(point.quantile_values[1].quantile, 1.0);
        assert_eq!(point.quantile_values[1].value, 1.0);

        let label = |key: &str| {
            point
                .labels
                .iter()
                .find(|l| l.key == key)
                .map(|l| l.value.as_str())
        };
        assert_eq!(label("Namespace"), Some("AWS/Lambda"));
        assert_eq!(label("MetricName"), Some("Custom"));
        assert_eq!(label(FUNCTION_NAME_LABEL), Some("target-fn"));
        assert_eq!(label("env"), Some("dev"));
    }

    #[test]
    fn no_match_is_a_no_op() {
        let mut request = request_for("other-fn");
        let before = codec::encode(&request);

        let injected = inject(&mut request, &rule()).unwrap();
        assert_eq!(injected, 0);
        assert_eq!(
            request.resource_metrics[0].instrumentation_library_metrics[0]
                .metrics
                .len(),
            1
        );
        assert_eq!(codec::encode(&request), before);
    }

    #[test]
    fn existing_metrics_are_not_mutated() {
        let mut request = request_for("target-fn");
        let original = request.resource_metrics[0].instrumentation_library_metrics[0].metrics[0]
            .clone();

        inject(&mut request, &rule()).unwrap();

        let after = &request.resource_metrics[0].instrumentation_library_metrics[0].metrics[0];
        assert_eq!(*after, original);
    }

    #[test]
    fn repeated_points_for_one_function_inject_once() {
        let mut request = request_for("target-fn");
        let duration = summary_metric("target-fn", 1_700_000_000_000_000_000);
        let mut errors = duration.clone();
        errors.name = "amazonaws.com/AWS/Lambda/Errors".to_string();
        request.resource_metrics[0].instrumentation_library_metrics[0]
            .metrics
            .push(errors);

        let injected = inject(&mut request, &rule()).unwrap();
        assert_eq!(injected, 1);
        assert_eq!(
            request.resource_metrics[0].instrumentation_library_metrics[0]
                .metrics
                .len(),
            3
        );
    }

    #[test]
    fn distinct_functions_inject_separately() {
        let mut request = request_for("target-fn");
        request.resource_metrics[0].instrumentation_library_metrics[0]
            .metrics
            .push(summary_metric("second-fn", 1_700_000_111_000_000_000));

        let rule = EnrichmentRule::new(["target-fn", "second-fn"], "env", "dev");
        let injected = inject(&mut request, &rule).unwrap();
        assert_eq!(injected, 2);
    }

    #[test]
    fn function_name_resource_attribute_also_matches() {
        let mut request = request_for("target-fn");
        // Strip the data point labels, leave the dimension on the resource.
        let Some(Data::DoubleSummary(summary)) = &mut request.resource_metrics[0]
            .instrumentation_library_metrics[0]
            .metrics[0]
            .data
        else {
            unreachable!()
        };
        summary.data_points[0].labels.clear();
        request.resource_metrics[0]
            .resource
            .as_mut()
            .unwrap()
            .attributes
            .push(KeyValue {
                key: FUNCTION_NAME_LABEL.to_string(),
                value: Some(AnyValue {
                    value: Some(any_value::Value::StringValue("target-fn".to_string())),
                }),
            });

        let injected = inject(&mut request, &rule()).unwrap();
        assert_eq!(injected, 1);
    }

    #[test]
    fn non_summary_shape_fails_loud_without_mutating() {
        let mut request = request_for("target-fn");
        request.resource_metrics[0].instrumentation_library_metrics[0]
            .metrics
            .push(Metric {
                name: "rogue-gauge".to_string(),
                description: String::new(),
                unit: String::new(),
                data: Some(Data::DoubleGauge(crate::proto::metrics::DoubleGauge {
                    data_points: vec![],
                })),
            });
        let before = codec::encode(&request);

        let err = inject(&mut request, &rule()).unwrap_err();
        assert!(matches!(err, ShapeError::UnexpectedShape { .. }));
        assert_eq!(codec::encode(&request), before);
    }
}
