//! Hand-maintained protobuf bindings for the OTLP v0.7.0 metrics schema.
//!
//! CloudWatch Metric Streams emits the AWS OTel 0.7.0 wire format, which
//! predates the current opentelemetry-proto releases: metrics carry
//! `InstrumentationLibraryMetrics` instead of `ScopeMetrics`, data points
//! carry `StringKeyValue` labels instead of attributes, and summaries use the
//! `DoubleSummary` oneof variant. The published `opentelemetry-proto` crate
//! no longer models these messages, so the bindings live here, written in
//! prost codegen style. Every field of the 0.7.0 schema is modeled so that a
//! decode/encode round trip never drops data the producer can emit.

pub mod collector;
pub mod common;
pub mod metrics;
pub mod resource;
