//! AWS Lambda-specific modules.

pub mod firehose;
