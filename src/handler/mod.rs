//! Per-record transform pipeline and batch orchestration.
//!
//! Each record runs split → decode → inject → encode → reframe to completion
//! before the next one begins. A fault anywhere in that chain fails the one
//! record, never the batch: the record's original bytes are returned so
//! nothing is lost, and siblings keep processing.

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::codec::{self, DecodeError};
use crate::config::{EnrichmentRule, FailurePolicy};
use crate::framing::{self, FramingError};
use crate::transform::{inject, ShapeError};

/// Anything that can fail a single record.
#[derive(Debug)]
pub enum RecordError {
    Framing(FramingError),
    Decode(DecodeError),
    Shape(ShapeError),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Framing(e) => write!(f, "framing error: {}", e),
            RecordError::Decode(e) => write!(f, "decode error: {}", e),
            RecordError::Shape(e) => write!(f, "transform error: {}", e),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Framing(e) => Some(e),
            RecordError::Decode(e) => Some(e),
            RecordError::Shape(e) => Some(e),
        }
    }
}

impl From<FramingError> for RecordError {
    fn from(e: FramingError) -> Self {
        RecordError::Framing(e)
    }
}

impl From<DecodeError> for RecordError {
    fn from(e: DecodeError) -> Self {
        RecordError::Decode(e)
    }
}

impl From<ShapeError> for RecordError {
    fn from(e: ShapeError) -> Self {
        RecordError::Shape(e)
    }
}

/// Record result in the Firehose transformation contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Ok,
    Dropped,
    ProcessingFailed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ok => "Ok",
            RecordStatus::Dropped => "Dropped",
            RecordStatus::ProcessingFailed => "ProcessingFailed",
        }
    }
}

/// One processed record, ready to map onto the response envelope.
#[derive(Debug)]
pub struct RecordOutput {
    pub id: String,
    pub status: RecordStatus,
    pub data: Vec<u8>,
}

/// Transform one record payload: split the delimited stream, decode each
/// message, inject custom metrics, and reframe.
///
/// Messages with no matching resource are forwarded as their original bytes,
/// untouched; only messages that received an injection are re-encoded.
pub fn transform_payload(blob: Bytes, rule: &EnrichmentRule) -> Result<Vec<u8>, RecordError> {
    let frames = framing::split(blob)?;
    let mut output: Vec<Bytes> = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut request = codec::decode(&frame)?;
        let injected = inject(&mut request, rule)?;
        if injected == 0 {
            output.push(frame);
        } else {
            debug!(injected, "re-encoding message with injected metrics");
            output.push(codec::encode(&request).into());
        }
    }
    Ok(framing::reframe(&output))
}

/// Run one record through the pipeline and map the outcome onto the record
/// result contract. On failure the original payload is passed through.
pub fn process_record(
    id: &str,
    data: Bytes,
    rule: &EnrichmentRule,
    policy: FailurePolicy,
) -> RecordOutput {
    match transform_payload(data.clone(), rule) {
        Ok(transformed) => RecordOutput {
            id: id.to_string(),
            status: RecordStatus::Ok,
            data: transformed,
        },
        Err(e) => {
            error!(
                record_id = %id,
                error = %e,
                "record transform failed, passing original payload through"
            );
            let status = match policy {
                FailurePolicy::Retry => RecordStatus::ProcessingFailed,
                FailurePolicy::Drop => RecordStatus::Dropped,
            };
            RecordOutput {
                id: id.to_string(),
                status,
                data: data.to_vec(),
            }
        }
    }
}

/// Process a batch of records sequentially. Failure isolation is per record.
pub fn process_batch<I>(records: I, rule: &EnrichmentRule, policy: FailurePolicy) -> Vec<RecordOutput>
where
    I: IntoIterator<Item = (String, Bytes)>,
{
    let outputs: Vec<RecordOutput> = records
        .into_iter()
        .map(|(id, data)| process_record(&id, data, rule, policy))
        .collect();

    let ok = outputs
        .iter()
        .filter(|o| o.status == RecordStatus::Ok)
        .count();
    info!(
        total = outputs.len(),
        ok,
        failed = outputs.len() - ok,
        "batch processed"
    );
    outputs
}
