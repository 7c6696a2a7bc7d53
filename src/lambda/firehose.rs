//! Mapping between the Firehose transformation envelope and the record pipeline.

use aws_lambda_events::encodings::Base64Data;
use aws_lambda_events::firehose::{
    KinesisFirehoseEvent, KinesisFirehoseResponse, KinesisFirehoseResponseRecord,
    KinesisFirehoseResponseRecordMetadata,
};
use bytes::Bytes;
use tracing::info;

use crate::config::{EnrichmentRule, FailurePolicy};
use crate::handler::{process_record, RecordStatus};

/// Transform every record of a Firehose invocation.
///
/// Record ids are echoed back unchanged; base64 transcoding of the payloads
/// is handled by the envelope types. A failed record reports its original
/// data and never affects its siblings.
pub fn transform_event(
    event: KinesisFirehoseEvent,
    rule: &EnrichmentRule,
    policy: FailurePolicy,
) -> KinesisFirehoseResponse {
    let mut records = Vec::with_capacity(event.records.len());
    let mut ok = 0usize;
    for record in event.records {
        let id = record.record_id.unwrap_or_default();
        let output = process_record(&id, Bytes::from(record.data.0), rule, policy);
        if output.status == RecordStatus::Ok {
            ok += 1;
        }
        records.push(KinesisFirehoseResponseRecord {
            record_id: Some(output.id),
            result: Some(output.status.as_str().to_string()),
            data: Base64Data(output.data),
            metadata: KinesisFirehoseResponseRecordMetadata {
                partition_keys: Default::default(),
            },
        });
    }
    info!(
        total = records.len(),
        ok,
        failed = records.len() - ok,
        "firehose invocation processed"
    );
    KinesisFirehoseResponse { records }
}
