//! AWS Lambda entry point for the Firehose enrichment function.
//!
//! Build with: cargo lambda build --release --arm64
//! Deploy artifact: target/lambda/lambda/bootstrap

use aws_lambda_events::firehose::{KinesisFirehoseEvent, KinesisFirehoseResponse};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use otlp2enrich::config::{EnrichmentRule, FailurePolicy};
use otlp2enrich::lambda::firehose::transform_event;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for CloudWatch Logs
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .json()
        .with_target(false)
        .without_time() // Lambda adds timestamps
        .init();

    info!("Lambda cold start - initializing");

    // Malformed configuration fails fast, before any record is handled
    let rule = Arc::new(EnrichmentRule::from_env()?);
    let policy = FailurePolicy::from_env()?;

    run(service_fn(move |event: LambdaEvent<KinesisFirehoseEvent>| {
        let rule = Arc::clone(&rule);
        async move { handler(event, &rule, policy) }
    }))
    .await
}

fn handler(
    event: LambdaEvent<KinesisFirehoseEvent>,
    rule: &EnrichmentRule,
    policy: FailurePolicy,
) -> Result<KinesisFirehoseResponse, Error> {
    Ok(transform_event(event.payload, rule, policy))
}
