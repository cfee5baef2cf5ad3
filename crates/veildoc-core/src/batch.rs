//! Batch driver: an ordered input sequence through a bounded worker pool.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use profile_engine::EffectiveProfile;
use tracing::info;

use crate::cancel::CancelFlag;
use crate::config::BatchOptions;
use crate::processor::{ProcessOutcome, Processor};

/// Stream a batch of documents through the processor, at most
/// `max_in_flight` concurrently.
///
/// Outcomes are yielded in input order as they complete; the bounded
/// buffer enforces backpressure. One document's failure does not abort the
/// batch unless `fail_fast` is set, in which case documents not yet
/// started fail with a cancellation; per-document audit records stay
/// independent either way.
pub fn process_batch_stream(
    processor: Arc<Processor>,
    inputs: Vec<Vec<u8>>,
    profile: Arc<EffectiveProfile>,
    options: BatchOptions,
) -> impl Stream<Item = ProcessOutcome> {
    let total = inputs.len();
    let cancel = CancelFlag::new();
    let fail_fast = options.fail_fast;
    info!(total, max_in_flight = options.max_in_flight, "starting batch");

    futures::stream::iter(inputs.into_iter().map(move |bytes| {
        let processor = Arc::clone(&processor);
        let profile = Arc::clone(&profile);
        let cancel = cancel.clone();
        async move {
            let outcome = processor
                .process_with_cancel(&bytes, &profile, &cancel)
                .await;
            if fail_fast && !outcome.result.success {
                cancel.cancel();
            }
            outcome
        }
    }))
    .buffered(options.max_in_flight.max(1))
}

/// Drive [`process_batch_stream`] to completion and collect the ordered
/// outcomes.
pub async fn process_batch(
    processor: Arc<Processor>,
    inputs: Vec<Vec<u8>>,
    profile: Arc<EffectiveProfile>,
    options: BatchOptions,
) -> Vec<ProcessOutcome> {
    process_batch_stream(processor, inputs, profile, options)
        .collect()
        .await
}
