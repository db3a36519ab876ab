//! Whole-batch runs: merge and convert.

use super::{BatchRun, BatchStatus, RunTicket, percent};
use crate::event::SessionEvent;
use crate::session::{Output, Shared, State};
use crate::tool::Tool;
use crate::util::{converted_filename, merged_filename};
use sheaf_engine::{ConvertOptions, Source};
use std::sync::Arc;
use time::UtcDateTime;
use tokio::sync::mpsc::unbounded_channel;

#[derive(Clone, Debug)]
pub(crate) enum Operation {
    Merge,
    Convert(ConvertOptions),
}

pub(crate) struct Job {
    operation: Operation,
    /// Usable records, in list order at the time the run started.
    sources: Vec<Source>,
}

/// Snapshot the list and publish `Preparing`.
pub(crate) fn prepare(shared: &Arc<Shared>, state: &mut State, ticket: &RunTicket) -> Job {
    let sources: Vec<_> = state
        .registry
        .iter()
        .filter(|record| record.status.is_usable())
        .filter_map(|record| record.to_source())
        .collect();
    let (operation, message) = match shared.tool {
        Tool::Convert => (Operation::Convert(state.convert), "Preparing images..."),
        _ => (Operation::Merge, "Preparing files..."),
    };
    let total = sources.len();
    shared.update_batch(state, |batch| *batch = BatchRun::preparing(ticket.id, total, 10, message));
    Job { operation, sources }
}

/// One worker call for the whole list. The call itself cannot be
/// interrupted; a cancelled run just stops waiting and never applies it.
/// Conversions report each placed image while the call runs.
pub(crate) async fn run(shared: Arc<Shared>, ticket: RunTicket, job: Job) {
    let Job { operation, sources } = job;
    let total = sources.len();
    let message = match &operation {
        Operation::Merge => "Merging PDFs...".to_string(),
        Operation::Convert(_) => format!("Converting {total} images..."),
    };
    {
        let mut state = shared.lock();
        if !shared.is_current(&state, &ticket) {
            return;
        }
        shared.update_batch(&mut state, |batch| batch.advance(BatchStatus::Running, 30, message));
    }

    let (progress, mut placed) = unbounded_channel();
    let call = async {
        match &operation {
            Operation::Merge => shared.worker.merge(sources).await,
            Operation::Convert(options) => shared.worker.convert(sources, *options, Some(progress)).await,
        }
    };
    let mut call = std::pin::pin!(call);
    let outcome = loop {
        tokio::select! {
            biased;
            () = ticket.token.cancelled() => {
                tracing::debug!(run = ticket.id, "Run cancelled while the worker was busy");
                return;
            },
            Some(done) = placed.recv() => {
                let mut state = shared.lock();
                if shared.is_current(&state, &ticket) {
                    shared.update_batch(&mut state, |batch| {
                        batch.advance(
                            BatchStatus::Running,
                            10 + percent(done as f64 * 0.8, total),
                            format!("Processing image {done} of {total}"),
                        );
                        batch.current_index = done;
                    });
                }
            },
            outcome = &mut call => break outcome,
        }
    };

    let now = UtcDateTime::now();
    let filename = match operation {
        Operation::Merge => merged_filename(now),
        Operation::Convert(_) => converted_filename(now),
    };
    let output = {
        let mut state = shared.lock();
        if !shared.is_current(&state, &ticket) {
            tracing::debug!(run = ticket.id, "Discarding result of a stale run");
            return;
        }
        match outcome {
            Ok(artifact) => {
                let output = Output {
                    filename,
                    bytes: artifact.bytes.into(),
                    page_count: artifact.page_count,
                    path: None,
                };
                state.last_output = Some(output.clone());
                shared.finish_run(&mut state, BatchStatus::Complete, "Download starting...");
                output
            },
            Err(failure) => {
                tracing::warn!(run = ticket.id, kind = %failure.kind, %failure, "Batch run failed");
                shared.finish_run(&mut state, BatchStatus::Error, failure.message);
                return;
            },
        }
    };

    let delivered = shared.output.deliver_artifact(&output.filename, &output.bytes).await;
    let mut state = shared.lock();
    match delivered {
        Ok(path) => {
            if let Some(last) = state.last_output.as_mut().filter(|last| last.filename == output.filename) {
                last.path = Some(path.clone());
            }
            shared.emit(SessionEvent::Delivered(path));
        },
        Err(err) => {
            tracing::error!(filename = %output.filename, error = ?err, "Failed to deliver output");
            let banner = format!("Failed to save {}: {}", output.filename, &*err);
            shared.set_banner(&mut state, Some(banner));
        },
    }
}
