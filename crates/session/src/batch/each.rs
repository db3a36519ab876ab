//! Per-item runs: compress.

use super::{BatchRun, BatchStatus, RunTicket, percent};
use crate::event::SessionEvent;
use crate::record::{ErrorCategory, FileId, Notice, Status, TransformResult};
use crate::session::{Shared, State};
use sheaf_engine::CompressionOptions;
use std::sync::Arc;

pub(crate) struct Job {
    /// Records to compress, in list order at the time the run started.
    targets: Vec<FileId>,
    options: CompressionOptions,
}

/// Pick the targets and publish `Preparing`.
///
/// A forced run also takes records that are already compressed, and drops
/// their results now so nothing stale can be downloaded meanwhile.
pub(crate) fn prepare(shared: &Arc<Shared>, state: &mut State, ticket: &RunTicket, force: bool) -> Job {
    let targets: Vec<_> = state
        .registry
        .iter()
        .filter(|record| record.status == Status::Ready || (force && record.status == Status::Transformed))
        .map(|record| record.id)
        .collect();
    if force {
        for &id in &targets {
            let Some(record) = state.registry.get_mut(id) else {
                continue;
            };
            if record.status == Status::Transformed {
                record.invalidate();
                shared.emit(SessionEvent::FileUpdated(id));
            }
        }
    }
    let total = targets.len();
    shared.update_batch(state, |batch| *batch = BatchRun::preparing(ticket.id, total, 5, "Preparing files..."));
    Job {
        targets,
        options: state.compression,
    }
}

/// Compress the targets one at a time. A failure stays on its record and
/// the run moves on; cancelling keeps every result applied so far.
pub(crate) async fn run(shared: Arc<Shared>, ticket: RunTicket, job: Job) {
    let Job { targets, options } = job;
    let total = targets.len();
    let mut completed = 0_usize;

    for (index, id) in targets.into_iter().enumerate() {
        let source = {
            let mut state = shared.lock();
            if !shared.is_current(&state, &ticket) {
                return;
            }
            let Some((source, name)) = start_item(&mut state, id) else {
                // Removed (or failed) since the run started.
                completed += 1;
                continue;
            };
            shared.emit(SessionEvent::FileUpdated(id));
            shared.update_batch(&mut state, |batch| {
                batch.advance(
                    BatchStatus::Running,
                    percent(index as f64 + 0.5, total),
                    format!("Compressing {name}..."),
                );
                batch.current_index = index + 1;
            });
            source
        };

        let outcome = tokio::select! {
            () = ticket.token.cancelled() => return,
            outcome = shared.worker.compress(source, options) => outcome,
        };

        let mut state = shared.lock();
        if !shared.is_current(&state, &ticket) {
            tracing::debug!(run = ticket.id, file = %id, "Discarding result of a stale run");
            return;
        }
        completed += 1;
        if let Some(record) = state.registry.get_mut(id).filter(|record| record.status == Status::Transforming) {
            match outcome {
                Ok(bytes) => {
                    let result = TransformResult::new(record.original_size, bytes);
                    tracing::debug!(file = %id, size = result.size, ratio = result.ratio, "File compressed");
                    record.complete(result);
                },
                Err(failure) => {
                    tracing::warn!(file = %id, kind = %failure.kind, %failure, "File failed to compress");
                    record.fail(Notice::from_failure(&failure, ErrorCategory::Transform));
                },
            }
            shared.emit(SessionEvent::FileUpdated(id));
        }
        let progress = percent(completed as f64, total);
        shared.update_batch(&mut state, |batch| {
            let message = batch.message.clone();
            batch.advance(BatchStatus::Running, progress, message);
        });
    }

    let mut state = shared.lock();
    if shared.is_current(&state, &ticket) {
        shared.finish_run(&mut state, BatchStatus::Complete, "Compression complete!");
    }
}

/// Mark the record as transforming and hand back its payload.
fn start_item(state: &mut State, id: FileId) -> Option<(sheaf_engine::Source, String)> {
    let record = state.registry.get_mut(id).filter(|record| record.status.is_usable())?;
    let source = record.to_source()?;
    record.status = Status::Transforming;
    record.result = None;
    Some((source, record.name.clone()))
}
