use crate::batch::{self, BatchRun, BatchStatus, Rerun, RunTicket, SkipReason};
use crate::error::{ErrorKind, Result};
use crate::event::SessionEvent;
use crate::ingest::{self, Ingested};
use crate::input::RawInput;
use crate::output::{OutputDispatcher, SinkHandle};
use crate::preview::{PreviewHandle, PreviewStore};
use crate::record::{FileId, FileRecord, Notice, Status};
use crate::registry::FileRegistry;
use crate::tool::Tool;
use crate::util::large_file_advisory;
use exn::{OptionExt, ResultExt};
use sheaf_config::{Config, IngestConfig};
use sheaf_engine::{CompressionOptions, ConvertOptions, EngineHandle, Thumbnail};
use sheaf_worker::{TransformWorker, WorkerSettings};
use std::path::PathBuf;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const WORKER_THREAD: &str = "sheaf-worker";

/// The combined output of the last merge or conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub filename: String,
    pub bytes: Arc<[u8]>,
    pub page_count: u32,
    /// Where the sink put it, once delivered.
    pub path: Option<PathBuf>,
}

pub(crate) struct State {
    pub(crate) registry: FileRegistry,
    pub(crate) previews: PreviewStore,
    pub(crate) batch: BatchRun,
    pub(crate) run: Option<RunTicket>,
    pub(crate) banner: Option<String>,
    pub(crate) last_output: Option<Output>,
    pub(crate) compression: CompressionOptions,
    pub(crate) convert: ConvertOptions,
    next_run_id: u64,
    disposed: bool,
}

pub(crate) struct Shared {
    pub(crate) tool: Tool,
    pub(crate) ingest: IngestConfig,
    pub(crate) worker: TransformWorker,
    pub(crate) output: OutputDispatcher,
    reset_delay: Duration,
    state: Mutex<State>,
    events: broadcast::Sender<SessionEvent>,
    settled: Notify,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock, unless the session is gone.
    fn live(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.disposed {
            exn::bail!(ErrorKind::Disposed);
        }
        Ok(state)
    }

    /// Call with the state locked, so events leave in mutation order.
    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn update_batch(&self, state: &mut State, update: impl FnOnce(&mut BatchRun)) {
        update(&mut state.batch);
        self.emit(SessionEvent::Batch(state.batch.clone()));
    }

    pub(crate) fn set_banner(&self, state: &mut State, banner: Option<String>) {
        if state.banner != banner {
            state.banner = banner.clone();
            self.emit(SessionEvent::Banner(banner));
        }
    }

    /// Whether `ticket` is still the active, uncancelled run.
    pub(crate) fn is_current(&self, state: &State, ticket: &RunTicket) -> bool {
        !ticket.token.is_cancelled() && state.run.as_ref().is_some_and(|run| run.id == ticket.id)
    }

    /// End the active run in `status`. Everything but `Error` returns to
    /// idle after the reset delay.
    pub(crate) fn finish_run(
        self: &Arc<Self>,
        state: &mut State,
        status: BatchStatus,
        message: impl Into<String>,
    ) {
        state.run = None;
        let progress = if status == BatchStatus::Complete { 100 } else { 0 };
        self.update_batch(state, |batch| {
            batch.advance(status, progress, message);
            if status == BatchStatus::Complete {
                batch.current_index = batch.total;
            }
        });
        tracing::info!(run = state.batch.run_id, %status, "Batch run finished");
        if status != BatchStatus::Error {
            self.schedule_reset(state.batch.run_id);
        }
    }

    fn schedule_reset(self: &Arc<Self>, run_id: u64) {
        let shared = Arc::downgrade(self);
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut state = shared.lock();
            // A newer run (or a reset) owns the batch state now.
            if state.batch.run_id != run_id || state.run.is_some() || state.disposed {
                return;
            }
            if matches!(state.batch.status, BatchStatus::Complete | BatchStatus::Cancelled) {
                shared.update_batch(&mut state, |batch| *batch = BatchRun::idle(run_id));
            }
        });
    }

    fn finish_ingest(&self, id: FileId, outcome: std::result::Result<Ingested, Notice>) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        if state.registry.get(id).is_none() {
            tracing::debug!(file = %id, "File removed before it finished ingesting");
        } else {
            Self::apply_ingest(&mut state, id, outcome);
            self.emit(SessionEvent::FileUpdated(id));
        }
        drop(state);
        self.settled.notify_waiters();
    }

    fn apply_ingest(state: &mut State, id: FileId, outcome: std::result::Result<Ingested, Notice>) {
        let State { registry, previews, .. } = state;
        let Some(record) = registry.get_mut(id) else {
            return;
        };
        match outcome {
            Ok(ingested) => {
                record.source = Some(ingested.bytes);
                record.derived.page_count = ingested.page_count;
                record.derived.dimensions = ingested.dimensions;
                record.derived.preview = ingested.thumbnail.map(|thumbnail| previews.insert(thumbnail));
                record.status = Status::Ready;
                record.keep_only_advisory();
                tracing::debug!(file = %id, "File ready");
            },
            Err(notice) => {
                tracing::info!(file = %id, category = %notice.category, %notice, "File failed to ingest");
                record.fail(notice);
            },
        }
    }

    fn release(state: &mut State, record: &FileRecord) {
        if let Some(handle) = record.derived.preview {
            state.previews.revoke(handle);
        }
    }
}

/// Everything one tool's page holds: the file list, the batch run and the
/// worker, with actions that mutate them and events that report it.
///
/// Cloning is cheap and every clone refers to the same session. Background
/// work (ingest, runs, resets) holds clones too, so [`dispose`](Self::dispose)
/// is what ends a session, not dropping it.
///
/// Must be created and used within a Tokio runtime.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Start a session (and its worker) for `tool`.
    pub fn init(tool: Tool, config: &Config, engine: EngineHandle, sink: SinkHandle) -> Result<Self> {
        let settings = WorkerSettings {
            thread_name: WORKER_THREAD.to_string(),
            metadata_timeout: Some(config.worker.metadata_timeout()),
            transform_timeout: config.worker.transform_timeout(),
        };
        let worker = TransformWorker::spawn(engine, settings).or_raise(|| ErrorKind::Worker)?;
        let (events, _) = broadcast::channel(config.batch.event_capacity.max(1));
        tracing::info!(%tool, engine = worker.engine_name(), sink = sink.name(), "Session started");

        let state = State {
            registry: FileRegistry::default(),
            previews: PreviewStore::default(),
            batch: BatchRun::default(),
            run: None,
            banner: None,
            last_output: None,
            compression: config.compression,
            convert: config.convert,
            next_run_id: 0,
            disposed: false,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                tool,
                ingest: config.ingest.clone(),
                worker,
                output: OutputDispatcher::new(sink, config.output.delivery_interval()),
                reset_delay: config.batch.reset_delay(),
                state: Mutex::new(state),
                events,
                settled: Notify::new(),
            }),
        })
    }

    pub fn tool(&self) -> Tool {
        self.shared.tool
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.shared.lock().registry.snapshot()
    }

    pub fn file(&self, id: FileId) -> Option<FileRecord> {
        self.shared.lock().registry.get(id).cloned()
    }

    pub fn batch(&self) -> BatchRun {
        self.shared.lock().batch.clone()
    }

    /// The batch-level message: an invalid selection, an empty batch, a
    /// failed delivery.
    pub fn error(&self) -> Option<String> {
        self.shared.lock().banner.clone()
    }

    pub fn last_output(&self) -> Option<Output> {
        self.shared.lock().last_output.clone()
    }

    pub fn compression_options(&self) -> CompressionOptions {
        self.shared.lock().compression
    }

    pub fn convert_options(&self) -> ConvertOptions {
        self.shared.lock().convert
    }

    pub fn preview(&self, handle: PreviewHandle) -> Option<Arc<Thumbnail>> {
        self.shared.lock().previews.get(handle)
    }

    /// Number of previews not yet revoked.
    pub fn live_previews(&self) -> usize {
        self.shared.lock().previews.live()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Add the inputs this tool accepts, in order, to the end of the list.
    ///
    /// Unacceptable inputs are dropped silently unless none is left, in
    /// which case nothing is added and the batch-level message says so.
    /// Returns as soon as the records exist; each one is read and inspected
    /// in the background.
    pub fn add_files(&self, inputs: impl IntoIterator<Item = RawInput>) -> Result<Vec<FileId>> {
        let tool = self.shared.tool;
        let accepted: Vec<_> = inputs
            .into_iter()
            .filter_map(|input| match tool.accept(&input) {
                Some(kind) => Some((input, kind)),
                None => {
                    tracing::debug!(name = %input.name, media_type = ?input.media_type, "Dropping unacceptable input");
                    None
                },
            })
            .collect();

        let mut state = self.shared.live()?;
        if accepted.is_empty() {
            self.shared.set_banner(&mut state, Some(tool.invalid_selection_message().to_string()));
            exn::bail!(ErrorKind::NoValidFiles);
        }
        self.shared.set_banner(&mut state, None);

        let threshold = tool.warn_threshold(&self.shared.ingest);
        let mut ids = Vec::with_capacity(accepted.len());
        let mut pending = Vec::with_capacity(accepted.len());
        for (input, kind) in accepted {
            let mut record = FileRecord::new(input.name.clone(), input.size, kind);
            if input.size > threshold {
                record.last_error = Some(Notice::advisory(large_file_advisory(input.size)));
            }
            ids.push(record.id);
            pending.push((record.id, input, kind));
            state.registry.push(record);
        }
        self.shared.emit(SessionEvent::FilesAdded(ids.clone()));
        drop(state);

        for (id, input, kind) in pending {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                let outcome = ingest::enrich(&shared.worker, &shared.ingest, id, &input, kind).await;
                shared.finish_ingest(id, outcome);
            });
        }
        Ok(ids)
    }

    /// Wait until no file is still being read.
    pub async fn settled(&self) {
        loop {
            let mut notified = pin!(self.shared.settled.notified());
            notified.as_mut().enable();
            {
                let state = self.shared.lock();
                if state.disposed || !state.registry.any_with_status(Status::Ingesting) {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Remove a file and revoke its preview. Returns `false` if no file has
    /// this id. Allowed during a run: the run ignores the file from then on.
    pub fn remove_file(&self, id: FileId) -> Result<bool> {
        let mut state = self.shared.live()?;
        let Some(record) = state.registry.remove(id) else {
            return Ok(false);
        };
        Shared::release(&mut state, &record);
        self.shared.emit(SessionEvent::FileRemoved(id));
        drop(state);
        self.shared.settled.notify_waiters();
        Ok(true)
    }

    /// Replace the order. `ids` must name every file exactly once.
    pub fn reorder(&self, ids: &[FileId]) -> Result<bool> {
        self.mutate_order(|registry| registry.reorder(ids))
    }

    /// Move the file at `from` to `to`.
    ///
    /// # Panics
    ///
    /// If either index is out of range.
    pub fn move_file(&self, from: usize, to: usize) -> Result<bool> {
        self.mutate_order(|registry| Ok(registry.move_file(from, to)))
    }

    pub fn move_to_top(&self, id: FileId) -> Result<bool> {
        self.mutate_order(|registry| registry.move_to_top(id).ok_or_raise(|| ErrorKind::NotFound(id)))
    }

    pub fn move_to_bottom(&self, id: FileId) -> Result<bool> {
        self.mutate_order(|registry| registry.move_to_bottom(id).ok_or_raise(|| ErrorKind::NotFound(id)))
    }

    fn mutate_order(&self, mutate: impl FnOnce(&mut FileRegistry) -> Result<bool>) -> Result<bool> {
        let mut state = self.shared.live()?;
        if state.run.is_some() {
            exn::bail!(ErrorKind::BatchActive);
        }
        let changed = mutate(&mut state.registry)?;
        self.shared.emit(SessionEvent::Reordered { changed });
        Ok(changed)
    }

    /// Empty the list, revoke every preview and abandon any run.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.shared.live()?;
        if let Some(run) = state.run.take() {
            run.token.cancel();
        }
        state.registry.clear();
        let revoked = state.previews.clear();
        tracing::debug!(revoked, "Cleared files");
        self.shared.emit(SessionEvent::Cleared);
        let run_id = state.batch.run_id;
        self.shared.update_batch(&mut state, |batch| *batch = BatchRun::idle(run_id));
        self.shared.set_banner(&mut state, None);
        drop(state);
        self.shared.settled.notify_waiters();
        Ok(())
    }

    /// Start the tool's batch run over the current list.
    ///
    /// Refused while files are being read or another run is active, and
    /// when no file is usable. Await the handle to wait for the run.
    pub fn run(&self) -> Result<JoinHandle<()>> {
        self.start_run(false)
    }

    /// Run the same batch again (the banner's retry action).
    pub fn retry(&self) -> Result<JoinHandle<()>> {
        self.reset_batch()?;
        self.start_run(false)
    }

    fn start_run(&self, force: bool) -> Result<JoinHandle<()>> {
        let mut state = self.shared.live()?;
        self.start_run_locked(&mut state, force)
    }

    /// Start a run while already holding the state lock, so nothing can
    /// slip in between the caller's checks and the run.
    #[instrument(skip(self, state), fields(tool = %self.shared.tool))]
    fn start_run_locked(&self, state: &mut State, force: bool) -> Result<JoinHandle<()>> {
        let tool = self.shared.tool;
        if state.run.is_some() {
            exn::bail!(ErrorKind::BatchActive);
        }
        if state.registry.any_with_status(Status::Ingesting) {
            exn::bail!(ErrorKind::Ingesting);
        }
        if !state.registry.iter().any(|record| record.status.is_usable()) {
            self.shared.set_banner(state, Some(tool.empty_batch_message().to_string()));
            exn::bail!(ErrorKind::EmptyBatch);
        }
        self.shared.set_banner(state, None);

        state.next_run_id += 1;
        let ticket = RunTicket {
            id: state.next_run_id,
            token: CancellationToken::new(),
        };
        state.run = Some(ticket.clone());
        tracing::info!(run = ticket.id, force, "Starting batch run");

        let shared = Arc::clone(&self.shared);
        let handle = if tool.is_whole_batch() {
            let job = batch::whole::prepare(&self.shared, state, &ticket);
            tokio::spawn(batch::whole::run(shared, ticket, job))
        } else {
            let job = batch::each::prepare(&self.shared, state, &ticket, force);
            tokio::spawn(batch::each::run(shared, ticket, job))
        };
        Ok(handle)
    }

    /// Stop the active run. Results already applied stay; whatever is in
    /// flight is discarded when it arrives. Returns `false` if nothing was
    /// running.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        if state.disposed {
            return false;
        }
        let Some(run) = state.run.take() else {
            return false;
        };
        run.token.cancel();
        let interrupted: Vec<_> = state
            .registry
            .iter()
            .filter(|record| record.status == Status::Transforming)
            .map(|record| record.id)
            .collect();
        for id in interrupted {
            if let Some(record) = state.registry.get_mut(id) {
                record.status = Status::Ready;
            }
            self.shared.emit(SessionEvent::FileUpdated(id));
        }
        self.shared.update_batch(&mut state, |batch| {
            batch.advance(BatchStatus::Cancelled, 0, "Cancelled");
        });
        tracing::info!(run = run.id, "Batch run cancelled");
        self.shared.schedule_reset(run.id);
        true
    }

    /// Return a finished run (including an `Error`) to idle.
    pub fn reset_batch(&self) -> Result<()> {
        let mut state = self.shared.live()?;
        if state.run.is_some() {
            exn::bail!(ErrorKind::BatchActive);
        }
        let run_id = state.batch.run_id;
        self.shared.update_batch(&mut state, |batch| *batch = BatchRun::idle(run_id));
        Ok(())
    }

    /// Change the compression options.
    ///
    /// When they actually changed, this session compresses, some file is
    /// already compressed and nothing is being read, transformed or run, a
    /// forced run starts that replaces every result.
    pub fn set_compression_options(&self, options: CompressionOptions) -> Result<Rerun> {
        let mut state = self.shared.live()?;
        if state.compression == options {
            return Ok(Rerun::Unchanged);
        }
        state.compression = options;
        self.shared.emit(SessionEvent::OptionsChanged);

        let skipped = if self.shared.tool != Tool::Compress {
            Some(SkipReason::NotCompressing)
        } else if state.run.is_some() {
            Some(SkipReason::RunActive)
        } else if state.registry.any_with_status(Status::Ingesting) {
            Some(SkipReason::Ingesting)
        } else if state.registry.any_with_status(Status::Transforming) {
            Some(SkipReason::Transforming)
        } else if !state.registry.any_with_status(Status::Transformed) {
            Some(SkipReason::NothingTransformed)
        } else {
            None
        };
        if let Some(reason) = skipped {
            tracing::debug!(%reason, "Not re-running compression");
            return Ok(Rerun::Skipped(reason));
        }
        self.start_run_locked(&mut state, true).map(Rerun::Started)
    }

    /// Change the image-to-PDF options used by the next conversion.
    pub fn set_convert_options(&self, options: ConvertOptions) -> Result<bool> {
        let mut state = self.shared.live()?;
        if state.convert == options {
            return Ok(false);
        }
        state.convert = options;
        self.shared.emit(SessionEvent::OptionsChanged);
        Ok(true)
    }

    /// Deliver one file's result.
    pub async fn download(&self, id: FileId) -> Result<PathBuf> {
        let record = {
            let state = self.shared.live()?;
            state.registry.get(id).cloned().ok_or_raise(|| ErrorKind::NotFound(id))?
        };
        let path = self.shared.output.deliver_single(&record).await?;
        self.delivered(&path);
        Ok(path)
    }

    /// Deliver every result, in list order.
    pub async fn download_all(&self) -> Result<Vec<PathBuf>> {
        let records = self.shared.live()?.registry.snapshot();
        let paths = self.shared.output.deliver_all(&records).await?;
        for path in &paths {
            self.delivered(path);
        }
        Ok(paths)
    }

    /// Deliver the last merge or conversion output again.
    pub async fn download_output(&self) -> Result<PathBuf> {
        let output = self
            .shared
            .live()?
            .last_output
            .clone()
            .ok_or_raise(|| ErrorKind::NoOutput)?;
        let path = self.shared.output.deliver_artifact(&output.filename, &output.bytes).await?;
        self.delivered(&path);
        Ok(path)
    }

    fn delivered(&self, path: &std::path::Path) {
        let _state = self.shared.lock();
        self.shared.emit(SessionEvent::Delivered(path.to_path_buf()));
    }

    /// End the session: abandon any run, revoke every preview and stop the
    /// worker. Every later action fails with `Disposed`.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            if let Some(run) = state.run.take() {
                run.token.cancel();
            }
            let revoked = state.previews.clear();
            tracing::info!(revoked, "Session disposed");
            self.shared.emit(SessionEvent::Disposed);
        }
        self.shared.worker.shutdown();
        self.shared.settled.notify_waiters();
    }
}
