use crate::broker::{Broker, Outcome};
use crate::error::{ErrorKind, Result};
use crate::message::{Request, RequestId, Response};
use crate::Failure;
use exn::ResultExt;
use sheaf_engine::{
    Artifact, CompressionOptions, ConvertOptions, Dimensions, Engine, EngineHandle, FileKind, Source, Thumbnail,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::instrument;

const DEFAULT_THREAD_NAME: &str = "sheaf-worker";
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    pub thread_name: String,
    /// Bound for page counts, image info and thumbnails.
    pub metadata_timeout: Option<Duration>,
    /// Bound for merge, compress and convert. `None` waits indefinitely.
    pub transform_timeout: Option<Duration>,
}
impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            metadata_timeout: Some(DEFAULT_METADATA_TIMEOUT),
            transform_timeout: None,
        }
    }
}

struct Envelope {
    id: RequestId,
    request: Request,
    /// Where to report partial progress, for requests that have any.
    progress: Option<UnboundedSender<usize>>,
}

struct Reply {
    id: RequestId,
    outcome: Outcome,
}

/// Runs every engine call on one dedicated OS thread.
///
/// Callers `await` their outcome without blocking the async runtime; the
/// thread answers requests in the order they were sent, and a reply task
/// hands each answer to whoever registered its id with the [`Broker`].
pub struct TransformWorker {
    engine_name: String,
    settings: WorkerSettings,
    broker: Arc<Broker>,
    requests: Mutex<Option<mpsc::Sender<Envelope>>>,
    dispatcher: JoinHandle<()>,
}

impl TransformWorker {
    /// Start the worker thread and its reply task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(engine: EngineHandle, settings: WorkerSettings) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().or_raise(|| ErrorKind::NoRuntime)?;
        let engine_name = engine.name().to_string();
        let (request_tx, request_rx) = mpsc::channel::<Envelope>();
        let (reply_tx, reply_rx) = unbounded_channel::<Reply>();

        thread::Builder::new()
            .name(settings.thread_name.clone())
            .spawn(move || serve(engine, request_rx, reply_tx))
            .or_raise(|| ErrorKind::Spawn)?;

        let broker = Arc::new(Broker::default());
        let dispatcher = runtime.spawn(dispatch(Arc::clone(&broker), reply_rx));
        tracing::debug!(engine = %engine_name, thread = %settings.thread_name, "Started transform worker");

        Ok(Self {
            engine_name,
            settings,
            broker,
            requests: Mutex::new(Some(request_tx)),
            dispatcher,
        })
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// Number of requests sent but not yet answered (or abandoned).
    pub fn pending(&self) -> usize {
        self.broker.pending()
    }

    pub fn is_running(&self) -> bool {
        self.sender().is_some() && !self.dispatcher.is_finished()
    }

    /// Send a request and wait for its outcome.
    ///
    /// This never fails with anything but a [`Failure`]: a `timeout` that
    /// elapses first yields a `Timeout` failure (the eventual reply is
    /// dropped), and a worker that has stopped yields an `Unknown` one.
    pub async fn invoke(&self, request: Request, timeout: Option<Duration>) -> Outcome {
        self.invoke_with_progress(request, timeout, None).await
    }

    /// [`invoke`](Self::invoke), with partial progress sent to `progress`
    /// while the request runs. Only conversions report progress (the number
    /// of images placed so far).
    #[instrument(skip_all, fields(operation = request.operation()))]
    pub async fn invoke_with_progress(
        &self,
        request: Request,
        timeout: Option<Duration>,
        progress: Option<UnboundedSender<usize>>,
    ) -> Outcome {
        let operation = request.operation();
        let Some(requests) = self.sender() else {
            return Err(Failure::unavailable());
        };
        let (id, receiver) = self.broker.register();
        if requests.send(Envelope { id, request, progress }).is_err() {
            self.broker.abandon(id);
            return Err(Failure::unavailable());
        }
        tracing::trace!(%id, "Request sent to worker");

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.broker.abandon(id);
                    tracing::warn!(%id, ?limit, "Worker did not answer in time");
                    return Err(Failure::timeout(operation, limit));
                },
            },
            None => receiver.await,
        };
        // A closed channel means the request was abandoned by a shutdown.
        received.unwrap_or_else(|_| Err(Failure::unavailable()))
    }

    pub async fn page_count(&self, source: Source) -> std::result::Result<u32, Failure> {
        match self.invoke(Request::PageCount(source), self.settings.metadata_timeout).await? {
            Response::PageCount(pages) => Ok(pages),
            other => Err(mismatch("page_count", &other)),
        }
    }

    pub async fn image_info(&self, source: Source) -> std::result::Result<Dimensions, Failure> {
        match self.invoke(Request::ImageInfo(source), self.settings.metadata_timeout).await? {
            Response::ImageInfo(dimensions) => Ok(dimensions),
            other => Err(mismatch("image_info", &other)),
        }
    }

    pub async fn thumbnail(
        &self,
        source: Source,
        kind: FileKind,
        height: u32,
        quality: u8,
    ) -> std::result::Result<Option<Thumbnail>, Failure> {
        let request = Request::Thumbnail {
            source,
            kind,
            height,
            quality,
        };
        match self.invoke(request, self.settings.metadata_timeout).await? {
            Response::Thumbnail(thumbnail) => Ok(thumbnail),
            other => Err(mismatch("thumbnail", &other)),
        }
    }

    pub async fn merge(&self, sources: Vec<Source>) -> std::result::Result<Artifact, Failure> {
        match self.invoke(Request::Merge(sources), self.settings.transform_timeout).await? {
            Response::Merged(artifact) => Ok(artifact),
            other => Err(mismatch("merge", &other)),
        }
    }

    pub async fn compress(
        &self,
        source: Source,
        options: CompressionOptions,
    ) -> std::result::Result<Vec<u8>, Failure> {
        let request = Request::Compress { source, options };
        match self.invoke(request, self.settings.transform_timeout).await? {
            Response::Compressed(bytes) => Ok(bytes),
            other => Err(mismatch("compress", &other)),
        }
    }

    /// Convert images into one PDF; `progress` receives the number of images
    /// placed so far after each one.
    pub async fn convert(
        &self,
        sources: Vec<Source>,
        options: ConvertOptions,
        progress: Option<UnboundedSender<usize>>,
    ) -> std::result::Result<Artifact, Failure> {
        let request = Request::Convert { sources, options };
        match self
            .invoke_with_progress(request, self.settings.transform_timeout, progress)
            .await?
        {
            Response::Converted(artifact) => Ok(artifact),
            other => Err(mismatch("convert", &other)),
        }
    }

    /// Stop accepting requests and release every waiting caller.
    ///
    /// The thread finishes whatever it is working on and then exits; its
    /// answer is dropped. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let sender = self.requests.lock().unwrap_or_else(PoisonError::into_inner).take();
        if sender.is_none() {
            return;
        }
        let abandoned = self.broker.abandon_all();
        self.dispatcher.abort();
        tracing::debug!(engine = %self.engine_name, abandoned, "Transform worker shut down");
    }

    fn sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl fmt::Debug for TransformWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformWorker")
            .field("engine_name", &self.engine_name)
            .field("settings", &self.settings)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl Drop for TransformWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn mismatch(expected: &str, response: &Response) -> Failure {
    Failure::unknown(format!(
        "Worker answered {} to a {expected} request",
        response.operation()
    ))
}

/// Body of the worker thread.
fn serve(engine: EngineHandle, requests: mpsc::Receiver<Envelope>, replies: UnboundedSender<Reply>) {
    while let Ok(Envelope { id, request, progress }) = requests.recv() {
        let operation = request.operation();
        let span = tracing::debug_span!("worker_request", %id, operation);
        let _entered = span.enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(engine.as_ref(), request, progress.as_ref())))
            .unwrap_or_else(|_| {
                tracing::error!("Engine panicked");
                Err(Failure::unknown(format!("The document worker crashed during {operation}")))
            });
        if let Err(failure) = &outcome {
            tracing::debug!(kind = %failure.kind, %failure, "Request failed");
        }
        if replies.send(Reply { id, outcome }).is_err() {
            break;
        }
    }
    tracing::debug!("Worker thread exiting");
}

fn execute(
    engine: &(dyn Engine + Send + Sync),
    request: Request,
    progress: Option<&UnboundedSender<usize>>,
) -> Outcome {
    // The caller may have stopped listening; the work carries on regardless.
    let mut report = |done: usize| {
        if let Some(progress) = progress {
            let _ = progress.send(done);
        }
    };
    let response = match request {
        Request::PageCount(source) => engine.page_count(&source).map(Response::PageCount),
        Request::ImageInfo(source) => engine.image_info(&source).map(Response::ImageInfo),
        Request::Thumbnail {
            source,
            kind,
            height,
            quality,
        } => engine.thumbnail(&source, kind, height, quality).map(Response::Thumbnail),
        Request::Merge(sources) => engine.merge(&sources).map(Response::Merged),
        Request::Compress { source, options } => engine.compress(&source, &options).map(Response::Compressed),
        Request::Convert { sources, options } => engine
            .convert(&sources, &options, &mut report)
            .map(Response::Converted),
    };
    response.map_err(|err| Failure::from(&err))
}

/// Body of the reply task.
async fn dispatch(broker: Arc<Broker>, mut replies: UnboundedReceiver<Reply>) {
    while let Some(Reply { id, outcome }) = replies.recv().await {
        broker.resolve(id, outcome);
    }
    // The thread is gone; nobody still waiting will ever be answered.
    let abandoned = broker.abandon_all();
    if abandoned > 0 {
        tracing::warn!(abandoned, "Worker thread stopped with requests outstanding");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;
    use sheaf_engine::{CompressionLevel, ImageFormat, MockEngine};

    fn start(engine: MockEngine, settings: WorkerSettings) -> TransformWorker {
        TransformWorker::spawn(Arc::new(engine), settings).unwrap()
    }

    #[tokio::test]
    async fn answers_typed_requests() {
        let worker = start(MockEngine::default(), WorkerSettings::default());
        assert_eq!(worker.page_count(MockEngine::pdf("a.pdf", 4)).await, Ok(4));
        assert_eq!(
            worker.image_info(MockEngine::image("a.png", 640, 480)).await,
            Ok(Dimensions::new(640, 480))
        );
        let merged = worker
            .merge(vec![MockEngine::pdf("a.pdf", 1), MockEngine::pdf("b.pdf", 2)])
            .await
            .unwrap();
        assert_eq!(merged.page_count, 3);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn thumbnail_and_compress() {
        let worker = start(MockEngine::default(), WorkerSettings::default());
        let thumbnail = worker
            .thumbnail(MockEngine::image("a.png", 200, 100), FileKind::Image(ImageFormat::Png), 50, 70)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thumbnail.dimensions, Dimensions::new(100, 50));

        let options = CompressionOptions {
            level: CompressionLevel::Strong,
            ..Default::default()
        };
        let output = worker
            .compress(MockEngine::padded_pdf("a.pdf", 2, 800), options)
            .await
            .unwrap();
        assert_eq!(output.len(), 200);
    }

    #[tokio::test]
    async fn convert_reports_each_image() {
        let worker = start(MockEngine::default(), WorkerSettings::default());
        let (progress, mut placed) = unbounded_channel();
        let images = vec![
            MockEngine::image("a.png", 10, 10),
            MockEngine::image("b.png", 20, 10),
            MockEngine::image("c.png", 10, 20),
        ];
        let artifact = worker
            .convert(images, ConvertOptions::default(), Some(progress))
            .await
            .unwrap();
        assert_eq!(artifact.page_count, 3);

        let mut seen = Vec::new();
        while let Some(done) = placed.recv().await {
            seen.push(done);
        }
        assert_eq!(seen, [1, 2, 3]);
    }

    #[tokio::test]
    async fn engine_errors_become_failures() {
        let worker = start(MockEngine::default(), WorkerSettings::default());
        let failure = worker.page_count(MockEngine::encrypted("secret.pdf")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Encrypted);
        assert!(failure.message.contains("secret.pdf"));

        let failure = worker
            .merge(vec![MockEngine::pdf("a.pdf", 1), MockEngine::corrupt("b.pdf")])
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Corrupt);
        assert!(failure.message.contains("b.pdf"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_callers_receive_their_own_answers() {
        let worker = Arc::new(start(
            MockEngine::default().with_delay(Duration::from_millis(5)),
            WorkerSettings::default(),
        ));
        let tasks: Vec<_> = (1..=8)
            .map(|pages| {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move { worker.page_count(MockEngine::pdf("a.pdf", pages)).await })
            })
            .collect();
        for (pages, task) in (1..=8).zip(tasks) {
            assert_eq!(task.await.unwrap(), Ok(pages));
        }
    }

    #[tokio::test]
    async fn timeout_resolves_and_late_reply_is_dropped() {
        let worker = start(
            MockEngine::default().with_hang(Duration::from_millis(300)),
            WorkerSettings {
                metadata_timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        );
        let failure = worker.page_count(MockEngine::hanging("slow.pdf")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(worker.pending(), 0);

        // The thread is still busy; a request without a bound waits for it.
        let outcome = worker.invoke(Request::PageCount(MockEngine::pdf("a.pdf", 2)), None).await;
        assert_eq!(outcome, Ok(Response::PageCount(2)));
        assert!(worker.is_running());
    }

    #[tokio::test]
    async fn requests_after_shutdown_fail() {
        let worker = start(MockEngine::default(), WorkerSettings::default());
        worker.shutdown();
        worker.shutdown();
        assert!(!worker.is_running());
        let failure = worker.page_count(MockEngine::pdf("a.pdf", 1)).await.unwrap_err();
        assert_eq!(failure, Failure::unavailable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_releases_waiting_callers() {
        let worker = Arc::new(start(
            MockEngine::default().with_hang(Duration::from_millis(500)),
            WorkerSettings::default(),
        ));
        let waiting = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.merge(vec![MockEngine::hanging("slow.pdf")]).await })
        };
        while worker.pending() == 0 {
            tokio::task::yield_now().await;
        }
        worker.shutdown();
        let failure = waiting.await.unwrap().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unknown);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn debug_names_the_engine() {
        let worker = TransformWorker::spawn(Arc::new(MockEngine::default()), WorkerSettings::default()).unwrap();
        let debug = format!("{worker:?}");
        assert!(debug.contains("engine_name: \"mock\""), "{debug}");
        assert!(debug.contains("pending: 0"), "{debug}");
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let err = TransformWorker::spawn(Arc::new(MockEngine::default()), WorkerSettings::default()).unwrap_err();
        assert_eq!(*err, ErrorKind::NoRuntime);
    }
}
