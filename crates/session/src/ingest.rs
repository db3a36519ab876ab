//! Reading a newly added file and filling in what the list shows about it.

use crate::input::RawInput;
use crate::record::{ErrorCategory, FileId, Notice};
use sheaf_config::IngestConfig;
use sheaf_engine::{Dimensions, FileKind, Source, Thumbnail};
use sheaf_worker::TransformWorker;
use std::sync::Arc;
use tracing::instrument;

/// What ingest learned about a file.
#[derive(Debug)]
pub(crate) struct Ingested {
    pub(crate) bytes: Arc<[u8]>,
    pub(crate) page_count: Option<u32>,
    pub(crate) dimensions: Option<Dimensions>,
    pub(crate) thumbnail: Option<Thumbnail>,
}

/// Read `input` and ask the worker about it.
///
/// Metadata (page count or pixel size) is required; a preview is not, so a
/// thumbnail failure only costs the preview.
#[instrument(skip_all, fields(file = %id, name = %input.name))]
pub(crate) async fn enrich(
    worker: &TransformWorker,
    config: &IngestConfig,
    id: FileId,
    input: &RawInput,
    kind: FileKind,
) -> Result<Ingested, Notice> {
    let bytes = input.read().await.map_err(|err| {
        tracing::warn!(error = %err, "Failed to read input");
        Notice::error(ErrorCategory::Ingestion, format!("Failed to read file: {err}"))
    })?;
    let source = Source::new(input.name.clone(), Arc::clone(&bytes));

    let thumbnail = worker.thumbnail(source.clone(), kind, config.preview_height, config.preview_quality);
    let (metadata, thumbnail) = match kind {
        FileKind::Pdf => {
            let (pages, thumbnail) = tokio::join!(worker.page_count(source), thumbnail);
            (pages.map(|pages| (Some(pages), None)), thumbnail)
        },
        FileKind::Image(_) => {
            let (dimensions, thumbnail) = tokio::join!(worker.image_info(source), thumbnail);
            (dimensions.map(|dimensions| (None, Some(dimensions))), thumbnail)
        },
    };

    let (page_count, dimensions) = metadata.map_err(|failure| Notice::from_failure(&failure, ErrorCategory::Ingestion))?;
    if page_count == Some(0) {
        return Err(Notice::error(ErrorCategory::Ingestion, "Failed to read PDF"));
    }
    let thumbnail = thumbnail.unwrap_or_else(|failure| {
        tracing::warn!(%failure, "No preview for this file");
        None
    });
    Ok(Ingested {
        bytes,
        page_count,
        dimensions,
        thumbnail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_engine::{EngineHandle, ImageFormat, MockEngine};
    use sheaf_worker::WorkerSettings;

    fn worker() -> TransformWorker {
        let engine: EngineHandle = Arc::new(MockEngine::default());
        TransformWorker::spawn(engine, WorkerSettings::default()).unwrap()
    }

    fn raw(source: Source) -> RawInput {
        RawInput::memory(source.name.clone(), None, source.bytes)
    }

    #[tokio::test]
    async fn pdf_gets_pages_and_preview() {
        let worker = worker();
        let input = raw(MockEngine::pdf("a.pdf", 4));
        let ingested = enrich(&worker, &IngestConfig::default(), FileId::new(), &input, FileKind::Pdf)
            .await
            .unwrap();
        assert_eq!(ingested.page_count, Some(4));
        assert_eq!(ingested.dimensions, None);
        assert!(ingested.thumbnail.is_some());
        assert_eq!(&*ingested.bytes, b"mock:4");
    }

    #[tokio::test]
    async fn image_gets_dimensions() {
        let worker = worker();
        let input = raw(MockEngine::image("a.png", 640, 480));
        let kind = FileKind::Image(ImageFormat::Png);
        let ingested = enrich(&worker, &IngestConfig::default(), FileId::new(), &input, kind)
            .await
            .unwrap();
        assert_eq!(ingested.page_count, None);
        assert_eq!(ingested.dimensions, Some(Dimensions::new(640, 480)));
    }

    #[tokio::test]
    async fn encrypted_is_its_own_category() {
        let worker = worker();
        let input = raw(MockEngine::encrypted("locked.pdf"));
        let notice = enrich(&worker, &IngestConfig::default(), FileId::new(), &input, FileKind::Pdf)
            .await
            .unwrap_err();
        assert_eq!(notice.category, ErrorCategory::Encrypted);
        assert!(!notice.advisory);
        assert!(notice.message.contains("locked.pdf"));
    }

    #[tokio::test]
    async fn unreadable_path_is_an_ingestion_error() {
        let worker = worker();
        let input = RawInput {
            name: "gone.pdf".to_string(),
            media_type: None,
            size: 10,
            source: crate::input::InputSource::Path("/nonexistent/sheaf/gone.pdf".into()),
        };
        let notice = enrich(&worker, &IngestConfig::default(), FileId::new(), &input, FileKind::Pdf)
            .await
            .unwrap_err();
        assert_eq!(notice.category, ErrorCategory::Ingestion);
        assert!(notice.message.starts_with("Failed to read file"));
    }
}
