use sheaf_engine::{Artifact, CompressionOptions, ConvertOptions, Dimensions, FileKind, Source, Thumbnail};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Correlation id of one request, unique per worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);
impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// An operation for the worker, with the payloads it needs.
///
/// Sources are reference counted; the worker drops its clones as soon as it
/// has answered.
#[derive(Clone, Debug)]
pub enum Request {
    PageCount(Source),
    ImageInfo(Source),
    Thumbnail {
        source: Source,
        kind: FileKind,
        height: u32,
        quality: u8,
    },
    Merge(Vec<Source>),
    Compress {
        source: Source,
        options: CompressionOptions,
    },
    Convert {
        sources: Vec<Source>,
        options: ConvertOptions,
    },
}

impl Request {
    /// Short operation name (for logging).
    pub fn operation(&self) -> &'static str {
        match self {
            Request::PageCount(_) => "page_count",
            Request::ImageInfo(_) => "image_info",
            Request::Thumbnail { .. } => "thumbnail",
            Request::Merge(_) => "merge",
            Request::Compress { .. } => "compress",
            Request::Convert { .. } => "convert",
        }
    }

    /// Metadata requests are cheap and bounded by the metadata timeout;
    /// transforms are bounded by the (optional) transform timeout.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Request::PageCount(_) | Request::ImageInfo(_) | Request::Thumbnail { .. })
    }
}

/// The successful answer to a [`Request`], one variant per operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    PageCount(u32),
    ImageInfo(Dimensions),
    Thumbnail(Option<Thumbnail>),
    Merged(Artifact),
    Compressed(Vec<u8>),
    Converted(Artifact),
}

impl Response {
    pub fn operation(&self) -> &'static str {
        match self {
            Response::PageCount(_) => "page_count",
            Response::ImageInfo(_) => "image_info",
            Response::Thumbnail(_) => "thumbnail",
            Response::Merged(_) => "merge",
            Response::Compressed(_) => "compress",
            Response::Converted(_) => "convert",
        }
    }
}
