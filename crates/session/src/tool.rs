use crate::input::RawInput;
use derive_more::Display;
use sheaf_config::IngestConfig;
use sheaf_engine::FileKind;

/// What a session does with its files.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Combine every document into one, in list order.
    #[display("merge")]
    Merge,
    /// Shrink each document on its own.
    #[display("compress")]
    Compress,
    /// Turn every image into one page of a single document.
    #[display("convert")]
    Convert,
}

impl Tool {
    /// The kind an input is accepted as, or `None` if this tool rejects it.
    pub fn accept(&self, input: &RawInput) -> Option<FileKind> {
        let kind = FileKind::detect(input.media_type.as_deref(), &input.name)?;
        match (self, kind) {
            (Tool::Merge | Tool::Compress, FileKind::Pdf) => Some(kind),
            (Tool::Convert, FileKind::Image(_)) => Some(kind),
            _ => None,
        }
    }

    /// One combined output, rather than a result per file.
    pub fn is_whole_batch(&self) -> bool {
        matches!(self, Tool::Merge | Tool::Convert)
    }

    /// Size above which a file gets the "may be slow" advisory.
    pub fn warn_threshold(&self, config: &IngestConfig) -> u64 {
        match self {
            Tool::Merge | Tool::Compress => config.document_warn_bytes,
            Tool::Convert => config.image_warn_bytes,
        }
    }

    pub fn invalid_selection_message(&self) -> &'static str {
        match self {
            Tool::Merge | Tool::Compress => "Please select valid PDF files",
            Tool::Convert => "Please select valid image files (JPG, PNG, GIF, WebP, BMP)",
        }
    }

    pub fn empty_batch_message(&self) -> &'static str {
        match self {
            Tool::Merge => "No files to merge",
            Tool::Compress => "No files to compress",
            Tool::Convert => "No images to convert",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sheaf_engine::ImageFormat;

    fn input(name: &str, media_type: Option<&str>) -> RawInput {
        RawInput::memory(name, media_type, Vec::new())
    }

    #[rstest]
    #[case(Tool::Merge, "a.pdf", None, Some(FileKind::Pdf))]
    #[case(Tool::Merge, "a.PDF", Some(""), Some(FileKind::Pdf))]
    #[case(Tool::Merge, "download", Some("application/pdf"), Some(FileKind::Pdf))]
    #[case(Tool::Compress, "a.pdf", Some("application/octet-stream"), Some(FileKind::Pdf))]
    #[case(Tool::Merge, "a.png", Some("image/png"), None)]
    #[case(Tool::Merge, "a.txt", Some("text/plain"), None)]
    #[case(Tool::Convert, "a.png", Some("image/png"), Some(FileKind::Image(ImageFormat::Png)))]
    #[case(Tool::Convert, "a.jpg", Some("image/jpg"), Some(FileKind::Image(ImageFormat::Jpeg)))]
    #[case(Tool::Convert, "a.bmp", Some("image/bmp"), Some(FileKind::Image(ImageFormat::Bmp)))]
    #[case(Tool::Convert, "a.png", None, None)]
    #[case(Tool::Convert, "a.svg", Some("image/svg+xml"), None)]
    #[case(Tool::Convert, "a.pdf", Some("application/pdf"), None)]
    fn test_accept(
        #[case] tool: Tool,
        #[case] name: &str,
        #[case] media_type: Option<&str>,
        #[case] expected: Option<FileKind>,
    ) {
        assert_eq!(tool.accept(&input(name, media_type)), expected);
    }

    #[test]
    fn thresholds_follow_the_kind_of_input() {
        let config = IngestConfig::default();
        assert_eq!(Tool::Merge.warn_threshold(&config), 50 * 1024 * 1024);
        assert_eq!(Tool::Convert.warn_threshold(&config), 10 * 1024 * 1024);
    }
}
