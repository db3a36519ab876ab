/// How aggressively [`compress`](crate::Engine::compress) rewrites a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CompressionLevel {
    /// Structural clean-up and stream compression only.
    #[default]
    Basic,
    /// Additionally strips document metadata (when allowed by
    /// [`CompressionOptions::remove_metadata`]).
    Strong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompressionOptions {
    pub level: CompressionLevel,
    pub remove_metadata: bool,
    pub flatten_annotations: bool,
}
impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::Basic,
            remove_metadata: true,
            flatten_annotations: false,
        }
    }
}
impl CompressionOptions {
    /// Metadata is only ever stripped at the strong level.
    pub fn strips_metadata(&self) -> bool {
        self.level == CompressionLevel::Strong && self.remove_metadata
    }
}

/// Target page size for image conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    /// The image's own pixel size, read at 96 DPI.
    Original,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Orientation {
    /// Landscape for images wider than they are tall, portrait otherwise.
    #[default]
    Auto,
    Portrait,
    Landscape,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConvertOptions {
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// Margin on every side, in millimetres.
    pub margin_mm: f32,
    /// JPEG quality in `(0, 1]`; exactly `1.0` embeds lossless.
    pub image_quality: f32,
}
impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Auto,
            margin_mm: 10.0,
            image_quality: 0.92,
        }
    }
}
impl ConvertOptions {
    /// Embed images without lossy re-encoding.
    pub fn is_lossless(&self) -> bool {
        self.image_quality >= 1.0
    }

    /// JPEG encoder quality (1-100).
    pub fn jpeg_quality(&self) -> u8 {
        // Clamped first, so the cast can't truncate.
        (self.image_quality.clamp(0.01, 1.0) * 100.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn compression_defaults() {
        let options = CompressionOptions::default();
        assert_eq!(options.level, CompressionLevel::Basic);
        assert!(options.remove_metadata);
        assert!(!options.flatten_annotations);
        assert!(!options.strips_metadata());
    }

    #[rstest]
    #[case(CompressionLevel::Basic, true, false)]
    #[case(CompressionLevel::Basic, false, false)]
    #[case(CompressionLevel::Strong, true, true)]
    #[case(CompressionLevel::Strong, false, false)]
    fn test_strips_metadata(#[case] level: CompressionLevel, #[case] remove: bool, #[case] expected: bool) {
        let options = CompressionOptions {
            level,
            remove_metadata: remove,
            ..Default::default()
        };
        assert_eq!(options.strips_metadata(), expected);
    }

    #[rstest]
    #[case(0.92, 92, false)]
    #[case(0.7, 70, false)]
    #[case(1.0, 100, true)]
    #[case(0.001, 1, false)]
    fn test_jpeg_quality(#[case] quality: f32, #[case] expected: u8, #[case] lossless: bool) {
        let options = ConvertOptions {
            image_quality: quality,
            ..Default::default()
        };
        assert_eq!(options.jpeg_quality(), expected);
        assert_eq!(options.is_lossless(), lossless);
    }
}
