//! Layered configuration for sheaf.
//!
//! Values are resolved, lowest precedence first, from: built-in defaults, the
//! user's `sheaf.toml` in the platform configuration directory, an explicit
//! file (TOML, YAML or JSON, chosen by extension), and `SHEAF_` environment
//! variables where `__` separates sections (`SHEAF_BATCH__RESET_DELAY_MS=0`).

pub mod error;
mod load;

pub use crate::load::Loader;
use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
pub use sheaf_engine::{CompressionLevel, CompressionOptions, ConvertOptions, Orientation, PageSize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub worker: WorkerConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
    /// Initial compression options of a session.
    pub compression: CompressionOptions,
    /// Initial image-to-PDF options of a session.
    pub convert: ConvertOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents larger than this get a "processing may be slow" advisory.
    pub document_warn_bytes: u64,
    /// Images larger than this get the same advisory.
    pub image_warn_bytes: u64,
    /// Height of generated previews, in pixels.
    pub preview_height: u32,
    /// JPEG quality of generated previews (1-100).
    pub preview_quality: u8,
}
impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            document_warn_bytes: 50 * MIB,
            image_warn_bytes: 10 * MIB,
            preview_height: 96,
            preview_quality: 70,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub metadata_timeout_ms: u64,
    /// Unset means merge, compress and convert wait as long as they take.
    pub transform_timeout_ms: Option<u64>,
}
impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_ms: 10_000,
            transform_timeout_ms: None,
        }
    }
}
impl WorkerConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn transform_timeout(&self) -> Option<Duration> {
        self.transform_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// How long a finished or cancelled run stays visible before the batch
    /// returns to idle.
    pub reset_delay_ms: u64,
    /// Capacity of the session event channel.
    pub event_capacity: usize,
}
impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 2_000,
            event_capacity: 256,
        }
    }
}
impl BatchConfig {
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where outputs are written; the current directory when unset.
    pub directory: Option<PathBuf>,
    /// Pause between consecutive deliveries of a "download all".
    pub delivery_interval_ms: u64,
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            delivery_interval_ms: 500,
        }
    }
}
impl OutputConfig {
    pub fn delivery_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_interval_ms)
    }

    pub fn directory_or_current(&self) -> &Path {
        self.directory.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

impl Config {
    /// Load from every layer, with an optional explicit file, and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut loader = Loader::new().with_user_file(Loader::user_config_path());
        if let Some(path) = explicit {
            loader = loader.with_file(path);
        }
        loader.load()
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid(message: &str) -> Result<()> {
            exn::bail!(ErrorKind::Invalid(message.to_string()))
        }
        if self.ingest.document_warn_bytes == 0 {
            return invalid("ingest.document_warn_bytes must be greater than zero");
        }
        if self.ingest.image_warn_bytes == 0 {
            return invalid("ingest.image_warn_bytes must be greater than zero");
        }
        if self.ingest.preview_height == 0 {
            return invalid("ingest.preview_height must be greater than zero");
        }
        if !(1..=100).contains(&self.ingest.preview_quality) {
            return invalid("ingest.preview_quality must be between 1 and 100");
        }
        if self.worker.metadata_timeout_ms == 0 {
            return invalid("worker.metadata_timeout_ms must be greater than zero");
        }
        if self.worker.transform_timeout_ms == Some(0) {
            return invalid("worker.transform_timeout_ms must be greater than zero when set");
        }
        if self.batch.event_capacity == 0 {
            return invalid("batch.event_capacity must be greater than zero");
        }
        if !(self.convert.margin_mm >= 0.0) {
            return invalid("convert.margin_mm must not be negative");
        }
        if !(self.convert.image_quality > 0.0 && self.convert.image_quality <= 1.0) {
            return invalid("convert.image_quality must be greater than 0 and at most 1");
        }
        Ok(())
    }
}
