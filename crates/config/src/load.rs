use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::instrument;

const APPLICATION: &str = "sheaf";
const FILE_NAME: &str = "sheaf.toml";
const ENV_PREFIX: &str = "SHEAF_";
const ENV_SEPARATOR: &str = "__";

/// Builds the layered [`Config`].
///
/// ```
/// use sheaf_config::Loader;
///
/// let config = Loader::new().with_env_prefix("SHEAF_DOCTEST_UNSET_").load().unwrap();
/// assert_eq!(config.batch.reset_delay_ms, 2000);
/// ```
#[derive(Clone, Debug)]
pub struct Loader {
    user_file: Option<PathBuf>,
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            user_file: None,
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sheaf.toml` in the platform configuration directory, if the platform
    /// has one.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    /// A TOML file read if it exists.
    pub fn with_user_file(mut self, path: Option<PathBuf>) -> Self {
        self.user_file = path;
        self
    }

    /// A file that must exist; its format follows its extension.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Merge every layer, deserialize, and validate.
    #[instrument(skip(self), fields(file = ?self.file))]
    pub fn load(&self) -> Result<Config> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = self.user_file.as_deref().filter(|path| path.is_file()) {
            tracing::debug!(path = %path.display(), "Reading user configuration");
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = self.file.as_deref() {
            figment = figment.merge(explicit(path)?);
        }
        figment = figment.merge(Env::prefixed(&self.env_prefix).split(ENV_SEPARATOR));

        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }
}

fn explicit(path: &Path) -> Result<Figment> {
    if !path.is_file() {
        exn::bail!(ErrorKind::MissingFile(path.display().to_string()));
    }
    tracing::debug!(path = %path.display(), "Reading configuration file");
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let figment = Figment::new();
    Ok(match extension.as_str() {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionLevel, PageSize};
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn isolated() -> Loader {
        Loader::new().with_env_prefix("SHEAF_TEST_NOTHING_SET_")
    }

    #[test]
    fn defaults_without_any_layer() {
        assert_eq!(isolated().load().unwrap(), Config::default());
    }

    #[rstest]
    #[case("sheaf.toml", "[batch]\nreset_delay_ms = 10\n[compression]\nlevel = \"strong\"\n")]
    #[case("sheaf.yaml", "batch:\n  reset_delay_ms: 10\ncompression:\n  level: strong\n")]
    #[case("sheaf.json", r#"{"batch": {"reset_delay_ms": 10}, "compression": {"level": "strong"}}"#)]
    fn test_explicit_file_formats(#[case] name: &str, #[case] content: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();

        let config = isolated().with_file(&path).load().unwrap();
        assert_eq!(config.batch.reset_delay_ms, 10);
        assert_eq!(config.compression.level, CompressionLevel::Strong);
        // Untouched keys keep their defaults.
        assert_eq!(config.batch.event_capacity, 256);
        assert!(config.compression.remove_metadata);
    }

    #[test]
    fn explicit_file_overrides_user_file() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let explicit = dir.path().join("explicit.toml");
        fs::write(&user, "[convert]\npage_size = \"letter\"\nmargin_mm = 5.0\n").unwrap();
        fs::write(&explicit, "[convert]\nmargin_mm = 0.0\n").unwrap();

        let config = isolated().with_user_file(Some(user)).with_file(&explicit).load().unwrap();
        assert_eq!(config.convert.page_size, PageSize::Letter);
        assert_eq!(config.convert.margin_mm, 0.0);
    }

    #[test]
    fn missing_user_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let config = isolated().with_user_file(Some(dir.path().join("absent.toml"))).load().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = isolated().with_file(dir.path().join("absent.toml")).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingFile(_)));
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheaf.ini");
        fs::write(&path, "").unwrap();
        let err = isolated().with_file(&path).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn malformed_values_fail_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheaf.toml");
        fs::write(&path, "[compression]\nlevel = \"extreme\"\n").unwrap();
        let err = isolated().with_file(&path).load().unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn loaded_values_are_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheaf.toml");
        fs::write(&path, "[ingest]\npreview_height = 0\n").unwrap();
        let err = isolated().with_file(&path).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn environment_overrides_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheaf.toml");
        fs::write(&path, "[worker]\nmetadata_timeout_ms = 500\n").unwrap();
        // A prefix no other test reads.
        // SAFETY: no other thread reads or writes this variable.
        unsafe {
            std::env::set_var("SHEAF_TEST_ENV_LAYER_WORKER__METADATA_TIMEOUT_MS", "750");
            std::env::set_var("SHEAF_TEST_ENV_LAYER_WORKER__TRANSFORM_TIMEOUT_MS", "60000");
        }
        let config = Loader::new()
            .with_env_prefix("SHEAF_TEST_ENV_LAYER_")
            .with_file(&path)
            .load()
            .unwrap();
        assert_eq!(config.worker.metadata_timeout_ms, 750);
        assert_eq!(config.worker.transform_timeout_ms, Some(60_000));
    }

    #[test]
    fn user_config_lives_in_a_sheaf_directory() {
        if let Some(path) = Loader::user_config_path() {
            assert!(path.ends_with(FILE_NAME));
        }
    }
}
