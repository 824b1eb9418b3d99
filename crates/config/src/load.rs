use crate::error::{ErrorKind, Result};
use crate::{Config, Overrides};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "LIBPROBE_";
const DEFAULT_FILE_NAME: &str = "config.toml";

/// Builds a [`Config`] from layered providers.
///
/// ```no_run
/// use libprobe_config::{Loader, Overrides};
///
/// # fn example() -> libprobe_config::error::Result<()> {
/// let config = Loader::new().with_default_file().with_env().with_overrides(Overrides::default()).load()?;
/// # Ok(())
/// # }
/// ```
pub struct Loader {
    figment: Figment,
}
impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
impl Loader {
    pub fn new() -> Self {
        Self { figment: Figment::from(Serialized::defaults(Config::default())) }
    }

    /// Merge `config.toml` from the platform configuration directory, if
    /// there is one. Its absence is not an error.
    pub fn with_default_file(self) -> Self {
        match Self::default_file() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Loading default configuration file");
                Self { figment: self.figment.merge(Toml::file(path)) }
            },
            _ => self,
        }
    }

    /// Merge an explicitly requested configuration file. Unlike
    /// [`with_default_file`](Self::with_default_file), a missing file is an
    /// error here.
    pub fn with_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        let figment = match extension.as_deref() {
            Some("toml") => self.figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => self.figment.merge(Yaml::file(path)),
            Some("json") => self.figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
        Ok(Self { figment })
    }

    pub fn with_env(self) -> Self {
        Self { figment: self.figment.merge(Env::prefixed(ENV_PREFIX).split("__")) }
    }

    pub fn with_overrides(self, overrides: Overrides) -> Self {
        Self { figment: self.figment.merge(Serialized::defaults(overrides)) }
    }

    /// Extract and validate the merged configuration.
    pub fn load(self) -> Result<Config> {
        let config: Config =
            self.figment.extract().map_err(|e| exn::Exn::from(ErrorKind::Invalid(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    fn default_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "libprobe").map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccumulationMode, FolderOverrides, Pipeline, ProbeOverrides};
    use figment::Jail;
    use std::io::Write;

    const COMPLETE_TOML: &str = r#"
        catalog = "library_index.json"
        examples = true

        [folders]
        hardware = ["/opt/hardware"]
        tools = ["/opt/tools"]
        libraries = ["/home/user/libraries"]

        [probe]
        timeout_secs = 30
    "#;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_file(".toml", COMPLETE_TOML);
        let config = Loader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.catalog, Some(PathBuf::from("library_index.json")));
        assert!(config.examples);
        assert!(!config.force);
        assert_eq!(config.probe.timeout_secs, 30);
        assert_eq!(config.folders.libraries, vec![PathBuf::from("/home/user/libraries")]);
    }

    #[test]
    fn test_load_yaml_command_pipeline() {
        let yaml = r#"
catalog: index.json
folders:
  hardware: [/hw]
  tools: [/tools]
  libraries: [/libs]
probe:
  pipeline:
    kind: command
    program: arduino-builder-wrapper
    args: ["--quiet"]
"#;
        let file = write_file(".yaml", yaml);
        let config = Loader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(
            config.probe.pipeline,
            Pipeline::Command { program: "arduino-builder-wrapper".to_string(), args: vec!["--quiet".to_string()] }
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Loader::new().with_file("/definitely/not/here.toml").err().unwrap();
        assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let file = write_file(".ini", "catalog=x");
        let err = Loader::new().with_file(file.path()).err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_mandatory_folders() {
        let file = write_file(".toml", r#"catalog = "index.json""#);
        let err = Loader::new().with_file(file.path()).unwrap().load().unwrap_err();
        assert_eq!(*err, ErrorKind::MissingParameter("hardware"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let file = write_file(".toml", COMPLETE_TOML);
        let overrides = Overrides {
            force: Some(true),
            accumulation: Some(AccumulationMode::Session),
            folders: FolderOverrides { libraries: vec![PathBuf::from("/elsewhere")], ..Default::default() },
            probe: ProbeOverrides { timeout_secs: Some(5), pipeline: None },
            ..Default::default()
        };
        let config = Loader::new().with_file(file.path()).unwrap().with_overrides(overrides).load().unwrap();
        assert!(config.force);
        // Not overridden; survives from the file.
        assert!(config.examples);
        assert_eq!(config.accumulation, AccumulationMode::Session);
        assert_eq!(config.probe.timeout_secs, 5);
        assert_eq!(config.folders.libraries, vec![PathBuf::from("/elsewhere")]);
        assert_eq!(config.folders.hardware, vec![PathBuf::from("/opt/hardware")]);
    }

    #[test]
    fn test_environment_layer() {
        Jail::expect_with(|jail| {
            jail.create_file("libprobe.toml", COMPLETE_TOML)?;
            jail.set_env("LIBPROBE_FORCE", "true");
            jail.set_env("LIBPROBE_PROBE__TIMEOUT_SECS", "12");
            let config = Loader::new().with_file("libprobe.toml").unwrap().with_env().load().unwrap();
            assert!(config.force);
            assert_eq!(config.probe.timeout_secs, 12);
            Ok(())
        });
    }
}
