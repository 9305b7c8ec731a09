use std::marker::PhantomData;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::env;
use crate::error::YamlfigError;
use crate::file::{self, ConfigPathGetter};
use crate::ops::{self, ConfigResult};
use crate::resolve::{self, ResolveInput};
use crate::shape::{self, Shape};
use crate::template::Template;
use crate::types::ConfigAction;

/// Entry point for building a yamlfig configuration.
pub struct Yamlfig;

impl Yamlfig {
    pub fn builder<T: Shape + DeserializeOwned>() -> YamlfigBuilder<T> {
        YamlfigBuilder::new()
    }
}

/// Builder for loading one config file plus environment overrides into `T`.
///
/// - **File**: [`config_path()`](Self::config_path) supplies the location,
///   [`file_required()`](Self::file_required) decides whether it may be absent.
/// - **Environment**: [`env_prefix()`](Self::env_prefix) is required unless
///   [`no_env()`](Self::no_env) is called. [`env_vars()`](Self::env_vars)
///   replaces the process environment with a snapshot.
pub struct YamlfigBuilder<T> {
    env_prefix: Option<String>,
    env_enabled: bool,
    env_vars: Option<Vec<(String, String)>>,
    path_getter: Option<Box<dyn ConfigPathGetter>>,
    file_required: bool,
    _phantom: PhantomData<T>,
}

impl<T: Shape + DeserializeOwned> YamlfigBuilder<T> {
    fn new() -> Self {
        Self {
            env_prefix: None,
            env_enabled: true,
            env_vars: None,
            path_getter: None,
            file_required: true,
            _phantom: PhantomData,
        }
    }

    /// Set the environment variable prefix, e.g. `"myapp"` for `MYAPP_PORT`.
    /// Matched case-insensitively.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Use these variables instead of the process environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Where to find the config file. See [`ConfigPathGetter`] for the
    /// available sources.
    pub fn config_path(mut self, getter: impl ConfigPathGetter + 'static) -> Self {
        self.path_getter = Some(Box::new(getter));
        self
    }

    /// Whether the config file must exist (default: `true`).
    ///
    /// When `false`, a missing file or an unknown path means every key has
    /// to come from the environment.
    pub fn file_required(mut self, required: bool) -> Self {
        self.file_required = required;
        self
    }

    /// Resolve the effective env prefix (None if env disabled).
    fn effective_env_prefix(&self) -> Result<Option<String>, YamlfigError> {
        if !self.env_enabled {
            return Ok(None);
        }
        match &self.env_prefix {
            Some(prefix) if !prefix.is_empty() => Ok(Some(prefix.clone())),
            _ => Err(YamlfigError::EnvPrefixRequired),
        }
    }

    /// Resolve the effective config path, or `None` when the file is optional
    /// and no path is known.
    fn effective_path(&self) -> Result<Option<PathBuf>, YamlfigError> {
        let path = self
            .path_getter
            .as_ref()
            .and_then(|g| match &self.env_vars {
                Some(vars) => g.config_path_in(vars),
                None => g.config_path(),
            });
        match path {
            Some(path) => Ok(Some(path)),
            None if self.file_required => Err(YamlfigError::ConfigPathRequired),
            None => {
                debug!("no config path, loading from environment only");
                Ok(None)
            }
        }
    }

    /// Build the `ResolveInput` from current builder state.
    fn build_input(&self) -> Result<ResolveInput, YamlfigError> {
        let env_prefix = self.effective_env_prefix()?;

        let file = match self.effective_path()? {
            Some(path) => file::read_config_file(&path, self.file_required)?,
            None => None,
        };

        let env_vars = match (&env_prefix, &self.env_vars) {
            (None, _) => Vec::new(),
            (Some(_), Some(vars)) => vars.clone(),
            (Some(_), None) => env::process_vars(),
        };

        Ok(ResolveInput {
            file,
            env_vars,
            env_prefix,
        })
    }

    /// Load and validate the configuration.
    ///
    /// The shape of `T` is checked before any file is touched.
    pub fn load(self) -> Result<T, YamlfigError> {
        shape::check(&T::shape())?;
        let input = self.build_input()?;
        let config = resolve::resolve(input)?;
        debug!(type_name = std::any::type_name::<T>(), "configuration loaded");
        Ok(config)
    }

    /// Load into an existing value. `target` is only replaced on success.
    pub fn load_into(self, target: &mut T) -> Result<(), YamlfigError> {
        *target = self.load()?;
        Ok(())
    }

    /// Handle a `ConfigAction` and print the result to stdout.
    pub fn handle_and_print(self, action: &ConfigAction) -> Result<(), YamlfigError>
    where
        T: Serialize + Template + Default,
    {
        let result = self.handle(action)?;
        println!("{result}");
        Ok(())
    }

    /// Handle a `ConfigAction` (show / gen).
    ///
    /// `Gen` renders the template from `T::default()` and does not load
    /// anything.
    pub fn handle(self, action: &ConfigAction) -> Result<ConfigResult, YamlfigError>
    where
        T: Serialize + Template + Default,
    {
        match action {
            ConfigAction::Show => {
                let config = self.load()?;
                ops::to_audit_yaml(&config).map(ConfigResult::Resolved)
            }
            ConfigAction::Gen { output } => {
                let template = ops::template(&T::default())?;
                match output {
                    Some(path) => {
                        if let Some(parent) = path.parent()
                            && !parent.as_os_str().is_empty()
                        {
                            std::fs::create_dir_all(parent).map_err(|e| YamlfigError::Io {
                                path: parent.to_path_buf(),
                                source: e,
                            })?;
                        }
                        std::fs::write(path, &template).map_err(|e| YamlfigError::Io {
                            path: path.clone(),
                            source: e,
                        })?;
                        Ok(ConfigResult::TemplateWritten { path: path.clone() })
                    }
                    None => Ok(ConfigResult::Template(template)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscrepancyKind, ShapeError};
    use crate::file::EnvPath;
    use crate::fixtures::test::{Credentials, Defaulted, IntKeyMap, Pooled, Typed};
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn env_enabled_requires_prefix() {
        let builder = Yamlfig::builder::<Pooled>();
        match builder.effective_env_prefix() {
            Err(YamlfigError::EnvPrefixRequired) => {}
            other => panic!("Expected EnvPrefixRequired, got: {other:?}"),
        }
    }

    #[test]
    fn no_env_disables_prefix() {
        let builder = Yamlfig::builder::<Pooled>().env_prefix("myapp").no_env();
        assert_eq!(builder.effective_env_prefix().unwrap(), None);
    }

    #[test]
    fn required_file_needs_a_path() {
        let err = Yamlfig::builder::<Pooled>().no_env().load().unwrap_err();
        match err {
            YamlfigError::ConfigPathRequired => {}
            other => panic!("Expected ConfigPathRequired, got: {other:?}"),
        }
    }

    #[test]
    fn load_with_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "pool_size: 4\n");

        let config: Pooled = Yamlfig::builder()
            .no_env()
            .config_path(path)
            .load()
            .unwrap();
        assert_eq!(config.pool_size, 4);
    }

    #[test]
    fn env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "pool_size: 4\n");

        let config: Pooled = Yamlfig::builder()
            .env_prefix("myapp")
            .env_vars([("MYAPP_POOL_SIZE", "16"), ("OTHER_POOL_SIZE", "1")])
            .config_path(path)
            .load()
            .unwrap();
        assert_eq!(config.pool_size, 16);
    }

    #[test]
    fn optional_file_missing_uses_env() {
        let dir = TempDir::new().unwrap();
        let config: Pooled = Yamlfig::builder()
            .env_prefix("myapp")
            .env_vars([("MYAPP_POOL_SIZE", "2")])
            .config_path(dir.path().join("absent.yaml"))
            .file_required(false)
            .load()
            .unwrap();
        assert_eq!(config.pool_size, 2);
    }

    #[test]
    fn env_path_resolved_from_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "pool_size: 5\n");
        let path_value = path.to_string_lossy().into_owned();

        let config: Pooled = Yamlfig::builder()
            .env_prefix("myapp")
            .env_vars([("APP_CONFIG_PATH", path_value.as_str())])
            .config_path(EnvPath::new("APP_CONFIG_PATH"))
            .load()
            .unwrap();
        assert_eq!(config.pool_size, 5);
    }

    #[test]
    fn env_path_missing_from_snapshot_requires_path() {
        let err = Yamlfig::builder::<Pooled>()
            .env_prefix("myapp")
            .env_vars(Vec::<(String, String)>::new())
            .config_path(EnvPath::new("APP_CONFIG_PATH"))
            .load()
            .unwrap_err();
        assert!(matches!(err, YamlfigError::ConfigPathRequired));
    }

    #[test]
    fn optional_file_without_path_uses_env() {
        let config: Pooled = Yamlfig::builder()
            .env_prefix("myapp")
            .env_vars([("MYAPP_POOL_SIZE", "3")])
            .config_path(None::<PathBuf>)
            .file_required(false)
            .load()
            .unwrap();
        assert_eq!(config.pool_size, 3);
    }

    #[test]
    fn required_file_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Yamlfig::builder::<Pooled>()
            .no_env()
            .config_path(dir.path().join("absent.yaml"))
            .load()
            .unwrap_err();
        assert!(matches!(err, YamlfigError::FileNotFound { .. }));
    }

    #[test]
    fn shape_checked_before_io() {
        let dir = TempDir::new().unwrap();
        let err = Yamlfig::builder::<IntKeyMap>()
            .no_env()
            .config_path(dir.path().join("absent.yaml"))
            .load()
            .unwrap_err();
        match err {
            YamlfigError::Shape(ShapeError::NonStringMapKey { .. }) => {}
            other => panic!("Expected NonStringMapKey, got: {other:?}"),
        }
    }

    #[test]
    fn missing_keys_reported_with_env_hint() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "port: 80\n");
        let err = Yamlfig::builder::<Typed>()
            .env_prefix("myapp")
            .env_vars(Vec::<(String, String)>::new())
            .config_path(path)
            .load()
            .unwrap_err();
        match err {
            YamlfigError::Validation(errors) => {
                assert!(
                    errors
                        .of_kind(DiscrepancyKind::MissingKey)
                        .any(|d| d.path.to_string() == "ratio")
                );
                assert!(
                    errors.to_string().contains("MYAPP_RATIO"),
                    "{errors}"
                );
            }
            other => panic!("Expected Validation, got: {other:?}"),
        }
    }

    #[test]
    fn load_into_replaces_on_success_only() {
        let dir = TempDir::new().unwrap();
        let mut target = Pooled { pool_size: 1 };

        let bad = write_config(&dir, "pool_size: many\n");
        assert!(
            Yamlfig::builder()
                .no_env()
                .config_path(bad)
                .load_into(&mut target)
                .is_err()
        );
        assert_eq!(target.pool_size, 1);

        let good = write_config(&dir, "pool_size: 9\n");
        Yamlfig::builder()
            .no_env()
            .config_path(good)
            .load_into(&mut target)
            .unwrap();
        assert_eq!(target.pool_size, 9);
    }

    #[test]
    fn handle_show_masks_secrets() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "user: admin\npassword: hunter2\n");
        let result = Yamlfig::builder::<Credentials>()
            .no_env()
            .config_path(path)
            .handle(&ConfigAction::Show)
            .unwrap();
        match result {
            ConfigResult::Resolved(yaml) => {
                assert!(yaml.contains("user: admin"));
                assert!(!yaml.contains("hunter2"));
            }
            other => panic!("Expected Resolved, got: {other:?}"),
        }
    }

    #[test]
    fn handle_gen() {
        let result = Yamlfig::builder::<Defaulted>()
            .handle(&ConfigAction::Gen { output: None })
            .unwrap();
        match result {
            ConfigResult::Template(text) => {
                assert!(
                    text.contains("# Listen port\nport: 8080 # u16\n"),
                    "got:\n{text}"
                );
                assert!(text.contains("# Display name\nname:"), "got:\n{text}");
            }
            other => panic!("Expected Template, got: {other:?}"),
        }
    }

    #[test]
    fn handle_gen_with_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("app.yaml");
        let result = Yamlfig::builder::<Defaulted>()
            .handle(&ConfigAction::Gen {
                output: Some(out.clone()),
            })
            .unwrap();
        assert_eq!(result, ConfigResult::TemplateWritten { path: out.clone() });
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("port: 8080"));
    }
}
