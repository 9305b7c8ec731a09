//! Locating and reading the config file.
//!
//! Where the file lives is decided by a [`ConfigPathGetter`]: an explicit
//! path, an environment variable, the platform config directory, or the clap
//! `--config` flag. Reading distinguishes a missing file, which is fine when
//! the file is optional, from every other I/O failure.

use std::path::{Path as FsPath, PathBuf};

use tracing::debug;

use crate::error::YamlfigError;

/// Supplies the config file path, if one is known.
pub trait ConfigPathGetter {
    fn config_path(&self) -> Option<PathBuf>;

    /// Path lookup against an explicit environment snapshot. Getters that
    /// do not read the environment keep the default.
    fn config_path_in(&self, _vars: &[(String, String)]) -> Option<PathBuf> {
        self.config_path()
    }
}

impl ConfigPathGetter for PathBuf {
    fn config_path(&self) -> Option<PathBuf> {
        Some(self.clone())
    }
}

impl ConfigPathGetter for Option<PathBuf> {
    fn config_path(&self) -> Option<PathBuf> {
        self.clone()
    }
}

/// Path taken from an environment variable, e.g. `MYAPP_CONFIG_PATH`.
///
/// An unset or empty variable yields no path. When the builder was given an
/// `env_vars` snapshot the variable is looked up there instead of in the
/// process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPath {
    pub var: String,
}

impl EnvPath {
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl ConfigPathGetter for EnvPath {
    fn config_path(&self) -> Option<PathBuf> {
        std::env::var_os(&self.var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn config_path_in(&self, vars: &[(String, String)]) -> Option<PathBuf> {
        vars.iter()
            .rev()
            .find(|(k, _)| *k == self.var)
            .filter(|(_, v)| !v.is_empty())
            .map(|(_, v)| PathBuf::from(v))
    }
}

/// `{platform config dir}/{app_name}/{file_name}`, e.g.
/// `~/.config/myapp/config.yaml` on Linux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPath {
    pub app_name: String,
    pub file_name: String,
}

impl PlatformPath {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            file_name: "config.yaml".to_string(),
        }
    }

    /// Override the file name (default: `config.yaml`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = name.to_string();
        self
    }
}

impl ConfigPathGetter for PlatformPath {
    fn config_path(&self) -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("", "", &self.app_name)?;
        Some(proj.config_dir().join(&self.file_name))
    }
}

/// Read the config file at `path`.
///
/// A missing file is `FileNotFound` when `required`, otherwise `Ok(None)`.
/// Any other I/O failure (permissions, a directory at the path) is an error
/// either way.
pub fn read_config_file(
    path: &FsPath,
    required: bool,
) -> Result<Option<(PathBuf, String)>, YamlfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "read config file");
            Ok(Some((path.to_path_buf(), content)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(YamlfigError::FileNotFound {
                    path: path.to_path_buf(),
                })
            } else {
                debug!(path = %path.display(), "optional config file not found, skipping");
                Ok(None)
            }
        }
        Err(e) => Err(YamlfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
