//! Strict configuration loading for Rust applications: one YAML file plus
//! environment overrides, merged into a typed struct that must be complete.
//!
//! ```ignore
//! #[derive(yamlfig::Config, serde::Serialize, serde::Deserialize)]
//! struct AppConfig {
//!     /// Address to listen on.
//!     listen: String,
//!     workers: u16,
//!     backends: HashMap<String, Backend>,
//! }
//!
//! let config: AppConfig = Yamlfig::builder()
//!     .env_prefix("myapp")
//!     .config_path(PathBuf::from("/etc/myapp/config.yaml"))
//!     .load()?;
//! ```
//!
//! # Strict by design
//!
//! Yamlfig refuses to guess. A load succeeds only when every leaf the struct
//! declares is supplied by the file or the environment, and nothing else is.
//! There are no compiled defaults: forgetting a key in production is an error
//! at startup, not a silent fallback. Every problem in one load is reported at
//! once, each with its path:
//!
//! ```text
//! Configuration does not match the expected structure (3 problems):
//!   missing key level1text: set it in the file or via MYAPP_LEVEL1TEXT
//!   missing key map2.<-key->.level3text
//!   unexpected key nonexistent: not declared, found in file
//! ```
//!
//! `Option<T>` fields are still required keys, but may be `null`.
//!
//! # Environment variables
//!
//! With prefix `myapp`, `MYAPP_LEVEL2_LEVEL3_TEXT` addresses
//! `level2.level3.text`. The prefix is matched case-insensitively, `_`
//! separates segments and segments are lower-cased. Field names containing
//! `_` match across segments (`MYAPP_POOL_SIZE` sets `pool_size`). Env values
//! override the file; env-only keys add map entries and sequence elements.
//! A variable that is set but empty still counts as supplied.
//!
//! Values are weakly typed: `"8080"` decodes into a `u16`, `1` into a
//! `String`, `"t"` into a `bool`.
//!
//! # Maps
//!
//! Map keys must be strings, and a map may not contain another map at any
//! depth (through structs, sequences or options included). Both are checked
//! from the type alone, before any file is read.
//!
//! # Templates
//!
//! [`template`] renders a commented YAML file from a sample value: doc
//! comments become `#` lines, each leaf is annotated with its type, and
//! `#[config(secret)]` fields never print their value.
//!
//! # Clap adapter
//!
//! Behind the `clap` feature (on by default), [`ConfigArgs`] adds a global
//! `--config <PATH>` flag and `config show|gen` subcommands that convert into
//! a framework-free [`ConfigAction`].

pub mod error;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod decode;
mod env;
mod file;
mod merge;
mod ops;
mod path;
mod resolve;
mod shape;
mod source;
mod template;
mod validate;

#[cfg(test)]
mod fixtures;

extern crate self as yamlfig;

pub use builder::{Yamlfig, YamlfigBuilder};
#[cfg(feature = "clap")]
pub use cli::{ConfigArgs, ConfigSubcommand};
pub use error::{Discrepancy, DiscrepancyKind, ShapeError, ValidationErrors, YamlfigError};
pub use file::{ConfigPathGetter, EnvPath, PlatformPath};
pub use ops::{ConfigResult, template, template_to, to_audit_yaml, to_yaml};
pub use path::{MAP_KEY_PLACEHOLDER, Path, Segment};
pub use resolve::{ResolveInput, resolve};
pub use shape::{FieldShape, ScalarKind, Shape, ShapeKind, ShapeNode};
pub use template::{Template, Templater};
pub use types::ConfigAction;
pub use yamlfig_derive::Config;
