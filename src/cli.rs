//! Clap adapter for yamlfig.
//!
//! Compiled only when the `clap` Cargo feature is enabled (on by default).
//! [`ConfigArgs`] adds a global `--config <PATH>` flag and the
//! `show|gen` subcommands to an application's clap parser.
//!
//! The bridge to the core is [`ConfigArgs::into_action()`], which converts
//! parsed arguments into a [`ConfigAction`](crate::ConfigAction), and the
//! [`ConfigPathGetter`] impl, which hands the `--config` path to the builder.
//! Without clap, construct `ConfigAction` values and path getters directly.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::file::ConfigPathGetter;
use crate::types::ConfigAction;

/// Clap-derived args for the `config` subcommand group.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(subcommand)]
///     command: Commands,
/// }
///
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(ConfigArgs),
/// }
///
/// // Commands::Config(args) =>
/// Yamlfig::builder::<AppConfig>()
///     .env_prefix("myapp")
///     .config_path(args.clone())
///     .handle_and_print(&args.into_action())?;
/// ```
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Path to the YAML config file.
    #[arg(long = "config", short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Option<ConfigSubcommand>,
}

/// Available config subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigSubcommand {
    /// Load the configuration and print it as YAML, secrets masked.
    Show,
    /// Generate a commented sample configuration file.
    Gen {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl ConfigArgs {
    /// Convert clap-parsed args into a framework-agnostic `ConfigAction`.
    ///
    /// Bare `config` (no subcommand) and explicit `config show` both map to
    /// `ConfigAction::Show`.
    pub fn into_action(self) -> ConfigAction {
        match self.action {
            None | Some(ConfigSubcommand::Show) => ConfigAction::Show,
            Some(ConfigSubcommand::Gen { output }) => ConfigAction::Gen { output },
        }
    }
}

impl ConfigPathGetter for ConfigArgs {
    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone()
    }
}
