use std::path::PathBuf;

/// A config operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Load the configuration and print it as YAML, secrets masked.
    Show,
    /// Render a commented template from a sample value, to stdout or a file.
    Gen { output: Option<PathBuf> },
}
