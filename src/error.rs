use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::path::Path;

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum YamlfigError {
    #[error(transparent)]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(yamlfig::shape),
            help(
                "maps must have string keys and may not contain other maps, only structs can be flattened"
            )
        )
    )]
    Shape(#[from] ShapeError),

    #[error("Config file path is required but none was provided")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(yamlfig::no_path),
            help("pass a path getter with .config_path() or call .file_required(false)")
        )
    )]
    ConfigPathRequired,

    #[error("Config file not found: {}", path.display())]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(yamlfig::not_found)))]
    FileNotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "failed to unmarshal config file into configuration structure ({}): {source}",
        path.display()
    )]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(yamlfig::parse)))]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(
        "failed to unmarshal config file into configuration structure: key \"{key}\" already set in map (at {path})"
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(yamlfig::duplicate_key),
            help("keys are matched case-insensitively against field names")
        )
    )]
    DuplicateKey { path: Path, key: String },

    #[error(transparent)]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(yamlfig::invalid)))]
    Validation(#[from] ValidationErrors),

    #[error("Failed to decode merged configuration: {0}")]
    Decode(#[source] serde_yaml::Error),

    #[error("Failed to serialize configuration: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error("unknown serialization for type {type_name} (please implement Template)")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(yamlfig::unknown_serialization)))]
    UnknownSerialization { type_name: String },

    #[error("failed to write child element {path}: {source}")]
    TemplateChild {
        path: Path,
        source: Box<YamlfigError>,
    },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Failed to write template: {0}")]
    TemplateIo(#[source] std::io::Error),

    #[error("Env prefix is required, call .env_prefix() or .no_env() on the builder")]
    EnvPrefixRequired,
}

/// Static problems with the destination shape, raised before any data is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("maps in config must have string keys but got: {type_name}")]
    NonStringMapKey { path: Path, type_name: String },

    #[error("nested maps are not allowed in config")]
    NestedMaps { path: Path },

    #[error("flattened field {path} must be a struct but got: {type_name}")]
    FlattenNotStruct { path: Path, type_name: String },
}

/// Class of a single validation discrepancy.
///
/// Variant order is the order discrepancies are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscrepancyKind {
    MissingKey,
    ExtraKey,
    TypeMismatch,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiscrepancyKind::MissingKey => "missing key",
            DiscrepancyKind::ExtraKey => "unexpected key",
            DiscrepancyKind::TypeMismatch => "type mismatch",
        })
    }
}

/// One path-qualified problem found while merging and validating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub path: Path,
    pub kind: DiscrepancyKind,
    pub message: String,
}

impl Discrepancy {
    pub fn missing(path: Path, message: impl Into<String>) -> Self {
        Self {
            path,
            kind: DiscrepancyKind::MissingKey,
            message: message.into(),
        }
    }

    pub fn extra(path: Path, message: impl Into<String>) -> Self {
        Self {
            path,
            kind: DiscrepancyKind::ExtraKey,
            message: message.into(),
        }
    }

    pub fn mismatch(path: Path, message: impl Into<String>) -> Self {
        Self {
            path,
            kind: DiscrepancyKind::TypeMismatch,
            message: message.into(),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Every discrepancy found in one load, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors {
    discrepancies: Vec<Discrepancy>,
}

impl ValidationErrors {
    /// Sort into report order: missing, then extra, then type mismatches,
    /// each group by path.
    pub fn new(mut discrepancies: Vec<Discrepancy>) -> Self {
        discrepancies.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.path.cmp(&b.path)));
        discrepancies.dedup();
        Self { discrepancies }
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    pub fn is_empty(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.discrepancies.len()
    }

    pub fn of_kind(&self, kind: DiscrepancyKind) -> impl Iterator<Item = &Discrepancy> {
        self.discrepancies.iter().filter(move |d| d.kind == kind)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configuration does not match the expected structure ({} problem{}):",
            self.discrepancies.len(),
            if self.discrepancies.len() == 1 { "" } else { "s" }
        )?;
        for d in &self.discrepancies {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}
