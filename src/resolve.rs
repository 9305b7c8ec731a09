//! Core resolution pipeline: merge the file and the environment and produce a
//! typed config.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Check the destination shape (string map keys, no nested maps)
//! 2. Parse the file, failing fast on duplicate keys
//! 3. Flatten env vars matching the prefix
//! 4. Merge both along the shape
//! 5. Compare required and supplied leaves, coerce scalars
//! 6. Decode through serde, rejecting anything it ignores

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::decode;
use crate::env::flatten_env;
use crate::error::{ValidationErrors, YamlfigError};
use crate::merge::merge;
use crate::shape::{self, Shape};
use crate::source::RawNode;
use crate::validate::{required_leaves, validate};

/// All pre-loaded data needed to resolve a config. No I/O happens here.
#[derive(Debug, Clone, Default)]
pub struct ResolveInput {
    /// Path and contents of the config file, if one was read.
    pub file: Option<(PathBuf, String)>,
    /// Raw environment variable pairs (a process snapshot or synthetic data).
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix (e.g. `"MYAPP"`). `None` means env disabled.
    pub env_prefix: Option<String>,
}

/// Resolve configuration from pre-loaded inputs.
///
/// Either the whole value is produced or an error is returned; a partially
/// filled config never escapes.
pub fn resolve<T: Shape + DeserializeOwned>(input: ResolveInput) -> Result<T, YamlfigError> {
    let shape = T::shape();
    shape::check(&shape)?;

    let file = match &input.file {
        Some((path, content)) => RawNode::parse(content, path)?,
        None => None,
    };

    let env = match &input.env_prefix {
        Some(prefix) => flatten_env(prefix, input.env_vars),
        None => Vec::new(),
    };
    debug!(entries = env.len(), "collected env entries");

    let merged = merge(&shape, file.as_ref(), &env)?;
    let required = required_leaves(&shape, &merged);

    let mut problems = validate(&required, &merged, input.env_prefix.as_deref());
    let (value, mismatches) = decode::build(&shape, &merged);
    problems.extend(mismatches);

    if !problems.is_empty() {
        let errors = ValidationErrors::new(problems);
        debug!(problems = errors.len(), "configuration rejected");
        return Err(errors.into());
    }

    decode::decode(value)
}
