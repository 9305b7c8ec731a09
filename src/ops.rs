//! Config operations: YAML output, template generation, and result types.
//!
//! Provides the logic behind `config show` and `config gen`, and the
//! `ConfigResult` enum that callers use to display results.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::YamlfigError;
use crate::shape::{FieldShape, Shape, ShapeKind, ShapeNode};
use crate::template::{Template, Templater, trim_trailing_whitespace};

/// Placeholder written in place of `#[config(secret)]` values.
pub const SECRET_MASK: &str = "<secret>";

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// A generated YAML template string.
    Template(String),
    /// Confirmation that a template was written to a file.
    TemplateWritten { path: PathBuf },
    /// The loaded configuration rendered as YAML, secrets masked.
    Resolved(String),
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::Template(t) => write!(f, "{t}"),
            ConfigResult::TemplateWritten { path } => {
                write!(f, "Config template written to {}", path.display())
            }
            ConfigResult::Resolved(yaml) => write!(f, "{yaml}"),
        }
    }
}

/// Serialize a loaded config back to YAML.
///
/// The output loads back into an equal value.
pub fn to_yaml<T: Serialize>(config: &T) -> Result<String, YamlfigError> {
    serde_yaml::to_string(config).map_err(YamlfigError::Encode)
}

/// Like [`to_yaml`], with every `#[config(secret)]` value replaced by
/// `<secret>`. Meant for logs and `config show`.
pub fn to_audit_yaml<T: Serialize + Shape>(config: &T) -> Result<String, YamlfigError> {
    let mut value = serde_yaml::to_value(config).map_err(YamlfigError::Encode)?;
    mask_secrets(&T::shape(), &mut value);
    serde_yaml::to_string(&value).map_err(YamlfigError::Encode)
}

fn mask_secrets(node: &ShapeNode, value: &mut Value) {
    match (&node.kind, value) {
        (ShapeKind::Optional(inner), value) => mask_secrets(inner, value),
        (ShapeKind::Struct(fields), Value::Mapping(mapping)) => {
            mask_fields(fields, mapping);
        }
        (ShapeKind::Map { value: element, .. }, Value::Mapping(mapping)) => {
            for (_, v) in mapping.iter_mut() {
                mask_secrets(element, v);
            }
        }
        (ShapeKind::Seq { element, .. }, Value::Sequence(items)) => {
            for item in items {
                mask_secrets(element, item);
            }
        }
        _ => {}
    }
}

fn mask_fields(fields: &[FieldShape], mapping: &mut serde_yaml::Mapping) {
    for field in fields {
        if field.flatten
            && let ShapeKind::Struct(inner) = &field.node.kind
        {
            mask_fields(inner, mapping);
            continue;
        }
        let Some(v) = mapping.get_mut(field.serialized_name()) else {
            continue;
        };
        if field.secret && !v.is_null() {
            *v = Value::String(SECRET_MASK.to_string());
        } else {
            mask_secrets(&field.node, v);
        }
    }
}

/// Render a commented YAML template from a sample value.
pub fn template<T: Template>(sample: &T) -> Result<String, YamlfigError> {
    let mut out = String::new();
    sample.template_to(&mut Templater::root(&mut out))?;
    Ok(trim_trailing_whitespace(&out))
}

/// Render a template and write it to `writer`. Nothing is written if
/// rendering fails.
pub fn template_to<T: Template>(sample: &T, mut writer: impl Write) -> Result<(), YamlfigError> {
    let text = template(sample)?;
    writer
        .write_all(text.as_bytes())
        .map_err(YamlfigError::TemplateIo)
}
