//! Commented YAML templates rendered from a sample value.
//!
//! Each type renders itself through [`Template`], driven by a [`Templater`]
//! that tracks indentation, the current field's metadata and the path used in
//! error messages. Structs get their impl from `#[derive(Config)]`; a type
//! marked `#[config(custom_template)]` writes its own.
//!
//! ```text
//! # Listen address
//! host: localhost # string
//! ports: # <array> of u16
//!   - 80 # u16
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::YamlfigError;
use crate::path::Path;
use crate::shape::{FieldShape, Shape, short_type_name};

/// A type that can render itself into a YAML template.
pub trait Template: Shape {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError>;
}

/// Field metadata carried into a child renderer.
#[derive(Debug, Clone, Copy, Default)]
struct FieldMeta {
    name: Option<&'static str>,
    comment: Option<&'static str>,
    default: Option<&'static str>,
    secret: bool,
}

impl From<&FieldShape> for FieldMeta {
    fn from(field: &FieldShape) -> Self {
        Self {
            name: Some(field.serialized_name()),
            comment: field.comment,
            default: field.default,
            secret: field.secret,
        }
    }
}

/// Rendering state for one node of the template.
pub struct Templater<'a> {
    out: &'a mut String,
    /// Nesting depth; the root value is at -1 so its fields land at column 0.
    level: i32,
    meta: FieldMeta,
    path: Path,
    prefix_with_space: bool,
    prefix_with_newline: bool,
    /// Set for flattened structs, which share their parent's header.
    inline: bool,
}

impl<'a> Templater<'a> {
    /// Renderer for the top-level value.
    pub fn root(out: &'a mut String) -> Self {
        Self {
            out,
            level: -1,
            meta: FieldMeta::default(),
            path: Path::root(),
            prefix_with_space: false,
            prefix_with_newline: false,
            inline: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Two spaces per level, none at or above the root.
    pub fn indent(&self) -> String {
        indent(self.level)
    }

    /// Append raw text. Custom impls use this for anything the helpers
    /// below do not cover.
    pub fn write_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Write the comment lines and `name: ` of the current field.
    pub fn header(&mut self) {
        if self.inline {
            return;
        }
        let indent = self.indent();
        if let Some(comment) = self.meta.comment {
            for line in comment.lines().map(str::trim).filter(|l| !l.is_empty()) {
                self.out.push_str(&format!("{indent}# {line}\n"));
            }
        }
        if let Some(name) = self.meta.name {
            self.out
                .push_str(&format!("{indent}{}: ", name.to_lowercase()));
        }
    }

    fn space(&mut self) {
        if self.prefix_with_space {
            self.out.push(' ');
        }
    }

    /// Render a scalar line: `value # label`.
    ///
    /// A declared default replaces the sample value. Secret fields print no
    /// value at all.
    pub fn scalar(&mut self, value: impl Display, label: &str) -> Result<(), YamlfigError> {
        self.header();
        self.space();
        if self.meta.secret {
            self.out.push_str(&format!("# {label} (secret)\n"));
        } else if let Some(default) = self.meta.default {
            self.out.push_str(&format!("{default} # {label}\n"));
        } else {
            self.out.push_str(&format!("{value} # {label}\n"));
        }
        Ok(())
    }

    /// Render a scalar with no sample value, e.g. a `None` option.
    pub fn blank(&mut self, label: &str) -> Result<(), YamlfigError> {
        self.header();
        self.space();
        match (self.meta.default, self.meta.secret) {
            (Some(default), false) => self.out.push_str(&format!("{default} # {label}\n")),
            (_, true) => self.out.push_str(&format!("# {label} (secret)\n")),
            (None, false) => self.out.push_str(&format!("# {label}\n")),
        }
        Ok(())
    }

    /// Render a struct: header, then `body` writes each field.
    pub fn structure(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), YamlfigError>,
    ) -> Result<(), YamlfigError> {
        self.header();
        if !self.inline && (self.level > 0 || self.prefix_with_newline) {
            self.out.push('\n');
        }
        body(self)
    }

    /// Render a struct field one level deeper.
    pub fn field<T: Template + ?Sized>(
        &mut self,
        field: &FieldShape,
        value: &T,
    ) -> Result<(), YamlfigError> {
        let path = self.path.field(&field.key());
        let mut child = self.child(path, FieldMeta::from(field), false, true);
        wrap(child.path.clone(), value.template_to(&mut child))
    }

    /// Render a flattened struct's fields at this struct's level.
    pub fn flatten<T: Template + ?Sized>(&mut self, value: &T) -> Result<(), YamlfigError> {
        let mut child = Templater {
            out: &mut *self.out,
            level: self.level,
            meta: FieldMeta::default(),
            path: self.path.clone(),
            prefix_with_space: false,
            prefix_with_newline: false,
            inline: true,
        };
        value.template_to(&mut child)
    }

    /// Render a `#[config(leaf)]` field through serde.
    ///
    /// Only values that serialize to a scalar can be shown on one line.
    pub fn opaque_field<T: Serialize + ?Sized>(
        &mut self,
        field: &FieldShape,
        value: &T,
    ) -> Result<(), YamlfigError> {
        let path = self.path.field(&field.key());
        let label = short_type_name(std::any::type_name::<T>());
        let mut child = self.child(path, FieldMeta::from(field), false, true);
        let result = match serde_yaml::to_value(value).map_err(YamlfigError::Encode) {
            Ok(Value::String(s)) => child.scalar(s, &label),
            Ok(Value::Number(n)) => child.scalar(n, &label),
            Ok(Value::Bool(b)) => child.scalar(b, &label),
            Ok(Value::Null) => child.blank(&label),
            Ok(_) => Err(YamlfigError::UnknownSerialization { type_name: label }),
            Err(e) => Err(e),
        };
        wrap(child.path.clone(), result)
    }

    /// Render a map: annotation line, then one `key:` line per entry in key
    /// order.
    pub fn map<'v, V: Template + 'v>(
        &mut self,
        label: &str,
        entries: impl IntoIterator<Item = (String, &'v V)>,
    ) -> Result<(), YamlfigError> {
        self.header();
        self.space();
        self.out.push_str(&format!("# {label}\n"));

        let sorted: BTreeMap<String, &V> = entries.into_iter().collect();
        let indent = indent(self.level + 1);
        for (key, value) in sorted {
            self.out.push_str(&format!("{indent}{key}:"));
            let path = self.path.key(&key);
            let mut child = self.child(path, FieldMeta::default(), true, false);
            wrap(child.path.clone(), value.template_to(&mut child))?;
        }
        Ok(())
    }

    /// Render a sequence: annotation line, then one `-` line per element.
    pub fn sequence<'v, V: Template + 'v>(
        &mut self,
        label: &str,
        items: impl IntoIterator<Item = &'v V>,
    ) -> Result<(), YamlfigError> {
        self.header();
        self.space();
        self.out.push_str(&format!("# {label}\n"));

        let indent = indent(self.level + 1);
        for (idx, item) in items.into_iter().enumerate() {
            self.out.push_str(&format!("{indent}-"));
            let path = self.path.index(idx);
            let mut child = self.child(path, FieldMeta::default(), true, false);
            wrap(child.path.clone(), item.template_to(&mut child))?;
        }
        Ok(())
    }

    fn child(
        &mut self,
        path: Path,
        meta: FieldMeta,
        prefix_with_space: bool,
        prefix_with_newline: bool,
    ) -> Templater<'_> {
        Templater {
            out: &mut *self.out,
            level: self.level + 1,
            meta,
            path,
            prefix_with_space,
            prefix_with_newline,
            inline: false,
        }
    }
}

impl fmt::Debug for Templater<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templater")
            .field("level", &self.level)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn indent(level: i32) -> String {
    "  ".repeat(level.max(0) as usize)
}

/// Attach the failing element's path, once, at the innermost level.
fn wrap(path: Path, result: Result<(), YamlfigError>) -> Result<(), YamlfigError> {
    result.map_err(|e| match e {
        YamlfigError::TemplateChild { .. } => e,
        other => YamlfigError::TemplateChild {
            path,
            source: Box::new(other),
        },
    })
}

/// Strip trailing whitespace from every line.
pub fn trim_trailing_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match line.strip_suffix('\n') {
            Some(body) => {
                out.push_str(body.trim_end());
                out.push('\n');
            }
            None => out.push_str(line.trim_end()),
        }
    }
    out
}

macro_rules! scalar_template {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Template for $ty {
                fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
                    t.scalar(self, &<$ty as Shape>::shape().label())
                }
            }
        )+
    };
}

scalar_template!(
    bool, f32, f64, String, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize,
);

impl Template for PathBuf {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        t.scalar(self.display(), &Self::shape().label())
    }
}

impl<T: Template> Template for Option<T> {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        match self {
            Some(value) => value.template_to(t),
            None => t.blank(&T::shape().label()),
        }
    }
}

impl<T: Template> Template for Box<T> {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        (**self).template_to(t)
    }
}

impl<T: Template> Template for Vec<T> {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        t.sequence(&Self::shape().label(), self.iter())
    }
}

impl<T: Template, const N: usize> Template for [T; N] {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        t.sequence(&Self::shape().label(), self.iter())
    }
}

impl<K: Shape + Display, V: Template, S> Template for HashMap<K, V, S> {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        t.map(
            &Self::shape().label(),
            self.iter().map(|(k, v)| (k.to_string(), v)),
        )
    }
}

impl<K: Shape + Display, V: Template> Template for BTreeMap<K, V> {
    fn template_to(&self, t: &mut Templater<'_>) -> Result<(), YamlfigError> {
        t.map(
            &Self::shape().label(),
            self.iter().map(|(k, v)| (k.to_string(), v)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Broken, Defaulted, Mode, WithBroken, WithLeaf, sample};

    fn render<T: Template>(value: &T) -> Result<String, YamlfigError> {
        let mut out = String::new();
        value.template_to(&mut Templater::root(&mut out))?;
        Ok(trim_trailing_whitespace(&out))
    }

    #[test]
    fn top_level_scalar_fields() {
        let s = render(&sample()).unwrap();
        assert!(
            s.contains("# List\nlist: # <array> of string"),
            "got:\n{s}"
        );
        assert!(s.contains("- val1 # string"));
        assert!(s.contains("- val2 # string"));
        assert!(s.contains("- val3 # string"));
    }

    #[test]
    fn secret_value_is_not_printed() {
        let s = render(&sample()).unwrap();
        assert!(s.contains("# Example secret value\nsimple: # string (secret)\n"));
        assert!(!s.contains("example"));
    }

    #[test]
    fn map_of_strings() {
        let s = render(&sample()).unwrap();
        assert!(s.contains("\n# Map\nmap: # <map> of string\n"));
        assert!(s.contains("\n  key1: value1 # string"));
        assert!(s.contains("\n  key2: value2 # string"));
        assert!(s.contains("\n  key3: value3 # string"));
    }

    #[test]
    fn list_of_structs() {
        let s = render(&sample()).unwrap();
        assert!(s.contains("\n# List of structs\nlistofstruct: # <array> of Inner\n"));
        assert!(s.contains(
            "\n  -\n    # First inner field\n    f1: firstValue # string\n    # Second inner field\n    f2: secondValue # string"
        ));
        assert!(s.contains(
            "\n  -\n    # First inner field\n    f1: value1 # string\n    # Second inner field\n    f2: value2 # string"
        ));
    }

    #[test]
    fn map_of_structs() {
        let s = render(&sample()).unwrap();
        assert!(s.contains("\n# Map of structs\nmapofstruct: # <map> of Inner\n"));
        assert!(s.contains(
            "\n  key1:\n    # First inner field\n    f1: value1 # string\n    # Second inner field\n    f2: value2 # string"
        ));
        assert!(s.contains(
            "\n  key2:\n    # First inner field\n    f1: value3 # string\n    # Second inner field\n    f2: value4 # string"
        ));
    }

    #[test]
    fn nested_struct() {
        let s = render(&sample()).unwrap();
        assert!(s.contains(
            "\ninner:\n  # First inner field\n  f1: innerField1 # string\n  # Second inner field\n  f2: innerField2 # string"
        ));
    }

    #[test]
    fn map_entries_are_sorted() {
        let s = render(&sample()).unwrap();
        let k1 = s.find("  key1: value1").unwrap();
        let k3 = s.find("  key3: value3").unwrap();
        assert!(k1 < k3);
    }

    #[test]
    fn no_trailing_whitespace() {
        let s = render(&sample()).unwrap();
        for line in s.lines() {
            assert_eq!(line, line.trim_end(), "line has trailing whitespace");
        }
    }

    #[test]
    fn default_replaces_sample_value() {
        let s = render(&Defaulted::default()).unwrap();
        assert!(s.contains("port: 8080 # u16"), "got:\n{s}");
    }

    #[test]
    fn comment_precedes_default_line() {
        let s = render(&Defaulted::default()).unwrap();
        assert!(s.starts_with("# Listen port\nport: 8080 # u16\n"), "got:\n{s}");
    }

    #[test]
    fn unit_enum_leaf_renders_through_serde() {
        let value = WithLeaf {
            mode: Mode::Fast,
            pairs: None,
        };
        let s = render(&value).unwrap();
        assert!(s.contains("mode: fast # Mode"), "got:\n{s}");
    }

    #[test]
    fn non_scalar_leaf_is_unknown_serialization() {
        let value = WithLeaf {
            mode: Mode::Fast,
            pairs: Some(vec![("a".into(), 1)]),
        };
        let err = render(&value).unwrap_err();
        match err {
            YamlfigError::TemplateChild { path, source } => {
                assert_eq!(path.to_string(), "pairs");
                match *source {
                    YamlfigError::UnknownSerialization { type_name } => {
                        assert_eq!(type_name, "Option<Vec<(String, u8)>>");
                    }
                    other => panic!("Expected UnknownSerialization, got: {other:?}"),
                }
            }
            other => panic!("Expected TemplateChild, got: {other:?}"),
        }
    }

    #[test]
    fn failing_custom_template_fails_dump() {
        let err = render(&WithBroken { broken: Broken }).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to write child element broken"), "{msg}");
        assert!(msg.contains("cannot render"), "{msg}");
    }

    #[test]
    fn trim_keeps_final_newline() {
        assert_eq!(trim_trailing_whitespace("a: \nb:  \n"), "a:\nb:\n");
        assert_eq!(trim_trailing_whitespace("x  "), "x");
    }
}
