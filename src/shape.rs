//! Declared structure of a configuration type.
//!
//! Every loadable type implements [`Shape`], which describes its structure as
//! a [`ShapeNode`] tree without touching any data. Scalars, `Option`, `Box`,
//! `Vec`, arrays and string-keyed maps are covered here; structs get their
//! impl from `#[derive(Config)]`.
//!
//! [`check`] enforces the two static rules of the loader before anything is
//! read: map keys must be strings, and a map may not contain another map at
//! any depth.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::ShapeError;
use crate::path::{MAP_KEY_PLACEHOLDER, Path};

/// A type whose structure can be described as a [`ShapeNode`].
pub trait Shape {
    fn shape() -> ShapeNode;
}

/// Scalar categories used for weak-typed coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Integer { signed: bool, bits: u32 },
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Scalar(ScalarKind),
    /// A leaf whose content is passed to serde untouched.
    Opaque,
    Optional(Box<ShapeNode>),
    Struct(Vec<FieldShape>),
    Map {
        key: Box<ShapeNode>,
        value: Box<ShapeNode>,
    },
    Seq {
        element: Box<ShapeNode>,
        /// Fixed length for arrays, `None` for growable sequences.
        len: Option<usize>,
    },
}

/// One node of the reflected destination type.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    pub type_name: &'static str,
    pub kind: ShapeKind,
}

impl ShapeNode {
    pub fn scalar<T: ?Sized>(kind: ScalarKind) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Scalar(kind),
        }
    }

    pub fn opaque<T: ?Sized>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Opaque,
        }
    }

    pub fn optional<T: ?Sized>(inner: ShapeNode) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Optional(Box::new(inner)),
        }
    }

    pub fn structure<T: ?Sized>(fields: Vec<FieldShape>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Struct(fields),
        }
    }

    pub fn map<T: ?Sized>(key: ShapeNode, value: ShapeNode) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
        }
    }

    pub fn sequence<T: ?Sized>(element: ShapeNode, len: Option<usize>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Seq {
                element: Box::new(element),
                len,
            },
        }
    }

    /// Whether this node is addressed by a single leaf path.
    pub fn is_leaf(&self) -> bool {
        match &self.kind {
            ShapeKind::Scalar(_) | ShapeKind::Opaque => true,
            ShapeKind::Optional(inner) => inner.is_leaf(),
            _ => false,
        }
    }

    /// Fields of a struct node, empty for every other kind.
    pub fn struct_fields(&self) -> &[FieldShape] {
        match &self.kind {
            ShapeKind::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// Struct fields with `flatten` fields replaced by their own fields.
    pub fn effective_fields(&self) -> Vec<&FieldShape> {
        let mut out = Vec::new();
        collect_effective(self.struct_fields(), &mut out);
        out
    }

    /// Human-readable type used in templates and error messages.
    pub fn label(&self) -> String {
        match &self.kind {
            ShapeKind::Scalar(ScalarKind::String) => "string".to_string(),
            ShapeKind::Optional(inner) => inner.label(),
            ShapeKind::Map { value, .. } => format!("<map> of {}", value.label()),
            ShapeKind::Seq { element, .. } => format!("<array> of {}", element.label()),
            _ => short_type_name(self.type_name),
        }
    }
}

fn collect_effective<'a>(fields: &'a [FieldShape], out: &mut Vec<&'a FieldShape>) {
    for field in fields {
        if field.flatten && matches!(field.node.kind, ShapeKind::Struct(_)) {
            collect_effective(field.node.struct_fields(), out);
        } else {
            out.push(field);
        }
    }
}

/// Strip module paths from a type name: `alloc::vec::Vec<my::Inner>` becomes
/// `Vec<Inner>`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut token = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            token.clear();
        } else if c.is_alphanumeric() || c == '_' {
            token.push(c);
        } else {
            out.push_str(&token);
            token.clear();
            out.push(c);
        }
    }
    out.push_str(&token);
    out
}

/// A named struct field and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    /// Rust field name.
    pub name: &'static str,
    /// Serialization name override (`#[serde(rename)]`).
    pub rename: Option<&'static str>,
    pub comment: Option<&'static str>,
    /// Default literal shown in generated templates.
    pub default: Option<&'static str>,
    pub secret: bool,
    /// Promoted into the parent's namespace (`#[serde(flatten)]`).
    pub flatten: bool,
    pub node: ShapeNode,
}

impl FieldShape {
    pub fn new(name: &'static str, node: ShapeNode) -> Self {
        Self {
            name,
            rename: None,
            comment: None,
            default: None,
            secret: false,
            flatten: false,
            node,
        }
    }

    pub fn rename(mut self, rename: &'static str) -> Self {
        self.rename = Some(rename);
        self
    }

    pub fn comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn default_value(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// The name serde uses for this field.
    pub fn serialized_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }

    /// The lower-cased name used in paths, templates and key matching.
    pub fn key(&self) -> String {
        self.serialized_name().to_lowercase()
    }
}

/// Reject shapes the loader cannot express.
///
/// Runs against the declared type only, so it fails the same way whether
/// data comes from a file, the environment, or nowhere.
pub fn check(node: &ShapeNode) -> Result<(), ShapeError> {
    check_node(node, &Path::root(), false)
}

fn check_node(node: &ShapeNode, path: &Path, inside_map: bool) -> Result<(), ShapeError> {
    match &node.kind {
        ShapeKind::Scalar(_) | ShapeKind::Opaque => Ok(()),
        ShapeKind::Optional(inner) => check_node(inner, path, inside_map),
        ShapeKind::Struct(fields) => {
            for field in fields {
                if field.flatten && !matches!(field.node.kind, ShapeKind::Struct(_)) {
                    return Err(ShapeError::FlattenNotStruct {
                        path: path.field(field.name),
                        type_name: field.node.label(),
                    });
                }
                check_node(&field.node, &path.field(&field.key()), inside_map)?;
            }
            Ok(())
        }
        ShapeKind::Seq { element, .. } => check_node(element, &path.index(0), inside_map),
        ShapeKind::Map { key, value } => {
            if inside_map {
                return Err(ShapeError::NestedMaps { path: path.clone() });
            }
            if !matches!(key.kind, ShapeKind::Scalar(ScalarKind::String)) {
                return Err(ShapeError::NonStringMapKey {
                    path: path.clone(),
                    type_name: key.label(),
                });
            }
            check_node(value, &path.key(MAP_KEY_PLACEHOLDER), true)
        }
    }
}

macro_rules! scalar_shape {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Shape for $ty {
                fn shape() -> ShapeNode {
                    ShapeNode::scalar::<$ty>($kind)
                }
            }
        )+
    };
}

macro_rules! integer_shape {
    ($($ty:ty => $signed:expr),+ $(,)?) => {
        $(
            impl Shape for $ty {
                fn shape() -> ShapeNode {
                    ShapeNode::scalar::<$ty>(ScalarKind::Integer {
                        signed: $signed,
                        bits: <$ty>::BITS,
                    })
                }
            }
        )+
    };
}

scalar_shape!(ScalarKind::Bool => bool);
scalar_shape!(ScalarKind::Float => f32, f64);
scalar_shape!(ScalarKind::String => String, PathBuf);
integer_shape!(
    i8 => true, i16 => true, i32 => true, i64 => true, isize => true,
    u8 => false, u16 => false, u32 => false, u64 => false, usize => false,
);

impl<T: Shape> Shape for Option<T> {
    fn shape() -> ShapeNode {
        ShapeNode::optional::<Self>(T::shape())
    }
}

impl<T: Shape> Shape for Box<T> {
    fn shape() -> ShapeNode {
        T::shape()
    }
}

impl<T: Shape> Shape for Vec<T> {
    fn shape() -> ShapeNode {
        ShapeNode::sequence::<Self>(T::shape(), None)
    }
}

impl<T: Shape, const N: usize> Shape for [T; N] {
    fn shape() -> ShapeNode {
        ShapeNode::sequence::<Self>(T::shape(), Some(N))
    }
}

impl<K: Shape, V: Shape, S> Shape for HashMap<K, V, S> {
    fn shape() -> ShapeNode {
        ShapeNode::map::<Self>(K::shape(), V::shape())
    }
}

impl<K: Shape, V: Shape> Shape for BTreeMap<K, V> {
    fn shape() -> ShapeNode {
        ShapeNode::map::<Self>(K::shape(), V::shape())
    }
}
