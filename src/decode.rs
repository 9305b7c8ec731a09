//! Weakly typed coercion and the final strict decode.
//!
//! Leaves are coerced to the scalar kind the shape declares (`"8080"` into
//! `u16`, `1` into `String`, `"t"` into `bool`), reassembled into a
//! `serde_yaml::Value` tree in serde's field naming, and deserialized into the
//! destination type. Any key serde ignores is reported as an extra key.

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Number, Value};

use crate::error::{Discrepancy, ValidationErrors, YamlfigError};
use crate::merge::{Leaf, MergedTree, Origin};
use crate::path::Path;
use crate::shape::{ScalarKind, ShapeKind, ShapeNode};

/// Rebuild a value tree for `shape` from the merged leaves.
///
/// Returns the tree and the type mismatches found while coercing. Leaves
/// absent from `merged` are skipped; the validator reports them.
pub fn build(shape: &ShapeNode, merged: &MergedTree) -> (Value, Vec<Discrepancy>) {
    let mut mismatches = Vec::new();
    let value = build_node(shape, &Path::root(), merged, &mut mismatches).unwrap_or(Value::Null);
    (value, mismatches)
}

fn build_node(
    node: &ShapeNode,
    path: &Path,
    merged: &MergedTree,
    mismatches: &mut Vec<Discrepancy>,
) -> Option<Value> {
    match &node.kind {
        ShapeKind::Scalar(kind) => {
            let leaf = merged.leaves.get(path)?;
            match coerce(*kind, &node.label(), leaf) {
                Ok(value) => Some(value),
                Err(message) => {
                    mismatches.push(Discrepancy::mismatch(path.clone(), message));
                    None
                }
            }
        }
        ShapeKind::Opaque => merged.leaves.get(path).map(|leaf| leaf.value.clone()),
        ShapeKind::Optional(inner) => match merged.leaves.get(path) {
            Some(leaf) if leaf.value.is_null() || leaf.is_empty_env() => Some(Value::Null),
            _ => build_node(inner, path, merged, mismatches),
        },
        ShapeKind::Struct(fields) => {
            let mut mapping = Mapping::new();
            build_struct(fields, path, merged, mismatches, &mut mapping);
            Some(Value::Mapping(mapping))
        }
        ShapeKind::Map { value, .. } => {
            let keys = merged.maps.get(path)?;
            let mut mapping = Mapping::new();
            for key in keys {
                if let Some(v) = build_node(value, &path.key(key), merged, mismatches) {
                    mapping.insert(Value::String(key.clone()), v);
                }
            }
            Some(Value::Mapping(mapping))
        }
        ShapeKind::Seq { element, len } => {
            let n = len.or_else(|| merged.seqs.get(path).copied())?;
            let items = (0..n)
                .filter_map(|idx| build_node(element, &path.index(idx), merged, mismatches))
                .collect();
            Some(Value::Sequence(items))
        }
    }
}

fn build_struct(
    fields: &[crate::shape::FieldShape],
    path: &Path,
    merged: &MergedTree,
    mismatches: &mut Vec<Discrepancy>,
    mapping: &mut Mapping,
) {
    for field in fields {
        if field.flatten
            && let ShapeKind::Struct(inner) = &field.node.kind
        {
            build_struct(inner, path, merged, mismatches, mapping);
            continue;
        }
        let child = path.field(&field.key());
        if let Some(v) = build_node(&field.node, &child, merged, mismatches) {
            mapping.insert(Value::String(field.serialized_name().to_string()), v);
        }
    }
}

/// Coerce one leaf to `kind`, returning a mismatch message on failure.
fn coerce(kind: ScalarKind, label: &str, leaf: &Leaf) -> Result<Value, String> {
    let fail = || {
        let got = describe(&leaf.value);
        match &leaf.origin {
            Origin::File => format!("expected {label}, got {got}"),
            Origin::Env { var } => format!("expected {label}, got {got} (from {var})"),
        }
    };

    match (kind, &leaf.value) {
        (ScalarKind::String, Value::String(_)) => Ok(leaf.value.clone()),
        (ScalarKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ScalarKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ScalarKind::Bool, Value::Bool(_)) => Ok(leaf.value.clone()),
        (ScalarKind::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool).ok_or_else(fail),
        (ScalarKind::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(fail()),
        },

        (ScalarKind::Integer { signed, bits }, v) => {
            let parsed = match v {
                Value::Number(n) => number_to_i128(n),
                Value::String(s) => s.trim().parse::<i128>().ok(),
                _ => None,
            };
            parsed
                .filter(|i| in_range(*i, signed, bits))
                .and_then(integer_value)
                .ok_or_else(fail)
        }

        (ScalarKind::Float, Value::Number(n)) => n
            .as_f64()
            .map(|f| Value::Number(Number::from(f)))
            .ok_or_else(fail),
        (ScalarKind::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| Value::Number(Number::from(f)))
            .map_err(|_| fail()),

        _ => Err(fail()),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

fn number_to_i128(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.into());
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| f as i128)
}

fn in_range(value: i128, signed: bool, bits: u32) -> bool {
    if signed {
        let max = (1i128 << (bits - 1)) - 1;
        (-max - 1..=max).contains(&value)
    } else {
        (0..=(1i128 << bits) - 1).contains(&value)
    }
}

fn integer_value(value: i128) -> Option<Value> {
    if let Ok(i) = i64::try_from(value) {
        return Some(Value::Number(i.into()));
    }
    u64::try_from(value).ok().map(|u| Value::Number(u.into()))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Sequence(_) => "a sequence".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(t) => format!("a value tagged {}", t.tag),
    }
}

/// Deserialize the rebuilt tree, rejecting any key serde does not consume.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, YamlfigError> {
    let mut ignored = Vec::new();
    let decoded: T = serde_ignored::deserialize(value, |path| {
        ignored.push(Discrepancy::extra(
            Path::root().field(&path.to_string()),
            "not consumed by the configuration type",
        ));
    })
    .map_err(YamlfigError::Decode)?;

    if ignored.is_empty() {
        Ok(decoded)
    } else {
        Err(ValidationErrors::new(ignored).into())
    }
}
