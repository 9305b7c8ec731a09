//! Strict validation: every declared leaf supplied, nothing undeclared.
//!
//! The shape is expanded into the set of leaf paths it requires, using the map
//! keys and sequence lengths the merge discovered. The symmetric difference
//! with the supplied leaves gives the missing and extra keys.

use std::collections::BTreeSet;

use crate::error::Discrepancy;
use crate::merge::{MergedTree, Origin};
use crate::path::{MAP_KEY_PLACEHOLDER, Path};
use crate::shape::{ShapeKind, ShapeNode};

/// Expand `shape` into the leaf paths a complete configuration must supply.
pub fn required_leaves(shape: &ShapeNode, merged: &MergedTree) -> BTreeSet<Path> {
    let mut out = BTreeSet::new();
    collect(shape, &Path::root(), merged, &mut out);
    out
}

fn collect(node: &ShapeNode, path: &Path, merged: &MergedTree, out: &mut BTreeSet<Path>) {
    match &node.kind {
        ShapeKind::Scalar(_) | ShapeKind::Opaque => {
            out.insert(path.clone());
        }
        ShapeKind::Optional(inner) => {
            let null_here = merged
                .leaves
                .get(path)
                .is_some_and(|leaf| leaf.value.is_null() || leaf.is_empty_env());
            if inner.is_leaf() || null_here {
                out.insert(path.clone());
            } else {
                collect(inner, path, merged, out);
            }
        }
        ShapeKind::Struct(_) => {
            for field in node.effective_fields() {
                collect(&field.node, &path.field(&field.key()), merged, out);
            }
        }
        ShapeKind::Map { value, .. } => match merged.maps.get(path) {
            Some(keys) => {
                for key in keys {
                    collect(value, &path.key(key), merged, out);
                }
            }
            None => collect(value, &path.key(MAP_KEY_PLACEHOLDER), merged, out),
        },
        ShapeKind::Seq { element, len } => match len.or_else(|| merged.seqs.get(path).copied()) {
            Some(n) => {
                for idx in 0..n {
                    collect(element, &path.index(idx), merged, out);
                }
            }
            None => {
                out.insert(path.clone());
            }
        },
    }
}

/// Compare required against supplied leaves.
///
/// Missing keys under a container that was given a scalar are not reported;
/// the conflict itself already is. `env_prefix` is used to name the variable
/// that would supply each missing key.
pub fn validate(
    required: &BTreeSet<Path>,
    merged: &MergedTree,
    env_prefix: Option<&str>,
) -> Vec<Discrepancy> {
    let mut problems = Vec::new();

    for path in required {
        if merged.leaves.contains_key(path) || merged.is_conflicted(path) {
            continue;
        }
        let hint = match env_prefix {
            Some(prefix) if !path.is_template() => {
                format!("set it in the file or via {}", path.to_env_var(prefix))
            }
            _ => String::new(),
        };
        problems.push(Discrepancy::missing(path.clone(), hint));
    }

    for (path, leaf) in &merged.leaves {
        if required.contains(path) {
            continue;
        }
        let source = match &leaf.origin {
            Origin::File => "not declared, found in file".to_string(),
            Origin::Env { var } => format!("not declared, found in {var}"),
        };
        problems.push(Discrepancy::extra(path.clone(), source));
    }

    problems.extend(merged.conflicts.iter().cloned());
    problems
}
