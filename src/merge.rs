//! Merge engine: walk the declared shape against the file tree and the
//! flattened environment together.
//!
//! The result is a flat [`MergedTree`] of leaf paths plus the keys of every
//! map and the length of every sequence that some source mentioned. Anything
//! a source supplies that the shape does not declare is kept as a leaf too,
//! so the validator sees it as an extra key.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::trace;

use crate::env::FlatEnvEntry;
use crate::error::{Discrepancy, YamlfigError};
use crate::path::Path;
use crate::shape::{ShapeKind, ShapeNode};
use crate::source::RawNode;

/// Where a leaf value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File,
    Env { var: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub value: Value,
    pub origin: Origin,
}

impl Leaf {
    /// An empty environment value, which stands for "set, but nothing".
    pub fn is_empty_env(&self) -> bool {
        matches!(self.origin, Origin::Env { .. })
            && matches!(&self.value, Value::String(s) if s.is_empty())
    }
}

/// Every leaf supplied by the file and the environment, keyed by path.
#[derive(Debug, Default)]
pub struct MergedTree {
    pub leaves: BTreeMap<Path, Leaf>,
    /// Keys of each map some source mentioned, file keys first.
    pub maps: BTreeMap<Path, Vec<String>>,
    /// Length of each dynamic sequence some source mentioned.
    pub seqs: BTreeMap<Path, usize>,
    /// Containers given a scalar. Required leaves below them are not reported.
    pub conflicts: Vec<Discrepancy>,
}

impl MergedTree {
    pub fn is_conflicted(&self, path: &Path) -> bool {
        self.conflicts.iter().any(|c| path.starts_with(&c.path))
    }

    fn insert_file(&mut self, path: Path, raw: &RawNode) {
        self.leaves.insert(
            path,
            Leaf {
                value: raw.to_value(),
                origin: Origin::File,
            },
        );
    }

    fn insert_env(&mut self, path: Path, entry: &FlatEnvEntry) {
        trace!(var = %entry.var, %path, "env leaf");
        self.leaves.insert(
            path,
            Leaf {
                value: Value::String(entry.value.clone()),
                origin: Origin::Env {
                    var: entry.var.clone(),
                },
            },
        );
    }
}

/// An env entry together with the segments not yet consumed by the walk.
#[derive(Clone, Copy)]
struct EnvRef<'a> {
    rest: &'a [String],
    entry: &'a FlatEnvEntry,
}

/// Merge the parsed file and env entries along `shape`.
///
/// Env leaves overwrite file leaves at identical paths. The only error
/// returned here is a struct field written twice under keys that differ only
/// in case; everything else is recorded in the tree for the validator.
pub fn merge(
    shape: &ShapeNode,
    file: Option<&RawNode>,
    env: &[FlatEnvEntry],
) -> Result<MergedTree, YamlfigError> {
    let segments: Vec<Vec<String>> = env.iter().map(FlatEnvEntry::segments).collect();
    let refs: Vec<EnvRef<'_>> = segments
        .iter()
        .zip(env)
        .map(|(rest, entry)| EnvRef { rest, entry })
        .collect();

    let mut tree = MergedTree::default();
    walk(&mut tree, shape, &Path::root(), file, &refs)?;
    Ok(tree)
}

fn walk(
    tree: &mut MergedTree,
    node: &ShapeNode,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> Result<(), YamlfigError> {
    match &node.kind {
        ShapeKind::Scalar(_) | ShapeKind::Opaque => {
            merge_leaf(tree, path, file, env);
            Ok(())
        }
        ShapeKind::Optional(inner) if inner.is_leaf() => walk(tree, inner, path, file, env),
        ShapeKind::Optional(inner) => merge_optional(tree, inner, path, file, env),
        ShapeKind::Struct(_) => merge_struct(tree, node, path, file, env),
        ShapeKind::Map { value, .. } => merge_map(tree, node, value, path, file, env),
        ShapeKind::Seq { element, len } => merge_seq(tree, node, element, *len, path, file, env),
    }
}

fn merge_leaf(tree: &mut MergedTree, path: &Path, file: Option<&RawNode>, env: &[EnvRef<'_>]) {
    if let Some(raw) = file {
        tree.insert_file(path.clone(), raw);
    }
    for r in env {
        if r.rest.is_empty() {
            tree.insert_env(path.clone(), r.entry);
        } else {
            spill_env(tree, path, *r);
        }
    }
}

fn merge_optional(
    tree: &mut MergedTree,
    inner: &ShapeNode,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> Result<(), YamlfigError> {
    let (exact, below): (Vec<&EnvRef<'_>>, Vec<&EnvRef<'_>>) = env.iter().partition(|r| r.rest.is_empty());

    if below.is_empty() {
        if let Some(r) = exact.iter().find(|r| r.entry.value.is_empty()) {
            tree.insert_env(path.clone(), r.entry);
            return Ok(());
        }
        if exact.is_empty()
            && let Some(raw) = file
            && raw.is_null()
        {
            tree.insert_file(path.clone(), raw);
            return Ok(());
        }
    }

    let file = file.filter(|raw| !raw.is_null());
    walk(tree, inner, path, file, env)
}

/// Record a scalar supplied where a container is declared.
fn container_conflict(
    tree: &mut MergedTree,
    node: &ShapeNode,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> bool {
    let label = node.label();
    let mut conflicted = false;
    if let Some(raw) = file {
        let expected = match &node.kind {
            ShapeKind::Struct(_) => matches!(raw, RawNode::Map(_) | RawNode::Null),
            ShapeKind::Map { .. } => matches!(raw, RawNode::Map(_) | RawNode::Null),
            ShapeKind::Seq { .. } => matches!(raw, RawNode::Seq(_) | RawNode::Null),
            _ => true,
        };
        if !expected {
            tree.conflicts.push(Discrepancy::mismatch(
                path.clone(),
                format!("expected {label}, got {}", raw.describe()),
            ));
            conflicted = true;
        }
    }
    for r in env.iter().filter(|r| r.rest.is_empty()) {
        tree.conflicts.push(Discrepancy::mismatch(
            path.clone(),
            format!("expected {label}, got a scalar from {}", r.entry.var),
        ));
        conflicted = true;
    }
    conflicted
}

fn merge_struct(
    tree: &mut MergedTree,
    node: &ShapeNode,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> Result<(), YamlfigError> {
    container_conflict(tree, node, path, file, env);

    let fields = node.effective_fields();
    let keys: Vec<String> = fields.iter().map(|f| f.key()).collect();
    let mut file_values: Vec<Option<&RawNode>> = vec![None; fields.len()];

    if let Some(RawNode::Map(entries)) = file {
        for (key, value) in entries {
            let lower = key.to_lowercase();
            match keys.iter().position(|k| *k == lower) {
                Some(i) if file_values[i].is_some() => {
                    return Err(YamlfigError::DuplicateKey {
                        path: path.clone(),
                        key: key.clone(),
                    });
                }
                Some(i) => file_values[i] = Some(value),
                None => spill_file(tree, &path.field(&lower), value),
            }
        }
    }

    let mut field_env: Vec<Vec<EnvRef<'_>>> = vec![Vec::new(); fields.len()];
    for r in env.iter().filter(|r| !r.rest.is_empty()) {
        match match_field(&keys, r.rest) {
            Some((i, consumed)) => field_env[i].push(EnvRef {
                rest: &r.rest[consumed..],
                entry: r.entry,
            }),
            None => spill_env(tree, path, *r),
        }
    }

    for (i, field) in fields.iter().enumerate() {
        walk(
            tree,
            &field.node,
            &path.field(&keys[i]),
            file_values[i],
            &field_env[i],
        )?;
    }
    Ok(())
}

/// Find the field whose `_`-separated name is the longest prefix of `rest`.
///
/// Returns the field index and the number of segments its name spans.
fn match_field(keys: &[String], rest: &[String]) -> Option<(usize, usize)> {
    keys.iter()
        .enumerate()
        .filter_map(|(i, key)| {
            let parts: Vec<&str> = key.split('_').filter(|s| !s.is_empty()).collect();
            let matches = !parts.is_empty()
                && parts.len() <= rest.len()
                && parts.iter().zip(rest).all(|(p, s)| *p == s.as_str());
            matches.then_some((i, parts.len()))
        })
        .max_by_key(|&(_, n)| n)
}

fn merge_map(
    tree: &mut MergedTree,
    node: &ShapeNode,
    value: &ShapeNode,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> Result<(), YamlfigError> {
    let conflicted = container_conflict(tree, node, path, file, env);

    let entries: &[(String, RawNode)] = match file {
        Some(RawNode::Map(entries)) => entries,
        _ => &[],
    };
    let mut keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
    let mut key_env: Vec<Vec<EnvRef<'_>>> = vec![Vec::new(); keys.len()];

    for r in env.iter().filter(|r| !r.rest.is_empty()) {
        let segment = &r.rest[0];
        let i = keys
            .iter()
            .position(|k| k == segment)
            .or_else(|| keys.iter().position(|k| k.eq_ignore_ascii_case(segment)))
            .unwrap_or_else(|| {
                keys.push(segment.clone());
                key_env.push(Vec::new());
                keys.len() - 1
            });
        key_env[i].push(EnvRef {
            rest: &r.rest[1..],
            entry: r.entry,
        });
    }

    let present = !keys.is_empty() || matches!(file, Some(RawNode::Map(_) | RawNode::Null));
    if present && !conflicted {
        tree.maps.insert(path.clone(), keys.clone());
    }

    for (i, key) in keys.iter().enumerate() {
        let raw = entries.get(i).map(|(_, v)| v);
        walk(tree, value, &path.key(key), raw, &key_env[i])?;
    }
    Ok(())
}

fn merge_seq(
    tree: &mut MergedTree,
    node: &ShapeNode,
    element: &ShapeNode,
    fixed: Option<usize>,
    path: &Path,
    file: Option<&RawNode>,
    env: &[EnvRef<'_>],
) -> Result<(), YamlfigError> {
    let conflicted = container_conflict(tree, node, path, file, env);

    let items: &[RawNode] = match file {
        Some(RawNode::Seq(items)) => items,
        _ => &[],
    };

    let mut index_env: BTreeMap<usize, Vec<EnvRef<'_>>> = BTreeMap::new();
    for r in env.iter().filter(|r| !r.rest.is_empty()) {
        match r.rest[0].parse::<usize>() {
            Ok(idx) => index_env.entry(idx).or_default().push(EnvRef {
                rest: &r.rest[1..],
                entry: r.entry,
            }),
            Err(_) => spill_env(tree, path, *r),
        }
    }

    // Env indexes may only extend the file sequence (or fill a fixed array)
    // contiguously. Anything past the first gap is undeclared.
    let mut run_end = items.len().max(fixed.unwrap_or(0));
    while index_env.contains_key(&run_end) {
        match run_end.checked_add(1) {
            Some(next) => run_end = next,
            None => break,
        }
    }
    for (idx, refs) in index_env.split_off(&run_end) {
        for r in refs {
            spill_env(tree, &path.index(idx), r);
        }
    }

    let env_len = index_env.keys().next_back().map_or(0, |max| max + 1);
    let len = items.len().max(env_len);

    let present = len > 0 || matches!(file, Some(RawNode::Seq(_) | RawNode::Null));
    if present && !conflicted && fixed.is_none() {
        tree.seqs.insert(path.clone(), len);
    }

    let empty = Vec::new();
    for idx in 0..len {
        let raw = items.get(idx);
        let env_here = index_env.get(&idx).unwrap_or(&empty);
        let child = path.index(idx);
        if fixed.is_some_and(|n| idx >= n) {
            if let Some(raw) = raw {
                spill_file(tree, &child, raw);
            }
            for r in env_here {
                spill_env(tree, &child, *r);
            }
        } else {
            walk(tree, element, &child, raw, env_here)?;
        }
    }
    Ok(())
}

/// Record an undeclared file subtree as leaves.
fn spill_file(tree: &mut MergedTree, path: &Path, raw: &RawNode) {
    match raw {
        RawNode::Map(entries) if !entries.is_empty() => {
            for (key, value) in entries {
                spill_file(tree, &path.field(&key.to_lowercase()), value);
            }
        }
        RawNode::Seq(items) if !items.is_empty() => {
            for (idx, item) in items.iter().enumerate() {
                spill_file(tree, &path.index(idx), item);
            }
        }
        _ => tree.insert_file(path.clone(), raw),
    }
}

/// Record an undeclared env variable as a leaf below `path`.
fn spill_env(tree: &mut MergedTree, path: &Path, r: EnvRef<'_>) {
    let leaf = r.rest.iter().fold(path.clone(), |p, s| p.field(s));
    tree.insert_env(leaf, r.entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::flatten_env;
    use crate::fixtures::test::{CfgStruct, Level3};
    use crate::shape::Shape;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn raw(content: &str) -> RawNode {
        RawNode::parse(content, &PathBuf::from("test.yaml"))
            .unwrap()
            .unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<FlatEnvEntry> {
        flatten_env(
            "testprefix",
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    fn leaf_paths(tree: &MergedTree) -> Vec<String> {
        tree.leaves.keys().map(|p| p.to_string()).collect()
    }

    #[test]
    fn file_leaves_are_collected() {
        let file = raw("level3text: hello\nnullstring: ~\n");
        let tree = merge(&Level3::shape(), Some(&file), &[]).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["level3text", "nullstring"]);
        assert_eq!(
            tree.leaves[&Path::root().field("level3text")].value,
            Value::String("hello".into())
        );
        assert_eq!(tree.leaves[&Path::root().field("nullstring")].value, Value::Null);
    }

    #[test]
    fn env_overrides_file_leaf() {
        let file = raw("level3text: from-file\nnullstring: x\n");
        let vars = env(&[("TESTPREFIX_LEVEL3TEXT", "from-env")]);
        let tree = merge(&Level3::shape(), Some(&file), &vars).unwrap();
        let leaf = &tree.leaves[&Path::root().field("level3text")];
        assert_eq!(leaf.value, Value::String("from-env".into()));
        assert_eq!(
            leaf.origin,
            Origin::Env {
                var: "TESTPREFIX_LEVEL3TEXT".into()
            }
        );
    }

    #[test]
    fn unknown_file_keys_spill() {
        let file = raw("level3text: a\nnullstring: b\nnonexistent:\n  deep: 1\n");
        let tree = merge(&Level3::shape(), Some(&file), &[]).unwrap();
        assert!(tree.leaves.contains_key(&Path::root().field("nonexistent").field("deep")));
    }

    #[test]
    fn unknown_env_keys_spill() {
        let vars = env(&[("TESTPREFIX_NONEXISTENT_VALUE1", "")]);
        let tree = merge(&Level3::shape(), None, &vars).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["nonexistent.value1"]);
    }

    #[test]
    fn file_keys_match_case_insensitively() {
        let file = raw("Level3Text: a\nnullString: ~\n");
        let tree = merge(&Level3::shape(), Some(&file), &[]).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["level3text", "nullstring"]);
    }

    #[test]
    fn case_variant_duplicate_fails_fast() {
        let file = raw("level3text: a\nLEVEL3TEXT: b\n");
        let err = merge(&Level3::shape(), Some(&file), &[]).unwrap_err();
        match err {
            YamlfigError::DuplicateKey { key, .. } => assert_eq!(key, "LEVEL3TEXT"),
            other => panic!("Expected DuplicateKey, got: {other:?}"),
        }
    }

    #[test]
    fn map_keys_are_union_of_sources() {
        let file = raw("map2:\n  a:\n    level3text: x\n    nullstring: ~\n");
        let vars = env(&[
            ("TESTPREFIX_MAP2_B_LEVEL3TEXT", "y"),
            ("TESTPREFIX_MAP2_A_LEVEL3TEXT", "z"),
        ]);
        let tree = merge(&CfgStruct::shape(), Some(&file), &vars).unwrap();
        assert_eq!(
            tree.maps[&Path::root().field("map2")],
            vec!["a".to_string(), "b".to_string()]
        );
        let a = &tree.leaves[&Path::root().field("map2").key("a").field("level3text")];
        assert_eq!(a.value, Value::String("z".into()));
    }

    #[test]
    fn env_map_key_addresses_file_key_ignoring_case() {
        let file = raw("Key1: one\n");
        let vars = env(&[("TESTPREFIX_KEY1", "two")]);
        let tree = merge(&HashMap::<String, String>::shape(), Some(&file), &vars).unwrap();
        assert_eq!(tree.maps[&Path::root()], vec!["Key1".to_string()]);
        assert_eq!(
            tree.leaves[&Path::root().key("Key1")].value,
            Value::String("two".into())
        );
    }

    #[test]
    fn absent_map_is_not_recorded() {
        let tree = merge(&CfgStruct::shape(), None, &[]).unwrap();
        assert!(tree.maps.is_empty());
    }

    #[test]
    fn empty_map_is_present() {
        let file = raw("map2: {}\n");
        let tree = merge(&CfgStruct::shape(), Some(&file), &[]).unwrap();
        assert_eq!(tree.maps[&Path::root().field("map2")], Vec::<String>::new());
    }

    #[test]
    fn sequence_length_from_file_and_env() {
        let file = raw("- a\n- b\n");
        let vars = env(&[("TESTPREFIX_2", "c"), ("TESTPREFIX_3", "d")]);
        let tree = merge(&Vec::<String>::shape(), Some(&file), &vars).unwrap();
        assert_eq!(tree.seqs[&Path::root()], 4);
        assert_eq!(leaf_paths(&tree), vec!["[0]", "[1]", "[2]", "[3]"]);
    }

    #[test]
    fn env_index_past_gap_is_spilled() {
        let file = raw("- a\n- b\n");
        let vars = env(&[("TESTPREFIX_3", "d")]);
        let tree = merge(&Vec::<String>::shape(), Some(&file), &vars).unwrap();
        assert_eq!(tree.seqs[&Path::root()], 2);
        assert_eq!(leaf_paths(&tree), vec!["[0]", "[1]", "[3]"]);
        assert_eq!(
            tree.leaves[&Path::root().index(3)].origin,
            Origin::Env {
                var: "TESTPREFIX_3".into()
            }
        );
    }

    #[test]
    fn max_env_index_does_not_overflow() {
        let file = raw("- a\n");
        let vars = env(&[("TESTPREFIX_18446744073709551615", "x")]);
        let tree = merge(&Vec::<String>::shape(), Some(&file), &vars).unwrap();
        assert_eq!(tree.seqs[&Path::root()], 1);
        assert!(tree.leaves.contains_key(&Path::root().index(usize::MAX)));
    }

    #[test]
    fn fixed_array_accepts_env_inside_bounds() {
        let vars = env(&[("TESTPREFIX_1", "7")]);
        let tree = merge(&<[u16; 2]>::shape(), None, &vars).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["[1]"]);
    }

    #[test]
    fn fixed_array_spills_overflow() {
        let file = raw("- 1\n- 2\n- 3\n");
        let tree = merge(&<[u16; 2]>::shape(), Some(&file), &[]).unwrap();
        assert!(tree.seqs.is_empty());
        assert_eq!(leaf_paths(&tree), vec!["[0]", "[1]", "[2]"]);
    }

    #[test]
    fn scalar_for_struct_is_conflict() {
        let file = raw("level1text: a\nlevel2: flat\n");
        let tree = merge(&CfgStruct::shape(), Some(&file), &[]).unwrap();
        assert_eq!(tree.conflicts.len(), 1);
        assert!(tree.is_conflicted(&Path::root().field("level2").field("level2text")));
    }

    #[test]
    fn underscored_field_consumes_segments() {
        use crate::fixtures::test::Pooled;
        let vars = env(&[("TESTPREFIX_POOL_SIZE", "4")]);
        let tree = merge(&Pooled::shape(), None, &vars).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["pool_size"]);
    }

    #[test]
    fn null_optional_struct_is_single_leaf() {
        use crate::fixtures::test::MaybeNested;
        let file = raw("inner: ~\n");
        let tree = merge(&MaybeNested::shape(), Some(&file), &[]).unwrap();
        assert_eq!(leaf_paths(&tree), vec!["inner"]);
    }
}
