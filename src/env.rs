use std::collections::BTreeMap;

/// One environment variable mapped into the configuration path space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEnvEntry {
    /// Original variable name, kept for error messages.
    pub var: String,
    /// Lower-cased dotted path, e.g. `level2.level3.text`.
    pub path: String,
    pub value: String,
}

impl FlatEnvEntry {
    pub fn segments(&self) -> Vec<String> {
        self.path.split('.').map(str::to_string).collect()
    }
}

/// Flatten environment variables matching `{PREFIX}_*` into dotted paths.
///
/// The prefix is matched case-insensitively. The rest of the name is split
/// on `_`, lower-cased and joined with `.`. Empty values are kept: a variable
/// that is set but empty still supplies its key.
///
/// When two variables flatten to the same path (`APP_X` and `app_x`), the
/// lexicographically greater variable name wins.
///
/// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
pub fn flatten_env(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Vec<FlatEnvEntry> {
    let needle = format!("{}_", prefix.to_uppercase());
    let mut by_path: BTreeMap<String, FlatEnvEntry> = BTreeMap::new();

    let mut vars: Vec<(String, String)> = vars.into_iter().collect();
    vars.sort();

    for (var, value) in vars {
        let upper = var.to_uppercase();
        let Some(rest) = upper.strip_prefix(&needle) else {
            continue;
        };

        let segments: Vec<String> = rest
            .split('_')
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        if segments.is_empty() {
            continue;
        }

        let path = segments.join(".");
        by_path.insert(path.clone(), FlatEnvEntry { var, path, value });
    }

    by_path.into_values().collect()
}

/// Snapshot of the process environment, skipping non-UTF-8 entries.
pub fn process_vars() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
