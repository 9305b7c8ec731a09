//! Structural locators for values in the configuration shape.
//!
//! A [`Path`] labels every merged leaf and every reported error. Equality and
//! ordering are segment-wise, so a map key `"a.b"` never collides with the
//! two fields `a` and `b` even though both render as `a.b`.

use std::fmt;

/// Placeholder key used when a map has no entries in any source.
///
/// Required paths of such a map are reported as `field.<-key->.leaf`.
pub const MAP_KEY_PLACEHOLDER: &str = "<-key->";

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A struct field, by its lower-cased serialized name.
    Field(String),
    /// A map key, as written in the source.
    Key(String),
    /// A sequence index.
    Index(usize),
}

/// An immutable location inside the configuration tree.
///
/// Appending returns a new path; the original is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path, addressing the destination value itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        self.push(Segment::Field(name.to_string()))
    }

    pub fn key(&self, key: &str) -> Self {
        self.push(Segment::Key(key.to_string()))
    }

    pub fn index(&self, idx: usize) -> Self {
        self.push(Segment::Index(idx))
    }

    fn push(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether any segment is the map placeholder key.
    pub fn is_template(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Key(k) if k == MAP_KEY_PLACEHOLDER))
    }

    /// Render the environment variable that addresses this path.
    ///
    /// `Path("level2.level3.text")` with prefix `app` becomes
    /// `APP_LEVEL2_LEVEL3_TEXT`.
    pub fn to_env_var(&self, prefix: &str) -> String {
        let mut var = prefix.to_uppercase();
        for segment in &self.segments {
            var.push('_');
            match segment {
                Segment::Field(s) | Segment::Key(s) => var.push_str(&s.to_uppercase()),
                Segment::Index(i) => var.push_str(&i.to_string()),
            }
        }
        var
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(".");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(s) | Segment::Key(s) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(s)?;
                }
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}
