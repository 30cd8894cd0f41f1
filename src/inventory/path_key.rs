//! Case-insensitive keys for path- and name-keyed maps.
//!
//! The cache format and the duplicate comparison both treat names the way a
//! case-insensitive filesystem does: `Photo.JPG` and `photo.jpg` are the
//! same file. Rather than lowercasing strings in place at every comparison
//! site, map keys wrap the folded form once.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::path::Path;

/// A path or file name folded for case-insensitive equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// Build a key from any string-ish name or path fragment.
    #[must_use]
    pub fn new(s: &str) -> Self {
        PathKey(fold(s))
    }

    /// Build a key from a full path.
    ///
    /// Non-UTF-8 components are replaced lossily; the same lossy form is
    /// used everywhere a path becomes a key, so lookups stay consistent.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        PathKey(fold(&path.to_string_lossy()))
    }

    /// The folded form, mostly useful for diagnostics.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PathKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Ordinal case-insensitive comparison without allocating folded copies.
///
/// This is the tie-break ordering used wherever records are sorted by path.
#[must_use]
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().flat_map(char::to_lowercase);
    let mut bi = b.chars().flat_map(char::to_lowercase);
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}
