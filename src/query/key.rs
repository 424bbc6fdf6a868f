//! Structural cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Int(i64),
    Str(String),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for KeySegment {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i32> for KeySegment {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for KeySegment {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// An ordered sequence of primitive values identifying a cached result.
///
/// The first element is a namespace tag such as `"viewer"` or `"watchlist"`.
/// Equality and hashing are structural, so two keys built independently from
/// the same values address the same cache entry.
///
/// # Example
///
/// ```
/// use watchdeck::query::QueryKey;
/// use watchdeck::query_key;
///
/// let page = query_key!["watchlist", "user-1", 1];
/// let user = QueryKey::new("watchlist").with("user-1");
///
/// assert!(page.starts_with(&user));
/// assert_eq!(page.namespace(), Some("watchlist"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Creates a key with a single namespace element.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(vec![KeySegment::Str(namespace.into())])
    }

    /// Creates a key from pre-built segments.
    #[must_use]
    pub const fn from_segments(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<KeySegment>) {
        self.0.push(segment.into());
    }

    /// Returns the key extended by one segment.
    #[must_use]
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.push(segment);
        self
    }

    /// Returns the namespace tag, if the first element is a string.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeySegment::Str(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `prefix` matches the leading elements of this key.
    ///
    /// Every key starts with the empty key and with itself.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

impl<S: Into<KeySegment>> FromIterator<S> for QueryKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Builds a [`QueryKey`] from a list of segments.
///
/// ```
/// use watchdeck::query_key;
///
/// let key = query_key!["search", "movie", "batman"];
/// assert_eq!(key.len(), 3);
/// ```
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::query::QueryKey::default()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::query::QueryKey::from_segments(vec![
            $($crate::query::KeySegment::from($segment)),+
        ])
    };
}
