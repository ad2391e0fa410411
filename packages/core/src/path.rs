//! Dot-separated paths addressing locations inside a wrapped value tree.

use std::fmt;

/// Separator placed between path components (`"user.profile.age"`).
pub const SEPARATOR: char = '.';

/// Pseudo-key addressing the length of an array.
pub const LENGTH: &str = "length";

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A path component cannot be used as a property name.
    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    #[error("invalid path: {message}")]
    InvalidPath { message: String },
}

/// The address of one location in a wrap tree.
///
/// A path is the sequence of property names walked from the wrap root. The
/// root itself is the empty path. Array elements are addressed by their
/// decimal index, so `items.0.name` is the `name` of the first element of
/// `items`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// The root path (no components).
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Parse a dot-separated path string.
    ///
    /// The empty string is the root path. Components must be non-empty, so
    /// `"a..b"`, `".a"` and `"a."` are rejected.
    ///
    /// ```rust
    /// use pathstate_core::Path;
    ///
    /// let path = Path::parse("user.profile.age").unwrap();
    /// assert_eq!(path.len(), 3);
    /// assert!(Path::parse("user..age").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let components: Vec<String> = s.split(SEPARATOR).map(str::to_string).collect();
        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(Path { components })
    }

    /// Try to create a path from components, validating each.
    pub fn try_from_components(components: Vec<String>) -> Result<Self, PathError> {
        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }
        Ok(Path { components })
    }

    /// Whether `key` can be used as a single path component.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty() && !key.contains(SEPARATOR)
    }

    pub(crate) fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        if component.is_empty() {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: "empty component".to_string(),
            });
        }
        if component.contains(SEPARATOR) {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: format!("component contains the separator '{}'", SEPARATOR),
            });
        }
        Ok(())
    }

    /// Check if this path is empty (root path).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Iterate over components.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// The last component, if any.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The path one level up, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_empty() {
            return None;
        }
        Some(self.slice(0, self.len() - 1))
    }

    /// Append one component.
    ///
    /// The key is not validated; callers that accept user keys check them
    /// with [`Path::is_valid_key`] first.
    #[must_use]
    pub fn child(&self, key: &str) -> Path {
        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.extend(self.components.iter().cloned());
        components.push(key.to_string());
        Path { components }
    }

    /// Append an array index component.
    #[must_use]
    pub fn child_index(&self, index: usize) -> Path {
        self.child(&index.to_string())
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path { components }
    }

    /// Strict ancestors, nearest first. The root is not included.
    ///
    /// ```rust
    /// use pathstate_core::{path, Path};
    ///
    /// let ancestors: Vec<Path> = path!("a.b.c").ancestors().collect();
    /// assert_eq!(ancestors, vec![path!("a.b"), path!("a")]);
    /// ```
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (1..self.len()).rev().map(move |end| self.slice(0, end))
    }

    /// Check if this path has the given prefix.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// True when `other` is a proper prefix of this path.
    pub fn is_strict_descendant_of(&self, other: &Path) -> bool {
        self.len() > other.len() && self.has_prefix(other)
    }

    /// Strip a prefix from this path.
    ///
    /// Returns `None` if the prefix doesn't match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.has_prefix(prefix) {
            Some(Path {
                components: self.components[prefix.components.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    /// Get a slice of components as a new path.
    pub fn slice(&self, start: usize, end: usize) -> Path {
        Path {
            components: self.components[start..end].to_vec(),
        }
    }

    /// Split `array.index[.rest]` into the array path and the index.
    ///
    /// The rightmost numeric component wins, and the array path is never the
    /// root: `"0"` alone does not match.
    ///
    /// ```rust
    /// use pathstate_core::path;
    ///
    /// assert_eq!(path!("todos.3.done").array_split(), Some((path!("todos"), 3)));
    /// assert_eq!(path!("a.0.b.1").array_split(), Some((path!("a.0.b"), 1)));
    /// assert_eq!(path!("user.name").array_split(), None);
    /// ```
    pub fn array_split(&self) -> Option<(Path, usize)> {
        (1..self.len()).rev().find_map(|i| {
            parse_index(&self.components[i]).map(|index| (self.slice(0, i), index))
        })
    }
}

/// Parse a canonical decimal array index (`"0"`, `"12"`, not `"01"` or `"+1"`).
pub fn parse_index(component: &str) -> Option<usize> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if component.len() > 1 && component.starts_with('0') {
        return None;
    }
    component.parse().ok()
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

impl std::ops::Index<usize> for Path {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use pathstate_core::path;
///
/// let p = path!("users.123.name");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_paths() {
        assert_eq!(Path::parse("").unwrap().len(), 0);
        assert_eq!(Path::parse("foo").unwrap().len(), 1);
        assert_eq!(Path::parse("foo.bar").unwrap().len(), 2);
        assert_eq!(Path::parse("foo.bar.baz").unwrap().len(), 3);
    }

    #[test]
    fn empty_components_rejected() {
        assert!(Path::parse("foo..bar").is_err());
        assert!(Path::parse(".foo").is_err());
        assert!(Path::parse("foo.").is_err());

        let err = Path::parse("a..b").unwrap_err();
        assert!(err.to_string().contains("empty component"));
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn arbitrary_property_names_allowed() {
        let p = Path::parse("headers.content-type").unwrap();
        assert_eq!(&p[1], "content-type");

        let p = Path::parse("usuarios.名前").unwrap();
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn try_from_components_rejects_separator() {
        let result = Path::try_from_components(vec!["a.b".to_string()]);
        assert!(result.is_err());
        assert!(!Path::is_valid_key("a.b"));
        assert!(!Path::is_valid_key(""));
        assert!(Path::is_valid_key("a"));
    }

    #[test]
    fn child_and_parent() {
        let p = path!("user");
        let child = p.child("name");
        assert_eq!(child, path!("user.name"));
        assert_eq!(child.parent(), Some(p));
        assert_eq!(path!("user").parent(), Some(Path::root()));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(path!("items").child_index(4), path!("items.4"));
    }

    #[test]
    fn ancestors_nearest_first() {
        let ancestors: Vec<String> = path!("a.b.c.d").ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a.b.c", "a.b", "a"]);
        assert_eq!(path!("a").ancestors().count(), 0);
        assert_eq!(Path::root().ancestors().count(), 0);
    }

    #[test]
    fn has_prefix_works() {
        let p = path!("foo.bar.baz");
        assert!(p.has_prefix(&Path::root()));
        assert!(p.has_prefix(&path!("foo")));
        assert!(p.has_prefix(&path!("foo.bar")));
        assert!(p.has_prefix(&path!("foo.bar.baz")));
        assert!(!p.has_prefix(&path!("bar")));
        assert!(!p.has_prefix(&path!("foo.bar.baz.qux")));
    }

    #[test]
    fn strict_descendant_is_component_aware() {
        assert!(path!("user.name").is_strict_descendant_of(&path!("user")));
        assert!(!path!("user").is_strict_descendant_of(&path!("user")));
        // "username" shares a string prefix with "user" but is a sibling
        assert!(!path!("username").is_strict_descendant_of(&path!("user")));
        assert!(path!("user").is_strict_descendant_of(&Path::root()));
    }

    #[test]
    fn strip_prefix_works() {
        let p = path!("foo.bar.baz");
        assert_eq!(p.strip_prefix(&path!("foo")), Some(path!("bar.baz")));
        assert_eq!(p.strip_prefix(&path!("other")), None);
    }

    #[test]
    fn array_split_finds_rightmost_index() {
        assert_eq!(path!("items.0").array_split(), Some((path!("items"), 0)));
        assert_eq!(
            path!("items.12.name").array_split(),
            Some((path!("items"), 12))
        );
        assert_eq!(path!("0.a").array_split(), None);
        assert_eq!(path!("items.01").array_split(), None);
        assert_eq!(path!("items.length").array_split(), None);
    }

    #[test]
    fn parse_index_is_canonical() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("007"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("1e3"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn display_joins_with_dots() {
        assert_eq!(path!("foo.bar.baz").to_string(), "foo.bar.baz");
        assert_eq!(Path::root().to_string(), "");
    }

    #[test]
    fn path_ord_groups_descendants() {
        let mut paths = [path!("b"), path!("a.b"), path!("a")];
        paths.sort();
        assert_eq!(paths, [path!("a"), path!("a.b"), path!("b")]);
    }
}
