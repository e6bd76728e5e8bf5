use std::fmt;

use smallvec::SmallVec;

/// Path of an element inside a container, stored as components
/// rather than a slash-delimited string.
///
/// e.g. `["layers", "X_norm"]` instead of `"layers/X_norm"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemPath(SmallVec<[String; 4]>);

impl ElemPath {
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Parse a slash-separated path string into components.
    /// Strips leading/trailing slashes, filters empty segments.
    pub fn parse(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Return a new path with the last component removed.
    pub fn parent(&self) -> Self {
        if self.0.is_empty() {
            Self::root()
        } else {
            Self(self.0[..self.0.len() - 1].into())
        }
    }

    /// Append a component to produce a new path.
    pub fn push(&self, component: &str) -> Self {
        let mut new = self.0.clone();
        new.extend(
            component
                .split('/')
                .filter(|seg| !seg.is_empty())
                .map(str::to_string),
        );
        Self(new)
    }

    /// Absolute node path as backends expect it (`/layers/X_norm`).
    pub fn to_node_path(&self) -> String {
        format!("/{}", self.0.join("/"))
    }
}

impl fmt::Display for ElemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_node_path())
    }
}

impl From<&str> for ElemPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
