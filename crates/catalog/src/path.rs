//! Materialized category path: `Electronics/Computers/Laptops`.

use serde::{Deserialize, Serialize};

use rentdesk_core::{DomainError, DomainResult, ValueObject, validate};

pub const SEPARATOR: char = '/';
pub const MAX_PATH_LENGTH: usize = 500;
pub const MAX_NAME_LENGTH: usize = 100;

/// Validate a single path segment (a category name).
pub fn validate_name(name: &str) -> DomainResult<String> {
    let name = validate::required_text("category name", name, MAX_NAME_LENGTH)?;
    if name.contains(SEPARATOR) {
        return Err(DomainError::validation(format!(
            "category name cannot contain '{SEPARATOR}'"
        )));
    }
    Ok(name)
}

/// Full ancestry of a category, root first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryPath(String);

impl ValueObject for CategoryPath {}

impl CategoryPath {
    pub fn root(name: &str) -> DomainResult<Self> {
        Self::checked(validate_name(name)?)
    }

    /// Parse a stored or user-supplied path. Whitespace around segments is trimmed.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let segments = raw
            .trim()
            .trim_matches(SEPARATOR)
            .split(SEPARATOR)
            .map(validate_name)
            .collect::<DomainResult<Vec<_>>>()?;
        Self::checked(segments.join("/"))
    }

    pub fn append(&self, name: &str) -> DomainResult<Self> {
        let name = validate_name(name)?;
        Self::checked(format!("{}{SEPARATOR}{name}", self.0))
    }

    fn checked(path: String) -> DomainResult<Self> {
        if path.chars().count() > MAX_PATH_LENGTH {
            return Err(DomainError::validation(format!(
                "category path cannot exceed {MAX_PATH_LENGTH} characters"
            )));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Depth of the node; roots are level 1.
    pub fn level(&self) -> u32 {
        self.segments().count() as u32
    }

    pub fn is_root(&self) -> bool {
        !self.0.contains(SEPARATOR)
    }

    pub fn parent_path(&self) -> Option<Self> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| Self(parent.to_string()))
    }

    pub fn first_segment(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or_default()
    }

    /// Equal to `prefix` or somewhere beneath it. Segment-aware:
    /// `Tents/Large` does not start with `Tent`.
    pub fn starts_with(&self, prefix: &CategoryPath) -> bool {
        self == prefix || self.is_descendant_of(prefix)
    }

    /// Strictly beneath `other`.
    pub fn is_descendant_of(&self, other: &CategoryPath) -> bool {
        self.0
            .strip_prefix(other.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    pub fn is_ancestor_of(&self, other: &CategoryPath) -> bool {
        other.is_descendant_of(self)
    }

    /// Deepest path both share, if they share a root.
    pub fn common_ancestor(&self, other: &CategoryPath) -> Option<Self> {
        let shared: Vec<&str> = self
            .segments()
            .zip(other.segments())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect();
        if shared.is_empty() {
            None
        } else {
            Some(Self(shared.join("/")))
        }
    }

    /// Replace the leading `old_prefix` with `new_prefix`.
    pub fn rebase(&self, old_prefix: &CategoryPath, new_prefix: &CategoryPath) -> DomainResult<Self> {
        if !self.starts_with(old_prefix) {
            return Err(DomainError::invariant(format!(
                "path '{self}' is not under '{old_prefix}'"
            )));
        }
        let rest = &self.0[old_prefix.0.len()..];
        Self::checked(format!("{}{rest}", new_prefix.0))
    }
}

impl core::fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CategoryPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CategoryPath> for String {
    fn from(value: CategoryPath) -> Self {
        value.0
    }
}
