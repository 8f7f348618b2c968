// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composite keys and the key schema of a group.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::error::{Error, Result};

/// A mapping from key field names to their textual values.
///
/// A group's key for some entity is the composite key holding a value for every field of
/// the group's [`KeySchema`]: its own key field and those of all its ancestors. Values are
/// rendered with [`Display`] when inserted, so integers and strings both work. Extra fields
/// are ignored by groups that don't need them.
///
/// # Examples
///
/// ```
/// use keynest::CompositeKey;
///
/// let key = CompositeKey::new().with("user_id", 10).with("post_id", "abc");
/// assert_eq!(key.get("user_id"), Some("10"));
///
/// let same = CompositeKey::from([("post_id", "abc"), ("user_id", "10")]);
/// assert_eq!(key, same);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    fields: BTreeMap<String, String>,
}

impl CompositeKey {
    /// Creates an empty key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `field`.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Display) -> Self {
        self.insert(field, value);
        self
    }

    /// Adds `field` if `value` is present; `None` leaves the field unset.
    #[must_use]
    pub fn with_optional<V: Display>(mut self, field: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(field, value);
        }
        self
    }

    /// Adds or replaces `field`.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Display) {
        self.fields.insert(field.into(), value.to_string());
    }

    /// Returns the value of `field`, if set.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Returns `true` if `field` is set.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value.as_str()))
    }

    pub(crate) fn require(&self, field: &str, group: &str) -> Result<&str> {
        self.get(field).ok_or_else(|| Error::missing_key(field, group))
    }
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {value}")?;
        }
        f.write_str("}")
    }
}

impl<F: Into<String>, V: Display> FromIterator<(F, V)> for CompositeKey {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut key = Self::new();
        for (field, value) in iter {
            key.insert(field, value);
        }
        key
    }
}

impl<F: Into<String>, V: Display, const N: usize> From<[(F, V); N]> for CompositeKey {
    fn from(fields: [(F, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

/// The ordered key fields a group's keys must carry, outermost ancestor first.
///
/// # Examples
///
/// ```
/// use keynest::{Config, InMemoryStore, Registry};
///
/// let registry = Registry::new();
/// registry.configure(Config::builder(InMemoryStore::new()).build())?;
/// let users = registry.register_group("users", "user_id")?;
/// let posts = users.register_child_group("posts", "post_id")?;
///
/// assert_eq!(posts.key_schema().fields(), ["user_id", "post_id"]);
/// # Ok::<(), keynest::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeySchema {
    fields: Vec<String>,
}

impl KeySchema {
    pub(crate) fn extend(&self, field: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field.to_owned());
        Self { fields }
    }

    /// Returns the field names, outermost ancestor first.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for the schema above root groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if `field` is part of the schema.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Checks a group, cache, or key field name.
///
/// Names become path segments, so they must be non-empty and free of the separator.
pub(crate) fn validate_segment(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration(format!("{what} must not be empty")));
    }

    if name.contains('/') {
        return Err(Error::configuration(format!("{what} '{name}' must not contain '/'")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_rendered_with_display() {
        let key = CompositeKey::new().with("id", 10).with("flag", true).with("name", "x");
        assert_eq!(key.get("id"), Some("10"));
        assert_eq!(key.get("flag"), Some("true"));
        assert_eq!(key.get("name"), Some("x"));
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn with_optional_skips_none() {
        let key = CompositeKey::new()
            .with_optional("present", Some(1))
            .with_optional::<u32>("absent", None);
        assert!(key.contains("present"));
        assert!(!key.contains("absent"));
    }

    #[test]
    fn empty_string_value_is_present() {
        let key = CompositeKey::new().with("id", "");
        assert_eq!(key.require("id", "g").expect("field is set"), "");
    }

    #[test]
    fn require_reports_field_and_group() {
        let err = CompositeKey::new().require("id", "users").unwrap_err();
        assert!(err.is_missing_key());
        assert!(err.to_string().contains("'id'"));
        assert!(err.to_string().contains("'users'"));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = CompositeKey::new().with("a", 1).with("b", 2);
        let b = CompositeKey::from([("b", 2), ("a", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn display_lists_fields_in_order() {
        let key = CompositeKey::from([("b", 2), ("a", 1)]);
        assert_eq!(key.to_string(), "{a: 1, b: 2}");
        assert_eq!(CompositeKey::new().to_string(), "{}");
    }

    #[test]
    fn schema_extends_without_mutating_parent() {
        let parent = KeySchema::default().extend("parentid");
        let child = parent.extend("childid");
        assert_eq!(parent.fields(), ["parentid"]);
        assert_eq!(child.fields(), ["parentid", "childid"]);
        assert!(child.contains("parentid"));
        assert!(!parent.contains("childid"));
        assert!(KeySchema::default().is_empty());
    }

    #[test]
    fn segments_reject_empty_and_separator() {
        assert!(validate_segment("group name", "users").is_ok());
        assert!(validate_segment("group name", "").unwrap_err().is_configuration());
        assert!(validate_segment("group name", "a/b").unwrap_err().is_configuration());
    }
}
