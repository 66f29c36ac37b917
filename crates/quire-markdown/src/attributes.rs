//! Attribute block parsing.
//!
//! Parses the `{#id .class key="value"}` syntax used by directives.

use std::collections::HashMap;

/// Attributes from a `{...}` block.
///
/// # Example
///
/// ```
/// use quire_markdown::Attributes;
///
/// let attrs = Attributes::parse(r#"#my-id .foo .bar lang="en""#);
/// assert_eq!(attrs.id, Some("my-id".to_string()));
/// assert_eq!(attrs.classes, vec!["foo", "bar"]);
/// assert_eq!(attrs.get("lang"), Some("en"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Attributes {
    /// ID from `{#id}`.
    pub id: Option<String>,
    /// Classes from `{.class1 .class2}`.
    pub classes: Vec<String>,
    /// Key-value pairs from `{key="value"}`.
    pub attrs: HashMap<String, String>,
}

impl Attributes {
    /// Parse an attributes string (without the surrounding braces).
    #[must_use]
    pub fn parse(attrs_str: &str) -> Self {
        let mut result = Self::default();
        let mut remaining = attrs_str.trim();

        while !remaining.is_empty() {
            remaining = remaining.trim_start();

            if let Some(rest) = remaining.strip_prefix('#') {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '.' || c == '#')
                    .unwrap_or(rest.len());
                result.id = Some(rest[..end].to_owned());
                remaining = &rest[end..];
            } else if let Some(rest) = remaining.strip_prefix('.') {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '.' || c == '#')
                    .unwrap_or(rest.len());
                result.classes.push(rest[..end].to_owned());
                remaining = &rest[end..];
            } else if let Some((key, value, rest)) = parse_key_value(remaining) {
                result.attrs.insert(key.to_owned(), value.to_owned());
                remaining = rest;
            } else {
                // Skip one unrecognized character
                let skip = remaining.chars().next().map_or(0, char::len_utf8);
                remaining = &remaining[skip..];
            }
        }

        result
    }

    /// Get a key-value attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// True when there is no id, class or key-value pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    /// Reconstruct the `{...}` syntax, or an empty string when there is nothing to emit.
    ///
    /// Keys are sorted so the output is deterministic.
    #[must_use]
    pub fn to_syntax(&self) -> String {
        let mut parts = Vec::new();

        if let Some(id) = &self.id {
            parts.push(format!("#{id}"));
        }
        for class in &self.classes {
            parts.push(format!(".{class}"));
        }

        let mut keys: Vec<_> = self.attrs.keys().collect();
        keys.sort();
        for key in keys {
            let escaped = self.attrs[key].replace('"', r#"\""#);
            parts.push(format!(r#"{key}="{escaped}""#));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", parts.join(" "))
        }
    }
}

/// Parse `key="value"`, `key='value'` or `key=value`.
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let eq_pos = s.find('=')?;
    let key = s[..eq_pos].trim();

    if key.is_empty() || key.starts_with('#') || key.starts_with('.') || key.contains(' ') {
        return None;
    }

    let after_eq = &s[eq_pos + 1..];

    if let Some(stripped) = after_eq.strip_prefix('"') {
        let end_quote = stripped.find('"')?;
        Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]))
    } else if let Some(stripped) = after_eq.strip_prefix('\'') {
        let end_quote = stripped.find('\'')?;
        Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]))
    } else {
        let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
        Some((key, &after_eq[..end], &after_eq[end..]))
    }
}
