//! YAML front matter of blog posts.
//!
//! ```text
//! ---
//! title: Hello
//! tags: [rust]
//! ---
//! # Body
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Post metadata from front matter.
///
/// Unknown keys are ignored; every field is optional except `draft`, which
/// defaults to `false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    /// Publication date as written (`2024-05-01`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Explicit URL path overriding the file location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl PostMeta {
    /// Parse YAML front matter (without the `---` fences).
    pub fn from_yaml(yaml: &str) -> Result<Self, ParseError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Split a leading `---` fenced YAML block from the body.
///
/// Returns `(Some(yaml), body)` when the document starts with a front matter
/// block, otherwise `(None, src)`. An opening fence without a closing one is
/// treated as body text.
///
/// ```
/// use quire_markdown::split_front_matter;
///
/// let (yaml, body) = split_front_matter("---\ntitle: Hi\n---\n# Body\n");
/// assert_eq!(yaml, Some("title: Hi\n"));
/// assert_eq!(body, "# Body\n");
/// ```
#[must_use]
pub fn split_front_matter(src: &str) -> (Option<&str>, &str) {
    let Some(rest) = src
        .strip_prefix("---\n")
        .or_else(|| src.strip_prefix("---\r\n"))
    else {
        return (None, src);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, src)
}
