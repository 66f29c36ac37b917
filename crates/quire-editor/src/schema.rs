//! Node and mark types with their content models.

use serde_json::Value;

use crate::error::SchemaError;
use crate::model::{Attrs, DocNode, Mark};

/// What a node may contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentModel {
    /// Leaf node.
    Empty,
    /// Text and inline nodes, optionally marked.
    Inline,
    /// Unmarked text only (code blocks).
    Text,
    /// Block nodes, at least `min` of them.
    Blocks { min: usize },
    /// One or more nodes of a single type.
    Only(String),
}

/// Where a node may appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeGroup {
    Block,
    Inline,
}

/// Declaration of a node type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub group: NodeGroup,
    pub content: ContentModel,
    /// Attribute names with their defaults.
    pub attrs: Attrs,
}

impl NodeSpec {
    #[must_use]
    pub fn block(name: impl Into<String>, content: ContentModel) -> Self {
        Self {
            name: name.into(),
            group: NodeGroup::Block,
            content,
            attrs: Attrs::new(),
        }
    }

    /// Inline leaf such as an image.
    #[must_use]
    pub fn inline_atom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: NodeGroup::Inline,
            content: ContentModel::Empty,
            attrs: Attrs::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), default.into());
        self
    }
}

/// Declaration of a mark type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkSpec {
    pub name: String,
    pub attrs: Attrs,
    /// Code marks sort innermost.
    pub code: bool,
}

impl MarkSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs::new(),
            code: false,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), default.into());
        self
    }

    #[must_use]
    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }
}

/// The set of node and mark types a document may use.
///
/// Mark order is significant: marks on a node are kept sorted by it, which
/// decides how overlapping marks nest when serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    nodes: Vec<NodeSpec>,
    marks: Vec<MarkSpec>,
}

impl Schema {
    /// Core CommonMark/GFM types.
    #[must_use]
    pub fn core() -> Self {
        let blocks = ContentModel::Blocks { min: 1 };
        let only = |name: &str| ContentModel::Only(name.to_owned());
        Self {
            nodes: Vec::new(),
            marks: Vec::new(),
        }
        .with_node(NodeSpec::block("doc", blocks.clone()))
        .with_node(NodeSpec::block("paragraph", ContentModel::Inline))
        .with_node(
            NodeSpec::block("heading", ContentModel::Inline)
                .with_attr("level", 1)
                .with_attr("id", Value::Null),
        )
        .with_node(NodeSpec::block("blockquote", blocks.clone()))
        .with_node(NodeSpec::block("bullet-list", only("list-item")).with_attr("tight", true))
        .with_node(
            NodeSpec::block("ordered-list", only("list-item"))
                .with_attr("start", 1)
                .with_attr("tight", true),
        )
        .with_node(NodeSpec::block("list-item", blocks))
        .with_node(
            NodeSpec::block("code-block", ContentModel::Text).with_attr("language", Value::Null),
        )
        .with_node(NodeSpec::block("horizontal-rule", ContentModel::Empty))
        .with_node(NodeSpec::block("html", ContentModel::Empty).with_attr("value", ""))
        .with_node(
            NodeSpec::block("table", only("table-row"))
                .with_attr("alignments", Value::Array(Vec::new())),
        )
        .with_node(NodeSpec::block("table-row", only("table-cell")).with_attr("header", false))
        .with_node(NodeSpec::block("table-cell", ContentModel::Inline))
        .with_node(
            NodeSpec::inline_atom("image")
                .with_attr("src", "")
                .with_attr("alt", "")
                .with_attr("title", Value::Null),
        )
        .with_node(NodeSpec::inline_atom("html-inline").with_attr("value", ""))
        .with_node(NodeSpec::inline_atom("hard-break"))
        .with_mark(
            MarkSpec::new("link")
                .with_attr("href", "")
                .with_attr("title", Value::Null),
        )
        .with_mark(MarkSpec::new("strong"))
        .with_mark(MarkSpec::new("emphasis"))
        .with_mark(MarkSpec::new("strike"))
        .with_mark(MarkSpec::new("inline-code").code())
    }

    /// Add or replace a node type.
    #[must_use]
    pub fn with_node(mut self, spec: NodeSpec) -> Self {
        match self.nodes.iter_mut().find(|node| node.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.nodes.push(spec),
        }
        self
    }

    /// Add a mark type. Non-code marks rank before code marks.
    #[must_use]
    pub fn with_mark(mut self, spec: MarkSpec) -> Self {
        self.marks.retain(|mark| mark.name != spec.name);
        let at = if spec.code {
            self.marks.len()
        } else {
            self.marks
                .iter()
                .position(|mark| mark.code)
                .unwrap_or(self.marks.len())
        };
        self.marks.insert(at, spec);
        self
    }

    pub fn node_spec(&self, name: &str) -> Result<&NodeSpec, SchemaError> {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .ok_or_else(|| SchemaError::UnknownNode(name.to_owned()))
    }

    pub fn mark_spec(&self, name: &str) -> Result<&MarkSpec, SchemaError> {
        self.marks
            .iter()
            .find(|mark| mark.name == name)
            .ok_or_else(|| SchemaError::UnknownMark(name.to_owned()))
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.name.as_str())
    }

    pub fn mark_names(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().map(|mark| mark.name.as_str())
    }

    /// True for block node types (not text, not inline atoms).
    #[must_use]
    pub fn is_block(&self, node_type: &str) -> bool {
        self.node_spec(node_type)
            .is_ok_and(|spec| spec.group == NodeGroup::Block)
    }

    /// True for blocks whose content is inline or text.
    #[must_use]
    pub fn is_textblock(&self, node_type: &str) -> bool {
        self.node_spec(node_type).is_ok_and(|spec| {
            matches!(spec.content, ContentModel::Inline | ContentModel::Text)
        })
    }

    /// Build a node, filling attribute defaults and checking its content.
    pub fn node(
        &self,
        node_type: &str,
        attrs: Attrs,
        content: Vec<DocNode>,
    ) -> Result<DocNode, SchemaError> {
        let spec = self.node_spec(node_type)?;
        let attrs = fill_attrs(node_type, &spec.attrs, attrs)?;
        self.check_content(spec, &content)?;
        Ok(DocNode {
            attrs,
            content,
            leaf: spec.content == ContentModel::Empty,
            ..DocNode::new(node_type)
        })
    }

    /// Build a text node with marks sorted by rank.
    pub fn text(&self, value: impl Into<String>, mut marks: Vec<Mark>) -> Result<DocNode, SchemaError> {
        for mark in &marks {
            self.mark_spec(&mark.mark_type)?;
        }
        self.sort_marks(&mut marks);
        Ok(DocNode::text(value, marks))
    }

    /// Build a mark, filling attribute defaults.
    pub fn mark(&self, mark_type: &str, attrs: Attrs) -> Result<Mark, SchemaError> {
        let spec = self.mark_spec(mark_type)?;
        Ok(Mark {
            mark_type: mark_type.to_owned(),
            attrs: fill_attrs(mark_type, &spec.attrs, attrs)?,
        })
    }

    /// Sort marks by schema rank; unknown marks go last.
    pub fn sort_marks(&self, marks: &mut [Mark]) {
        marks.sort_by_key(|mark| {
            self.marks
                .iter()
                .position(|spec| spec.name == mark.mark_type)
                .unwrap_or(usize::MAX)
        });
    }

    /// Add `mark` to a mark set, replacing any mark of the same type.
    #[must_use]
    pub fn add_mark(&self, marks: &[Mark], mark: Mark) -> Vec<Mark> {
        let mut out: Vec<Mark> = marks
            .iter()
            .filter(|existing| existing.mark_type != mark.mark_type)
            .cloned()
            .collect();
        out.push(mark);
        self.sort_marks(&mut out);
        out
    }

    /// Check a whole tree against the schema.
    pub fn validate(&self, node: &DocNode) -> Result<(), SchemaError> {
        if node.is_text() {
            for mark in &node.marks {
                self.mark_spec(&mark.mark_type)?;
            }
            return Ok(());
        }
        let spec = self.node_spec(&node.node_type)?;
        self.check_content(spec, &node.content)?;
        node.content.iter().try_for_each(|child| self.validate(child))
    }

    fn check_content(&self, spec: &NodeSpec, content: &[DocNode]) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidContent {
            node: spec.name.clone(),
            reason,
        };
        match &spec.content {
            ContentModel::Empty if !content.is_empty() => {
                Err(invalid("leaf nodes have no content".to_owned()))
            }
            ContentModel::Empty => Ok(()),
            ContentModel::Inline => content.iter().try_for_each(|child| {
                if child.is_text() || self.node_spec(&child.node_type)?.group == NodeGroup::Inline {
                    Ok(())
                } else {
                    Err(invalid(format!("'{}' is not inline", child.node_type)))
                }
            }),
            ContentModel::Text => content.iter().try_for_each(|child| {
                if child.is_text() && child.marks.is_empty() {
                    Ok(())
                } else {
                    Err(invalid("only unmarked text is allowed".to_owned()))
                }
            }),
            ContentModel::Blocks { min } => {
                if content.len() < *min {
                    return Err(invalid(format!("expected at least {min} block(s)")));
                }
                content.iter().try_for_each(|child| {
                    if !child.is_text() && self.is_block(&child.node_type) {
                        Ok(())
                    } else {
                        Err(invalid(format!("'{}' is not a block", child.node_type)))
                    }
                })
            }
            ContentModel::Only(allowed) => {
                if content.is_empty() {
                    return Err(invalid(format!("expected at least one '{allowed}'")));
                }
                match content.iter().find(|child| child.node_type != *allowed) {
                    Some(child) => Err(invalid(format!("'{}' is not '{allowed}'", child.node_type))),
                    None => Ok(()),
                }
            }
        }
    }
}

fn fill_attrs(owner: &str, defaults: &Attrs, attrs: Attrs) -> Result<Attrs, SchemaError> {
    if let Some(name) = attrs.keys().find(|name| !defaults.contains_key(*name)) {
        return Err(SchemaError::UnknownAttr {
            node: owner.to_owned(),
            attr: name.clone(),
        });
    }
    let mut filled = defaults.clone();
    filled.extend(attrs);
    Ok(filled)
}

impl Default for Schema {
    fn default() -> Self {
        Self::core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attrs(value: Value) -> Attrs {
        match value {
            Value::Object(map) => map,
            _ => Attrs::new(),
        }
    }

    #[test]
    fn test_defaults_are_filled() {
        let schema = Schema::core();
        let heading = schema
            .node("heading", attrs(json!({"level": 2})), vec![DocNode::text("x", vec![])])
            .unwrap();
        assert_eq!(heading.attr_u64("level"), Some(2));
        assert_eq!(heading.attrs.get("id"), Some(&Value::Null));
    }

    #[test]
    fn test_unknown_attr_is_rejected() {
        let err = Schema::core()
            .node("paragraph", attrs(json!({"kind": "info"})), vec![])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownAttr {
                node: "paragraph".to_owned(),
                attr: "kind".to_owned(),
            }
        );
    }

    #[test]
    fn test_block_content_needs_blocks() {
        let schema = Schema::core();
        assert!(schema.node("blockquote", Attrs::new(), vec![]).is_err());
        assert!(
            schema
                .node("blockquote", Attrs::new(), vec![DocNode::text("x", vec![])])
                .is_err()
        );
        let paragraph = schema.node("paragraph", Attrs::new(), vec![]).unwrap();
        assert!(schema.node("blockquote", Attrs::new(), vec![paragraph]).is_ok());
    }

    #[test]
    fn test_code_block_rejects_marks() {
        let schema = Schema::core();
        let marked = schema.text("x", vec![Mark::new("strong")]).unwrap();
        assert!(schema.node("code-block", Attrs::new(), vec![marked]).is_err());
    }

    #[test]
    fn test_leaf_flag_follows_content_model() {
        let schema = Schema::core();
        let rule = schema.node("horizontal-rule", Attrs::new(), vec![]).unwrap();
        assert!(rule.is_leaf());
        assert_eq!(rule.node_size(), 1);
        let paragraph = schema.node("paragraph", Attrs::new(), vec![]).unwrap();
        assert_eq!(paragraph.node_size(), 2);
    }

    #[test]
    fn test_extension_marks_rank_before_code() {
        let schema = Schema::core().with_mark(MarkSpec::new("coloured-span").with_attr("class", "red"));
        let names: Vec<_> = schema.mark_names().collect();
        assert_eq!(
            names,
            vec!["link", "strong", "emphasis", "strike", "coloured-span", "inline-code"]
        );

        let mut marks = vec![Mark::new("inline-code"), Mark::new("coloured-span"), Mark::new("link")];
        schema.sort_marks(&mut marks);
        let sorted: Vec<_> = marks.iter().map(|mark| mark.mark_type.as_str()).collect();
        assert_eq!(sorted, vec!["link", "coloured-span", "inline-code"]);
    }
}
