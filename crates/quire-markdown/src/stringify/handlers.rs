//! Stringify handlers for directive and span nodes.

use crate::ast::{Directive, NodeKind, SyntaxNode};

use super::{StringifyError, StringifyHandler, Stringifier};

/// Writes `:::name`, `::name` and `:name` directives, and info boxes as
/// `:::kind` containers.
///
/// Containers that hold other containers get extra colons so the inner
/// closing fence cannot close the outer one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectiveHandler;

impl StringifyHandler for DirectiveHandler {
    fn tags(&self) -> &[&'static str] {
        &["containerDirective", "leafDirective", "textDirective", "infoBox"]
    }

    fn stringify(&self, node: &SyntaxNode, out: &Stringifier) -> Result<String, StringifyError> {
        match &node.kind {
            NodeKind::ContainerDirective(directive) => container(directive, node, out),
            NodeKind::InfoBox { kind } => container(&Directive::new(kind.as_str()), node, out),
            NodeKind::LeafDirective(directive) => Ok(directive.as_written(2)),
            NodeKind::TextDirective(directive) => Ok(directive.as_written(1)),
            kind => Err(StringifyError::Invalid {
                tag: kind.tag().to_owned(),
                reason: "not a directive".to_owned(),
            }),
        }
    }
}

fn container(
    directive: &Directive,
    node: &SyntaxNode,
    out: &Stringifier,
) -> Result<String, StringifyError> {
    let colons = 3 + container_depth(&node.children);
    let body = out.blocks(&node.children, false)?;
    let fence = ":".repeat(colons);
    let open = directive.as_written(colons);
    if body.is_empty() {
        Ok(format!("{open}\n{fence}"))
    } else {
        Ok(format!("{open}\n{body}\n{fence}"))
    }
}

/// Deepest nesting of containers below these nodes.
fn container_depth(nodes: &[SyntaxNode]) -> usize {
    nodes
        .iter()
        .map(|node| {
            let inner = container_depth(&node.children);
            match node.kind {
                NodeKind::ContainerDirective(_) | NodeKind::InfoBox { .. } => inner + 1,
                _ => inner,
            }
        })
        .max()
        .unwrap_or(0)
}

/// Writes coloured spans as `[inner]{.class}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpanHandler;

impl StringifyHandler for SpanHandler {
    fn tags(&self) -> &[&'static str] {
        &["spanClass"]
    }

    fn stringify(&self, node: &SyntaxNode, out: &Stringifier) -> Result<String, StringifyError> {
        let NodeKind::Span { class } = &node.kind else {
            return Err(StringifyError::Invalid {
                tag: node.kind.tag().to_owned(),
                reason: "not a span".to_owned(),
            });
        };
        Ok(format!("[{}]{{.{class}}}", out.inline(&node.children)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::InfoBoxKind;
    use crate::parser::MarkdownParser;
    use crate::transform::{Pipeline, TransformContext};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_containers_get_longer_fences() {
        let src = "::::info\nouter\n\n:::warning\ninner\n:::\n::::\n";
        let tree = MarkdownParser::new().with_directives().parse(src).tree;
        assert_eq!(Stringifier::standard().stringify(&tree).unwrap(), src);
    }

    #[test]
    fn test_info_box_written_as_container() {
        let tree = SyntaxNode::with_children(
            NodeKind::Root,
            vec![SyntaxNode::with_children(
                NodeKind::InfoBox {
                    kind: InfoBoxKind::Error,
                },
                vec![SyntaxNode::paragraph("Broken")],
            )],
        );
        assert_eq!(
            Stringifier::standard().stringify(&tree).unwrap(),
            ":::error\nBroken\n:::\n"
        );
    }

    #[test]
    fn test_span_with_formatted_content() {
        let tree = MarkdownParser::new().parse("a [**b** c]{.red-2}\n").tree;
        let mut ctx = TransformContext::default();
        let tree = Pipeline::editor().run_with(tree, &mut ctx);
        assert_eq!(
            Stringifier::standard().stringify(&tree).unwrap(),
            "a [**b** c]{.red-2}\n"
        );
    }

    #[test]
    fn test_leaf_and_text_directives() {
        let tree = MarkdownParser::new()
            .with_directives()
            .parse("::video[id]{autoplay=yes}\n\nPress :kbd[K]\n")
            .tree;
        assert_eq!(
            Stringifier::standard().stringify(&tree).unwrap(),
            "::video[id]{autoplay=yes}\n\nPress :kbd[K]\n"
        );
    }
}
