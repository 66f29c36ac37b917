//! End-to-end behaviour of the render and editor pipelines.

use pretty_assertions::assert_eq;
use quire_markdown::{
    InfoBoxKind, MarkdownParser, NodeKind, Pipeline, Stringifier, SyntaxNode, render_markdown,
};

fn render_tree(src: &str) -> SyntaxNode {
    let parsed = MarkdownParser::new().with_directives().parse(src);
    Pipeline::render().run(parsed.tree).0
}

fn find_all<'a>(tree: &'a SyntaxNode, pred: impl Fn(&NodeKind) -> bool) -> Vec<&'a SyntaxNode> {
    let mut out = Vec::new();
    tree.walk(&mut |node| {
        if pred(&node.kind) {
            out.push(node);
        }
    });
    out
}

#[test]
fn info_box_kinds_are_retagged_in_lower_case() {
    for (name, kind) in [
        ("info", InfoBoxKind::Info),
        ("Warning", InfoBoxKind::Warning),
        ("SUCCESS", InfoBoxKind::Success),
        ("eRRoR", InfoBoxKind::Error),
    ] {
        let tree = render_tree(&format!(":::{name}\nbody\n:::\n"));
        assert_eq!(tree.children[0].kind, NodeKind::InfoBox { kind });
    }
}

#[test]
fn other_container_names_pass_through() {
    let tree = render_tree(":::details\nbody\n:::\n");
    assert!(matches!(
        &tree.children[0].kind,
        NodeKind::ContainerDirective(directive) if directive.name == "details"
    ));
}

#[test]
fn citation_numbers_follow_encounter_order() {
    let tree = render_tree("See ^[a] and [cite:b] and [cite:a]\n");
    let numbers: Vec<_> = find_all(&tree, |kind| matches!(kind, NodeKind::Citation { .. }))
        .into_iter()
        .map(|node| match &node.kind {
            NodeKind::Citation { key, number, .. } => (key.as_str(), *number),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(numbers, vec![("a", 1), ("b", 2), ("a", 1)]);
}

#[test]
fn heading_id_is_extracted() {
    let result = render_markdown("### Title {#custom-id}\n").unwrap();
    assert_eq!(result.html, r#"<h3 id="custom-id">Title</h3>"#);
}

#[test]
fn titled_image_becomes_figure() {
    let tree = render_tree("![x](u \"My caption\")\n");
    let figure = &tree.children[0];
    assert_eq!(figure.kind, NodeKind::Figure);
    assert!(matches!(
        &figure.children[0].kind,
        NodeKind::Image { title: None, .. }
    ));
    assert_eq!(figure.children[1].kind, NodeKind::FigCaption);
    assert_eq!(figure.children[1].text_content(), "My caption");
}

#[test]
fn span_after_citation_split_is_still_found() {
    // The citation pass splits the text; the span pass must see across it.
    let result = render_markdown("[see [cite:a] here]{.teal-2}\n").unwrap();
    assert!(result.html.starts_with(r#"<p><span class="teal-2">see <sup class="citation">"#));
    assert!(result.html.ends_with(" here</span></p>"));
}

#[test]
fn editor_pipeline_roundtrips_structure() {
    let src = ":::warning\nCareful with [this]{.red}\n\n- a\n- b\n:::\n\nAt :30 we meet. Time 19:00.\n";
    let parser = MarkdownParser::new().with_directives();
    let (first, _) = Pipeline::editor().run(parser.parse(src).tree);
    let markdown = Stringifier::standard().stringify(&first).unwrap();
    let (second, _) = Pipeline::editor().run(parser.parse(&markdown).tree);
    assert_eq!(first, second);
    assert!(find_all(&first, |kind| matches!(kind, NodeKind::TextDirective(_))).is_empty());
}

/// Editor pipeline, stringify, then the editor pipeline again. The two trees
/// must match.
fn editor_roundtrip(src: &str) -> (SyntaxNode, String) {
    let parser = MarkdownParser::new().with_directives();
    let (first, _) = Pipeline::editor().run(parser.parse(src).tree);
    let markdown = Stringifier::standard().stringify(&first).unwrap();
    let (second, _) = Pipeline::editor().run(parser.parse(&markdown).tree);
    assert_eq!(first, second, "markdown: {markdown:?}");
    (first, markdown)
}

#[test]
fn html_looking_text_stays_text() {
    let (tree, markdown) = editor_roundtrip("&lt;b&gt;bold&lt;/b&gt; text\n");
    assert_eq!(markdown, "\\<b>bold\\</b> text\n");
    assert!(find_all(&tree, |kind| matches!(kind, NodeKind::InlineHtml { .. })).is_empty());
    assert_eq!(tree.children[0].text_content(), "<b>bold</b> text");

    let result = render_markdown("&lt;b&gt;bold&lt;/b&gt; text\n").unwrap();
    assert_eq!(result.html, "<p>&lt;b&gt;bold&lt;/b&gt; text</p>");
}

#[test]
fn escaped_block_markers_stay_paragraphs() {
    for src in [
        "\\- not a list\n",
        "\\+ not a list\n",
        "\\# not heading\n",
        "\\> not a quote\n",
        "1986\\. A fine year\n",
        "Title\n\\---\n",
    ] {
        let (tree, markdown) = editor_roundtrip(src);
        assert_eq!(markdown, src);
        assert_eq!(tree.children.len(), 1, "source: {src:?}");
        assert_eq!(tree.children[0].kind, NodeKind::Paragraph, "source: {src:?}");
    }
}

#[test]
fn escaped_span_syntax_is_not_a_span() {
    let (tree, markdown) = editor_roundtrip("\\[x\\]{.red}\n");
    assert!(find_all(&tree, |kind| matches!(kind, NodeKind::Span { .. })).is_empty());
    assert_eq!(markdown, "\\[x\\]{.red}\n");

    let result = render_markdown("\\[x\\]{.red} and \\[cite:a\\]\n").unwrap();
    assert!(!result.html.contains("<span"));
    assert!(!result.html.contains("citation"));
    assert_eq!(result.html, "<p>[x]{.red} and [cite:a]</p>");
}

#[test]
fn every_reference_list_gets_backlinks() {
    let tree = render_tree("A [cite:a]\n\n## References\n\n1. One\n\n## Bibliography\n\n1. Uno\n");
    let backlinks = find_all(&tree, |kind| matches!(kind, NodeKind::CitationBacklink { .. }));
    assert_eq!(backlinks.len(), 2);
}

#[cfg(feature = "serialize")]
#[test]
fn render_result_serializes() {
    let result = render_markdown(":::info\nHi\n:::\n").unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["display"][0]["tag"], "div");
}
