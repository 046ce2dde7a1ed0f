//! Markdown document walking.
//!
//! [`nodes`] turns a markdown text into a lazy sequence of the two node kinds
//! docrun cares about: `docrun` metadata comments and code blocks. [`classify`]
//! then decodes metadata into fixtures.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::diagnostics::DocrunError;
use crate::fixture::{self, Fixture};

/// A code block extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    pub code: String,
    /// First word of the fence info string, if any.
    pub lang: Option<String>,
}

impl SourceBlock {
    pub fn new(code: impl Into<String>, lang: Option<&str>) -> Self {
        Self {
            code: code.into(),
            lang: lang.filter(|l| !l.is_empty()).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Inner text of a `<!-- docrun ... -->` comment.
    Metadata(String),
    Source(SourceBlock),
    /// Any other HTML block.
    Other,
}

#[derive(Debug)]
pub enum Classified {
    Fixture(Fixture),
    Source(SourceBlock),
    Malformed(DocrunError),
    Ignored,
}

/// Lazy node sequence over a markdown document, in document order.
pub struct NodeStream<'a> {
    events: Parser<'a>,
}

pub fn nodes(markdown: &str) -> NodeStream<'_> {
    NodeStream {
        events: Parser::new(markdown),
    }
}

impl Iterator for NodeStream<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        loop {
            match self.events.next()? {
                Event::Start(Tag::HtmlBlock) => {
                    let mut text = String::new();
                    for event in self.events.by_ref() {
                        match event {
                            Event::Html(chunk) | Event::Text(chunk) => text.push_str(&chunk),
                            Event::End(TagEnd::HtmlBlock) => break,
                            _ => {}
                        }
                    }
                    return Some(html_node(&text));
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match &kind {
                        CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                        CodeBlockKind::Indented => None,
                    };
                    let lang = lang.map(str::to_string);
                    let mut code = String::new();
                    for event in self.events.by_ref() {
                        match event {
                            Event::Text(chunk) => code.push_str(&chunk),
                            Event::End(TagEnd::CodeBlock) => break,
                            _ => {}
                        }
                    }
                    return Some(Node::Source(SourceBlock::new(code, lang.as_deref())));
                }
                _ => {}
            }
        }
    }
}

fn html_node(html: &str) -> Node {
    let text = html.trim_matches(|c| c == ' ' || c == '\n');
    match text
        .strip_prefix("<!--")
        .and_then(|rest| rest.strip_suffix("-->"))
        .map(str::trim)
    {
        Some(inner) if inner.starts_with("docrun") => Node::Metadata(inner.to_string()),
        _ => Node::Other,
    }
}

/// Decodes metadata nodes into fixtures; source blocks pass through.
pub fn classify(node: Node) -> Classified {
    match node {
        Node::Metadata(text) => match fixture::decode(&text) {
            Ok(fixture) => Classified::Fixture(fixture),
            Err(err) => Classified::Malformed(err),
        },
        Node::Source(source) => Classified::Source(source),
        Node::Other => Classified::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureMode;

    const DOC: &str = r#"# Title

Some prose.

<!--
docrun:
  pass: true
-->
```python
print("hi")
```

<!-- an ordinary comment -->

    indented block
"#;

    #[test]
    fn test_nodes_in_document_order() {
        let found: Vec<Node> = nodes(DOC).collect();
        assert_eq!(
            found,
            vec![
                Node::Metadata("docrun:\n  pass: true".to_string()),
                Node::Source(SourceBlock::new("print(\"hi\")\n", Some("python"))),
                Node::Other,
                Node::Source(SourceBlock::new("indented block\n", None)),
            ]
        );
    }

    #[test]
    fn test_fence_info_uses_first_word() {
        let found: Vec<Node> = nodes("```shell title=x\nls\n```\n").collect();
        assert_eq!(
            found,
            vec![Node::Source(SourceBlock::new("ls\n", Some("shell")))]
        );
    }

    #[test]
    fn test_classify_decodes_metadata() {
        let classified = classify(Node::Metadata("docrun:\n  pass: true".to_string()));
        match classified {
            Classified::Fixture(f) => assert_eq!(f.mode, FixtureMode::Pass),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify(Node::Metadata("docrun: [".to_string())),
            Classified::Malformed(_)
        ));
        assert!(matches!(classify(Node::Other), Classified::Ignored));
    }
}
