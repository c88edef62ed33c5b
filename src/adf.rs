//! Atlassian Document Format (ADF) text extraction
//!
//! Jira stores descriptions and comment bodies as a nested JSON tree:
//!
//! ```json
//! { "type": "doc", "version": 1, "content": [
//!     { "type": "paragraph", "content": [ { "type": "text", "text": "Hello" } ] }
//! ] }
//! ```
//!
//! Parsing is defensive: anything that does not look like a document yields
//! `None` (rendered as a placeholder), and unknown node types are skipped.

use crate::model::{Attachment, Comment};
use serde_json::{json, Value};
use tracing::debug;

/// Placeholder for absent, malformed or empty descriptions
pub const NO_DESCRIPTION: &str = "No description";
/// Placeholder for comments whose body has no text
pub const NO_CONTENT: &str = "No content";

/// One node of a rich-text tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocNode {
    Text(String),
    /// Inline leaf that renders as literal text (mentions, emoji)
    Inline(String),
    HardBreak,
    /// Any node carrying a `content` array (paragraph, list, panel, ...)
    Block(Vec<DocNode>),
    Unknown,
}

impl DocNode {
    pub fn parse(value: &Value) -> Self {
        let Some(node) = value.as_object() else {
            return DocNode::Unknown;
        };

        match node.get("type").and_then(Value::as_str) {
            Some("text") => node
                .get("text")
                .and_then(Value::as_str)
                .map(|t| DocNode::Text(t.to_string()))
                .unwrap_or(DocNode::Unknown),
            Some("hardBreak") => DocNode::HardBreak,
            Some("mention") | Some("emoji") => {
                let attrs = node.get("attrs");
                attrs
                    .and_then(|a| a.get("text"))
                    .or_else(|| attrs.and_then(|a| a.get("shortName")))
                    .and_then(Value::as_str)
                    .map(|t| DocNode::Inline(t.to_string()))
                    .unwrap_or(DocNode::Unknown)
            }
            Some(_) => match node.get("content").and_then(Value::as_array) {
                Some(children) => DocNode::Block(children.iter().map(DocNode::parse).collect()),
                None => DocNode::Unknown,
            },
            None => DocNode::Unknown,
        }
    }
}

/// A parsed `{type: "doc"}` tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<DocNode>,
}

impl Document {
    /// Returns `None` unless the root is an object with `type == "doc"` and a
    /// `content` array.
    pub fn parse(value: &Value) -> Option<Self> {
        let root = value.as_object()?;
        if root.get("type").and_then(Value::as_str) != Some("doc") {
            return None;
        }
        let content = root.get("content")?.as_array()?;
        Some(Self {
            blocks: content.iter().map(DocNode::parse).collect(),
        })
    }

    /// Inline text of each block concatenated, blocks joined by newlines.
    pub fn to_plain_text(&self) -> String {
        let mut lines = Vec::new();
        render_children(&self.blocks, &mut lines);
        lines.join("\n")
    }
}

fn render_children(children: &[DocNode], lines: &mut Vec<String>) {
    let mut line = String::new();
    for child in children {
        match child {
            DocNode::Text(text) | DocNode::Inline(text) => line.push_str(text),
            DocNode::HardBreak => flush_line(&mut line, lines),
            DocNode::Block(grandchildren) => {
                flush_line(&mut line, lines);
                render_children(grandchildren, lines);
            }
            DocNode::Unknown => {}
        }
    }
    flush_line(&mut line, lines);
}

fn flush_line(line: &mut String, lines: &mut Vec<String>) {
    if !line.is_empty() {
        lines.push(std::mem::take(line));
    }
}

/// Plain text of a document, or `None` when the input is not a document or
/// holds no text.
pub fn extract_text(doc: Option<&Value>) -> Option<String> {
    let text = Document::parse(doc?)?.to_plain_text();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Never fails: anything unusable becomes [`NO_DESCRIPTION`].
pub fn extract_description(doc: Option<&Value>) -> String {
    extract_text(doc).unwrap_or_else(|| NO_DESCRIPTION.to_string())
}

/// Flatten a comment page (`{comments: [...]}`) into [`Comment`] records.
///
/// Comments missing an author name or a creation timestamp are skipped.
pub fn extract_comments(page: Option<&Value>) -> Vec<Comment> {
    let raw = match page {
        Some(Value::Array(items)) => items,
        Some(page) => match page.get("comments").and_then(Value::as_array) {
            Some(items) => items,
            None => return Vec::new(),
        },
        None => return Vec::new(),
    };

    raw.iter()
        .enumerate()
        .filter_map(|(index, comment)| {
            let parsed = parse_comment(comment);
            if parsed.is_none() {
                debug!(index, "Skipping malformed comment");
            }
            parsed
        })
        .collect()
}

fn parse_comment(raw: &Value) -> Option<Comment> {
    let author = raw.get("author")?.get("displayName")?.as_str()?;
    let created = raw.get("created")?.as_str()?;
    Some(Comment {
        author: author.to_string(),
        body: extract_text(raw.get("body")).unwrap_or_else(|| NO_CONTENT.to_string()),
        created: created.to_string(),
    })
}

/// Flatten an issue's `attachment` array; incomplete entries are skipped.
pub fn extract_attachments(raw: Option<&Value>) -> Vec<Attachment> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|a| {
            Some(Attachment {
                filename: a.get("filename")?.as_str()?.to_string(),
                content: a.get("content")?.as_str()?.to_string(),
                created: a.get("created")?.as_str()?.to_string(),
            })
        })
        .collect()
}

/// Build a document with one paragraph per line of `text`.
pub fn plain_text_document(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                json!({ "type": "paragraph", "content": [] })
            } else {
                json!({
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": line }]
                })
            }
        })
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": paragraphs
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(texts: &[&str]) -> Value {
        let content: Vec<Value> = texts
            .iter()
            .map(|t| json!({ "type": "text", "text": t }))
            .collect();
        json!({ "type": "paragraph", "content": content })
    }

    fn doc(content: Vec<Value>) -> Value {
        json!({ "type": "doc", "version": 1, "content": content })
    }

    #[test]
    fn test_malformed_documents_yield_placeholder() {
        let cases = vec![
            Value::Null,
            json!("plain string"),
            json!(42),
            json!([]),
            json!({}),
            json!({ "type": "paragraph", "content": [] }),
            json!({ "type": "doc" }),
            json!({ "type": "doc", "content": "not an array" }),
            json!({ "content": [paragraph(&["orphan"])] }),
        ];

        for case in &cases {
            assert_eq!(extract_description(Some(case)), NO_DESCRIPTION, "{}", case);
        }
        assert_eq!(extract_description(None), NO_DESCRIPTION);
    }

    #[test]
    fn test_empty_document_yields_placeholder() {
        assert_eq!(extract_description(Some(&doc(vec![]))), NO_DESCRIPTION);
        assert_eq!(
            extract_description(Some(&doc(vec![paragraph(&["  "])]))),
            NO_DESCRIPTION
        );
    }

    #[test]
    fn test_whitespace_only_fragment_is_kept_between_blocks() {
        let value = doc(vec![
            paragraph(&["above"]),
            paragraph(&["  "]),
            paragraph(&["below"]),
        ]);
        assert_eq!(extract_description(Some(&value)), "above\n  \nbelow");
    }

    #[test]
    fn test_inline_text_concatenates_and_blocks_join_with_newlines() {
        let value = doc(vec![
            paragraph(&["Hello, ", "world"]),
            paragraph(&["Second line"]),
        ]);
        assert_eq!(extract_description(Some(&value)), "Hello, world\nSecond line");
    }

    #[test]
    fn test_nested_lists_keep_document_order() {
        let value = doc(vec![
            paragraph(&["intro"]),
            json!({
                "type": "bulletList",
                "content": [
                    { "type": "listItem", "content": [paragraph(&["one"])] },
                    { "type": "listItem", "content": [
                        paragraph(&["two"]),
                        { "type": "orderedList", "content": [
                            { "type": "listItem", "content": [paragraph(&["two.a"])] }
                        ]}
                    ]}
                ]
            }),
            paragraph(&["outro"]),
        ]);

        assert_eq!(
            extract_description(Some(&value)),
            "intro\none\ntwo\ntwo.a\noutro"
        );
    }

    #[test]
    fn test_every_fragment_appears_in_order() {
        let fragments: Vec<String> = (0..12).map(|i| format!("frag{:02}", i)).collect();
        let mut blocks = Vec::new();
        for chunk in fragments.chunks(3) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            blocks.push(json!({ "type": "blockquote", "content": [paragraph(&refs)] }));
        }

        let text = extract_description(Some(&doc(blocks)));
        let mut cursor = 0;
        for fragment in &fragments {
            let found = text[cursor..].find(fragment.as_str()).expect("fragment missing");
            cursor += found + fragment.len();
        }
    }

    #[test]
    fn test_unknown_nodes_are_skipped() {
        let value = doc(vec![
            json!({ "type": "mediaSingle", "content": [{ "type": "media", "attrs": { "id": "x" } }] }),
            json!({ "type": "rule" }),
            json!("garbage"),
            paragraph(&["kept"]),
            json!({ "type": "paragraph", "content": [{ "type": "text" }, { "type": "status" }] }),
        ]);
        assert_eq!(extract_description(Some(&value)), "kept");
    }

    #[test]
    fn test_inline_leaves() {
        let value = doc(vec![json!({
            "type": "paragraph",
            "content": [
                { "type": "mention", "attrs": { "id": "1", "text": "@Ada" } },
                { "type": "text", "text": " ships " },
                { "type": "emoji", "attrs": { "shortName": ":rocket:" } },
                { "type": "hardBreak" },
                { "type": "text", "text": "next line" }
            ]
        })]);
        assert_eq!(
            extract_description(Some(&value)),
            "@Ada ships :rocket:\nnext line"
        );
    }

    #[test]
    fn test_extract_comments() {
        let page = json!({
            "comments": [
                {
                    "author": { "displayName": "Ada" },
                    "body": doc(vec![paragraph(&["Looks good"])]),
                    "created": "2024-03-01T10:15:30.000+0100"
                },
                {
                    "author": { "accountId": "no-name" },
                    "body": doc(vec![paragraph(&["skipped"])]),
                    "created": "2024-03-01T10:15:30.000+0100"
                },
                {
                    "author": { "displayName": "Grace" },
                    "created": "2024-03-02T08:00:00.000+0000"
                },
                "not an object"
            ]
        });

        let comments = extract_comments(Some(&page));
        assert_eq!(
            comments,
            vec![
                Comment {
                    author: "Ada".into(),
                    body: "Looks good".into(),
                    created: "2024-03-01T10:15:30.000+0100".into(),
                },
                Comment {
                    author: "Grace".into(),
                    body: NO_CONTENT.into(),
                    created: "2024-03-02T08:00:00.000+0000".into(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_comments_without_page() {
        assert!(extract_comments(None).is_empty());
        assert!(extract_comments(Some(&json!({}))).is_empty());
        assert!(extract_comments(Some(&json!({ "comments": null }))).is_empty());
    }

    #[test]
    fn test_extract_attachments() {
        let raw = json!([
            {
                "filename": "spec.pdf",
                "content": "https://acme.atlassian.net/rest/api/3/attachment/content/1",
                "created": "2024-03-01T10:15:30.000+0100",
                "size": 1024
            },
            { "filename": "broken.png" }
        ]);

        let attachments = extract_attachments(Some(&raw));
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "spec.pdf");
        assert!(extract_attachments(None).is_empty());
    }

    #[test]
    fn test_plain_text_document_reads_back() {
        let built = plain_text_document("first\n\nsecond");
        assert_eq!(built["type"], "doc");
        assert_eq!(built["content"].as_array().unwrap().len(), 3);
        assert_eq!(extract_description(Some(&built)), "first\nsecond");
    }
}
