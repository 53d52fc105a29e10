/*!
 * Document processor boundary.
 *
 * A processor turns a document into an ordered list of nodes and puts the
 * translated nodes back together. The engine never looks inside a document;
 * it only sees the nodes.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::node::{Node, NodeId};

/// Opening or closing line of a fenced code block
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(`{3,}|~{3,})").expect("fence pattern is valid"));

/// Splits documents into nodes and reassembles translations
pub trait DocumentProcessor: Send {
    /// Parse `text` into nodes with unique ids in document order
    fn extract(&mut self, text: &str) -> Vec<Node>;

    /// Rebuild the document. Nodes missing from `translations` keep their
    /// original content.
    fn reassemble(&self, translations: &HashMap<NodeId, String>) -> String;
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Translatable paragraph and the line ending that closed it
    Text {
        id: NodeId,
        content: String,
        line_ending: String,
    },
    /// Passed through untouched: code blocks and blank-line separators
    Protected(String),
}

#[derive(Debug, Default)]
struct Paragraph {
    content: String,
    line_ending: String,
}

/// Paragraph-based processor for plain text.
///
/// Paragraphs separated by blank lines become nodes with contiguous ids.
/// Fenced code blocks and the separators between paragraphs are kept
/// verbatim, so reassembling without translations returns the input.
#[derive(Debug, Default)]
pub struct PlainTextProcessor {
    segments: Vec<Segment>,
    text_nodes: usize,
}

impl PlainTextProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_paragraph(&mut self, paragraph: &mut Option<Paragraph>) {
        if let Some(Paragraph { content, line_ending }) = paragraph.take() {
            self.text_nodes += 1;
            let id = self.text_nodes as NodeId;
            self.segments.push(Segment::Text {
                id,
                content,
                line_ending,
            });
        }
    }

    fn push_protected(&mut self, raw: &str) {
        match self.segments.last_mut() {
            Some(Segment::Protected(previous)) => previous.push_str(raw),
            _ => self.segments.push(Segment::Protected(raw.to_string())),
        }
    }
}

/// Split a raw line into its text and its line ending
fn split_line_ending(raw: &str) -> (&str, &str) {
    let text = raw.trim_end_matches(['\n', '\r']);
    (text, &raw[text.len()..])
}

impl DocumentProcessor for PlainTextProcessor {
    fn extract(&mut self, text: &str) -> Vec<Node> {
        self.segments.clear();
        self.text_nodes = 0;

        let mut paragraph: Option<Paragraph> = None;
        let mut fence: Option<(String, String)> = None;

        for raw in text.split_inclusive('\n') {
            let (line, line_ending) = split_line_ending(raw);

            if let Some((marker, block)) = fence.as_mut() {
                block.push_str(raw);
                if line.trim_start().starts_with(marker.as_str()) {
                    let block = std::mem::take(block);
                    fence = None;
                    self.push_protected(&block);
                }
                continue;
            }

            if let Some(caps) = FENCE.captures(line) {
                self.flush_paragraph(&mut paragraph);
                fence = Some((caps[1].to_string(), raw.to_string()));
            } else if line.trim().is_empty() {
                self.flush_paragraph(&mut paragraph);
                self.push_protected(raw);
            } else {
                let current = paragraph.get_or_insert_with(Paragraph::default);
                if !current.content.is_empty() {
                    let previous_ending = std::mem::take(&mut current.line_ending);
                    current.content.push_str(&previous_ending);
                }
                current.content.push_str(line);
                current.line_ending = line_ending.to_string();
            }
        }
        self.flush_paragraph(&mut paragraph);
        // Unclosed fence runs to the end of the document
        if let Some((_, block)) = fence {
            self.push_protected(&block);
        }

        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text { id, content, .. } => Some(Node::new(*id, content.clone())),
                Segment::Protected(_) => None,
            })
            .collect()
    }

    fn reassemble(&self, translations: &HashMap<NodeId, String>) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text {
                    id,
                    content,
                    line_ending,
                } => {
                    output.push_str(translations.get(id).unwrap_or(content));
                    output.push_str(line_ending);
                }
                Segment::Protected(raw) => output.push_str(raw),
            }
        }
        output
    }
}
