//! Readable-text extraction from HTML
//!
//! Walks the parsed document, skipping script, style and structural chrome
//! (navigation, headers, footers and similar), and normalizes what remains into
//! one non-empty trimmed line per text block.

use crate::crawler::classifier::Failure;
use scraper::{ElementRef, Html, Node};

/// Elements whose whole subtree is dropped from the extracted text
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "svg", "form", "iframe",
    "template",
];

/// Extracts the readable text of an HTML document
///
/// Malformed markup is parsed leniently; a document with no text yields an
/// empty string.
///
/// # Arguments
///
/// * `html` - The raw HTML content
///
/// # Returns
///
/// Newline-separated lines with collapsed inner whitespace
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len() / 4);
    collect_text(document.root_element(), &mut raw);
    normalize_lines(&raw)
}

/// Depth-first walk with an explicit stack, so nesting depth is bounded only by memory
fn collect_text(root: ElementRef<'_>, out: &mut String) {
    let mut stack = vec![*root];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push('\n');
            }
            Node::Element(element) if SKIPPED_TAGS.contains(&element.name()) => {}
            Node::Element(_) => stack.extend(node.children().rev()),
            _ => {}
        }
    }
}

/// Collapses whitespace runs, trims every line and drops empty lines
pub fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accepts extracted text only if it reaches `min_chars` characters
///
/// Shorter text is a content failure, classified as `parse_error`.
pub fn check_content(text: String, min_chars: usize) -> Result<String, Failure> {
    let chars = text.trim().chars().count();
    if chars < min_chars {
        return Err(Failure::ContentTooShort {
            chars,
            min: min_chars,
        });
    }
    Ok(text)
}
