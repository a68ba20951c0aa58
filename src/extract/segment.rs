//! Document segmentation
//!
//! Splits a fetched HTML document into block-level segments that the
//! content filters score and the markdown renderer emits. Inline markup
//! (links, images, code) is rendered to markdown at segmentation time so
//! the link/image options apply uniformly to raw and filtered output.

use crate::config::MarkdownConfig;
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Block-level segment kinds recognized by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// h1-h6, with the heading level
    Heading(u8),
    Paragraph,
    ListItem,
    CodeBlock,
    Quote,
}

/// One block of page content
#[derive(Debug, Clone)]
pub struct Segment {
    pub kind: SegmentKind,

    /// Markdown-rendered text of the block
    pub text: String,

    /// Words of visible text in the block
    pub word_count: usize,

    /// Words of visible text inside anchors; used for link-density scoring
    pub link_word_count: usize,
}

impl Segment {
    /// Fraction of the block's words that sit inside links
    pub fn link_density(&self) -> f64 {
        if self.word_count == 0 {
            return 0.0;
        }
        self.link_word_count as f64 / self.word_count as f64
    }
}

const BLOCK_TAGS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "li",
    "pre",
    "blockquote",
];

/// Segments an HTML document into block-level content units
///
/// Only the outermost block of any nested pair becomes a segment (a `<p>`
/// inside a `<blockquote>` is part of the quote, not its own paragraph).
/// Blocks with no visible text are dropped.
pub fn segment_document(html: &str, base_url: &Url, options: &MarkdownConfig) -> Vec<Segment> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote").expect("static selector");

    let mut segments = Vec::new();

    for element in document.select(&selector) {
        if has_block_ancestor(&element) {
            continue;
        }

        let kind = match element.value().name() {
            "h1" => SegmentKind::Heading(1),
            "h2" => SegmentKind::Heading(2),
            "h3" => SegmentKind::Heading(3),
            "h4" => SegmentKind::Heading(4),
            "h5" => SegmentKind::Heading(5),
            "h6" => SegmentKind::Heading(6),
            "p" => SegmentKind::Paragraph,
            "li" => SegmentKind::ListItem,
            "pre" => SegmentKind::CodeBlock,
            "blockquote" => SegmentKind::Quote,
            _ => continue,
        };

        let mut render = InlineRender::default();
        // Code blocks keep their text verbatim, without inline markup
        let literal = kind == SegmentKind::CodeBlock;
        render_children(*element, base_url, options, literal, &mut render);

        let text = normalize_whitespace(&render.out, literal);
        if text.is_empty() {
            continue;
        }

        segments.push(Segment {
            kind,
            text,
            word_count: render.words,
            link_word_count: render.link_words,
        });
    }

    segments
}

/// True if any ancestor element is itself a block tag
fn has_block_ancestor(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BLOCK_TAGS.contains(&a.value().name()))
}

#[derive(Default)]
struct InlineRender {
    out: String,
    words: usize,
    link_words: usize,
    in_link: bool,
}

/// Walks an element's children, emitting markdown inline text
fn render_children(
    node: NodeRef<'_, Node>,
    base_url: &Url,
    options: &MarkdownConfig,
    literal: bool,
    render: &mut InlineRender,
) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                let words = text.split_whitespace().count();
                render.words += words;
                if render.in_link {
                    render.link_words += words;
                }
                render.out.push_str(text);
            }
            Node::Element(el) => match el.name() {
                _ if literal => render_children(child, base_url, options, literal, render),
                "a" => {
                    let href = el.attr("href").unwrap_or("");
                    let internal = href.starts_with('#');
                    let plain = options.ignore_links
                        || (options.skip_internal_links && internal)
                        || href.is_empty();

                    if plain {
                        // Words inside the anchor still count as link words
                        // so density scoring ignores rendering options
                        let was_in_link = render.in_link;
                        render.in_link = true;
                        render_children(child, base_url, options, literal, render);
                        render.in_link = was_in_link;
                    } else {
                        let resolved = base_url
                            .join(href)
                            .map(|u| u.to_string())
                            .unwrap_or_else(|_| href.to_string());

                        render.out.push('[');
                        let was_in_link = render.in_link;
                        render.in_link = true;
                        render_children(child, base_url, options, literal, render);
                        render.in_link = was_in_link;
                        render.out.push_str("](");
                        render.out.push_str(&resolved);
                        render.out.push(')');
                    }
                }
                "img" => {
                    if !options.ignore_images {
                        let alt = el.attr("alt").unwrap_or("");
                        let src = el.attr("src").unwrap_or("");
                        let resolved = base_url
                            .join(src)
                            .map(|u| u.to_string())
                            .unwrap_or_else(|_| src.to_string());
                        render.out.push_str(&format!("![{}]({})", alt, resolved));
                    }
                }
                "code" => {
                    render.out.push('`');
                    render_children(child, base_url, options, literal, render);
                    render.out.push('`');
                }
                "br" => render.out.push('\n'),
                "script" | "style" | "noscript" => {}
                _ => render_children(child, base_url, options, literal, render),
            },
            _ => {}
        }
    }
}

/// Collapses runs of whitespace; code blocks keep their line structure
fn normalize_whitespace(text: &str, literal: bool) -> String {
    if literal {
        return text.trim_matches('\n').trim_end().to_string();
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    fn segment(html: &str) -> Vec<Segment> {
        segment_document(html, &base(), &MarkdownConfig::default())
    }

    #[test]
    fn test_basic_blocks() {
        let segments = segment(
            "<html><body><h1>Title</h1><p>First paragraph here.</p>\
             <ul><li>item one</li><li>item two</li></ul></body></html>",
        );

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].kind, SegmentKind::Heading(1));
        assert_eq!(segments[0].text, "Title");
        assert_eq!(segments[1].kind, SegmentKind::Paragraph);
        assert_eq!(segments[1].word_count, 3);
        assert_eq!(segments[2].kind, SegmentKind::ListItem);
    }

    #[test]
    fn test_nested_blocks_not_duplicated() {
        let segments = segment("<blockquote><p>quoted words</p></blockquote>");

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Quote);
        assert_eq!(segments[0].text, "quoted words");
    }

    #[test]
    fn test_empty_blocks_dropped() {
        let segments = segment("<p></p><p>   </p><p>real</p>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "real");
    }

    #[test]
    fn test_links_rendered_and_counted() {
        let segments = segment(r#"<p>see <a href="/api">the api docs</a> now</p>"#);

        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments[0].text,
            "see [the api docs](https://example.com/api) now"
        );
        assert_eq!(segments[0].word_count, 5);
        assert_eq!(segments[0].link_word_count, 3);
    }

    #[test]
    fn test_ignore_links_option() {
        let options = MarkdownConfig {
            ignore_links: true,
            ..Default::default()
        };
        let segments = segment_document(
            r#"<p>see <a href="/api">the docs</a></p>"#,
            &base(),
            &options,
        );

        assert_eq!(segments[0].text, "see the docs");
        // Link words are still counted for density scoring
        assert_eq!(segments[0].link_word_count, 2);
    }

    #[test]
    fn test_skip_internal_links_option() {
        let options = MarkdownConfig {
            skip_internal_links: true,
            ..Default::default()
        };
        let segments = segment_document(
            r##"<p><a href="#top">back</a> and <a href="/other">other</a></p>"##,
            &base(),
            &options,
        );

        assert_eq!(
            segments[0].text,
            "back and [other](https://example.com/other)"
        );
    }

    #[test]
    fn test_images() {
        let segments = segment(r#"<p>logo <img src="/logo.png" alt="Logo"></p>"#);
        assert_eq!(
            segments[0].text,
            "logo ![Logo](https://example.com/logo.png)"
        );

        let options = MarkdownConfig {
            ignore_images: true,
            ..Default::default()
        };
        let segments = segment_document(
            r#"<p>logo <img src="/logo.png" alt="Logo"></p>"#,
            &base(),
            &options,
        );
        assert_eq!(segments[0].text, "logo");
    }

    #[test]
    fn test_code_block_kept_verbatim() {
        let segments = segment("<pre>fn main() {\n    println!();\n}</pre>");

        assert_eq!(segments[0].kind, SegmentKind::CodeBlock);
        assert!(segments[0].text.contains("fn main() {"));
        assert!(segments[0].text.contains("    println!();"));
    }

    #[test]
    fn test_inline_code() {
        let segments = segment("<p>use <code>cargo</code> here</p>");
        assert_eq!(segments[0].text, "use `cargo` here");
    }

    #[test]
    fn test_script_and_style_excluded() {
        let segments = segment("<p>visible<script>var x = 1;</script></p>");
        assert_eq!(segments[0].text, "visible");
    }

    #[test]
    fn test_link_density() {
        let seg = Segment {
            kind: SegmentKind::Paragraph,
            text: String::new(),
            word_count: 10,
            link_word_count: 4,
        };
        assert!((seg.link_density() - 0.4).abs() < 1e-9);

        let empty = Segment {
            kind: SegmentKind::Paragraph,
            text: String::new(),
            word_count: 0,
            link_word_count: 0,
        };
        assert_eq!(empty.link_density(), 0.0);
    }
}
