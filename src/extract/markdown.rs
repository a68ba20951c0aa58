//! Markdown rendering of segmented documents
//!
//! Renders a list of [`Segment`]s into markdown text. The same renderer
//! produces the raw rendering (all segments) and the filtered rendering
//! (the subset a content filter retained), so output options behave
//! identically in both.

use crate::config::MarkdownConfig;
use crate::extract::segment::{Segment, SegmentKind};

/// Renders segments into a markdown document
pub fn render(segments: &[Segment], options: &MarkdownConfig) -> String {
    let mut blocks = Vec::with_capacity(segments.len());

    for segment in segments {
        let block = match segment.kind {
            SegmentKind::Heading(level) => {
                format!(
                    "{} {}",
                    "#".repeat(level as usize),
                    prepare_text(&segment.text, options)
                )
            }
            SegmentKind::Paragraph => wrap_text(&prepare_text(&segment.text, options), options),
            SegmentKind::ListItem => {
                format!("- {}", wrap_text(&prepare_text(&segment.text, options), options))
            }
            SegmentKind::CodeBlock => format!("```\n{}\n```", segment.text),
            SegmentKind::Quote => {
                let text = wrap_text(&prepare_text(&segment.text, options), options);
                text.lines()
                    .map(|l| format!("> {}", l))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        blocks.push(block);
    }

    blocks.join("\n\n")
}

fn prepare_text(text: &str, options: &MarkdownConfig) -> String {
    if options.escape_html {
        escape_html(text)
    } else {
        text.to_string()
    }
}

/// Escapes HTML-significant characters so they survive as literal text
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap at the configured width; 0 disables wrapping
fn wrap_text(text: &str, options: &MarkdownConfig) -> String {
    let width = options.body_width;
    if width == 0 {
        return text.to_string();
    }

    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
        } else if line.len() + 1 + word.len() <= width {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(kind: SegmentKind, text: &str) -> Segment {
        Segment {
            kind,
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
            link_word_count: 0,
        }
    }

    #[test]
    fn test_render_basic_document() {
        let segments = vec![
            seg(SegmentKind::Heading(1), "Title"),
            seg(SegmentKind::Paragraph, "Some body text."),
            seg(SegmentKind::ListItem, "first"),
            seg(SegmentKind::ListItem, "second"),
        ];

        let md = render(&segments, &MarkdownConfig::default());
        assert_eq!(md, "# Title\n\nSome body text.\n\n- first\n\n- second");
    }

    #[test]
    fn test_render_heading_levels() {
        let segments = vec![
            seg(SegmentKind::Heading(2), "Section"),
            seg(SegmentKind::Heading(3), "Subsection"),
        ];
        let md = render(&segments, &MarkdownConfig::default());
        assert_eq!(md, "## Section\n\n### Subsection");
    }

    #[test]
    fn test_render_code_block() {
        let segments = vec![seg(SegmentKind::CodeBlock, "let x = 1;")];
        let md = render(&segments, &MarkdownConfig::default());
        assert_eq!(md, "```\nlet x = 1;\n```");
    }

    #[test]
    fn test_render_quote() {
        let segments = vec![seg(SegmentKind::Quote, "quoted words")];
        let md = render(&segments, &MarkdownConfig::default());
        assert_eq!(md, "> quoted words");
    }

    #[test]
    fn test_empty_segments_render_empty() {
        let md = render(&[], &MarkdownConfig::default());
        assert!(md.is_empty());
    }

    #[test]
    fn test_escape_html_option() {
        let options = MarkdownConfig {
            escape_html: true,
            ..Default::default()
        };
        let segments = vec![seg(SegmentKind::Paragraph, "a < b && b > c")];
        let md = render(&segments, &options);
        assert_eq!(md, "a &lt; b &amp;&amp; b &gt; c");
    }

    #[test]
    fn test_escape_does_not_touch_code() {
        let options = MarkdownConfig {
            escape_html: true,
            ..Default::default()
        };
        let segments = vec![seg(SegmentKind::CodeBlock, "if a < b {}")];
        let md = render(&segments, &options);
        assert_eq!(md, "```\nif a < b {}\n```");
    }

    #[test]
    fn test_body_width_wrapping() {
        let options = MarkdownConfig {
            body_width: 20,
            ..Default::default()
        };
        let segments = vec![seg(
            SegmentKind::Paragraph,
            "one two three four five six seven eight",
        )];
        let md = render(&segments, &options);

        for line in md.lines() {
            assert!(line.len() <= 20, "line too long: {:?}", line);
        }
        assert!(md.lines().count() > 1);
    }

    #[test]
    fn test_wrapped_quote_prefixes_every_line() {
        let options = MarkdownConfig {
            body_width: 20,
            ..Default::default()
        };
        let segments = vec![seg(
            SegmentKind::Quote,
            "a fairly long quotation that wraps lines",
        )];
        let md = render(&segments, &options);

        for line in md.lines() {
            assert!(line.starts_with("> "), "unprefixed line: {:?}", line);
        }
    }

    #[test]
    fn test_no_wrapping_when_width_zero() {
        let long = "word ".repeat(50);
        let segments = vec![seg(SegmentKind::Paragraph, long.trim())];
        let md = render(&segments, &MarkdownConfig::default());
        assert_eq!(md.lines().count(), 1);
    }
}
