//! Markdown rendering
//!
//! Blog posts and project case studies are written in Markdown and stored
//! alongside their rendered HTML. Raw HTML in the source is escaped, never
//! passed through.
//!
//! ```
//! use vitrine::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Hello\n\n**bold** <script>x</script>");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("&lt;script&gt;"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser, TagEnd};

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Render Markdown to HTML with raw HTML escaped.
    pub fn render(&self, markdown: &str) -> String {
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events);
        output
    }

    /// Plain-text summary of the first `max_chars` characters.
    ///
    /// Used when a blog is saved without an explicit excerpt.
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak => text.push(' '),
                Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => text.push(' '),
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }
        let cut: String = collapsed.chars().take(max_chars).collect();
        let cut = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", cut.trim_end())
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        let html = MarkdownRenderer::new().render("## Titre\n\nUn *site* vitrine.");
        assert!(html.contains("<h2>Titre</h2>"));
        assert!(html.contains("<em>site</em>"));
    }

    #[test]
    fn test_render_escapes_block_html() {
        let html = MarkdownRenderer::new().render("<div onclick=\"x()\">hi</div>\n");
        assert!(!html.contains("<div"));
        assert!(html.contains("&lt;div"));
    }

    #[test]
    fn test_render_escapes_inline_html() {
        let html = MarkdownRenderer::new().render("hello <img src=x onerror=alert(1)> world");
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn test_render_tables() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_code_block_content_escaped() {
        let html = MarkdownRenderer::new().render("```\n<b>not bold</b>\n```\n");
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_excerpt_strips_markup() {
        let r = MarkdownRenderer::new();
        assert_eq!(r.excerpt("# Title\n\nSome **bold** text.", 100), "Title Some bold text.");
    }

    #[test]
    fn test_excerpt_truncates_on_word() {
        let r = MarkdownRenderer::new();
        let out = r.excerpt("one two three four five", 12);
        assert_eq!(out, "one two…");
    }

    #[test]
    fn test_default_enables_extensions() {
        let html = MarkdownRenderer::default().render("| a |\n|---|\n| 1 |\n\n~~old~~\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
    }
}
