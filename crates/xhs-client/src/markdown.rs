//! Markdown and HTML helpers for chat content.
//!
//! Markdown is rendered GitHub-style with single newlines kept as line
//! breaks.  Raw HTML inside Markdown is escaped rather than passed through,
//! and `javascript:` link targets are neutralized, so backend text can never
//! inject markup.  [`html_to_text`] flattens rendered HTML for front ends
//! that cannot display it, such as the terminal UI.

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use regex::Regex;

/// Render Markdown to sanitized HTML.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, events);
    out
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if scheme.starts_with("javascript:") || scheme.starts_with("vbscript:") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Escape text for use between HTML tags.
pub fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Escape text for use inside a double-quoted HTML attribute.
pub fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

/// Compile a pattern known to be valid at build time.
fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid built-in pattern {re:?}: {e}"))
}

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|pre|blockquote|ul|ol|table)>")
});
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)<li[^>]*>"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)<img[^>]*>"));
static TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"<[^>]*>"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| pattern(r"\n{3,}"));

/// Flatten rendered HTML into readable plain text.
///
/// Block-level closers become newlines, list items get a bullet, images are
/// replaced by a marker, remaining tags are dropped, and entities decoded.
pub fn html_to_text(html: &str) -> String {
    let text = BLOCK_BREAK.replace_all(html, "\n");
    let text = LIST_ITEM.replace_all(&text, "• ");
    let text = IMAGE.replace_all(&text, "[图片]");
    let text = TAG.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let joined = lines.join("\n");
    BLANK_RUN.replace_all(joined.trim(), "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = render_markdown("# 标题\n\n**加粗** 文本");
        assert!(html.contains("<h1>标题</h1>"));
        assert!(html.contains("<strong>加粗</strong>"));
    }

    #[test]
    fn single_newlines_become_breaks() {
        let html = render_markdown("第一行\n第二行");
        assert!(html.contains("<br />"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = render_markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let inline = render_markdown("hello <b onclick=\"x()\">there</b>");
        assert!(!inline.contains("<b "));
    }

    #[test]
    fn javascript_links_are_neutralized() {
        let html = render_markdown("[click](javascript:alert(1))");
        assert!(html.contains("href=\"#\""));
        assert!(!html.contains("javascript:"));

        let ok = render_markdown("[site](https://www.xiaohongshu.com)");
        assert!(ok.contains("href=\"https://www.xiaohongshu.com\""));
    }

    #[test]
    fn tables_are_enabled() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn escaping_helpers() {
        assert_eq!(escape_text("<a&b>"), "&lt;a&amp;b&gt;");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
    }

    #[test]
    fn html_to_text_flattens_blocks() {
        let text = html_to_text("<h4>搜索统计</h4><ul><li>笔记：3 篇</li><li>评论：9 条</li></ul>");
        assert_eq!(text, "搜索统计\n• 笔记：3 篇\n• 评论：9 条");
    }

    #[test]
    fn html_to_text_decodes_entities_and_marks_images() {
        let text = html_to_text("<p>a &amp; b</p><img src=\"data:image/jpeg;base64,xx\">");
        assert_eq!(text, "a & b\n[图片]");
    }
}
