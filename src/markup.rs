//! Markdown to HTML for lesson descriptions and class assignments.
//!
//! Descriptions are written by hand in Drive and come back with whatever the
//! editor left in them: a byte-order mark, `\r\n` line endings, stray control
//! characters. [`sanitize_source`] normalizes those before
//! [pulldown-cmark](https://docs.rs/pulldown-cmark) renders the text.
//!
//! The output is embedded verbatim in the site, so raw HTML in the source is
//! rendered as text and `javascript:` links are neutralized.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html as md_html};

/// Number of assignment sections the site renders. The assignments page
/// layout assumes exactly this many.
pub const ASSIGNMENT_SECTIONS: usize = 4;

/// Opening sequence of the section separator in rendered assignments.
const SECTION_MARKER: &str = "<hr";

/// Normalize line endings and drop characters markdown has no use for.
pub fn sanitize_source(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .filter(|c| !matches!(c, '\u{200b}' | '\u{2028}' | '\u{2029}'))
        .collect()
}

/// Render markdown to HTML safe to embed in a page.
pub fn render_markdown(source: &str) -> String {
    let source = sanitize_source(source);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_script_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    });

    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

fn is_script_url(url: &str) -> bool {
    let lowered = url.trim_start().to_ascii_lowercase();
    lowered.starts_with("javascript:") || lowered.starts_with("vbscript:")
}

/// Keep HTML up to and including the `sections`-th separator tag.
///
/// A separator is located by its opening `<hr` and ends at the next `>`.
/// With fewer separators than `sections`, the input is returned unchanged.
pub fn truncate_sections(html: &str, sections: usize) -> &str {
    let mut end = 0;
    for _ in 0..sections {
        let Some(start) = html[end..].find(SECTION_MARKER).map(|i| end + i) else {
            return html;
        };
        let Some(close) = html[start..].find('>').map(|i| start + i) else {
            return html;
        };
        end = close + 1;
    }
    &html[..end]
}

/// Render the class assignments file and cap it at [`ASSIGNMENT_SECTIONS`].
pub fn render_assignments(source: &str) -> String {
    truncate_sections(&render_markdown(source), ASSIGNMENT_SECTIONS).to_string()
}
