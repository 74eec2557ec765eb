use comrak::{markdown_to_html, Options};
use lazy_static::lazy_static;
use regex::Regex;

use crate::sanitize;

lazy_static! {
    static ref HIGHLIGHT_MARK: Regex =
        Regex::new(r"==([^=\s<](?:[^=<]*[^=\s<])?)==").expect("Invalid HIGHLIGHT_MARK regex pattern");
    static ref ESCAPED_CHAR_SPAN: Regex =
        Regex::new(r"<span data-escaped-char>([^<]*)</span>").expect("Invalid ESCAPED_CHAR_SPAN regex pattern");
}

pub fn to_html(src: &str) -> String {
    let opt = create_comrak_options();
    let html = markdown_to_html(src, &opt);
    let html = patch_highlight_marks(&html);
    // Escape spans only exist to keep escaped `==` out of the highlight pass
    ESCAPED_CHAR_SPAN.replace_all(&html, "$1").into_owned()
}

/// Render Markdown for read-only display: HTML with everything outside the
/// editor dialect stripped.
pub fn preview_html(src: &str) -> String {
    sanitize::sanitize_with_options(&to_html(src), true)
}

/// The comrak options describing the editor dialect. Parsing and preview
/// share them so both see the same constructs.
pub(crate) fn create_comrak_options() -> Options<'static> {
    let mut opt = Options::default();

    // Extension options
    opt.extension.strikethrough = true;
    opt.extension.tasklist = true;

    // Render options - SECURITY: never pass raw HTML through
    opt.render.unsafe_ = false;
    opt.render.escape = true;
    opt.render.escaped_char_spans = true;

    opt
}

/// comrak has no `==highlight==` syntax, so it is patched in after rendering.
/// Text inside `<code>`/`<pre>` is left alone.
pub fn patch_highlight_marks(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find("<code") {
        out.push_str(&HIGHLIGHT_MARK.replace_all(&rest[..start], "<mark>$1</mark>"));
        match rest[start..].find("</code>") {
            Some(end) => {
                let close = start + end + "</code>".len();
                out.push_str(&rest[start..close]);
                rest = &rest[close..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(&HIGHLIGHT_MARK.replace_all(rest, "<mark>$1</mark>"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_basic_markdown() {
        let md = "# Hello\n\nThis is **bold** and *italic*.";
        let html = to_html(md);
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>"));
        assert!(html.contains("<em>"));
    }

    #[test]
    fn test_heading_snapshot() {
        assert_snapshot!(to_html("# Title").trim_end(), @"<h1>Title</h1>");
    }

    #[test]
    fn test_strikethrough_extension() {
        let html = to_html("~~gone~~");
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_highlight_marks() {
        assert_snapshot!(
            patch_highlight_marks("<p>some ==marked== text</p>"),
            @"<p>some <mark>marked</mark> text</p>"
        );
    }

    #[test]
    fn test_highlight_marks_skip_code() {
        let html = "<p><code>a ==b== c</code> and ==d==</p>";
        let patched = patch_highlight_marks(html);
        assert!(patched.contains("<code>a ==b== c</code>"));
        assert!(patched.contains("<mark>d</mark>"));
    }

    #[test]
    fn test_escaped_markers_render_literally() {
        assert_snapshot!(to_html("\\=\\=x\\=\\=").trim_end(), @"<p>==x==</p>");
        assert_snapshot!(to_html("\\# not heading").trim_end(), @"<p># not heading</p>");
        let html = to_html("- \\[ \\] todo");
        assert!(!html.contains("<input"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = to_html("<b>raw</b>");
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_preview_keeps_task_checkboxes() {
        let html = preview_html("- [x] done\n- [ ] todo");
        assert!(html.contains("<input"));
        assert!(html.contains("checked"));
        assert!(html.contains("done"));
    }
}
