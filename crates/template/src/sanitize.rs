//! HTML allow-lists: a full allow-list for the template path and a
//! narrower one for the plain-text override path.

use std::collections::HashSet;

use ammonia::Builder;

/// Full allow-list used on the template path. Tags: block/inline text,
/// lists, tables, `<a>`, `<img>`, `<hr>`. `style` is allowed globally;
/// `href/target/rel` on anchors; `src/alt/width/height` on images (`style`
/// already covers image styling via the generic attribute).
pub fn sanitize_full(html: &str) -> String {
    let tags: HashSet<&str> = [
        "div", "p", "br", "b", "strong", "i", "em", "ul", "ol", "li", "span", "small", "h1", "h2",
        "h3", "h4", "a", "img", "hr", "table", "thead", "tbody", "tr", "th", "td",
    ]
    .into_iter()
    .collect();

    Builder::default()
        .tags(tags)
        .generic_attributes(["style"].into_iter().collect())
        .add_tag_attributes("a", ["href", "target"])
        .add_tag_attributes("img", ["src", "alt", "width", "height"])
        .link_rel(Some("noopener noreferrer"))
        .clean(html)
        .to_string()
}

/// Narrower allow-list used for `message_override`: plain-ish text with a
/// handful of inline/structural tags and bare links, no `style` attribute
/// anywhere (the override is user-authored prose, not a branded template).
pub fn sanitize_override(html: &str) -> String {
    let tags: HashSet<&str> = [
        "b", "strong", "i", "em", "u", "br", "p", "ul", "ol", "li", "div", "span", "a",
    ]
    .into_iter()
    .collect();

    Builder::default()
        .tags(tags)
        .add_tag_attributes("a", ["href", "target"])
        .link_rel(Some("noopener noreferrer"))
        .clean(html)
        .to_string()
}

/// Converts bare `http(s)://` text into `<a>` tags before a sanitize pass.
/// `ammonia` sanitizes but does not auto-linkify; this fills that gap. It
/// never touches text already inside an existing `href="..."` attribute
/// value because it runs before the first sanitize pass, on the raw
/// substituted template text.
pub fn linkify_bare_urls(text: &str) -> String {
    use std::sync::LazyLock;

    use regex::Regex;

    static URL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"(?P<url>https?://[^\s<>"']+)"#).unwrap());

    URL_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let url = &caps["url"];
            format!(r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#)
        })
        .into_owned()
}

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sanitize_strips_script_tags() {
        let out = sanitize_full("<p>hi</p><script>alert(1)</script>");
        assert!(!out.contains("script"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn override_sanitize_drops_img_and_style() {
        let out = sanitize_override(r#"<p style="color:red">hi<img src="x"></p>"#);
        assert!(!out.contains("style"));
        assert!(!out.contains("<img"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn override_sanitize_keeps_narrow_allow_list_tags() {
        let out = sanitize_override("<b>bold</b> <a href=\"https://example.com\">link</a>");
        assert!(out.contains("<b>bold</b>"));
        assert!(out.contains("href=\"https://example.com\""));
    }

    #[test]
    fn linkify_wraps_bare_urls() {
        let out = linkify_bare_urls("see https://example.com/x for more");
        assert!(out.contains(r#"<a href="https://example.com/x""#));
    }

    #[test]
    fn html_escape_handles_all_five_entities() {
        assert_eq!(html_escape("<a>&\"'"), "&lt;a&gt;&amp;&quot;&#39;");
    }
}
