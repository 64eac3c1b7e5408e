//! Compiles a restricted-subset template (or a plain-text override) plus a
//! data bag into sanitized HTML. Two explicit output pipelines — see
//! [`render_override`] and [`render_template`] — prevent XSS while keeping
//! rendering predictable.

mod data;
mod default_template;
mod grammar;
mod sanitize;
mod wrap;

pub use data::TemplateData;
pub use default_template::DEFAULT_SCHEDULER_TEMPLATE;

/// Override path: `message_override` is user-authored plain-ish text, not
/// HTML. Escape it, turn newlines into `<br>`, sanitize against the narrow
/// allow-list, wrap in the personal-message container, and return the full
/// document with no body-level style and no second sanitize pass.
#[must_use]
pub fn render_override(message_override: &str) -> String {
    let escaped = sanitize::html_escape(message_override);
    let with_breaks = escaped.replace('\n', "<br>");
    let sanitized = sanitize::sanitize_override(&with_breaks);
    let wrapped = wrap::wrap_personal_message(&sanitized);
    wrap::wrap_document(&wrapped, None)
}

/// Template path: render conditionals, substitute variables, linkify bare
/// URLs, sanitize against the full allow-list, wrap in the personal-message
/// container, sanitize again (belt-and-suspenders), and return the full
/// document with the template-path body style.
#[must_use]
pub fn render_template(template_source: &str, data: TemplateData) -> String {
    let data = data.normalized();
    let rendered = grammar::render(template_source, &data);
    let linkified = sanitize::linkify_bare_urls(&rendered);
    let sanitized_once = sanitize::sanitize_full(&linkified);
    let wrapped = wrap::wrap_personal_message(&sanitized_once);
    let sanitized_twice = sanitize::sanitize_full(&wrapped);
    wrap::wrap_document(&sanitized_twice, Some(wrap::TEMPLATE_BODY_STYLE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_path_escapes_html_and_preserves_line_breaks() {
        let html = render_override("Hi <b>there</b>\nSecond line");
        assert!(html.contains("Hi &lt;b&gt;there&lt;/b&gt;<br>Second line"));
        assert!(!html.contains("style=\"font-family: ui-sans-serif"));
    }

    #[test]
    fn override_path_strips_disallowed_tags() {
        let html = render_override("<script>alert(1)</script>hello");
        assert!(!html.contains("<script"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn template_path_uses_default_body_style() {
        let data = TemplateData {
            name: Some("Ada".into()),
            r#type: Some("checkup".into()),
            ..Default::default()
        };
        let html = render_template(DEFAULT_SCHEDULER_TEMPLATE, data);
        assert!(html.contains("font-family: ui-sans-serif"));
        assert!(html.contains("Hi Ada,"));
        assert!(html.contains("Just a quick reminder about checkup."));
    }

    #[test]
    fn template_path_omits_optional_blocks_when_blank() {
        let data = TemplateData {
            name: Some("Ada".into()),
            r#type: Some("checkup".into()),
            description: None,
            due_date: None,
            ..Default::default()
        };
        let html = render_template(DEFAULT_SCHEDULER_TEMPLATE, data);
        assert!(!html.contains("Due date:"));
    }

    #[test]
    fn template_path_includes_due_date_when_present() {
        let data = TemplateData {
            name: Some("Ada".into()),
            r#type: Some("checkup".into()),
            due_date: Some("2026-02-17".into()),
            ..Default::default()
        };
        let html = render_template(DEFAULT_SCHEDULER_TEMPLATE, data);
        assert!(html.contains("<b>Due date:</b> 2026-02-17"));
    }
}
