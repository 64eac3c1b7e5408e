//! The personal-message container and outer HTML document shell.

/// Wraps already-sanitized inner HTML in a two-`<div>` personal-message
/// container: an outer div carrying the base font/color, an inner div
/// capping line length at 600px.
#[must_use]
pub fn wrap_personal_message(inner_html: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; font-size:14px; color:#111; \
         line-height:1.6;\"><div style=\"max-width:600px;margin:0 auto;padding:16px;\">\
         {inner_html}</div></div>"
    )
}

/// Wraps a `<body>` fragment in the full HTML document shell with charset
/// and viewport meta tags. `body_style` is `None` on the override path and
/// `Some(..)` on the template path (§4.4).
#[must_use]
pub fn wrap_document(body_html: &str, body_style: Option<&str>) -> String {
    let body_attr = body_style
        .map(|s| format!(" style=\"{s}\""))
        .unwrap_or_default();
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n</head>\n\
         <body{body_attr}>\n{body_html}\n</body>\n</html>"
    )
}

pub const TEMPLATE_BODY_STYLE: &str =
    "font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Arial; padding:16px;";
