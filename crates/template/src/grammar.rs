//! The restricted template grammar: `{{ var }}` substitution and nestable
//! `{% if var %} ... {% endif %}` conditionals. Scans arbitrary text (not
//! just whole lines) so a conditional can open and close within the same
//! paragraph, which the built-in default template relies on.

use std::sync::LazyLock;

use regex::Regex;

use crate::data::TemplateData;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*if\s+(\w+)\s*%\}|\{%\s*endif\s*%\}").unwrap());
static VAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap());

/// Strips `{% if %}`/`{% endif %}` blocks whose condition is falsy, leaving
/// the inner text of truthy blocks (and all text outside any conditional)
/// untouched. Unmatched/unknown control tokens pass straight through the
/// variable-substitution pass and simply find no allow-listed name to fire.
pub fn render_conditionals(template: &str, data: &TemplateData) -> String {
    let mut output = String::with_capacity(template.len());
    let mut stack: Vec<bool> = Vec::new();
    let mut last_end = 0;

    for caps in TAG_RE.captures_iter(template) {
        let m = caps.get(0).unwrap();
        let chunk = &template[last_end..m.start()];
        if stack.iter().all(|&active| active) {
            output.push_str(chunk);
        }

        if let Some(var) = caps.get(1) {
            let parent_active = stack.iter().all(|&active| active);
            stack.push(parent_active && data.truthy(var.as_str()));
        } else {
            stack.pop();
        }
        last_end = m.end();
    }

    let tail = &template[last_end..];
    if stack.iter().all(|&active| active) {
        output.push_str(tail);
    }
    output
}

/// Substitutes `{{ var }}` tokens. Allow-listed names resolve to their data
/// value (or empty string if unset); everything else renders empty.
pub fn render_variables(text: &str, data: &TemplateData) -> String {
    VAR_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            data.lookup(&caps[1]).unwrap_or("").to_string()
        })
        .into_owned()
}

pub fn render(template: &str, data: &TemplateData) -> String {
    let with_conditionals_resolved = render_conditionals(template, data);
    render_variables(&with_conditionals_resolved, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with(description: Option<&str>) -> TemplateData {
        TemplateData {
            name: Some("Ada".into()),
            description: description.map(str::to_string),
            ..Default::default()
        }
        .normalized()
    }

    #[test]
    fn conditional_block_renders_when_truthy() {
        let tpl = "Hi {{name}}{% if description %}, about {{description}}{% endif %}!";
        let out = render(tpl, &data_with(Some("your checkup")));
        assert_eq!(out, "Hi Ada, about your checkup!");
    }

    #[test]
    fn conditional_block_strips_when_falsy() {
        let tpl = "Hi {{name}}{% if description %}, about {{description}}{% endif %}!";
        let out = render(tpl, &data_with(None));
        assert_eq!(out, "Hi Ada!");
    }

    #[test]
    fn unknown_variable_renders_empty() {
        let out = render_variables("x{{bogus}}y", &TemplateData::default());
        assert_eq!(out, "xy");
    }

    #[test]
    fn nested_conditionals_require_both_truthy() {
        let tpl = "{% if name %}A{% if description %}B{% endif %}C{% endif %}";
        let truthy_outer_only = TemplateData {
            name: Some("Ada".into()),
            ..Default::default()
        };
        assert_eq!(render(tpl, &truthy_outer_only), "AC");

        let both = TemplateData {
            name: Some("Ada".into()),
            description: Some("checkup".into()),
            ..Default::default()
        };
        assert_eq!(render(tpl, &both), "ABC");
    }
}
