//! The built-in fallback template, used when a followup has neither a
//! `message_override` nor a saved user template: optional brand-logo block,
//! greeting, optional description, optional due-date, signature, optional
//! footer with a rule above it.
pub const DEFAULT_SCHEDULER_TEMPLATE: &str = r#"{% if brand_logo %}<div style="text-align:center;margin-bottom:12px;"><img src="{{brand_logo}}" alt="{{company_name}}" style="max-height:48px;"></div>{% endif %}
<p>Hi {{name}},</p>
<p>Just a quick reminder about {{type}}.</p>
{% if description %}<p>{{description}}</p>{% endif %}
{% if due_date %}<p><b>Due date:</b> {{due_date}}</p>{% endif %}
<p>Thanks,<br>{{sender}}</p>
{% if footer %}<hr><p style="font-size:12px;color:#777;">{{footer}}</p>{% endif %}"#;
