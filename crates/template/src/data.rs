//! The renderer's data bag. Field names mirror the allow-listed template
//! variable names exactly (`r#type` stands in for the reserved word
//! `type`).

/// Variables available to `{{ var }}` substitution and `{% if var %}`
/// conditionals. Every field here, and nothing else, is honored by the
/// grammar — unlisted tokens render as empty string.
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    pub name: Option<String>,
    pub r#type: Option<String>,
    pub description: Option<String>,
    pub sender: Option<String>,
    pub company_name: Option<String>,
    pub due_date: Option<String>,
    pub brand_logo: Option<String>,
    pub support_email: Option<String>,
    pub footer: Option<String>,
    pub content: Option<String>,
}

impl TemplateData {
    /// Applies the defaulting rules: blank `name` -> `"there"`, blank
    /// `company_name`/`sender` -> `"Your Company"`, and a generated `footer`
    /// when `support_email` is set and no explicit footer was provided.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.name = Some("there".to_string());
        }

        let company = self
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "Your Company".to_string());

        if self.sender.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.sender = Some(company.clone());
        }
        self.company_name = Some(company);

        if self.footer.is_none() {
            if let Some(support) = self
                .support_email
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                self.footer = Some(format!("Need help? Contact {support}"));
            }
        }

        self
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "name" => self.name.as_deref(),
            "type" => self.r#type.as_deref(),
            "description" => self.description.as_deref(),
            "sender" => self.sender.as_deref(),
            "company_name" => self.company_name.as_deref(),
            "due_date" => self.due_date.as_deref(),
            "brand_logo" => self.brand_logo.as_deref(),
            "support_email" => self.support_email.as_deref(),
            "footer" => self.footer.as_deref(),
            "content" => self.content.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn truthy(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|v| !v.trim().is_empty())
    }
}
