// Query value object: one data-source query inside a panel

/// Group filter that matches every host group.
pub const ANY_GROUP: &str = "/.*/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    host: String,
    item: String,
    group: String,
    application: Option<String>,
    mode: Option<i64>,
    alias: Option<String>,
}

impl Query {
    pub fn new(host: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            item: item.into(),
            group: ANY_GROUP.to_string(),
            application: None,
            mode: None,
            alias: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Query semantics selector, e.g. 0 for metrics and 2 for text.
    pub fn with_mode(mut self, mode: i64) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Display label, and the variable name used by math expressions.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn mode(&self) -> Option<i64> {
        self.mode
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Label shown for this query: the alias when set, otherwise the item name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = Query::new("nutmeg", "ICMP ping");
        assert_eq!(query.group(), ANY_GROUP);
        assert_eq!(query.application(), None);
        assert_eq!(query.mode(), None);
        assert_eq!(query.display_name(), "ICMP ping");
    }

    #[test]
    fn test_alias_is_display_name() {
        let query = Query::new("nutmeg", "System uptime").with_alias("uptime");
        assert_eq!(query.display_name(), "uptime");
        assert_eq!(query.item(), "System uptime");
    }
}
