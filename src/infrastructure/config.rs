use crate::domain::layout::LayoutConfig;
use crate::domain::panel::{GraphOptions, SingleStatOptions};
use crate::domain::query::Query;
use crate::infrastructure::grafana_mapper::ImportPolicy;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaConfig {
    pub grafana: GrafanaSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaSettings {
    /// Server root, e.g. "http://localhost:3000".
    pub url: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZabbixConfig {
    pub zabbix: ZabbixSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZabbixSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Set for servers older than 6.4.
    #[serde(default)]
    pub legacy_auth: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardsConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub import_policy: ImportPolicy,
    #[serde(default)]
    pub dashboards: Vec<DashboardDefinition>,
}

impl DashboardsConfig {
    /// Whether any panel definition needs the host directory.
    pub fn uses_host_groups(&self) -> bool {
        self.dashboards
            .iter()
            .flat_map(|dashboard| &dashboard.panels)
            .any(|panel| panel.host_group.is_some())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardDefinition {
    pub title: String,
    /// Update this existing dashboard instead of creating a new one.
    pub uid: Option<String>,
    pub layout: Option<LayoutConfig>,
    #[serde(default)]
    pub panels: Vec<PanelDefinition>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PanelKindConfig {
    Graph,
    SingleStat,
    MathStat,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Expansion {
    /// One panel per host.
    #[default]
    PerHost,
    /// One panel with a query per host, aliased by host name.
    Combined,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ItemDefinition {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryDefinition {
    pub host: String,
    pub item: String,
    pub group: Option<String>,
    pub application: Option<String>,
    pub mode: Option<i64>,
    pub alias: Option<String>,
}

impl QueryDefinition {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new(&self.host, &self.item);
        if let Some(group) = &self.group {
            query = query.with_group(group);
        }
        if let Some(application) = &self.application {
            query = query.with_application(application);
        }
        if let Some(mode) = self.mode {
            query = query.with_mode(mode);
        }
        if let Some(alias) = &self.alias {
            query = query.with_alias(alias);
        }
        query
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelDefinition {
    pub kind: PanelKindConfig,
    /// May use ${host}, ${group} and ${host_count}.
    pub title: String,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
    pub host_group: Option<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    #[serde(default)]
    pub expand: Expansion,
    pub link: Option<String>,
    pub math: Option<String>,
    #[serde(default)]
    pub graph: GraphOptions,
    #[serde(default)]
    pub stat: SingleStatOptions,
}

pub fn load_grafana_config() -> anyhow::Result<GrafanaConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/grafana").required(false))
        .add_source(config::Environment::default().separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_zabbix_config() -> anyhow::Result<ZabbixConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/zabbix").required(false))
        .add_source(config::Environment::default().separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_dashboards_config() -> anyhow::Result<DashboardsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboards"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace ${name} placeholders in a template string
pub fn prepare_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_template() {
        let mut vars = HashMap::new();
        vars.insert("group".to_string(), "Lab_240".to_string());
        vars.insert("host_count".to_string(), "12".to_string());

        let title = "Users in ${group} (${host_count} machines)";
        let result = prepare_template(title, &vars);

        assert_eq!(result, "Users in Lab_240 (12 machines)");
    }

    #[test]
    fn test_dashboards_config_from_toml() {
        let source = r#"
            import_policy = "strict"

            [layout]
            panels_per_row = 5

            [[dashboards]]
            title = "Users Per Lab"

            [[dashboards.panels]]
            kind = "math_stat"
            title = "Users in ${group}"
            host_group = "Lab_240"
            expand = "combined"
            items = [{ name = "Number of logged in users" }]

            [dashboards.panels.stat]
            postfix = " user(s)"
            colors = ["green", "yellow", "red"]
            thresholds = "1, 4"
            color_background = true

            [[dashboards.panels]]
            kind = "graph"
            title = "nutmeg traffic"
            queries = [{ host = "nutmeg", item = "Incoming network traffic on eth0", alias = "in" }]

            [dashboards.panels.graph]
            units = "bps"
            y_range = { min = 0.0, max = 800.0 }
        "#;

        let config: DashboardsConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.layout.panels_per_row(), 5);
        assert_eq!(config.layout.panel_height(), 8);
        assert_eq!(config.import_policy, ImportPolicy::Strict);
        assert!(config.uses_host_groups());

        let panels = &config.dashboards[0].panels;
        assert_eq!(panels[0].kind, PanelKindConfig::MathStat);
        assert_eq!(panels[0].expand, Expansion::Combined);
        assert_eq!(panels[0].stat.postfix.as_deref(), Some(" user(s)"));
        assert!(panels[0].stat.color_background);
        assert_eq!(panels[1].graph.units.as_deref(), Some("bps"));
        assert_eq!(panels[1].queries[0].to_query().alias(), Some("in"));
    }

    #[test]
    fn test_zero_panels_per_row_is_rejected() {
        let source = "[layout]\npanels_per_row = 0\n";
        let result = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<DashboardsConfig>();
        assert!(result.is_err());
    }
}
