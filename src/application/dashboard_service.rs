// Dashboard service - Use cases for loading, building and publishing dashboards
use crate::application::dashboard_repository::{DashboardRepository, HostDirectory};
use crate::domain::dashboard::Dashboard;
use crate::domain::layout::LayoutConfig;
use crate::domain::panel::Panel;
use crate::domain::query::Query;
use crate::infrastructure::config::{
    prepare_template, DashboardDefinition, Expansion, ItemDefinition, PanelDefinition, PanelKindConfig,
    QueryDefinition,
};
use crate::infrastructure::grafana_mapper::{dashboard_from_json, dashboard_to_document, ImportPolicy};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn DashboardRepository>,
    hosts: Option<Arc<dyn HostDirectory>>,
    import_policy: ImportPolicy,
}

impl DashboardService {
    pub fn new(
        repository: Arc<dyn DashboardRepository>,
        hosts: Option<Arc<dyn HostDirectory>>,
        import_policy: ImportPolicy,
    ) -> Self {
        Self {
            repository,
            hosts,
            import_policy,
        }
    }

    /// Fetch an existing dashboard and import it. Imported panels keep their
    /// ids, positions and sizes.
    pub async fn load(&self, uid: &str, layout: LayoutConfig) -> anyhow::Result<Dashboard> {
        let text = self.repository.fetch(uid).await?;
        let dashboard = dashboard_from_json(&text, layout, self.import_policy)
            .with_context(|| format!("Failed to import dashboard {}", uid))?;

        tracing::debug!("Loaded dashboard {} with {} panel(s)", uid, dashboard.len());
        Ok(dashboard)
    }

    /// Push the dashboard, replacing any stored version with the same uid.
    pub async fn publish(&self, dashboard: &mut Dashboard) -> anyhow::Result<()> {
        dashboard.set_overwrite(true);
        let document = dashboard_to_document(dashboard);

        if let Some(uid) = self.repository.push(&document).await? {
            dashboard.set_uid(uid);
        }

        tracing::info!("{} successfully posted (uid {})", dashboard.title(), dashboard.uid());
        Ok(())
    }

    /// Build a dashboard from its definition. With a uid, the stored dashboard
    /// is loaded and panels with the same titles as the new ones are replaced.
    pub async fn build(
        &self,
        definition: &DashboardDefinition,
        default_layout: LayoutConfig,
    ) -> anyhow::Result<Dashboard> {
        let layout = definition.layout.unwrap_or(default_layout);

        let mut panels = Vec::new();
        for panel_definition in &definition.panels {
            panels.extend(self.build_panels(panel_definition).await?);
        }

        let mut dashboard = match &definition.uid {
            Some(uid) => {
                let mut existing = self.load(uid, layout).await?;
                existing.rename(&definition.title);
                let titles: Vec<&str> = panels.iter().map(Panel::title).collect();
                existing.remove_panels_by_title(titles.as_slice());
                existing
            }
            None => Dashboard::new(&definition.title, layout),
        };

        dashboard.add_panels(panels);
        tracing::debug!("Built dashboard '{}' with {} panel(s)", dashboard.title(), dashboard.len());
        Ok(dashboard)
    }

    async fn build_panels(&self, definition: &PanelDefinition) -> anyhow::Result<Vec<Panel>> {
        let mut hosts = definition.hosts.clone();
        if let Some(group) = &definition.host_group {
            let directory = self.hosts.as_ref().with_context(|| {
                format!(
                    "Panel '{}' uses host group {} but no host directory is configured",
                    definition.title, group
                )
            })?;
            let members = directory
                .hosts_in_group(group)
                .await
                .with_context(|| format!("Failed to list hosts of group {}", group))?;
            hosts.extend(members);
        }

        let mut vars = HashMap::new();
        vars.insert(
            "group".to_string(),
            definition.host_group.clone().unwrap_or_default(),
        );
        vars.insert("host_count".to_string(), hosts.len().to_string());

        let fixed: Vec<Query> = definition.queries.iter().map(QueryDefinition::to_query).collect();

        if hosts.is_empty() {
            return Ok(vec![panel_from_definition(definition, fixed, &vars, None)?]);
        }

        match definition.expand {
            Expansion::PerHost => hosts
                .iter()
                .map(|host| {
                    let mut vars = vars.clone();
                    vars.insert("host".to_string(), host.clone());

                    let mut queries: Vec<Query> = definition
                        .items
                        .iter()
                        .map(|item| item_query(host, item))
                        .collect();
                    queries.extend(fixed.iter().cloned());
                    panel_from_definition(definition, queries, &vars, None)
                })
                .collect(),
            Expansion::Combined => {
                let mut queries = Vec::new();
                for host in &hosts {
                    for item in &definition.items {
                        let alias = if definition.items.len() == 1 {
                            host.clone()
                        } else {
                            format!("{}_{}", host, item.alias.as_deref().unwrap_or(&item.name))
                        };
                        queries.push(Query::new(host, &item.name).with_alias(alias));
                    }
                }

                // Sum of every host's value unless the definition says otherwise
                let default_math = queries
                    .iter()
                    .filter_map(Query::alias)
                    .collect::<Vec<_>>()
                    .join("+");
                queries.extend(fixed);
                Ok(vec![panel_from_definition(
                    definition,
                    queries,
                    &vars,
                    Some(default_math),
                )?])
            }
        }
    }
}

fn item_query(host: &str, item: &ItemDefinition) -> Query {
    let query = Query::new(host, &item.name);
    match &item.alias {
        Some(alias) => query.with_alias(alias),
        None => query,
    }
}

fn panel_from_definition(
    definition: &PanelDefinition,
    queries: Vec<Query>,
    vars: &HashMap<String, String>,
    default_math: Option<String>,
) -> anyhow::Result<Panel> {
    let title = prepare_template(&definition.title, vars);

    let mut stat = definition.stat.clone();
    stat.prefix = stat.prefix.map(|prefix| prepare_template(&prefix, vars));
    stat.postfix = stat.postfix.map(|postfix| prepare_template(&postfix, vars));

    let panel = match definition.kind {
        PanelKindConfig::Graph => Panel::graph(&title, queries, definition.graph.clone()),
        PanelKindConfig::SingleStat => Panel::single_stat(&title, queries, stat)
            .with_context(|| format!("Invalid single-stat panel '{}'", title))?,
        PanelKindConfig::MathStat => {
            let math = definition
                .math
                .as_deref()
                .map(|math| prepare_template(math, vars))
                .or(default_math)
                .unwrap_or_default();
            Panel::math_stat(&title, queries, stat, math)
                .with_context(|| format!("Invalid math-stat panel '{}'", title))?
        }
    };

    match &definition.link {
        Some(link) => Ok(panel
            .with_link(prepare_template(link, vars))
            .with_context(|| format!("Invalid link on panel '{}'", title))?),
        None => Ok(panel),
    }
}
