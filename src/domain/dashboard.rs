// Dashboard domain model: an ordered, laid-out panel collection
use super::layout::{layout_panels, LayoutConfig};
use super::panel::Panel;
use serde_json::{Map, Value};
use std::fmt;

/// Uid of a dashboard the backend has not stored yet.
pub const UNKNOWN_UID: &str = "unknown";

pub const SCHEMA_VERSION: u32 = 16;

/// Document fields the panel model does not interpret but must carry through a
/// fetch/push cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardMeta {
    pub id: Option<i64>,
    pub tags: Vec<String>,
    pub timezone: String,
    pub schema_version: u32,
    pub version: i64,
    pub folder_id: i64,
    pub overwrite: bool,
    /// Remaining keys of an imported dashboard object.
    pub passthrough: Map<String, Value>,
}

impl Default for DashboardMeta {
    fn default() -> Self {
        Self {
            id: None,
            tags: Vec::new(),
            timezone: "browser".to_string(),
            schema_version: SCHEMA_VERSION,
            version: 0,
            folder_id: 0,
            overwrite: false,
            passthrough: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    title: String,
    uid: String,
    panels: Vec<Panel>,
    layout: LayoutConfig,
    pub(crate) meta: DashboardMeta,
}

impl Dashboard {
    pub fn new(title: impl Into<String>, layout: LayoutConfig) -> Self {
        let title = title.into();
        tracing::debug!("Creating new dashboard '{}'", title);
        Self {
            title,
            uid: UNKNOWN_UID.to_string(),
            panels: Vec::new(),
            layout,
            meta: DashboardMeta::default(),
        }
    }

    /// Rebuild a dashboard from imported parts. Panel ids and positions are
    /// taken as they are.
    pub(crate) fn from_parts(
        title: String,
        uid: Option<String>,
        panels: Vec<Panel>,
        layout: LayoutConfig,
        meta: DashboardMeta,
    ) -> Self {
        Self {
            title,
            uid: uid.unwrap_or_else(|| UNKNOWN_UID.to_string()),
            panels,
            layout,
            meta,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Whether the backend has assigned this dashboard a uid.
    pub fn has_uid(&self) -> bool {
        self.uid != UNKNOWN_UID
    }

    pub(crate) fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = uid.into();
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn meta(&self) -> &DashboardMeta {
        &self.meta
    }

    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.meta.overwrite = overwrite;
    }

    /// Append panels below the existing ones. If the current ids are no longer
    /// `0..len`, the existing panels are laid out again first.
    pub fn add_panels(&mut self, panels: impl IntoIterator<Item = Panel>) {
        if !self.ids_contiguous() {
            tracing::debug!("Panel ids of '{}' are not contiguous, re-sorting", self.title);
            self.relayout();
        }

        let mut added: Vec<Panel> = panels.into_iter().collect();
        let start_id = self.panels.len() as u32;
        layout_panels(&mut added, start_id, &self.layout);
        self.panels.extend(added);
    }

    /// Remove every panel with a query on one of `hosts`. Returns the number of
    /// panels removed.
    pub fn remove_panels_by_host<S: AsRef<str>>(&mut self, hosts: &[S]) -> usize {
        self.remove_panels_where(hosts, "host", Panel::contains_host)
    }

    pub fn remove_panels_by_item<S: AsRef<str>>(&mut self, items: &[S]) -> usize {
        self.remove_panels_where(items, "item", Panel::contains_item)
    }

    pub fn remove_panels_by_title<S: AsRef<str>>(&mut self, titles: &[S]) -> usize {
        self.remove_panels_where(titles, "title", |panel, title| panel.title() == title)
    }

    fn remove_panels_where<S, F>(&mut self, values: &[S], key: &str, matches: F) -> usize
    where
        S: AsRef<str>,
        F: Fn(&Panel, &str) -> bool,
    {
        let before = self.panels.len();
        for value in values {
            let value = value.as_ref();
            self.panels.retain(|panel| {
                let remove = matches(panel, value);
                if remove {
                    tracing::info!("{} removed from dashboard '{}'", panel.title(), self.title);
                }
                !remove
            });
        }

        let removed = before - self.panels.len();
        if removed > 0 {
            self.relayout();
        } else {
            tracing::info!("No panels matching those {}s found in '{}'", key, self.title);
        }
        removed
    }

    fn relayout(&mut self) {
        layout_panels(&mut self.panels, 0, &self.layout);
    }

    fn ids_contiguous(&self) -> bool {
        let mut seen = vec![false; self.panels.len()];
        for panel in &self.panels {
            match seen.get_mut(panel.id() as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "title: {}", self.title)?;
        writeln!(f, "uid: {}", self.uid)?;
        writeln!(f, "panels: {}", self.panels.len())?;
        writeln!(f, "panels per row: {}", self.layout.panels_per_row())?;
        write!(f, "panel height: {}", self.layout.panel_height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::{GraphOptions, GridPosition, PanelSize};
    use crate::domain::query::Query;

    fn host_panel(host: &str) -> Panel {
        Panel::graph(
            format!("{} traffic", host),
            vec![Query::new(host, "Incoming network traffic on eth0")],
            GraphOptions::default(),
        )
    }

    fn ids(dashboard: &Dashboard) -> Vec<u32> {
        dashboard.panels().iter().map(Panel::id).collect()
    }

    #[test]
    fn test_new_dashboard() {
        let dashboard = Dashboard::new("Example", LayoutConfig::default());
        assert_eq!(dashboard.uid(), UNKNOWN_UID);
        assert!(!dashboard.has_uid());
        assert!(dashboard.is_empty());
        assert_eq!(dashboard.meta().schema_version, 16);
    }

    #[test]
    fn test_add_panels_appends_after_existing() {
        let mut dashboard = Dashboard::new("Example", LayoutConfig::new(3, 8).unwrap());
        dashboard.add_panels(vec![host_panel("nutmeg"), host_panel("basil")]);
        dashboard.add_panels(vec![host_panel("lime"), host_panel("mace"), host_panel("sage")]);

        assert_eq!(ids(&dashboard), vec![0, 1, 2, 3, 4]);
        assert_eq!(dashboard.panels()[2].position(), GridPosition::new(16.0, 0.0));
        assert_eq!(dashboard.panels()[4].position(), GridPosition::new(8.0, 8.0));
        assert_eq!(dashboard.panels()[4].size(), PanelSize::new(8.0, 8.0));
    }

    #[test]
    fn test_remove_by_host_closes_gaps() {
        let mut dashboard = Dashboard::new("Example", LayoutConfig::new(2, 8).unwrap());
        dashboard.add_panels(["nutmeg", "basil", "lime", "mace"].map(host_panel));

        assert_eq!(dashboard.remove_panels_by_host(&["basil"]), 1);
        assert_eq!(dashboard.len(), 3);
        assert_eq!(ids(&dashboard), vec![0, 1, 2]);
        assert_eq!(dashboard.panels()[1].title(), "lime traffic");
        assert_eq!(dashboard.panels()[1].position(), GridPosition::new(12.0, 0.0));
        assert_eq!(dashboard.panels()[2].position(), GridPosition::new(0.0, 8.0));
    }

    #[test]
    fn test_remove_by_item_and_title() {
        let mut dashboard = Dashboard::new("Example", LayoutConfig::default());
        let mut ping = host_panel("nutmeg");
        ping.set_title("ping");
        ping.add_queries(vec![Query::new("nutmeg", "ICMP ping")]);
        dashboard.add_panels(vec![ping, host_panel("basil"), host_panel("lime")]);

        assert_eq!(dashboard.remove_panels_by_item(&["ICMP ping"]), 1);
        assert_eq!(dashboard.remove_panels_by_title(&["lime traffic", "nope"]), 1);
        assert_eq!(dashboard.len(), 1);
        assert_eq!(dashboard.panels()[0].title(), "basil traffic");
        assert_eq!(dashboard.panels()[0].id(), 0);
    }

    #[test]
    fn test_remove_without_match_changes_nothing() {
        let mut dashboard = Dashboard::new("Example", LayoutConfig::default());
        dashboard.add_panels(vec![host_panel("nutmeg"), host_panel("basil")]);
        let before = dashboard.clone();

        assert_eq!(dashboard.remove_panels_by_host(&["thyme"]), 0);
        assert_eq!(dashboard.remove_panels_by_title(&["thyme"]), 0);
        assert_eq!(dashboard, before);
    }

    #[test]
    fn test_add_after_gap_relays_existing() {
        let layout = LayoutConfig::new(2, 8).unwrap();
        let mut first = host_panel("nutmeg");
        first.set_id(4);
        let mut second = host_panel("basil");
        second.set_id(7);
        let mut dashboard = Dashboard::from_parts(
            "Imported".to_string(),
            Some("abc".to_string()),
            vec![first, second],
            layout,
            DashboardMeta::default(),
        );

        dashboard.add_panels(vec![host_panel("lime")]);
        assert_eq!(ids(&dashboard), vec![0, 1, 2]);
        assert_eq!(dashboard.panels()[2].position(), GridPosition::new(0.0, 8.0));
    }

    #[test]
    fn test_display_summary() {
        let mut dashboard = Dashboard::new("Users Per Lab", LayoutConfig::new(3, 6).unwrap());
        dashboard.add_panels(vec![host_panel("nutmeg")]);
        dashboard.rename("Users");
        assert_eq!(
            dashboard.to_string(),
            "title: Users\nuid: unknown\npanels: 1\npanels per row: 3\npanel height: 6"
        );
    }
}
