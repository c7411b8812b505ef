// Panel domain model: graph, single-stat and math-stat panels
use super::color::{resolve_colors, resolve_threshold_map, ThresholdStep};
use super::error::{DashboardError, Result};
use super::query::Query;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire tag of the math-stat plugin panel.
pub const MATH_STAT_TYPE: &str = "blackmirror1-singlestat-math-panel";

pub const DEFAULT_PANEL_HEIGHT: f64 = 8.0;
pub const DEFAULT_PANEL_WIDTH: f64 = 12.0;
pub const DEFAULT_FONT_SIZE: &str = "100%";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelType {
    Graph,
    SingleStat,
    MathStat,
}

impl PanelType {
    pub fn type_tag(self) -> &'static str {
        match self {
            PanelType::Graph => "graph",
            PanelType::SingleStat => "singlestat",
            PanelType::MathStat => MATH_STAT_TYPE,
        }
    }
}

/// Top-left corner of a panel, in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridPosition {
    pub x: f64,
    pub y: f64,
}

impl GridPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Panel extent in grid units. Widths may be fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSize {
    pub height: f64,
    pub width: f64,
}

impl PanelSize {
    pub fn new(height: f64, width: f64) -> Self {
        Self { height, width }
    }
}

impl Default for PanelSize {
    fn default() -> Self {
        Self::new(DEFAULT_PANEL_HEIGHT, DEFAULT_PANEL_WIDTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Unit format code applied to both y axes, e.g. "bps".
    pub units: Option<String>,
    /// Fixed range for the left y axis.
    pub y_range: Option<AxisRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMap {
    pub op: String,
    pub text: String,
    pub value: String,
}

impl ValueMap {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            op: "=".to_string(),
            text: text.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMap {
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueMapping {
    Values(Vec<ValueMap>),
    Ranges(Vec<RangeMap>),
}

impl ValueMapping {
    /// Backend mapping mode: 1 for value maps, 2 for range maps.
    pub fn mapping_type(&self) -> u8 {
        match self {
            ValueMapping::Values(_) => 1,
            ValueMapping::Ranges(_) => 2,
        }
    }
}

/// Everything a caller can configure on a single-stat panel. `None` keeps the
/// panel template's default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SingleStatOptions {
    pub value_maps: Option<Vec<ValueMap>>,
    /// Takes precedence over `value_maps` when both are given.
    pub range_maps: Option<Vec<RangeMap>>,
    pub font_size: Option<String>,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    /// Color names, see [`crate::domain::color::COLOR_TABLE`].
    pub colors: Option<Vec<String>>,
    pub thresholds: Option<String>,
    pub units: Option<String>,
    pub decimals: Option<u32>,
    pub sparkline: bool,
    pub color_background: bool,
    /// Setting this together with `color_background` hides the value.
    pub color_value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleStat {
    pub mapping: Option<ValueMapping>,
    pub font_size: String,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    /// Resolved hex colors.
    pub colors: Option<Vec<String>>,
    pub thresholds: Option<String>,
    pub units: Option<String>,
    pub decimals: Option<u32>,
    pub sparkline: bool,
    pub color_background: bool,
    pub color_value: bool,
}

impl Default for SingleStat {
    fn default() -> Self {
        Self {
            mapping: None,
            font_size: DEFAULT_FONT_SIZE.to_string(),
            prefix: None,
            postfix: None,
            colors: None,
            thresholds: None,
            units: None,
            decimals: None,
            sparkline: false,
            color_background: false,
            color_value: false,
        }
    }
}

impl SingleStat {
    fn from_options(options: SingleStatOptions) -> Result<Self> {
        let colors = options.colors.as_deref().map(resolve_colors).transpose()?;
        let mapping = match (options.value_maps, options.range_maps) {
            (_, Some(ranges)) => Some(ValueMapping::Ranges(ranges)),
            (Some(values), None) => Some(ValueMapping::Values(values)),
            (None, None) => None,
        };

        Ok(Self {
            mapping,
            font_size: options
                .font_size
                .unwrap_or_else(|| DEFAULT_FONT_SIZE.to_string()),
            prefix: options.prefix,
            postfix: options.postfix,
            colors,
            thresholds: options.thresholds,
            units: options.units,
            decimals: options.decimals,
            sparkline: options.sparkline,
            color_background: options.color_background,
            color_value: options.color_value,
        })
    }
}

/// Math-stat payload: the single-stat settings plus an expression over query
/// aliases.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MathStat {
    pub stat: SingleStat,
    pub math: String,
    pub threshold_map: Option<Vec<ThresholdStep>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelKind {
    Graph(GraphOptions),
    SingleStat(SingleStat),
    MathStat(MathStat),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub(crate) id: u32,
    pub(crate) title: String,
    pub(crate) queries: Vec<Query>,
    pub(crate) position: GridPosition,
    pub(crate) size: PanelSize,
    pub(crate) size_locked: bool,
    pub(crate) link: Option<String>,
    pub(crate) kind: PanelKind,
    /// Type tag of an imported panel whose type has no dedicated variant.
    pub(crate) source_type: Option<String>,
    /// Source object of an imported panel; `None` for panels built here.
    pub(crate) passthrough: Option<Map<String, Value>>,
}

impl Panel {
    fn with_kind(title: impl Into<String>, queries: Vec<Query>, kind: PanelKind) -> Self {
        Self {
            id: 0,
            title: title.into(),
            queries,
            position: GridPosition::default(),
            size: PanelSize::default(),
            size_locked: false,
            link: None,
            kind,
            source_type: None,
            passthrough: None,
        }
    }

    pub fn graph(title: impl Into<String>, queries: Vec<Query>, options: GraphOptions) -> Self {
        Self::with_kind(title, queries, PanelKind::Graph(options))
    }

    /// Fails when a color name is unknown.
    pub fn single_stat(
        title: impl Into<String>,
        queries: Vec<Query>,
        options: SingleStatOptions,
    ) -> Result<Self> {
        let stat = SingleStat::from_options(options)?;
        Ok(Self::with_kind(title, queries, PanelKind::SingleStat(stat)))
    }

    /// Builds a math-stat panel. When both colors and thresholds are given they
    /// are resolved into a threshold map, which must have a color for every
    /// boundary plus the implicit leading 0.
    pub fn math_stat(
        title: impl Into<String>,
        queries: Vec<Query>,
        options: SingleStatOptions,
        math: impl Into<String>,
    ) -> Result<Self> {
        let threshold_map = match (&options.colors, &options.thresholds) {
            (Some(colors), Some(thresholds)) => Some(resolve_threshold_map(colors.as_slice(), thresholds)?),
            _ => None,
        };
        let stat = SingleStat::from_options(options)?;
        let math = MathStat {
            stat,
            math: math.into(),
            threshold_map,
        };
        Ok(Self::with_kind(title, queries, PanelKind::MathStat(math)))
    }

    /// Attach an absolute link followed when the panel is clicked.
    pub fn with_link(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        match reqwest::Url::parse(&url) {
            Ok(parsed) if !parsed.cannot_be_a_base() => {
                self.link = Some(url);
                Ok(self)
            }
            _ => Err(DashboardError::InvalidLink(url)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn panel_type(&self) -> PanelType {
        match self.kind {
            PanelKind::Graph(_) => PanelType::Graph,
            PanelKind::SingleStat(_) => PanelType::SingleStat,
            PanelKind::MathStat(_) => PanelType::MathStat,
        }
    }

    /// Tag written to the document's `type` field.
    pub fn type_tag(&self) -> &str {
        self.source_type
            .as_deref()
            .unwrap_or_else(|| self.panel_type().type_tag())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn size(&self) -> PanelSize {
        self.size
    }

    pub fn is_size_locked(&self) -> bool {
        self.size_locked
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn kind(&self) -> &PanelKind {
        &self.kind
    }

    /// Append queries. Repeated calls accumulate.
    pub fn add_queries(&mut self, queries: impl IntoIterator<Item = Query>) {
        self.queries.extend(queries);
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.queries.iter().any(|q| q.host() == host)
    }

    pub fn contains_item(&self, item: &str) -> bool {
        self.queries.iter().any(|q| q.item() == item)
    }

    /// Assign the panel size. Only the first assignment takes effect; returns
    /// whether this call changed the size.
    pub fn set_size(&mut self, size: PanelSize) -> bool {
        if self.size_locked {
            tracing::warn!(
                "Size of panel '{}' already set to {}x{}, keeping it",
                self.title,
                self.size.height,
                self.size.width
            );
            return false;
        }
        self.size = size;
        self.size_locked = true;
        true
    }

    /// Replace the value-to-text maps of a single-stat or math-stat panel.
    /// Returns false for graph panels.
    pub fn set_value_maps(&mut self, maps: Vec<ValueMap>) -> bool {
        match self.single_stat_mut() {
            Some(stat) => {
                stat.mapping = Some(ValueMapping::Values(maps));
                true
            }
            None => false,
        }
    }

    pub fn stat_settings(&self) -> Option<&SingleStat> {
        match &self.kind {
            PanelKind::SingleStat(stat) => Some(stat),
            PanelKind::MathStat(math) => Some(&math.stat),
            PanelKind::Graph(_) => None,
        }
    }

    fn single_stat_mut(&mut self) -> Option<&mut SingleStat> {
        match &mut self.kind {
            PanelKind::SingleStat(stat) => Some(stat),
            PanelKind::MathStat(math) => Some(&mut math.stat),
            PanelKind::Graph(_) => None,
        }
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub(crate) fn set_position(&mut self, position: GridPosition) {
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_options(colors: &[&str], thresholds: &str) -> SingleStatOptions {
        SingleStatOptions {
            colors: Some(colors.iter().map(|c| c.to_string()).collect()),
            thresholds: Some(thresholds.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh_panel_defaults() {
        let panel = Panel::graph("traffic", vec![Query::new("nutmeg", "eth0")], GraphOptions::default());
        assert_eq!(panel.id(), 0);
        assert_eq!(panel.position(), GridPosition::default());
        assert_eq!(panel.size(), PanelSize::new(8.0, 12.0));
        assert!(!panel.is_size_locked());
        assert_eq!(panel.type_tag(), "graph");
    }

    #[test]
    fn test_size_is_set_once() {
        let mut panel = Panel::graph("traffic", vec![], GraphOptions::default());
        assert!(panel.set_size(PanelSize::new(6.0, 4.0)));
        assert!(!panel.set_size(PanelSize::new(10.0, 12.0)));
        assert_eq!(panel.size(), PanelSize::new(6.0, 4.0));
        assert!(panel.is_size_locked());
    }

    #[test]
    fn test_single_stat_resolves_colors() {
        let panel = Panel::single_stat("users", vec![], stat_options(&["green", "yellow", "red"], "1, 4")).unwrap();
        let stat = panel.stat_settings().unwrap();
        assert_eq!(
            stat.colors.as_deref().unwrap(),
            ["#37872D", "#E0B400", "#C4162A"]
        );
        assert_eq!(stat.thresholds.as_deref(), Some("1, 4"));
        assert_eq!(stat.font_size, "100%");
    }

    #[test]
    fn test_single_stat_rejects_unknown_color() {
        let err = Panel::single_stat("users", vec![], stat_options(&["green", "teal"], "1")).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownColor(_)));
    }

    #[test]
    fn test_range_maps_win_over_value_maps() {
        let options = SingleStatOptions {
            value_maps: Some(vec![ValueMap::new("1", "Up")]),
            range_maps: Some(vec![RangeMap {
                from: "0".into(),
                to: "10".into(),
                text: "low".into(),
            }]),
            ..Default::default()
        };
        let panel = Panel::single_stat("state", vec![], options).unwrap();
        let mapping = panel.stat_settings().unwrap().mapping.as_ref().unwrap();
        assert_eq!(mapping.mapping_type(), 2);
    }

    #[test]
    fn test_math_stat_threshold_map() {
        let panel = Panel::math_stat(
            "uptime",
            vec![],
            stat_options(&["green", "yellow", "red"], "1,4"),
            "uptime*ping",
        )
        .unwrap();
        let PanelKind::MathStat(math) = panel.kind() else {
            panic!("expected a math-stat panel");
        };
        assert_eq!(math.math, "uptime*ping");
        assert_eq!(
            math.threshold_map.as_deref().unwrap(),
            [
                ThresholdStep::new("#37872D", 0),
                ThresholdStep::new("#E0B400", 1),
                ThresholdStep::new("#C4162A", 4),
            ]
        );
        assert_eq!(panel.type_tag(), MATH_STAT_TYPE);
    }

    #[test]
    fn test_math_stat_needs_enough_colors() {
        let err = Panel::math_stat("uptime", vec![], stat_options(&["green"], "1,4"), "a").unwrap_err();
        assert!(matches!(err, DashboardError::InsufficientColors { .. }));
    }

    #[test]
    fn test_queries_accumulate_and_match() {
        let mut panel = Panel::graph("traffic", vec![Query::new("nutmeg", "in")], GraphOptions::default());
        panel.add_queries(vec![Query::new("basil", "out")]);
        panel.add_queries(vec![Query::new("lime", "out")]);
        assert_eq!(panel.queries().len(), 3);
        assert!(panel.contains_host("basil"));
        assert!(panel.contains_item("in"));
        assert!(!panel.contains_host("mace"));
    }

    #[test]
    fn test_link_must_be_absolute() {
        let panel = Panel::graph("traffic", vec![], GraphOptions::default());
        assert!(panel.clone().with_link("/d/abc").is_err());
        let linked = panel.with_link("http://grafana.local/d/abc?var-Host=lime").unwrap();
        assert_eq!(linked.link(), Some("http://grafana.local/d/abc?var-Host=lime"));
    }

    #[test]
    fn test_value_maps_only_on_stat_panels() {
        let mut graph = Panel::graph("traffic", vec![], GraphOptions::default());
        assert!(!graph.set_value_maps(vec![ValueMap::new("0", "Down")]));

        let mut stat = Panel::single_stat("ping", vec![], SingleStatOptions::default()).unwrap();
        assert!(stat.set_value_maps(vec![ValueMap::new("0", "Down")]));
        assert_eq!(stat.stat_settings().unwrap().mapping.as_ref().unwrap().mapping_type(), 1);
    }
}
