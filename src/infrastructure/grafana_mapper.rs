// Mapper between the domain model and Grafana's dashboard JSON (schema 16)
use crate::domain::color::ThresholdStep;
use crate::domain::dashboard::{Dashboard, DashboardMeta, UNKNOWN_UID};
use crate::domain::error::{DashboardError, Result};
use crate::domain::layout::LayoutConfig;
use crate::domain::panel::{
    AxisRange, GraphOptions, GridPosition, MathStat, Panel, PanelKind, PanelSize, PanelType,
    RangeMap, SingleStat, ValueMap, ValueMapping, DEFAULT_FONT_SIZE, MATH_STAT_TYPE,
};
use crate::domain::query::Query;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const SET_ALIAS: &str = "setAlias";

/// How to treat panel types without a dedicated variant on import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    /// Import them as single-stat panels, keeping their type tag and fields.
    #[default]
    Lenient,
    /// Reject the document.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub filter: String,
}

impl Filter {
    fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetOptions {
    pub show_disabled_items: bool,
    pub skip_empty_values: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableOptions {
    pub skip_empty_values: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionDef {
    pub category: String,
    pub default_params: Vec<Value>,
    pub name: String,
    pub params: Vec<FunctionParam>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetFunction {
    pub added: bool,
    pub def: FunctionDef,
    pub params: Vec<Value>,
    pub text: String,
}

impl TargetFunction {
    fn set_alias(alias: &str) -> Self {
        Self {
            added: false,
            def: FunctionDef {
                category: "Alias".to_string(),
                default_params: Vec::new(),
                name: SET_ALIAS.to_string(),
                params: vec![FunctionParam {
                    name: "alias".to_string(),
                    kind: "string".to_string(),
                }],
            },
            params: vec![Value::String(alias.to_string())],
            text: format!("{}({})", SET_ALIAS, alias),
        }
    }
}

/// Serialized form of one query inside a panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Target {
    pub application: Filter,
    pub functions: Vec<TargetFunction>,
    pub group: Filter,
    pub host: Filter,
    pub item: Filter,
    pub mode: i64,
    pub options: TargetOptions,
    pub ref_id: String,
    pub result_format: String,
    pub table: TableOptions,
}

pub fn query_to_target(query: &Query) -> Target {
    Target {
        application: Filter::new(query.application().unwrap_or_default()),
        functions: vec![TargetFunction::set_alias(query.display_name())],
        group: Filter::new(query.group()),
        host: Filter::new(query.host()),
        item: Filter::new(query.item()),
        mode: query.mode().unwrap_or(0),
        options: TargetOptions::default(),
        ref_id: "A".to_string(),
        result_format: "time_series".to_string(),
        table: TableOptions::default(),
    }
}

/// Rebuild a query from its target. The alias is recovered from the
/// `setAlias` function when it differs from the item name.
pub fn query_from_target(target: &Target) -> Query {
    target_query(target, false)
}

/// Math expressions name their operands by alias, so math-stat targets always
/// carry an explicit one.
fn target_query(target: &Target, explicit_alias: bool) -> Query {
    let mut query = Query::new(&target.host.filter, &target.item.filter).with_group(&target.group.filter);
    if !target.application.filter.is_empty() {
        query = query.with_application(&target.application.filter);
    }
    if target.mode != 0 {
        query = query.with_mode(target.mode);
    }

    let alias = target
        .functions
        .iter()
        .find(|function| function.def.name == SET_ALIAS)
        .and_then(|function| function.params.first())
        .and_then(Value::as_str);
    match alias {
        Some(alias) if explicit_alias || alias != target.item.filter => query.with_alias(alias),
        _ => query,
    }
}

pub fn dashboard_to_document(dashboard: &Dashboard) -> Value {
    let meta = dashboard.meta();
    let mut body = meta.passthrough.clone();
    body.insert("id".to_string(), json!(meta.id));
    if dashboard.has_uid() {
        body.insert("uid".to_string(), json!(dashboard.uid()));
    }
    body.insert("title".to_string(), json!(dashboard.title()));
    body.insert("tags".to_string(), json!(meta.tags));
    body.insert(
        "panels".to_string(),
        Value::Array(dashboard.panels().iter().map(panel_to_document).collect()),
    );
    body.insert("timezone".to_string(), json!(meta.timezone));
    body.insert("schemaVersion".to_string(), json!(meta.schema_version));
    body.insert("version".to_string(), json!(meta.version));

    json!({
        "dashboard": Value::Object(body),
        "folderID": meta.folder_id,
        "overwrite": meta.overwrite,
    })
}

pub fn dashboard_to_json(dashboard: &Dashboard) -> Result<String> {
    Ok(serde_json::to_string(&dashboard_to_document(dashboard))?)
}

pub fn dashboard_from_json(text: &str, layout: LayoutConfig, policy: ImportPolicy) -> Result<Dashboard> {
    let document: Value = serde_json::from_str(text)?;
    dashboard_from_document(&document, layout, policy)
}

/// Import a dashboard. Accepts the push envelope, the fetch response
/// (`{"dashboard": .., "meta": ..}`) or a bare dashboard object.
pub fn dashboard_from_document(
    document: &Value,
    layout: LayoutConfig,
    policy: ImportPolicy,
) -> Result<Dashboard> {
    let envelope = document
        .as_object()
        .ok_or_else(|| malformed("document is not an object"))?;
    let body = match envelope.get("dashboard") {
        Some(Value::Object(body)) => body,
        Some(_) => return Err(malformed("'dashboard' is not an object")),
        None => envelope,
    };

    let title = body
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("dashboard has no title"))?
        .to_string();
    let uid = body
        .get("uid")
        .and_then(Value::as_str)
        .filter(|uid| !uid.is_empty() && *uid != UNKNOWN_UID)
        .map(str::to_string);

    let panels = match body.get("panels") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| panel_from_document(entry, policy))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(malformed("'panels' is not an array")),
        None => Vec::new(),
    };

    let defaults = DashboardMeta::default();
    let folder_id = envelope
        .get("folderID")
        .or_else(|| envelope.get("folderId"))
        .or_else(|| envelope.get("meta").and_then(|meta| meta.get("folderId")))
        .and_then(Value::as_i64)
        .unwrap_or(defaults.folder_id);

    let mut passthrough = body.clone();
    for key in ["id", "uid", "title", "tags", "panels", "timezone", "schemaVersion", "version"] {
        passthrough.remove(key);
    }

    let meta = DashboardMeta {
        id: body.get("id").and_then(Value::as_i64),
        tags: body
            .get("tags")
            .and_then(|tags| serde_json::from_value(tags.clone()).ok())
            .unwrap_or_default(),
        timezone: string_field(body, "timezone").unwrap_or(defaults.timezone),
        schema_version: body
            .get("schemaVersion")
            .and_then(Value::as_u64)
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or(defaults.schema_version),
        version: body.get("version").and_then(Value::as_i64).unwrap_or(defaults.version),
        folder_id,
        overwrite: envelope
            .get("overwrite")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.overwrite),
        passthrough,
    };

    tracing::debug!("Imported dashboard '{}' with {} panel(s)", title, panels.len());
    Ok(Dashboard::from_parts(title, uid, panels, layout, meta))
}

pub fn panel_to_document(panel: &Panel) -> Value {
    let mut doc = match &panel.passthrough {
        Some(source) => source.clone(),
        None => panel_template(panel.panel_type()),
    };

    let size = panel.size();
    let position = panel.position();
    doc.insert("id".to_string(), json!(panel.id()));
    doc.insert("type".to_string(), json!(panel.type_tag()));
    doc.insert("title".to_string(), json!(panel.title()));
    doc.insert(
        "gridPos".to_string(),
        json!({
            "x": grid_unit(position.x),
            "y": grid_unit(position.y),
            "h": grid_unit(size.height),
            "w": grid_unit(size.width),
        }),
    );
    let targets = targets_document(panel);
    doc.insert("targets".to_string(), targets);
    if let Some(url) = panel.link() {
        apply_link(&mut doc, url);
    }

    // Panels of unsupported types only get the common fields projected.
    if panel.source_type.is_none() {
        match panel.kind() {
            PanelKind::Graph(options) => apply_graph(&mut doc, options),
            PanelKind::SingleStat(stat) => apply_single_stat(&mut doc, stat),
            PanelKind::MathStat(math) => {
                apply_single_stat(&mut doc, &math.stat);
                apply_math_stat(&mut doc, math);
            }
        }
    }

    Value::Object(doc)
}

/// Import one panel. The source object is kept so fields without a typed
/// counterpart survive re-export; the panel's size stays as the source set it.
pub fn panel_from_document(document: &Value, policy: ImportPolicy) -> Result<Panel> {
    let doc = document
        .as_object()
        .ok_or_else(|| malformed("panel is not an object"))?;
    let type_tag = doc
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("panel has no type"))?;
    let title = string_field(doc, "title").unwrap_or_default();

    let (kind, source_type) = match type_tag {
        "graph" => (PanelKind::Graph(graph_from_document(doc)), None),
        "singlestat" => (PanelKind::SingleStat(single_stat_from_document(doc)), None),
        MATH_STAT_TYPE => (PanelKind::MathStat(math_stat_from_document(doc)), None),
        other => match policy {
            ImportPolicy::Strict => {
                return Err(DashboardError::UnsupportedPanelType(other.to_string()));
            }
            ImportPolicy::Lenient => {
                tracing::warn!(
                    "Panel '{}' has unsupported type '{}', importing it as singlestat",
                    title,
                    other
                );
                (
                    PanelKind::SingleStat(single_stat_from_document(doc)),
                    Some(other.to_string()),
                )
            }
        },
    };

    let grid = doc
        .get("gridPos")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(&format!("panel '{}' has no gridPos", title)))?;
    let coordinate = |key: &str| {
        grid.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(&format!("panel '{}' has no gridPos.{}", title, key)))
    };
    let position = GridPosition::new(coordinate("x")?, coordinate("y")?);
    let size = PanelSize::new(coordinate("h")?, coordinate("w")?);

    let explicit_alias = matches!(kind, PanelKind::MathStat(_));
    let mut queries = Vec::new();
    if let Some(Value::Array(targets)) = doc.get("targets") {
        for (index, raw) in targets.iter().enumerate() {
            match decode_target(raw, explicit_alias) {
                Some(query) => queries.push(query),
                None if policy == ImportPolicy::Strict => {
                    return Err(malformed(&format!(
                        "target {} of panel '{}' is not a Zabbix query",
                        index, title
                    )));
                }
                None => tracing::warn!(
                    "Target {} of panel '{}' is not a Zabbix query, keeping it as is",
                    index,
                    title
                ),
            }
        }
    }

    let link = doc
        .get("links")
        .and_then(Value::as_array)
        .and_then(|links| links.iter().find_map(|link| link.get("url").and_then(Value::as_str)))
        .map(str::to_string);

    let id = doc
        .get("id")
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .unwrap_or(0);

    Ok(Panel {
        id,
        title,
        queries,
        position,
        size,
        size_locked: true,
        link,
        kind,
        source_type,
        passthrough: Some(doc.clone()),
    })
}

/// Imported targets that still describe the same query are written back
/// verbatim, so datasource fields the query model does not know survive.
/// Targets of other datasources keep their place.
fn targets_document(panel: &Panel) -> Value {
    let explicit_alias = panel.source_type.is_none() && panel.panel_type() == PanelType::MathStat;
    let fresh = |query: &Query| serde_json::to_value(query_to_target(query)).unwrap_or(Value::Null);

    let source = panel
        .passthrough
        .as_ref()
        .and_then(|doc| doc.get("targets"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut queries = panel.queries().iter();
    let mut targets = Vec::with_capacity(source.len().max(panel.queries().len()));
    for raw in source {
        match decode_target(raw, explicit_alias) {
            None => targets.push(raw.clone()),
            Some(decoded) => {
                if let Some(query) = queries.next() {
                    if decoded == *query {
                        targets.push(raw.clone());
                    } else {
                        targets.push(fresh(query));
                    }
                }
            }
        }
    }
    targets.extend(queries.map(fresh));
    Value::Array(targets)
}

/// `None` for targets that do not address a Zabbix host and item.
fn decode_target(raw: &Value, explicit_alias: bool) -> Option<Query> {
    if raw.get("host").is_none() || raw.get("item").is_none() {
        return None;
    }
    serde_json::from_value::<Target>(raw.clone())
        .ok()
        .map(|target| target_query(&target, explicit_alias))
}

fn malformed(reason: &str) -> DashboardError {
    DashboardError::MalformedDocument(reason.to_string())
}

fn string_field(doc: &Map<String, Value>, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Whole grid units are written as integers, fractional ones as floats.
fn grid_unit(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn apply_link(doc: &mut Map<String, Value>, url: &str) {
    let already_linked = doc
        .get("links")
        .and_then(Value::as_array)
        .is_some_and(|links| links.iter().any(|link| link.get("url").and_then(Value::as_str) == Some(url)));
    if !already_linked {
        doc.insert(
            "links".to_string(),
            json!([{ "title": "Click to go", "type": "absolute", "url": url }]),
        );
    }
}

fn default_y_axes() -> Value {
    let axis = json!({
        "format": "short",
        "label": null,
        "logBase": 1,
        "max": null,
        "min": null,
        "show": true,
    });
    Value::Array(vec![axis.clone(), axis])
}

fn set_axis_field(doc: &mut Map<String, Value>, axis: usize, field: &str, value: Value) {
    let axes = doc.entry("yaxes").or_insert_with(default_y_axes);
    if !matches!(axes, Value::Array(list) if list.len() > axis) {
        *axes = default_y_axes();
    }
    if let Some(Value::Object(entry)) = axes.get_mut(axis) {
        entry.insert(field.to_string(), value);
    }
}

fn apply_graph(doc: &mut Map<String, Value>, options: &GraphOptions) {
    if let Some(units) = &options.units {
        set_axis_field(doc, 0, "format", json!(units));
        set_axis_field(doc, 1, "format", json!(units));
    }
    if let Some(range) = options.y_range {
        set_axis_field(doc, 0, "min", json!(range.min));
        set_axis_field(doc, 0, "max", json!(range.max));
    }
}

fn graph_from_document(doc: &Map<String, Value>) -> GraphOptions {
    let left_axis = doc.get("yaxes").and_then(|axes| axes.get(0));
    let units = left_axis
        .and_then(|axis| axis.get("format"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let bound = |key: &str| left_axis.and_then(|axis| axis.get(key)).and_then(number_or_string);
    let y_range = match (bound("min"), bound("max")) {
        (Some(min), Some(max)) => Some(AxisRange { min, max }),
        _ => None,
    };
    GraphOptions { units, y_range }
}

fn apply_single_stat(doc: &mut Map<String, Value>, stat: &SingleStat) {
    doc.insert("valueFontSize".to_string(), json!(stat.font_size));

    let sparkline = doc.entry("sparkline").or_insert_with(|| json!({}));
    if !sparkline.is_object() {
        *sparkline = json!({});
    }
    if let Value::Object(sparkline) = sparkline {
        sparkline.insert("show".to_string(), json!(stat.sparkline));
    }

    if let Some(units) = &stat.units {
        doc.insert("format".to_string(), json!(units));
    }
    if let Some(decimals) = stat.decimals {
        doc.insert("decimals".to_string(), json!(decimals));
    }
    match &stat.mapping {
        Some(ValueMapping::Values(maps)) => {
            doc.insert("mappingType".to_string(), json!(1));
            doc.insert("valueMaps".to_string(), json!(maps));
        }
        Some(ValueMapping::Ranges(maps)) => {
            doc.insert("mappingType".to_string(), json!(2));
            doc.insert("rangeMaps".to_string(), json!(maps));
        }
        None => {}
    }
    if let Some(prefix) = &stat.prefix {
        doc.insert("prefix".to_string(), json!(prefix));
    }
    if let Some(postfix) = &stat.postfix {
        doc.insert("postfix".to_string(), json!(postfix));
    }
    if let Some(colors) = &stat.colors {
        doc.insert("colors".to_string(), json!(colors));
    }
    if let Some(thresholds) = &stat.thresholds {
        doc.insert("thresholds".to_string(), json!(thresholds));
    }
    doc.insert("colorBackground".to_string(), json!(stat.color_background));
    doc.insert("colorValue".to_string(), json!(stat.color_value));
}

fn single_stat_from_document(doc: &Map<String, Value>) -> SingleStat {
    let mapping = match doc.get("mappingType").and_then(Value::as_u64) {
        Some(1) => doc
            .get("valueMaps")
            .and_then(|maps| serde_json::from_value::<Vec<ValueMap>>(maps.clone()).ok())
            .map(ValueMapping::Values),
        Some(2) => doc
            .get("rangeMaps")
            .and_then(|maps| serde_json::from_value::<Vec<RangeMap>>(maps.clone()).ok())
            .map(ValueMapping::Ranges),
        _ => None,
    };

    SingleStat {
        mapping,
        font_size: string_field(doc, "valueFontSize").unwrap_or_else(|| DEFAULT_FONT_SIZE.to_string()),
        prefix: string_field(doc, "prefix"),
        postfix: string_field(doc, "postfix"),
        colors: doc
            .get("colors")
            .and_then(|colors| serde_json::from_value(colors.clone()).ok()),
        thresholds: string_field(doc, "thresholds"),
        units: string_field(doc, "format"),
        decimals: doc
            .get("decimals")
            .and_then(Value::as_u64)
            .and_then(|decimals| u32::try_from(decimals).ok()),
        sparkline: doc
            .get("sparkline")
            .and_then(|sparkline| sparkline.get("show"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        color_background: doc.get("colorBackground").and_then(Value::as_bool).unwrap_or(false),
        color_value: doc.get("colorValue").and_then(Value::as_bool).unwrap_or(false),
    }
}

fn apply_math_stat(doc: &mut Map<String, Value>, math: &MathStat) {
    doc.insert("math".to_string(), json!(math.math));
    // The math plugin only understands a threshold map, never the boundary string.
    match &math.threshold_map {
        Some(map) => {
            doc.insert("thresholds".to_string(), json!(map));
        }
        None => {
            if doc.get("thresholds").is_some_and(Value::is_string) {
                doc.insert("thresholds".to_string(), json!([]));
            }
        }
    }
}

fn math_stat_from_document(doc: &Map<String, Value>) -> MathStat {
    let threshold_map = doc.get("thresholds").and_then(Value::as_array).map(|steps| {
        steps
            .iter()
            .filter_map(|step| {
                let color = step.get("color")?.as_str()?;
                let value = step.get("value").and_then(number_or_string)?;
                Some(ThresholdStep::new(color, value as i64))
            })
            .collect()
    });

    MathStat {
        stat: single_stat_from_document(doc),
        math: string_field(doc, "math").unwrap_or_default(),
        threshold_map,
    }
}

/// Starting document for a freshly built panel of the given type.
fn panel_template(panel_type: PanelType) -> Map<String, Value> {
    let template = match panel_type {
        PanelType::Graph => json!({
            "aliasColors": {},
            "bars": false,
            "dashLength": 10,
            "dashes": false,
            "fill": 1,
            "legend": {
                "avg": false,
                "current": false,
                "max": false,
                "min": false,
                "show": true,
                "total": false,
                "values": false
            },
            "lines": true,
            "linewidth": 1,
            "links": [],
            "nullPointMode": "null",
            "percentage": false,
            "pointradius": 2,
            "points": false,
            "renderer": "flot",
            "seriesOverrides": [],
            "spaceLength": 10,
            "stack": false,
            "steppedLine": false,
            "thresholds": [],
            "timeFrom": null,
            "timeRegions": [],
            "timeShift": null,
            "tooltip": { "shared": true, "sort": 0, "value_type": "individual" },
            "xaxis": { "buckets": null, "mode": "time", "name": null, "show": true, "values": [] },
            "yaxes": default_y_axes(),
            "yaxis": { "align": false, "alignLevel": null }
        }),
        PanelType::SingleStat | PanelType::MathStat => json!({
            "cacheTimeout": null,
            "colorBackground": false,
            "colorValue": false,
            "colors": ["#299c46", "rgba(237, 129, 40, 0.89)", "#d44a3a"],
            "format": "none",
            "gauge": {
                "maxValue": 100,
                "minValue": 0,
                "show": false,
                "thresholdLabels": false,
                "thresholdMarkers": true
            },
            "interval": null,
            "links": [],
            "mappingType": 1,
            "mappingTypes": [
                { "name": "value to text", "value": 1 },
                { "name": "range to text", "value": 2 }
            ],
            "maxDataPoints": 100,
            "nullPointMode": "connected",
            "nullText": null,
            "postfix": "",
            "postfixFontSize": "50%",
            "prefix": "",
            "prefixFontSize": "50%",
            "rangeMaps": [{ "from": "null", "text": "N/A", "to": "null" }],
            "sparkline": {
                "fillColor": "rgba(31, 118, 189, 0.18)",
                "full": false,
                "lineColor": "rgb(31, 120, 193)",
                "show": false
            },
            "tableColumn": "",
            "thresholds": "",
            "timeFrom": null,
            "timeShift": null,
            "valueFontSize": "100%",
            "valueMaps": [{ "op": "=", "text": "N/A", "value": "null" }],
            "valueName": "avg"
        }),
    };

    match template {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
