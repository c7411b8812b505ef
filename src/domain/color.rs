// Color names and threshold maps for single-stat panels
use super::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};

/// Symbolic color names and the hex values the backend renders them with.
pub const COLOR_TABLE: [(&str, &str); 8] = [
    ("red", "#C4162A"),
    ("blue", "#1F60C4"),
    ("green", "#37872D"),
    ("yellow", "#E0B400"),
    ("orange", "#FA6400"),
    ("purple", "#440563"),
    ("baby blue", "#8AB8FF"),
    ("grey", "#757575"),
];

/// One (color, lower boundary) pair of a math-stat threshold map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdStep {
    pub color: String,
    pub value: i64,
}

impl ThresholdStep {
    pub fn new(color: impl Into<String>, value: i64) -> Self {
        Self {
            color: color.into(),
            value,
        }
    }
}

/// Look up the hex value for a color name. "baby-blue" and "baby_blue" are
/// accepted as spellings of "baby blue".
pub fn resolve_color(name: &str) -> Result<&'static str> {
    let normalized = name.trim().to_ascii_lowercase().replace(['-', '_'], " ");
    COLOR_TABLE
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, hex)| *hex)
        .ok_or_else(|| DashboardError::UnknownColor(name.to_string()))
}

pub fn resolve_colors<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| resolve_color(name.as_ref()).map(str::to_string))
        .collect()
}

/// Parse a comma-separated boundary string such as "1, 4".
pub fn parse_thresholds(thresholds: &str) -> Result<Vec<i64>> {
    thresholds
        .split(',')
        .map(str::trim)
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| DashboardError::InvalidThreshold(token.to_string()))
        })
        .collect()
}

/// Pair colors with boundaries, with an implicit leading boundary of 0.
///
/// Needs one more color than there are boundaries in `thresholds`. Extra
/// colors beyond that are ignored.
pub fn resolve_threshold_map<S: AsRef<str>>(
    colors: &[S],
    thresholds: &str,
) -> Result<Vec<ThresholdStep>> {
    let mut boundaries = vec![0];
    boundaries.extend(parse_thresholds(thresholds)?);

    if colors.len() < boundaries.len() {
        return Err(DashboardError::InsufficientColors {
            colors: colors.len(),
            required: boundaries.len(),
        });
    }

    boundaries
        .into_iter()
        .zip(colors)
        .map(|(value, name)| Ok(ThresholdStep::new(resolve_color(name.as_ref())?, value)))
        .collect()
}
