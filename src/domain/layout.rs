// Grid layout: ids, sizes and positions for an ordered panel sequence
use super::error::{DashboardError, Result};
use super::panel::{GridPosition, Panel, PanelSize};
use serde::Deserialize;

/// Horizontal resolution of the backend's grid.
pub const GRID_WIDTH: f64 = 24.0;

pub const DEFAULT_PANELS_PER_ROW: u32 = 2;
pub const DEFAULT_PANEL_HEIGHT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "LayoutSettings")]
pub struct LayoutConfig {
    panels_per_row: u32,
    panel_height: u32,
}

#[derive(Debug, Deserialize)]
struct LayoutSettings {
    #[serde(default = "default_panels_per_row")]
    panels_per_row: u32,
    #[serde(default = "default_panel_height")]
    panel_height: u32,
}

fn default_panels_per_row() -> u32 {
    DEFAULT_PANELS_PER_ROW
}

fn default_panel_height() -> u32 {
    DEFAULT_PANEL_HEIGHT
}

impl TryFrom<LayoutSettings> for LayoutConfig {
    type Error = DashboardError;

    fn try_from(settings: LayoutSettings) -> Result<Self> {
        LayoutConfig::new(settings.panels_per_row, settings.panel_height)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            panels_per_row: DEFAULT_PANELS_PER_ROW,
            panel_height: DEFAULT_PANEL_HEIGHT,
        }
    }
}

impl LayoutConfig {
    pub fn new(panels_per_row: u32, panel_height: u32) -> Result<Self> {
        if panels_per_row == 0 {
            return Err(DashboardError::InvalidLayout(
                "panels_per_row must be positive".to_string(),
            ));
        }
        if panel_height == 0 {
            return Err(DashboardError::InvalidLayout(
                "panel_height must be positive".to_string(),
            ));
        }
        Ok(Self {
            panels_per_row,
            panel_height,
        })
    }

    pub fn panels_per_row(&self) -> u32 {
        self.panels_per_row
    }

    pub fn panel_height(&self) -> u32 {
        self.panel_height
    }

    /// Width of one column; fractional when the row count does not divide 24.
    pub fn panel_width(&self) -> f64 {
        GRID_WIDTH / f64::from(self.panels_per_row)
    }

    pub fn panel_size(&self) -> PanelSize {
        PanelSize::new(f64::from(self.panel_height), self.panel_width())
    }

    /// Grid cell of the panel with the given id.
    pub fn position_of(&self, id: u32) -> GridPosition {
        let column = id % self.panels_per_row;
        let row = id / self.panels_per_row;
        GridPosition::new(
            f64::from(column) * self.panel_width(),
            f64::from(row) * f64::from(self.panel_height),
        )
    }
}

/// Give `panels[i]` the id `start_id + i`, the layout's uniform size and the
/// matching grid cell. Panels whose size is locked keep it.
pub fn layout_panels(panels: &mut [Panel], start_id: u32, layout: &LayoutConfig) {
    for (id, panel) in (start_id..).zip(panels.iter_mut()) {
        panel.set_id(id);
        if !panel.is_size_locked() {
            panel.set_size(layout.panel_size());
        }
        panel.set_position(layout.position_of(id));
    }

    tracing::debug!(
        "Laid out {} panel(s) from id {} at {} per row",
        panels.len(),
        start_id,
        layout.panels_per_row
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::GraphOptions;
    use std::collections::HashSet;

    fn panels(count: usize) -> Vec<Panel> {
        (0..count)
            .map(|i| Panel::graph(format!("panel {}", i), vec![], GraphOptions::default()))
            .collect()
    }

    #[test]
    fn test_five_panels_three_per_row() {
        let layout = LayoutConfig::new(3, 8).unwrap();
        let mut panels = panels(5);
        layout_panels(&mut panels, 0, &layout);

        let ids: Vec<u32> = panels.iter().map(Panel::id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        let positions: Vec<(f64, f64)> = panels.iter().map(|p| (p.position().x, p.position().y)).collect();
        assert_eq!(
            positions,
            vec![(0.0, 0.0), (8.0, 0.0), (16.0, 0.0), (0.0, 8.0), (8.0, 8.0)]
        );
        assert!(panels.iter().all(|p| p.size() == PanelSize::new(8.0, 8.0)));
    }

    #[test]
    fn test_layout_properties_hold_for_many_shapes() {
        for per_row in 1..=7 {
            for count in 0..=20 {
                let layout = LayoutConfig::new(per_row, 6).unwrap();
                let mut panels = panels(count);
                layout_panels(&mut panels, 0, &layout);

                let ids: HashSet<u32> = panels.iter().map(Panel::id).collect();
                assert_eq!(ids, (0..count as u32).collect::<HashSet<_>>());

                let cells: HashSet<(u64, u64)> = panels
                    .iter()
                    .map(|p| (p.position().x.to_bits(), p.position().y.to_bits()))
                    .collect();
                assert_eq!(cells.len(), count, "overlap with {} per row", per_row);

                for pair in panels.windows(2) {
                    assert!(pair[0].position().y <= pair[1].position().y);
                }
            }
        }
    }

    #[test]
    fn test_start_id_continues_grid() {
        let layout = LayoutConfig::new(2, 8).unwrap();
        let mut panels = panels(2);
        layout_panels(&mut panels, 3, &layout);
        assert_eq!(panels[0].id(), 3);
        assert_eq!(panels[0].position(), GridPosition::new(12.0, 8.0));
        assert_eq!(panels[1].position(), GridPosition::new(0.0, 16.0));
    }

    #[test]
    fn test_fractional_width() {
        let layout = LayoutConfig::new(5, 8).unwrap();
        assert_eq!(layout.panel_width(), 4.8);
        assert_eq!(layout.position_of(4), GridPosition::new(19.2, 0.0));
    }

    #[test]
    fn test_locked_size_survives_relayout() {
        let layout = LayoutConfig::new(4, 5).unwrap();
        let mut panels = panels(1);
        panels[0].set_size(PanelSize::new(3.0, 10.0));
        layout_panels(&mut panels, 0, &layout);
        assert_eq!(panels[0].size(), PanelSize::new(3.0, 10.0));
    }

    #[test]
    fn test_relayout_moves_locked_panels_without_resizing() {
        let mut panels = panels(3);
        layout_panels(&mut panels, 0, &LayoutConfig::new(3, 8).unwrap());
        assert!(panels.iter().all(Panel::is_size_locked));

        layout_panels(&mut panels, 0, &LayoutConfig::new(2, 6).unwrap());
        assert!(panels.iter().all(|p| p.size() == PanelSize::new(8.0, 8.0)));
        assert_eq!(panels[2].position(), GridPosition::new(0.0, 6.0));
    }

    #[test]
    fn test_zero_sized_layout_is_rejected() {
        assert!(LayoutConfig::new(0, 8).is_err());
        assert!(LayoutConfig::new(2, 0).is_err());
    }
}
