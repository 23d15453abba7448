//! Plot parameter blocks for the three graph visualisations.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::params::{type_error, ParamBlock, ParamDescriptor, ParamKind, ParamValue};

pub const VIEW_CHOICES: &[&str] = &["2d", "3d"];
pub const SELECTION_CHOICES: &[&str] = &["random", "highest_activity"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    #[default]
    Node,
    Spatial,
    Heatmap,
}

impl PlotKind {
    pub const ALL: [PlotKind; 3] = [PlotKind::Node, PlotKind::Spatial, PlotKind::Heatmap];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::Node => "node",
            PlotKind::Spatial => "spatial",
            PlotKind::Heatmap => "heatmap",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlotKind::Node => "Node time series",
            PlotKind::Spatial => "Spatial network",
            PlotKind::Heatmap => "Temporal heatmap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlotView {
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl PlotView {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotView::TwoD => "2d",
            PlotView::ThreeD => "3d",
        }
    }

    fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "2d" => Ok(PlotView::TwoD),
            "3d" => Ok(PlotView::ThreeD),
            _ => Err(type_error(name, "2d or 3d")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    Random,
    HighestActivity,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Random => "random",
            SelectionMethod::HighestActivity => "highest_activity",
        }
    }

    fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "random" => Ok(SelectionMethod::Random),
            "highest_activity" | "highest activity" => Ok(SelectionMethod::HighestActivity),
            _ => Err(type_error(name, "random or highest_activity")),
        }
    }
}

const SELECTION: ParamDescriptor = ParamDescriptor::new(
    "selection_method",
    "Method to select nodes",
    ParamKind::Choice(SELECTION_CHOICES),
);
const TIME_DELTA: ParamDescriptor =
    ParamDescriptor::new("time_delta", "Time delta between steps (hours)", ParamKind::Int);
const N_NODES: ParamDescriptor =
    ParamDescriptor::new("n_nodes", "Number of nodes to plot", ParamKind::Int);
const N_STEP: ParamDescriptor = ParamDescriptor::new(
    "n_step",
    "Number of time steps to include",
    ParamKind::OptionalInt,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePlotParams {
    pub view: PlotView,
    pub selection_method: SelectionMethod,
    pub time_delta: u32,
    pub n_nodes: u32,
    pub n_step: Option<u32>,
}

impl Default for NodePlotParams {
    fn default() -> Self {
        Self {
            view: PlotView::TwoD,
            selection_method: SelectionMethod::Random,
            time_delta: 1,
            n_nodes: 5,
            n_step: None,
        }
    }
}

static NODE_PARAMS: [ParamDescriptor; 5] = [
    ParamDescriptor::new("view", "Plot view in 2D or 3D", ParamKind::Choice(VIEW_CHOICES)),
    SELECTION,
    TIME_DELTA,
    N_NODES,
    N_STEP,
];

impl ParamBlock for NodePlotParams {
    fn block_name(&self) -> &'static str {
        "plot_nodes"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &NODE_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "view" => ParamValue::Text(self.view.as_str().to_string()),
            "selection_method" => ParamValue::Text(self.selection_method.as_str().to_string()),
            "time_delta" => ParamValue::Int(self.time_delta.into()),
            "n_nodes" => ParamValue::Int(self.n_nodes.into()),
            "n_step" => self.n_step.into(),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "view" => self.view = PlotView::parse(name, value.as_text(name)?)?,
            "selection_method" => {
                self.selection_method = SelectionMethod::parse(name, value.as_text(name)?)?
            }
            "time_delta" => self.time_delta = value.as_unsigned(name)?,
            "n_nodes" => self.n_nodes = value.as_unsigned(name)?,
            "n_step" => self.n_step = value.as_optional(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialPlotParams {
    pub time_step: Option<u32>,
}

static SPATIAL_PARAMS: [ParamDescriptor; 1] = [ParamDescriptor::new(
    "time_step",
    "Optional time step for temporal data",
    ParamKind::OptionalInt,
)];

impl ParamBlock for SpatialPlotParams {
    fn block_name(&self) -> &'static str {
        "plot_spatial"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &SPATIAL_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        match name {
            "time_step" => Some(self.time_step.into()),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "time_step" => self.time_step = value.as_optional(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapPlotParams {
    pub selection_method: SelectionMethod,
    pub time_delta: u32,
    pub n_nodes: u32,
    pub n_step: Option<u32>,
}

impl Default for HeatmapPlotParams {
    fn default() -> Self {
        Self {
            selection_method: SelectionMethod::Random,
            time_delta: 1,
            n_nodes: 5,
            n_step: None,
        }
    }
}

static HEATMAP_PARAMS: [ParamDescriptor; 4] = [SELECTION, TIME_DELTA, N_NODES, N_STEP];

impl ParamBlock for HeatmapPlotParams {
    fn block_name(&self) -> &'static str {
        "plot_heatmap"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &HEATMAP_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "selection_method" => ParamValue::Text(self.selection_method.as_str().to_string()),
            "time_delta" => ParamValue::Int(self.time_delta.into()),
            "n_nodes" => ParamValue::Int(self.n_nodes.into()),
            "n_step" => self.n_step.into(),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "selection_method" => {
                self.selection_method = SelectionMethod::parse(name, value.as_text(name)?)?
            }
            "time_delta" => self.time_delta = value.as_unsigned(name)?,
            "n_nodes" => self.n_nodes = value.as_unsigned(name)?,
            "n_step" => self.n_step = value.as_optional(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub plot_type: PlotKind,
    pub nodes: NodePlotParams,
    pub spatial: SpatialPlotParams,
    pub heatmap: HeatmapPlotParams,
}

impl PlotSettings {
    pub fn block(&self, kind: PlotKind) -> &dyn ParamBlock {
        match kind {
            PlotKind::Node => &self.nodes,
            PlotKind::Spatial => &self.spatial,
            PlotKind::Heatmap => &self.heatmap,
        }
    }

    pub fn block_mut(&mut self, kind: PlotKind) -> &mut dyn ParamBlock {
        match kind {
            PlotKind::Node => &mut self.nodes,
            PlotKind::Spatial => &mut self.spatial,
            PlotKind::Heatmap => &mut self.heatmap,
        }
    }

    /// File stem the plotting call writes under `graph/`.
    pub fn artifact_stem(&self) -> String {
        match self.plot_type {
            PlotKind::Node => format!("time_series_{}", self.nodes.view.as_str()),
            PlotKind::Spatial => "spatial_network".to_string(),
            PlotKind::Heatmap => "temporal_heatmap".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_stem_follows_view() {
        let mut plot = PlotSettings::default();
        assert_eq!(plot.artifact_stem(), "time_series_2d");
        plot.nodes.view = PlotView::ThreeD;
        assert_eq!(plot.artifact_stem(), "time_series_3d");
        plot.plot_type = PlotKind::Heatmap;
        assert_eq!(plot.artifact_stem(), "temporal_heatmap");
    }

    #[test]
    fn test_selection_accepts_display_label() {
        let mut heatmap = HeatmapPlotParams::default();
        heatmap
            .set("selection_method", ParamValue::Text("highest activity".into()))
            .unwrap();
        assert_eq!(heatmap.selection_method, SelectionMethod::HighestActivity);
    }
}
