//! The graph toolkit collaborator.
//!
//! All preprocessing, mapping, graph construction, plotting and training is
//! done by the external `stm_graph` library. [`GraphToolkit`] is the seam: one
//! method per library call, with typed requests and responses. Library objects
//! (frames, graphs, models) stay on the other side and are referred to by
//! opaque [`Handle`]s.

pub mod bridge;

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{BinType, Bounds, ModelFamily, OsmFeature, PlotView, SelectionMethod, TaskType};

pub use bridge::{BridgeError, PythonBridge};

/// Opaque reference to an object owned by the toolkit process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub String);

impl Handle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

// ============================================================================
// Mapping strategies
// ============================================================================

/// Spatial partitioning strategy, instantiated when the mapping form validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingStrategy {
    Grid {
        cell_size: u32,
        meter_crs: String,
    },
    Administrative {
        districts_file: PathBuf,
        input_crs: String,
        meter_crs: String,
    },
    Voronoi {
        small_cell_size: u32,
        large_cell_size: u32,
    },
}

impl MappingStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            MappingStrategy::Grid { .. } => "grid",
            MappingStrategy::Administrative { .. } => "administrative",
            MappingStrategy::Voronoi { .. } => "voronoi-based",
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessRequest {
    pub data_path: PathBuf,
    pub time_col: String,
    pub lat_col: String,
    pub lng_col: String,
    pub filter_dates: (Option<String>, Option<String>),
    pub testing_mode: bool,
    pub test_bounds: Option<Bounds>,
    pub crs: String,
    pub vis_crs: String,
    pub output_dir: PathBuf,
    pub visualize: bool,
    pub fig_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRequest {
    pub strategy: MappingStrategy,
    pub points: Handle,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsmFeatureRequest {
    pub regions: Handle,
    pub bounds: Option<Bounds>,
    pub feature_types: Vec<OsmFeature>,
    pub meter_crs: String,
    pub lat_lon_crs: String,
    pub csv_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphRequest {
    pub partitions: Handle,
    pub points: Handle,
    pub assignment: Handle,
    pub static_features: Option<Handle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRequest {
    pub graph: Handle,
    pub static_features: Option<Handle>,
    pub time_col: String,
    pub bin_type: BinType,
    pub horizon: u32,
    pub interval_hours: u32,
    pub history_window: u32,
    pub use_time_features: bool,
    pub task: TaskType,
    pub normalize: bool,
    pub scaler_type: String,
    pub out_dir: PathBuf,
    pub dataset_name: String,
    pub output_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadDatasetRequest {
    pub path: PathBuf,
    pub to_3d: bool,
    pub static_features_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plot", rename_all = "snake_case")]
pub enum PlotJob {
    NodeTimeSeries {
        view: PlotView,
        selection_method: SelectionMethod,
        time_delta_hours: u32,
        num_nodes: u32,
        n_steps: Option<u32>,
        figsize: (u32, u32),
    },
    SpatialNetwork {
        time_step: u32,
    },
    TemporalHeatmap {
        selection_method: SelectionMethod,
        time_delta_hours: u32,
        num_nodes: u32,
        n_steps: Option<u32>,
        figsize: (u32, u32),
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRequest {
    pub job: PlotJob,
    pub dataset: Handle,
    pub graph: Handle,
    pub regions: Handle,
    pub static_features_count: usize,
    pub title: String,
    pub out_dir: PathBuf,
    pub filename: String,
    pub file_format: String,
    pub fig_dpi: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model_name: ModelFamily,
    pub task: TaskType,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainRequest {
    pub model: Handle,
    pub dataset: Handle,
    pub optimizer_name: String,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub momentum: f64,
    pub task: TaskType,
    pub num_epochs: u32,
    pub batch_size: u32,
    pub test_size: f64,
    pub val_size: f64,
    pub early_stopping: bool,
    pub patience: u32,
    pub scheduler_type: String,
    pub lr_decay_epochs: u32,
    pub lr_decay_factor: f64,
    pub lr_patience: u32,
    pub wandb_api_key: Option<String>,
    pub wandb_project: String,
    pub experiment_name: String,
    pub use_wandb: bool,
    pub log_dir: Option<PathBuf>,
    pub fixed_batch_size: bool,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub handle: Handle,
    pub rows: usize,
    pub columns: usize,
    #[serde(default)]
    pub time_range: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingOutput {
    /// Partition polygons (regions).
    pub partitions: Handle,
    /// Points that fell inside a partition.
    pub points: Handle,
    /// Point-to-partition index for `points`.
    pub assignment: Handle,
    pub regions: usize,
    pub points_total: usize,
    pub points_valid: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub handle: Handle,
    pub columns: usize,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub handle: Handle,
    pub num_nodes: usize,
    pub num_edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalDataset {
    pub handle: Handle,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Number of snapshots in the dataset.
    pub time_steps: usize,
    /// Shape of the first snapshot's feature tensor.
    pub feature_shape: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub handle: Handle,
    pub family: ModelFamily,
    #[serde(default)]
    pub parameters: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    #[serde(default)]
    pub summary: Value,
}

impl TrainingReport {
    /// Scalar metrics in the summary, sorted by name.
    pub fn metrics(&self) -> Vec<(String, f64)> {
        let mut metrics: Vec<(String, f64)> = match &self.summary {
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                .collect(),
            _ => Vec::new(),
        };
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }
}

/// Operations provided by the graph toolkit.
///
/// Implementations are shared with worker threads and must be thread-safe.
pub trait GraphToolkit: Send + Sync {
    fn preprocess(&self, request: &PreprocessRequest) -> Result<ProcessedData>;

    /// Assign points to partitions. Also writes the mapping figures.
    fn create_mapping(&self, request: &MappingRequest) -> Result<MappingOutput>;

    fn extract_osm_features(&self, request: &OsmFeatureRequest) -> Result<FeatureTable>;

    fn build_graph(&self, request: &GraphRequest) -> Result<GraphData>;

    fn create_temporal_dataset(&self, request: &DatasetRequest) -> Result<TemporalDataset>;

    fn load_temporal_dataset(&self, request: &LoadDatasetRequest) -> Result<TemporalDataset>;

    /// Returns the path of the written PDF.
    fn plot(&self, request: &PlotRequest) -> Result<PathBuf>;

    fn create_model(&self, request: &ModelRequest) -> Result<ModelHandle>;

    fn train(&self, request: &TrainRequest) -> Result<TrainingReport>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_strategy_is_tagged() {
        let strategy = MappingStrategy::Voronoi {
            small_cell_size: 2000,
            large_cell_size: 3000,
        };
        let value = serde_json::to_value(&strategy).unwrap();
        assert_eq!(value["kind"], "voronoi");
        assert_eq!(value["small_cell_size"], 2000);
    }

    #[test]
    fn test_report_metrics_skip_non_numeric() {
        let report = TrainingReport {
            summary: json!({"test_accuracy": 0.81, "best_epoch": 7, "model": "gcn"}),
        };
        let metrics = report.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].0, "best_epoch");
    }
}
