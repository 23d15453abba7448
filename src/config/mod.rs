//! Configuration store.
//!
//! One typed [`Config`] value holds every wizard setting. Validators mutate it
//! field by field; background tasks receive an owned clone.

pub mod error;
pub mod model;
pub mod params;
pub mod plot;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use error::ConfigError;
pub use model::{
    AgcrnParams, DcrnnParams, GcnParams, LogDestination, ModelFamily, ModelParams, Optimizer,
    Scheduler, StgcnParams, TemporalPooling, TgcnParams, TrainingSettings,
    DEFAULT_EXPERIMENT_NAME,
};
pub use params::{ParamBlock, ParamDescriptor, ParamKind, ParamValue};
pub use plot::{
    HeatmapPlotParams, NodePlotParams, PlotKind, PlotSettings, PlotView, SelectionMethod,
    SpatialPlotParams,
};

pub const DEFAULT_INPUT_CRS: &str = "EPSG:4326";
pub const DEFAULT_METER_CRS: &str = "EPSG:3857";
/// Log directory used for remote-only logging when no output folder is set.
pub const FALLBACK_LOG_DIR: &str = "out";

/// Latitude/longitude window applied in test mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_lat: 40.4774,
            max_lat: 40.9176,
            min_lon: -74.2591,
            max_lon: -73.7004,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Classification,
    Regression,
}

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::Classification, TaskType::Regression];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }
}

/// Temporal binning of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinType {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl BinType {
    pub const ALL: [BinType; 4] = [BinType::Hourly, BinType::Daily, BinType::Weekly, BinType::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinType::Hourly => "hourly",
            BinType::Daily => "daily",
            BinType::Weekly => "weekly",
            BinType::Monthly => "monthly",
        }
    }
}

/// Knowledge-graph feature categories pulled from OpenStreetMap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmFeature {
    Poi,
    Road,
    Junction,
}

impl OsmFeature {
    pub const ALL: [OsmFeature; 3] = [OsmFeature::Poi, OsmFeature::Road, OsmFeature::Junction];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsmFeature::Poi => "poi",
            OsmFeature::Road => "road",
            OsmFeature::Junction => "junction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MappingKind {
    #[default]
    #[serde(rename = "grid")]
    Grid,
    #[serde(rename = "administrative")]
    Administrative,
    #[serde(rename = "voronoi-based")]
    Voronoi,
}

impl MappingKind {
    pub const ALL: [MappingKind; 3] = [
        MappingKind::Grid,
        MappingKind::Administrative,
        MappingKind::Voronoi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingKind::Grid => "grid",
            MappingKind::Administrative => "administrative",
            MappingKind::Voronoi => "voronoi-based",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSettings {
    pub mapping: MappingKind,
    pub cell_size: u32,
    pub vor_small_cell_size: u32,
    pub vor_big_cell_size: u32,
    pub adm_shape_file: Option<PathBuf>,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            mapping: MappingKind::Grid,
            cell_size: 1000,
            vor_small_cell_size: 1000,
            vor_big_cell_size: 2000,
            adm_shape_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub time_column: Option<String>,
    pub lat_column: Option<String>,
    pub long_column: Option<String>,
    pub input_crs: String,
    pub meter_crs: String,
    pub test_mode: bool,
    pub bounds: Option<Bounds>,
    pub use_time_features: bool,
    pub app_type: TaskType,
    pub pred_type: BinType,
    pub horizon: u32,
    pub window_size: u32,
    pub interval_step: u32,
    pub date_filter_start: Option<NaiveDate>,
    pub date_filter_end: Option<NaiveDate>,
    pub osm_types: Option<Vec<OsmFeature>>,
    pub mapping: MappingSettings,
    pub plot: PlotSettings,
    pub training: TrainingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            data_path: None,
            time_column: None,
            lat_column: None,
            long_column: None,
            input_crs: DEFAULT_INPUT_CRS.to_string(),
            meter_crs: DEFAULT_METER_CRS.to_string(),
            test_mode: false,
            bounds: Some(Bounds::default()),
            use_time_features: true,
            app_type: TaskType::Classification,
            pred_type: BinType::Daily,
            horizon: 1,
            window_size: 1,
            interval_step: 1,
            date_filter_start: None,
            date_filter_end: None,
            osm_types: None,
            mapping: MappingSettings::default(),
            plot: PlotSettings::default(),
            training: TrainingSettings::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Start of the date filter as sent to the library.
    pub fn filter_start_timestamp(&self) -> Option<String> {
        self.date_filter_start.map(filter_timestamp)
    }

    pub fn filter_end_timestamp(&self) -> Option<String> {
        self.date_filter_end.map(filter_timestamp)
    }

    pub fn preprocess_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join("preprocess"))
    }

    pub fn mapping_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join("mapping"))
    }

    pub fn graph_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join("graph"))
    }

    pub fn osm_features_path(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join("osm_features.csv"))
    }

    /// Expected location of the current plot selection's PDF.
    pub fn plot_artifact_path(&self) -> Option<PathBuf> {
        self.graph_dir()
            .map(|dir| dir.join(format!("{}.pdf", self.plot.artifact_stem())))
    }
}

/// Dates are inclusive through the end of the day.
pub fn filter_timestamp(date: NaiveDate) -> String {
    format!("{} 23:59:59", date.format("%d-%m-%Y"))
}
