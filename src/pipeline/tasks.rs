//! The six pipeline tasks.
//!
//! Each task runs on a worker thread against an owned [`Config`] snapshot and
//! the toolkit. Inputs produced by earlier tasks are passed in explicitly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use super::artifacts;
use crate::config::{Config, ModelParams, PlotKind, PlotView};
use crate::toolkit::{
    DatasetRequest, FeatureTable, GraphData, GraphRequest, GraphToolkit, LoadDatasetRequest,
    MappingOutput, MappingRequest, MappingStrategy, ModelHandle, ModelRequest, OsmFeatureRequest,
    PlotJob, PlotRequest, PreprocessRequest, ProcessedData, TemporalDataset, TrainRequest,
    TrainingReport,
};
use crate::viewer::Rasterizer;

/// Result of the data-generation task.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedData {
    pub graph: GraphData,
    pub dataset: TemporalDataset,
    pub osm_features: Option<FeatureTable>,
}

impl GeneratedData {
    pub fn static_feature_count(&self) -> usize {
        self.osm_features.as_ref().map_or(0, |f| f.columns)
    }

    /// Summary shown once the dataset is ready.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Data generated successfully.".to_string(),
            format!("Number of nodes: {}", self.graph.num_nodes),
            format!("Number of edges: {}", self.graph.num_edges),
        ];
        if let Some(features) = &self.osm_features {
            lines.push(format!("Extracted OSM features: {}", features.columns));
        }
        lines.push(format!(
            "Temporal dataset: {} snapshots, features {:?}",
            self.dataset.time_steps, self.dataset.feature_shape
        ));
        if let Some(path) = &self.dataset.path {
            lines.push(format!("Saved to: {}", path.display()));
        }
        lines.join("\n")
    }
}

/// Model plus the dataset it was sized for.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedModel {
    pub model: ModelHandle,
    pub dataset: TemporalDataset,
    /// Parameters with the dataset-derived values filled in.
    pub params: ModelParams,
}

fn required<'a, T>(value: &'a Option<T>, what: &str) -> Result<&'a T> {
    value
        .as_ref()
        .with_context(|| format!("{what} is not set"))
}

pub fn dataset_name() -> String {
    format!("stmgraph_data_{}", Local::now().format("%Y-%m-%d_%H%M%S"))
}

// ============================================================================
// Data pipeline
// ============================================================================

pub fn preprocess(
    config: &Config,
    toolkit: &dyn GraphToolkit,
    rasterizer: &dyn Rasterizer,
) -> Result<ProcessedData> {
    let output_dir = required(&config.output_dir, "Output folder")?;
    let request = PreprocessRequest {
        data_path: required(&config.data_path, "Data file")?.clone(),
        time_col: required(&config.time_column, "Time column")?.clone(),
        lat_col: required(&config.lat_column, "Latitude column")?.clone(),
        lng_col: required(&config.long_column, "Longitude column")?.clone(),
        filter_dates: (config.filter_start_timestamp(), config.filter_end_timestamp()),
        testing_mode: config.test_mode,
        test_bounds: if config.test_mode { config.bounds } else { None },
        crs: config.input_crs.clone(),
        vis_crs: config.meter_crs.clone(),
        output_dir: output_dir.clone(),
        visualize: true,
        fig_format: "pdf".to_string(),
    };

    info!(data = %request.data_path.display(), "Preprocessing");
    let processed = toolkit
        .preprocess(&request)
        .context("Preprocessing failed")?;
    artifacts::rasterize_oversized(&output_dir.join("preprocess"), rasterizer);
    info!(rows = processed.rows, "Preprocessing done");
    Ok(processed)
}

pub fn map(
    config: &Config,
    strategy: &MappingStrategy,
    points: &ProcessedData,
    toolkit: &dyn GraphToolkit,
    rasterizer: &dyn Rasterizer,
) -> Result<MappingOutput> {
    let output_dir = required(&config.output_dir, "Output folder")?;
    let request = MappingRequest {
        strategy: strategy.clone(),
        points: points.handle.clone(),
        out_dir: output_dir.clone(),
    };

    info!(strategy = strategy.label(), "Mapping points to partitions");
    let mapping = toolkit
        .create_mapping(&request)
        .context("Mapping failed")?;
    artifacts::rasterize_oversized(&output_dir.join("mapping"), rasterizer);
    info!(
        regions = mapping.regions,
        valid = mapping.points_valid,
        total = mapping.points_total,
        "Mapping done"
    );
    Ok(mapping)
}

pub fn generate(
    config: &Config,
    mapping: &MappingOutput,
    toolkit: &dyn GraphToolkit,
) -> Result<GeneratedData> {
    let output_dir = required(&config.output_dir, "Output folder")?;

    let osm_features = match &config.osm_types {
        Some(types) if !types.is_empty() => {
            let request = OsmFeatureRequest {
                regions: mapping.partitions.clone(),
                bounds: config.bounds,
                feature_types: types.clone(),
                meter_crs: config.meter_crs.clone(),
                lat_lon_crs: config.input_crs.clone(),
                csv_path: output_dir.join("osm_features.csv"),
            };
            let features = toolkit
                .extract_osm_features(&request)
                .context("OSM feature extraction failed")?;
            info!(columns = features.columns, "Extracted OSM features");
            Some(features)
        }
        _ => None,
    };

    let static_features = osm_features.as_ref().map(|f| f.handle.clone());
    let graph = toolkit
        .build_graph(&GraphRequest {
            partitions: mapping.partitions.clone(),
            points: mapping.points.clone(),
            assignment: mapping.assignment.clone(),
            static_features: static_features.clone(),
        })
        .context("Graph construction failed")?;

    let request = DatasetRequest {
        graph: graph.handle.clone(),
        static_features,
        time_col: required(&config.time_column, "Time column")?.clone(),
        bin_type: config.pred_type,
        horizon: config.horizon,
        interval_hours: config.interval_step,
        history_window: config.window_size,
        use_time_features: config.use_time_features,
        task: config.app_type,
        normalize: true,
        scaler_type: "minmax".to_string(),
        out_dir: output_dir.clone(),
        dataset_name: dataset_name(),
        output_format: "4d".to_string(),
    };
    let dataset = toolkit
        .create_temporal_dataset(&request)
        .context("Temporal dataset creation failed")?;
    info!(
        nodes = graph.num_nodes,
        edges = graph.num_edges,
        dataset = %request.dataset_name,
        "Dataset generated"
    );

    Ok(GeneratedData {
        graph,
        dataset,
        osm_features,
    })
}

/// Build the plotting request for the current plot selection.
pub fn plot_request(
    config: &Config,
    generated: &GeneratedData,
    mapping: &MappingOutput,
) -> Result<PlotRequest> {
    let out_dir = required(&config.output_dir, "Output folder")?.clone();
    let plot = &config.plot;

    let (job, title) = match plot.plot_type {
        PlotKind::Node => {
            let nodes = &plot.nodes;
            let (figsize, title) = match nodes.view {
                PlotView::TwoD => ((15, 8), "Event over time in 2D"),
                PlotView::ThreeD => ((15, 10), "Event over time in 3D"),
            };
            let job = PlotJob::NodeTimeSeries {
                view: nodes.view,
                selection_method: nodes.selection_method,
                time_delta_hours: nodes.time_delta,
                num_nodes: nodes.n_nodes,
                n_steps: nodes.n_step,
                figsize,
            };
            (job, title.to_string())
        }
        PlotKind::Spatial => {
            let time_step = plot.spatial.time_step.unwrap_or(0);
            (
                PlotJob::SpatialNetwork { time_step },
                format!("Event Density (Time step: {time_step})"),
            )
        }
        PlotKind::Heatmap => {
            let heatmap = &plot.heatmap;
            let job = PlotJob::TemporalHeatmap {
                selection_method: heatmap.selection_method,
                time_delta_hours: heatmap.time_delta,
                num_nodes: heatmap.n_nodes,
                n_steps: heatmap.n_step,
                figsize: (14, 7),
            };
            (job, "Events Temporal Heatmap".to_string())
        }
    };

    Ok(PlotRequest {
        job,
        dataset: generated.dataset.handle.clone(),
        graph: generated.graph.handle.clone(),
        regions: mapping.partitions.clone(),
        static_features_count: generated.static_feature_count(),
        title,
        out_dir,
        filename: plot.artifact_stem(),
        file_format: "pdf".to_string(),
        fig_dpi: 300,
    })
}

pub fn plot(
    config: &Config,
    generated: &GeneratedData,
    mapping: &MappingOutput,
    toolkit: &dyn GraphToolkit,
) -> Result<PathBuf> {
    let request = plot_request(config, generated, mapping)?;
    info!(plot = config.plot.plot_type.as_str(), "Plotting");
    let written = toolkit.plot(&request).context("Plotting failed")?;
    if written.as_os_str().is_empty() {
        return required(&config.plot_artifact_path(), "Plot output path").cloned();
    }
    Ok(written)
}

// ============================================================================
// Training pipeline
// ============================================================================

pub fn create_model(
    config: &Config,
    static_features_count: usize,
    toolkit: &dyn GraphToolkit,
) -> Result<CreatedModel> {
    let path = required(&config.training.graph_data_path, "Graph data file")?;
    let family = config.training.model;

    let dataset = toolkit
        .load_temporal_dataset(&LoadDatasetRequest {
            path: path.clone(),
            to_3d: family.uses_3d_dataset(),
            static_features_count,
        })
        .with_context(|| format!("Failed to load dataset {}", path.display()))?;

    let mut params = config.training.active();
    params.derive_from_dataset(&dataset.feature_shape, config.window_size)?;

    let model = toolkit
        .create_model(&ModelRequest {
            model_name: family,
            task: config.app_type,
            params: params.to_kwargs()?,
        })
        .context("Model creation failed")?;
    info!(model = %family, "Model created");

    Ok(CreatedModel {
        model,
        dataset,
        params,
    })
}

pub fn train_request(
    config: &Config,
    model: &ModelHandle,
    dataset: &TemporalDataset,
) -> TrainRequest {
    let training = &config.training;
    TrainRequest {
        model: model.handle.clone(),
        dataset: dataset.handle.clone(),
        optimizer_name: training.optimizer.as_str().to_string(),
        learning_rate: training.learning_rate,
        weight_decay: training.weight_decay,
        momentum: training.momentum,
        task: config.app_type,
        num_epochs: training.num_epochs,
        batch_size: training.batch_size,
        test_size: training.test_ratio,
        val_size: training.val_ratio,
        early_stopping: training.early_stopping,
        patience: training.es_patience,
        scheduler_type: training.scheduler_type.as_str().to_string(),
        lr_decay_epochs: training.lr_step_decay,
        lr_decay_factor: training.lr_decay_factor,
        lr_patience: training.lr_patience,
        wandb_api_key: training.wandb_api_key.clone(),
        wandb_project: training.wandb_project.clone(),
        experiment_name: training.experiment_name.clone(),
        use_wandb: training.use_wandb,
        log_dir: training.log_dir.clone(),
        fixed_batch_size: model.family.needs_fixed_batch_size(),
    }
}

pub fn train(
    config: &Config,
    model: &ModelHandle,
    dataset: &TemporalDataset,
    toolkit: &dyn GraphToolkit,
) -> Result<TrainingReport> {
    let request = train_request(config, model, dataset);
    info!(
        model = %model.family,
        epochs = request.num_epochs,
        log_dir = ?request.log_dir,
        "Training"
    );
    toolkit.train(&request).context("Training failed")
}
