//! Tests for the step validators

use std::collections::BTreeSet;

use chrono::NaiveDate;
use stmgraph::config::{Config, LogDestination, MappingKind, ModelFamily, OsmFeature, Optimizer};
use stmgraph::toolkit::MappingStrategy;
use stmgraph::wizard::{
    validate_configure, validate_load, validate_logging, validate_mapping, validate_model_params,
    validate_plot, FieldId, Forms,
};

fn forms() -> (Config, Forms) {
    let mut config = Config::default();
    config.data_path = Some("events.csv".into());
    config.output_dir = Some("out".into());
    config.time_column = Some("time".to_string());
    config.lat_column = Some("lat".to_string());
    config.long_column = Some("lon".to_string());
    let forms = Forms::from_config(&config);
    (config, forms)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Load
// ============================================================================

#[test]
fn test_load_accepts_and_normalizes_crs() {
    let (mut config, mut forms) = forms();
    forms.load.input_crs = "epsg:4326".to_string();
    forms.load.meter_crs = "EPSG:32618".to_string();

    let result = validate_load(&forms.load, &mut config);
    assert!(result.ok);
    assert_eq!(config.input_crs, "EPSG:4326");
    assert_eq!(config.meter_crs, "EPSG:32618");
}

#[test]
fn test_load_marks_bad_crs_and_missing_columns() {
    let (mut config, mut forms) = forms();
    forms.load.input_crs = "WGS84".to_string();
    forms.load.meter_crs = "EPSG:38".to_string();
    forms.load.lat_column = None;

    let result = validate_load(&forms.load, &mut config);
    assert!(!result.ok);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::InputCrs, FieldId::MeterCrs, FieldId::LatColumn])
    );
    // Rejected values never reach the configuration.
    assert_eq!(config.input_crs, "EPSG:4326");
}

#[test]
fn test_load_requires_data_file() {
    let mut config = Config::default();
    let forms = Forms::from_config(&config);
    let result = validate_load(&forms.load, &mut config);
    assert!(result.is_marked(FieldId::DataFile));
    assert!(result.is_marked(FieldId::TimeColumn));
}

// ============================================================================
// Configure
// ============================================================================

#[test]
fn test_configure_defaults_pass() {
    let (mut config, forms) = forms();
    let result = validate_configure(&forms.configure, &mut config);
    assert!(result.ok, "unexpected marks: {:?}", result.marks);
    assert_eq!(config.osm_types, None);
    assert_eq!(config.date_filter_start, None);
}

#[test]
fn test_configure_rejects_non_positive_integers() {
    let (mut config, mut forms) = forms();
    forms.configure.horizon = "0".to_string();
    forms.configure.window_size = "-3".to_string();
    forms.configure.interval_step = "two".to_string();

    let result = validate_configure(&forms.configure, &mut config);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::Horizon, FieldId::WindowSize, FieldId::IntervalStep])
    );
}

#[test]
fn test_configure_test_mode_bounds() {
    let (mut config, mut forms) = forms();
    forms.configure.test_mode = true;
    forms.configure.min_lat = "40.5".to_string();
    forms.configure.max_lat = "40.9".to_string();
    forms.configure.min_lon = "-73.7".to_string();
    forms.configure.max_lon = "-74.2".to_string();

    let result = validate_configure(&forms.configure, &mut config);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::MinLon, FieldId::MaxLon])
    );

    forms.configure.max_lon = "-73.5".to_string();
    let result = validate_configure(&forms.configure, &mut config);
    assert!(result.ok);
    let bounds = config.bounds.unwrap();
    assert_eq!(bounds.min_lat, 40.5);
    assert_eq!(bounds.max_lon, -73.5);
    assert!(config.test_mode);
}

#[test]
fn test_configure_dates_only_when_enabled() {
    let (mut config, mut forms) = forms();
    let dates = &mut forms.configure.dates;
    dates.set_start(date(2024, 3, 1));
    dates.set_end(date(2024, 3, 10));
    dates.enable_start(true);

    let result = validate_configure(&forms.configure, &mut config);
    assert!(result.ok);
    assert_eq!(config.date_filter_start, Some(date(2024, 3, 1)));
    assert_eq!(config.date_filter_end, None);
    assert_eq!(
        config.filter_start_timestamp().as_deref(),
        Some("01-03-2024 23:59:59")
    );
}

#[test]
fn test_date_constraint_holds_after_changes() {
    let (_, mut forms) = forms();
    let dates = &mut forms.configure.dates;
    dates.set_start(date(2024, 3, 1));
    dates.set_end(date(2024, 3, 2));
    dates.enable_start(true);
    dates.enable_end(true);

    dates.shift_end(-30);
    assert_eq!(dates.end(), date(2024, 3, 2));
    dates.shift_start(30);
    assert_eq!(dates.start(), date(2024, 3, 1));

    dates.set_end(date(2024, 3, 20));
    dates.set_start(date(2024, 5, 1));
    assert_eq!(dates.start(), date(2024, 3, 19));
    assert_eq!(dates.end(), date(2024, 3, 20));
    assert!(dates.end() > dates.start());
}

#[test]
fn test_knowledge_graph_needs_a_feature() {
    let (mut config, mut forms) = forms();
    forms.configure.use_knowledge_graph = true;

    let result = validate_configure(&forms.configure, &mut config);
    assert!(result.is_marked(FieldId::Osm(OsmFeature::Poi)));
    assert!(result.is_marked(FieldId::Osm(OsmFeature::Junction)));

    forms.configure.toggle_osm(OsmFeature::Road);
    let result = validate_configure(&forms.configure, &mut config);
    assert!(result.ok);
    assert_eq!(config.osm_types, Some(vec![OsmFeature::Road]));

    forms.configure.use_knowledge_graph = false;
    validate_configure(&forms.configure, &mut config);
    assert_eq!(config.osm_types, None);
}

#[test]
fn test_configure_requires_output_dir() {
    let (mut config, mut forms) = forms();
    forms.configure.output_dir = "   ".to_string();
    let result = validate_configure(&forms.configure, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::OutputDir]));
}

// ============================================================================
// Mapping
// ============================================================================

#[test]
fn test_grid_mapping_builds_strategy() {
    let (mut config, mut forms) = forms();
    forms.mapping.kind = MappingKind::Grid;
    forms.mapping.grid_size = "500".to_string();

    let (result, strategy) = validate_mapping(&forms.mapping, &mut config);
    assert!(result.ok);
    assert_eq!(
        strategy,
        Some(MappingStrategy::Grid {
            cell_size: 500,
            meter_crs: "EPSG:3857".to_string()
        })
    );
    assert_eq!(config.mapping.cell_size, 500);
}

#[test]
fn test_voronoi_large_must_exceed_small() {
    let (mut config, mut forms) = forms();
    forms.mapping.kind = MappingKind::Voronoi;
    forms.mapping.voronoi_small = "2000".to_string();
    forms.mapping.voronoi_large = "1000".to_string();

    let (result, strategy) = validate_mapping(&forms.mapping, &mut config);
    assert!(!result.ok);
    assert!(strategy.is_none());
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::VoronoiSmall, FieldId::VoronoiLarge])
    );

    forms.mapping.voronoi_large = "3000".to_string();
    let (result, strategy) = validate_mapping(&forms.mapping, &mut config);
    assert!(result.ok);
    assert_eq!(
        strategy,
        Some(MappingStrategy::Voronoi {
            small_cell_size: 2000,
            large_cell_size: 3000
        })
    );
}

#[test]
fn test_administrative_needs_shape_file() {
    let (mut config, mut forms) = forms();
    forms.mapping.kind = MappingKind::Administrative;

    let (result, _) = validate_mapping(&forms.mapping, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::ShapeFile]));

    forms.mapping.shape_file = "districts.shp".to_string();
    let (result, strategy) = validate_mapping(&forms.mapping, &mut config);
    assert!(result.ok);
    assert!(matches!(
        strategy,
        Some(MappingStrategy::Administrative { .. })
    ));
}

// ============================================================================
// Plot
// ============================================================================

#[test]
fn test_plot_rejects_negative_counts() {
    let (mut config, mut forms) = forms();
    let result = validate_plot(&forms.plot, &mut config);
    assert!(result.ok);

    assert!(forms.plot.active_mut().set_text("time_delta", "-1"));
    let result = validate_plot(&forms.plot, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::Plot("time_delta")]));

    // An empty optional count is accepted as unset.
    assert!(forms.plot.active_mut().set_text("time_delta", "2"));
    assert!(forms.plot.active_mut().set_text("n_step", ""));
    assert!(validate_plot(&forms.plot, &mut config).ok);
    assert_eq!(config.plot.nodes.n_step, None);
    assert_eq!(config.plot.nodes.time_delta, 2);
}

// ============================================================================
// Model parameters
// ============================================================================

fn model_forms() -> (Config, Forms) {
    let (config, mut forms) = forms();
    forms.model.graph_data_path = "out/data.pt".to_string();
    (config, forms)
}

#[test]
fn test_model_defaults_pass() {
    let (mut config, forms) = model_forms();
    let result = validate_model_params(&forms.model, &mut config);
    assert!(result.ok, "unexpected marks: {:?}", result.marks);
    assert_eq!(
        config.training.graph_data_path.as_deref(),
        Some(std::path::Path::new("out/data.pt"))
    );
}

#[test]
fn test_model_ratios_are_open_interval() {
    let (mut config, mut forms) = model_forms();
    forms.model.test_ratio = "0".to_string();
    forms.model.val_ratio = "1".to_string();
    let result = validate_model_params(&forms.model, &mut config);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::TestRatio, FieldId::ValRatio])
    );

    forms.model.test_ratio = "0.2".to_string();
    forms.model.val_ratio = "0.1".to_string();
    let result = validate_model_params(&forms.model, &mut config);
    assert!(result.ok);
    assert_eq!(config.training.test_ratio, 0.2);
}

#[test]
fn test_model_decay_factor_below_one() {
    let (mut config, mut forms) = model_forms();
    forms.model.lr_decay_factor = "1.0".to_string();
    forms.model.learning_rate = "-0.1".to_string();
    let result = validate_model_params(&forms.model, &mut config);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::LearningRate, FieldId::DecayFactor])
    );
}

#[test]
fn test_hidden_fields_are_not_validated() {
    let (mut config, mut forms) = model_forms();
    forms.model.momentum = "not a number".to_string();
    forms.model.es_patience = "".to_string();
    assert!(validate_model_params(&forms.model, &mut config).ok);

    forms.model.optimizer = Optimizer::Sgd;
    let result = validate_model_params(&forms.model, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::Momentum]));

    forms.model.early_stopping = true;
    let result = validate_model_params(&forms.model, &mut config);
    assert!(result.is_marked(FieldId::EsPatience));
}

#[test]
fn test_model_dropout_range() {
    let (mut config, mut forms) = model_forms();
    forms.model.family = ModelFamily::Gcn;
    if let Some(text) = forms.model.text_mut(FieldId::Model("dropout")) {
        *text = "1.5".to_string();
    }
    let result = validate_model_params(&forms.model, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::Model("dropout")]));
}

#[test]
fn test_model_requires_graph_data() {
    let (mut config, forms) = forms();
    let result = validate_model_params(&forms.model, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::GraphData]));
}

// ============================================================================
// Logging
// ============================================================================

#[test]
fn test_local_logging_needs_folder() {
    let (mut config, mut forms) = forms();
    forms.logging.destination = LogDestination::Local;
    forms.logging.log_dir = String::new();
    let result = validate_logging(&forms.logging, &mut config);
    assert_eq!(result.marks, BTreeSet::from([FieldId::LogDir]));

    forms.logging.log_dir = "logs".to_string();
    assert!(validate_logging(&forms.logging, &mut config).ok);
    assert!(!config.training.use_wandb);
    assert_eq!(config.training.experiment_name, "stm_graph_experiment");
}

#[test]
fn test_remote_logging_needs_credentials() {
    let (mut config, mut forms) = forms();
    forms.logging.destination = LogDestination::Wandb;
    forms.logging.log_dir = String::new();
    forms.logging.api_token = String::new();
    forms.logging.project_id = String::new();

    let result = validate_logging(&forms.logging, &mut config);
    assert_eq!(
        result.marks,
        BTreeSet::from([FieldId::ApiToken, FieldId::ProjectId])
    );

    forms.logging.api_token = "secret".to_string();
    forms.logging.project_id = "traffic".to_string();
    let result = validate_logging(&forms.logging, &mut config);
    assert!(result.ok);
    assert!(config.training.use_wandb);
    // Remote-only runs log next to the outputs.
    assert_eq!(
        config.training.log_dir.as_deref(),
        Some(std::path::Path::new("out"))
    );
}

#[test]
fn test_both_destinations_need_everything() {
    let (mut config, mut forms) = forms();
    forms.logging.destination = LogDestination::Both;
    forms.logging.log_dir = String::new();
    forms.logging.api_token = String::new();
    forms.logging.experiment = String::new();

    let result = validate_logging(&forms.logging, &mut config);
    assert!(result.is_marked(FieldId::LogDir));
    assert!(result.is_marked(FieldId::ApiToken));
    assert!(result.is_marked(FieldId::Experiment));
}
