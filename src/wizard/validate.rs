//! Step validators.
//!
//! Each validator reads a step form, writes every accepted value into the
//! [`Config`], and reports which fields are invalid. The forward action of a
//! step is enabled only while its validator reports `ok`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use super::forms::{
    ConfigureForm, FieldId, LoadForm, LogForm, MappingForm, ModelForm, ParamForm, ParamInput,
    PlotForm,
};
use crate::config::{
    Bounds, Config, LogDestination, MappingKind, ParamBlock, ParamKind, ParamValue,
    DEFAULT_EXPERIMENT_NAME, FALLBACK_LOG_DIR,
};
use crate::toolkit::MappingStrategy;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub ok: bool,
    pub marks: BTreeSet<FieldId>,
}

impl Validation {
    fn from_marks(marks: BTreeSet<FieldId>) -> Self {
        Self {
            ok: marks.is_empty(),
            marks,
        }
    }

    /// Validation for steps that have nothing to check.
    pub fn pass() -> Self {
        Self {
            ok: true,
            marks: BTreeSet::new(),
        }
    }

    pub fn is_marked(&self, field: FieldId) -> bool {
        self.marks.contains(&field)
    }
}

// ============================================================================
// Field rules
// ============================================================================

fn crs_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^EPSG:\d{3,}$").expect("CRS pattern is valid"))
}

pub fn is_valid_crs(value: &str) -> bool {
    crs_pattern().is_match(value)
}

/// Uppercased CRS code, or `None` if the value is not `EPSG:` plus 3+ digits.
pub fn normalize_crs(value: &str) -> Option<String> {
    is_valid_crs(value).then(|| value.to_uppercase())
}

fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

fn parse_unsigned(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

fn parse_positive(text: &str) -> Option<u32> {
    parse_unsigned(text).filter(|v| *v > 0)
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Check the test-mode bounding box.
///
/// Off: bounds are cleared. On: all four must parse and `max > min` must hold
/// for both axes; offending pairs are returned as marks.
pub fn check_bounds(
    test_mode: bool,
    min_lat: &str,
    max_lat: &str,
    min_lon: &str,
    max_lon: &str,
) -> Result<Option<Bounds>, BTreeSet<FieldId>> {
    if !test_mode {
        return Ok(None);
    }

    let mut marks = BTreeSet::new();
    let mut field = |text: &str, id: FieldId| {
        let value = parse_float(text);
        if value.is_none() {
            marks.insert(id);
        }
        value
    };
    let values = (
        field(min_lat, FieldId::MinLat),
        field(max_lat, FieldId::MaxLat),
        field(min_lon, FieldId::MinLon),
        field(max_lon, FieldId::MaxLon),
    );

    let (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) = values else {
        return Err(marks);
    };
    if max_lat <= min_lat {
        marks.extend([FieldId::MinLat, FieldId::MaxLat]);
    }
    if max_lon <= min_lon {
        marks.extend([FieldId::MinLon, FieldId::MaxLon]);
    }
    if !marks.is_empty() {
        return Err(marks);
    }

    Ok(Some(Bounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }))
}

/// Parse one form row according to its descriptor.
fn parse_param(kind: ParamKind, input: &ParamInput) -> Option<ParamValue> {
    match (kind, input) {
        (ParamKind::Choice(options), ParamInput::Choice { selected, .. }) => options
            .get(*selected)
            .map(|o| ParamValue::Text((*o).to_string())),
        (ParamKind::Int, ParamInput::Text(text)) => parse_int(text).map(ParamValue::Int),
        (ParamKind::OptionalInt, ParamInput::Text(text)) => match non_empty(text) {
            None => Some(ParamValue::Unset),
            Some(t) => parse_int(t).map(ParamValue::Int),
        },
        (ParamKind::Float, ParamInput::Text(text)) => parse_float(text).map(ParamValue::Float),
        _ => None,
    }
}

/// Write a parameter form into its block. Returns the names that failed.
fn apply_param_form(
    form: &ParamForm,
    block: &mut dyn ParamBlock,
    extra_check: impl Fn(&str, &ParamValue) -> bool,
) -> Vec<&'static str> {
    let mut failed = Vec::new();
    for row in &form.rows {
        let name = row.descriptor.name;
        let accepted = parse_param(row.descriptor.kind, &row.input)
            .filter(|value| extra_check(name, value))
            .map(|value| block.set(name, value).is_ok())
            .unwrap_or(false);
        if !accepted {
            failed.push(name);
        }
    }
    failed
}

// ============================================================================
// Data steps
// ============================================================================

pub fn validate_load(form: &LoadForm, config: &mut Config) -> Validation {
    let mut marks = BTreeSet::new();

    match normalize_crs(&form.input_crs) {
        Some(crs) => config.input_crs = crs,
        None => {
            marks.insert(FieldId::InputCrs);
        }
    }
    match normalize_crs(&form.meter_crs) {
        Some(crs) => config.meter_crs = crs,
        None => {
            marks.insert(FieldId::MeterCrs);
        }
    }

    match &form.data_path {
        Some(path) => config.data_path = Some(path.clone()),
        None => {
            marks.insert(FieldId::DataFile);
        }
    }

    let columns = [
        (form.time_column, FieldId::TimeColumn, &mut config.time_column),
        (form.lat_column, FieldId::LatColumn, &mut config.lat_column),
        (form.lon_column, FieldId::LonColumn, &mut config.long_column),
    ];
    for (choice, field, slot) in columns {
        match form.column_name(choice) {
            Some(name) => *slot = Some(name.to_string()),
            None => {
                marks.insert(field);
            }
        }
    }

    Validation::from_marks(marks)
}

pub fn validate_configure(form: &ConfigureForm, config: &mut Config) -> Validation {
    let mut marks = BTreeSet::new();

    config.app_type = form.task_type;
    config.pred_type = form.bin_type;
    config.use_time_features = form.use_time_features;

    let (start, end) = form.dates.range();
    config.date_filter_start = start;
    config.date_filter_end = end;

    let integers = [
        (&form.horizon, FieldId::Horizon, &mut config.horizon),
        (&form.window_size, FieldId::WindowSize, &mut config.window_size),
        (&form.interval_step, FieldId::IntervalStep, &mut config.interval_step),
    ];
    for (text, field, slot) in integers {
        match parse_positive(text) {
            Some(value) => *slot = value,
            None => {
                marks.insert(field);
            }
        }
    }

    config.test_mode = form.test_mode;
    match check_bounds(
        form.test_mode,
        &form.min_lat,
        &form.max_lat,
        &form.min_lon,
        &form.max_lon,
    ) {
        Ok(bounds) => config.bounds = bounds,
        Err(bad) => marks.extend(bad),
    }

    if form.use_knowledge_graph {
        if form.osm.is_empty() {
            marks.extend(
                crate::config::OsmFeature::ALL
                    .iter()
                    .map(|f| FieldId::Osm(*f)),
            );
        } else {
            config.osm_types = Some(form.osm.iter().copied().collect());
        }
    } else {
        config.osm_types = None;
    }

    match non_empty(&form.output_dir) {
        Some(dir) => config.output_dir = Some(PathBuf::from(dir)),
        None => {
            marks.insert(FieldId::OutputDir);
        }
    }

    Validation::from_marks(marks)
}

/// Validate the mapping form and build the strategy from the accepted values.
pub fn validate_mapping(
    form: &MappingForm,
    config: &mut Config,
) -> (Validation, Option<MappingStrategy>) {
    let mut marks = BTreeSet::new();
    config.mapping.mapping = form.kind;

    let strategy = match form.kind {
        MappingKind::Grid => match parse_positive(&form.grid_size) {
            Some(cell_size) => {
                config.mapping.cell_size = cell_size;
                Some(MappingStrategy::Grid {
                    cell_size,
                    meter_crs: config.meter_crs.clone(),
                })
            }
            None => {
                marks.insert(FieldId::GridSize);
                None
            }
        },
        MappingKind::Administrative => match non_empty(&form.shape_file) {
            Some(file) => {
                let districts_file = PathBuf::from(file);
                config.mapping.adm_shape_file = Some(districts_file.clone());
                Some(MappingStrategy::Administrative {
                    districts_file,
                    input_crs: config.input_crs.clone(),
                    meter_crs: config.meter_crs.clone(),
                })
            }
            None => {
                marks.insert(FieldId::ShapeFile);
                None
            }
        },
        MappingKind::Voronoi => {
            let small = parse_positive(&form.voronoi_small);
            let large = parse_positive(&form.voronoi_large);
            if small.is_none() {
                marks.insert(FieldId::VoronoiSmall);
            }
            if large.is_none() {
                marks.insert(FieldId::VoronoiLarge);
            }
            match (small, large) {
                (Some(small), Some(large)) if large > small => {
                    config.mapping.vor_small_cell_size = small;
                    config.mapping.vor_big_cell_size = large;
                    Some(MappingStrategy::Voronoi {
                        small_cell_size: small,
                        large_cell_size: large,
                    })
                }
                (Some(_), Some(_)) => {
                    marks.extend([FieldId::VoronoiSmall, FieldId::VoronoiLarge]);
                    None
                }
                _ => None,
            }
        }
    };

    (Validation::from_marks(marks), strategy)
}

pub fn validate_plot(form: &PlotForm, config: &mut Config) -> Validation {
    config.plot.plot_type = form.kind;
    let block = config.plot.block_mut(form.kind);
    let failed = apply_param_form(form.active(), block, |_, value| match value {
        ParamValue::Int(v) => *v >= 0,
        _ => true,
    });
    Validation::from_marks(failed.into_iter().map(FieldId::Plot).collect())
}

// ============================================================================
// Training steps
// ============================================================================

pub fn validate_model_params(form: &ModelForm, config: &mut Config) -> Validation {
    let mut marks = BTreeSet::new();
    let training = &mut config.training;

    training.model = form.family;
    training.optimizer = form.optimizer;
    training.scheduler_type = form.scheduler;
    training.early_stopping = form.early_stopping;

    let visible = form.visible_training_fields();
    let shown = |field: FieldId| visible.contains(&field);

    let mut ints = vec![
        (&form.batch_size, FieldId::BatchSize, &mut training.batch_size),
        (&form.num_epochs, FieldId::Epochs, &mut training.num_epochs),
    ];
    if shown(FieldId::StepDecay) {
        ints.push((&form.lr_step_decay, FieldId::StepDecay, &mut training.lr_step_decay));
    }
    if shown(FieldId::LrPatience) {
        ints.push((&form.lr_patience, FieldId::LrPatience, &mut training.lr_patience));
    }
    if shown(FieldId::EsPatience) {
        ints.push((&form.es_patience, FieldId::EsPatience, &mut training.es_patience));
    }
    for (text, field, slot) in ints {
        match parse_unsigned(text) {
            Some(value) => *slot = value,
            None => {
                marks.insert(field);
            }
        }
    }

    type FloatRule = fn(f64) -> bool;
    let ratio: FloatRule = |v| v > 0.0 && v < 1.0;
    let non_negative: FloatRule = |v| v >= 0.0;
    let below_one: FloatRule = |v| v < 1.0;

    let mut floats = vec![
        (&form.test_ratio, FieldId::TestRatio, ratio, &mut training.test_ratio),
        (&form.val_ratio, FieldId::ValRatio, ratio, &mut training.val_ratio),
        (&form.learning_rate, FieldId::LearningRate, non_negative, &mut training.learning_rate),
        (&form.weight_decay, FieldId::WeightDecay, non_negative, &mut training.weight_decay),
        (&form.lr_decay_factor, FieldId::DecayFactor, below_one, &mut training.lr_decay_factor),
    ];
    if shown(FieldId::Momentum) {
        floats.push((&form.momentum, FieldId::Momentum, non_negative, &mut training.momentum));
    }
    for (text, field, rule, slot) in floats {
        match parse_float(text).filter(|v| rule(*v)) {
            Some(value) => *slot = value,
            None => {
                marks.insert(field);
            }
        }
    }

    let block = training.block_mut(form.family);
    let failed = apply_param_form(form.active(), block, |name, value| match (name, value) {
        ("dropout", ParamValue::Float(v)) => (0.0..=1.0).contains(v),
        (_, ParamValue::Int(v)) => *v >= 0,
        _ => true,
    });
    marks.extend(failed.into_iter().map(FieldId::Model));

    match non_empty(&form.graph_data_path) {
        Some(path) => training.graph_data_path = Some(PathBuf::from(path)),
        None => {
            marks.insert(FieldId::GraphData);
        }
    }

    Validation::from_marks(marks)
}

/// Logging destination rules.
///
/// Local needs a log folder. Remote needs a token, project and experiment
/// name; remote-only logs next to the outputs. Both needs everything.
pub fn validate_logging(form: &LogForm, config: &mut Config) -> Validation {
    let mut marks = BTreeSet::new();
    let output_dir = config.output_dir.clone();
    let training = &mut config.training;

    training.log_destination = form.destination;
    training.use_wandb = form.destination.writes_remote();

    if form.destination.writes_remote() {
        training.experiment_name = form.experiment.clone();
        training.wandb_api_key = Some(form.api_token.clone());
        training.wandb_project = form.project_id.clone();

        let required = [
            (&form.api_token, FieldId::ApiToken),
            (&form.project_id, FieldId::ProjectId),
            (&form.experiment, FieldId::Experiment),
        ];
        for (text, field) in required {
            if non_empty(text).is_none() {
                marks.insert(field);
            }
        }
    } else {
        training.experiment_name = DEFAULT_EXPERIMENT_NAME.to_string();
    }

    match form.destination {
        LogDestination::Wandb => {
            training.log_dir =
                Some(output_dir.unwrap_or_else(|| PathBuf::from(FALLBACK_LOG_DIR)));
        }
        LogDestination::Local | LogDestination::Both => match non_empty(&form.log_dir) {
            Some(dir) => training.log_dir = Some(PathBuf::from(dir)),
            None => {
                training.log_dir = None;
                marks.insert(FieldId::LogDir);
            }
        },
    }

    Validation::from_marks(marks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_pattern() {
        assert!(is_valid_crs("EPSG:4326"));
        assert!(is_valid_crs("epsg:3857"));
        assert!(!is_valid_crs("4326"));
        assert!(!is_valid_crs("EPSG:12"));
        assert!(!is_valid_crs(" EPSG:4326"));
        assert!(!is_valid_crs("EPSG:4326x"));
    }

    #[test]
    fn test_normalize_uppercases() {
        assert_eq!(normalize_crs("epsg:3857").as_deref(), Some("EPSG:3857"));
        assert_eq!(normalize_crs("EPSG:12"), None);
    }

    #[test]
    fn test_bounds_off_clears() {
        assert_eq!(check_bounds(false, "x", "y", "z", "w"), Ok(None));
    }

    #[test]
    fn test_bounds_marks_only_offending_pair() {
        let marks = check_bounds(true, "40", "41", "-74", "-75").unwrap_err();
        assert_eq!(
            marks,
            BTreeSet::from([FieldId::MinLon, FieldId::MaxLon])
        );
    }

    #[test]
    fn test_bounds_unparsable_field() {
        let marks = check_bounds(true, "forty", "41", "-75", "-74").unwrap_err();
        assert_eq!(marks, BTreeSet::from([FieldId::MinLat]));
    }

    #[test]
    fn test_optional_param_accepts_empty() {
        assert_eq!(
            parse_param(ParamKind::OptionalInt, &ParamInput::Text("  ".into())),
            Some(ParamValue::Unset)
        );
        assert_eq!(
            parse_param(ParamKind::Int, &ParamInput::Text("".into())),
            None
        );
        assert_eq!(
            parse_param(ParamKind::Int, &ParamInput::Text("2.5".into())),
            None
        );
    }
}
