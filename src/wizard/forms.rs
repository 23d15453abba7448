//! Form state for each wizard step.
//!
//! Forms hold what the user typed, as text. Validators parse them and write
//! the accepted values into the [`Config`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{Days, Local, NaiveDate};

use crate::config::{
    BinType, Config, LogDestination, MappingKind, ModelFamily, Optimizer, OsmFeature,
    ParamBlock, ParamDescriptor, ParamKind, ParamValue, PlotKind, Scheduler, TaskType,
    DEFAULT_EXPERIMENT_NAME,
};
use crate::pipeline::DataPreview;

/// Identifies a form field, for focus and validation marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    // Load
    DataFile,
    TimeColumn,
    LatColumn,
    LonColumn,
    InputCrs,
    MeterCrs,
    // Configure
    TaskType,
    BinType,
    UseTimeFeatures,
    StartDateEnabled,
    StartDate,
    EndDateEnabled,
    EndDate,
    Horizon,
    WindowSize,
    IntervalStep,
    TestMode,
    MinLat,
    MaxLat,
    MinLon,
    MaxLon,
    UseKnowledgeGraph,
    Osm(OsmFeature),
    OutputDir,
    // Mapping
    MappingKind,
    GridSize,
    ShapeFile,
    VoronoiSmall,
    VoronoiLarge,
    // Plot
    PlotKind,
    Plot(&'static str),
    // Model parameters
    ModelFamily,
    Model(&'static str),
    GraphData,
    Optimizer,
    LearningRate,
    WeightDecay,
    Momentum,
    Scheduler,
    StepDecay,
    DecayFactor,
    LrPatience,
    TestRatio,
    ValRatio,
    Epochs,
    BatchSize,
    EarlyStopping,
    EsPatience,
    // Logging
    LogDestination,
    LogDir,
    ApiToken,
    ProjectId,
    Experiment,
}

// ============================================================================
// Date range
// ============================================================================

/// Optional start/end date pair with a closed mutual constraint.
///
/// While both ends are enabled, `end >= start + 1 day` and
/// `start <= end - 1 day` hold after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRangeFilter {
    start_enabled: bool,
    end_enabled: bool,
    start: NaiveDate,
    end: NaiveDate,
}

impl Default for DateRangeFilter {
    fn default() -> Self {
        let today = Local::now().date_naive();
        let start = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self::new(start, today)
    }
}

impl DateRangeFilter {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_enabled: false,
            end_enabled: false,
            start,
            end,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    pub fn end_enabled(&self) -> bool {
        self.end_enabled
    }

    fn constrained(&self) -> bool {
        self.start_enabled && self.end_enabled
    }

    /// Earliest allowed end date while both ends are enabled.
    pub fn end_minimum(&self) -> Option<NaiveDate> {
        self.constrained()
            .then(|| self.start.checked_add_days(Days::new(1)))
            .flatten()
    }

    /// Latest allowed start date while both ends are enabled.
    pub fn start_maximum(&self) -> Option<NaiveDate> {
        self.constrained()
            .then(|| self.end.checked_sub_days(Days::new(1)))
            .flatten()
    }

    fn reconcile(&mut self) {
        if let Some(min_end) = self.end_minimum() {
            if self.end < min_end {
                self.end = min_end;
            }
        }
        if let Some(max_start) = self.start_maximum() {
            if self.start > max_start {
                self.start = max_start;
            }
        }
    }

    /// Set the start date. Clamped to the maximum while both ends are enabled.
    pub fn set_start(&mut self, date: NaiveDate) {
        self.start = match self.start_maximum() {
            Some(max_start) if date > max_start => max_start,
            _ => date,
        };
        self.reconcile();
    }

    /// Set the end date. Clamped to the minimum while both ends are enabled.
    pub fn set_end(&mut self, date: NaiveDate) {
        self.end = match self.end_minimum() {
            Some(min_end) if date < min_end => min_end,
            _ => date,
        };
        self.reconcile();
    }

    pub fn enable_start(&mut self, enabled: bool) {
        self.start_enabled = enabled;
        self.reconcile();
    }

    pub fn enable_end(&mut self, enabled: bool) {
        self.end_enabled = enabled;
        self.reconcile();
    }

    pub fn shift_start(&mut self, days: i64) {
        if let Some(date) = shift(self.start, days) {
            self.set_start(date);
        }
    }

    pub fn shift_end(&mut self, days: i64) {
        if let Some(date) = shift(self.end, days) {
            self.set_end(date);
        }
    }

    /// The enabled ends, as written to the configuration.
    pub fn range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (
            self.start_enabled.then_some(self.start),
            self.end_enabled.then_some(self.end),
        )
    }
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

// ============================================================================
// Generic parameter forms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamInput {
    Text(String),
    Choice {
        options: &'static [&'static str],
        selected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRow {
    pub descriptor: &'static ParamDescriptor,
    pub input: ParamInput,
}

impl ParamRow {
    pub fn display(&self) -> &str {
        match &self.input {
            ParamInput::Text(text) => text,
            ParamInput::Choice { options, selected } => options.get(*selected).copied().unwrap_or(""),
        }
    }
}

/// Form rows generated from a parameter block's descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamForm {
    pub rows: Vec<ParamRow>,
}

impl ParamForm {
    /// One row per editable descriptor, pre-filled with the block's values.
    pub fn build(block: &dyn ParamBlock) -> Self {
        let rows = block
            .editable()
            .into_iter()
            .map(|descriptor| {
                let current = block.get(descriptor.name).unwrap_or(ParamValue::Unset);
                let input = match descriptor.kind {
                    ParamKind::Choice(options) => {
                        let text = current.to_string();
                        let selected = options.iter().position(|o| *o == text).unwrap_or(0);
                        ParamInput::Choice { options, selected }
                    }
                    _ => ParamInput::Text(current.to_string()),
                };
                ParamRow { descriptor, input }
            })
            .collect();
        Self { rows }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rows.iter().map(|r| r.descriptor.name).collect()
    }

    pub fn row(&self, name: &str) -> Option<&ParamRow> {
        self.rows.iter().find(|r| r.descriptor.name == name)
    }

    pub fn text_mut(&mut self, name: &str) -> Option<&mut String> {
        self.rows
            .iter_mut()
            .find(|r| r.descriptor.name == name)
            .and_then(|r| match &mut r.input {
                ParamInput::Text(text) => Some(text),
                ParamInput::Choice { .. } => None,
            })
    }

    pub fn set_text(&mut self, name: &str, value: &str) -> bool {
        match self.text_mut(name) {
            Some(text) => {
                *text = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn cycle_choice(&mut self, name: &str, delta: isize) -> bool {
        let Some(row) = self.rows.iter_mut().find(|r| r.descriptor.name == name) else {
            return false;
        };
        match &mut row.input {
            ParamInput::Choice { options, selected } if !options.is_empty() => {
                *selected = cycle(*selected, options.len(), delta);
                true
            }
            _ => false,
        }
    }
}

/// Wrap-around index step.
pub fn cycle(index: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (index as isize + delta).rem_euclid(len as isize) as usize
}

// ============================================================================
// Step forms
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LoadForm {
    pub data_path: Option<PathBuf>,
    pub preview: Option<DataPreview>,
    pub columns: Vec<String>,
    pub time_column: Option<usize>,
    pub lat_column: Option<usize>,
    pub lon_column: Option<usize>,
    pub input_crs: String,
    pub meter_crs: String,
}

impl LoadForm {
    pub fn from_config(config: &Config) -> Self {
        let columns: Vec<String> = [&config.time_column, &config.lat_column, &config.long_column]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let position = |name: &Option<String>| {
            name.as_ref()
                .and_then(|n| columns.iter().position(|c| c == n))
        };
        Self {
            data_path: config.data_path.clone(),
            preview: None,
            time_column: position(&config.time_column),
            lat_column: position(&config.lat_column),
            lon_column: position(&config.long_column),
            columns: columns.clone(),
            input_crs: config.input_crs.clone(),
            meter_crs: config.meter_crs.clone(),
        }
    }

    /// Install a freshly read file, keeping column choices that still exist.
    pub fn set_preview(&mut self, path: PathBuf, preview: DataPreview) {
        let keep = |choice: Option<usize>, old: &[String], new: &[String]| {
            choice
                .and_then(|i| old.get(i))
                .and_then(|name| new.iter().position(|c| c == name))
        };
        let (guess_time, guess_lat, guess_lon) =
            crate::pipeline::preview::guess_coordinate_columns(&preview.columns);

        self.time_column = keep(self.time_column, &self.columns, &preview.columns).or(guess_time);
        self.lat_column = keep(self.lat_column, &self.columns, &preview.columns).or(guess_lat);
        self.lon_column = keep(self.lon_column, &self.columns, &preview.columns).or(guess_lon);
        self.columns = preview.columns.clone();
        self.data_path = Some(path);
        self.preview = Some(preview);
    }

    pub fn column_name(&self, choice: Option<usize>) -> Option<&str> {
        choice.and_then(|i| self.columns.get(i)).map(String::as_str)
    }

    pub fn cycle_column(&mut self, field: FieldId, delta: isize) {
        let len = self.columns.len();
        if len == 0 {
            return;
        }
        let slot = match field {
            FieldId::TimeColumn => &mut self.time_column,
            FieldId::LatColumn => &mut self.lat_column,
            FieldId::LonColumn => &mut self.lon_column,
            _ => return,
        };
        *slot = Some(match *slot {
            Some(i) => cycle(i, len, delta),
            None if delta < 0 => len - 1,
            None => 0,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureForm {
    pub task_type: TaskType,
    pub bin_type: BinType,
    pub use_time_features: bool,
    pub dates: DateRangeFilter,
    pub horizon: String,
    pub window_size: String,
    pub interval_step: String,
    pub test_mode: bool,
    pub min_lat: String,
    pub max_lat: String,
    pub min_lon: String,
    pub max_lon: String,
    pub use_knowledge_graph: bool,
    pub osm: BTreeSet<OsmFeature>,
    pub output_dir: String,
}

impl ConfigureForm {
    pub fn from_config(config: &Config) -> Self {
        let mut dates = DateRangeFilter::default();
        if let Some(start) = config.date_filter_start {
            dates.set_start(start);
            dates.enable_start(true);
        }
        if let Some(end) = config.date_filter_end {
            dates.set_end(end);
            dates.enable_end(true);
        }
        let bounds = config.bounds.unwrap_or_default();
        let osm: BTreeSet<OsmFeature> = config.osm_types.iter().flatten().copied().collect();

        Self {
            task_type: config.app_type,
            bin_type: config.pred_type,
            use_time_features: config.use_time_features,
            dates,
            horizon: config.horizon.to_string(),
            window_size: config.window_size.to_string(),
            interval_step: config.interval_step.to_string(),
            test_mode: config.test_mode,
            min_lat: bounds.min_lat.to_string(),
            max_lat: bounds.max_lat.to_string(),
            min_lon: bounds.min_lon.to_string(),
            max_lon: bounds.max_lon.to_string(),
            use_knowledge_graph: !osm.is_empty(),
            osm,
            output_dir: config
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn toggle_osm(&mut self, feature: OsmFeature) {
        if !self.osm.remove(&feature) {
            self.osm.insert(feature);
        }
    }
}

pub const UI_GRID_SIZE: u32 = 20000;
pub const UI_VORONOI_SMALL: u32 = 20000;
pub const UI_VORONOI_LARGE: u32 = 30000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingForm {
    pub kind: MappingKind,
    pub grid_size: String,
    pub shape_file: String,
    pub voronoi_small: String,
    pub voronoi_large: String,
}

impl Default for MappingForm {
    fn default() -> Self {
        Self {
            kind: MappingKind::Grid,
            grid_size: UI_GRID_SIZE.to_string(),
            shape_file: String::new(),
            voronoi_small: UI_VORONOI_SMALL.to_string(),
            voronoi_large: UI_VORONOI_LARGE.to_string(),
        }
    }
}

impl MappingForm {
    pub fn from_config(config: &Config) -> Self {
        let mapping = &config.mapping;
        Self {
            kind: mapping.mapping,
            grid_size: mapping.cell_size.to_string(),
            shape_file: mapping
                .adm_shape_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            voronoi_small: mapping.vor_small_cell_size.to_string(),
            voronoi_large: mapping.vor_big_cell_size.to_string(),
        }
    }

    /// Fields relevant to the selected strategy.
    pub fn visible_fields(&self) -> Vec<FieldId> {
        let mut fields = vec![FieldId::MappingKind];
        match self.kind {
            MappingKind::Grid => fields.push(FieldId::GridSize),
            MappingKind::Administrative => fields.push(FieldId::ShapeFile),
            MappingKind::Voronoi => fields.extend([FieldId::VoronoiSmall, FieldId::VoronoiLarge]),
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotForm {
    pub kind: PlotKind,
    pub node: ParamForm,
    pub spatial: ParamForm,
    pub heatmap: ParamForm,
}

impl PlotForm {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kind: config.plot.plot_type,
            node: ParamForm::build(&config.plot.nodes),
            spatial: ParamForm::build(&config.plot.spatial),
            heatmap: ParamForm::build(&config.plot.heatmap),
        }
    }

    pub fn active(&self) -> &ParamForm {
        self.params(self.kind)
    }

    pub fn active_mut(&mut self) -> &mut ParamForm {
        match self.kind {
            PlotKind::Node => &mut self.node,
            PlotKind::Spatial => &mut self.spatial,
            PlotKind::Heatmap => &mut self.heatmap,
        }
    }

    pub fn params(&self, kind: PlotKind) -> &ParamForm {
        match kind {
            PlotKind::Node => &self.node,
            PlotKind::Spatial => &self.spatial,
            PlotKind::Heatmap => &self.heatmap,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelForm {
    pub family: ModelFamily,
    pub params: Vec<(ModelFamily, ParamForm)>,
    pub graph_data_path: String,
    pub optimizer: Optimizer,
    pub learning_rate: String,
    pub weight_decay: String,
    pub momentum: String,
    pub scheduler: Scheduler,
    pub lr_step_decay: String,
    pub lr_decay_factor: String,
    pub lr_patience: String,
    pub test_ratio: String,
    pub val_ratio: String,
    pub num_epochs: String,
    pub batch_size: String,
    pub early_stopping: bool,
    pub es_patience: String,
}

impl ModelForm {
    pub fn from_config(config: &Config) -> Self {
        let training = &config.training;
        Self {
            family: training.model,
            params: ModelFamily::ALL
                .iter()
                .map(|&family| (family, ParamForm::build(training.block(family))))
                .collect(),
            graph_data_path: training
                .graph_data_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            optimizer: training.optimizer,
            learning_rate: training.learning_rate.to_string(),
            weight_decay: training.weight_decay.to_string(),
            momentum: training.momentum.to_string(),
            scheduler: training.scheduler_type,
            lr_step_decay: training.lr_step_decay.to_string(),
            lr_decay_factor: training.lr_decay_factor.to_string(),
            lr_patience: training.lr_patience.to_string(),
            test_ratio: training.test_ratio.to_string(),
            val_ratio: training.val_ratio.to_string(),
            num_epochs: training.num_epochs.to_string(),
            batch_size: training.batch_size.to_string(),
            early_stopping: training.early_stopping,
            es_patience: training.es_patience.to_string(),
        }
    }

    pub fn active(&self) -> &ParamForm {
        self.params_for(self.family)
    }

    pub fn params_for(&self, family: ModelFamily) -> &ParamForm {
        self.params
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, form)| form)
            .unwrap_or(&EMPTY_PARAM_FORM)
    }

    pub fn active_mut(&mut self) -> Option<&mut ParamForm> {
        let family = self.family;
        self.params
            .iter_mut()
            .find(|(f, _)| *f == family)
            .map(|(_, form)| form)
    }

    /// Refresh one family's rows from the configuration.
    pub fn reload_family(&mut self, config: &Config, family: ModelFamily) {
        let form = ParamForm::build(config.training.block(family));
        match self.params.iter_mut().find(|(f, _)| *f == family) {
            Some((_, slot)) => *slot = form,
            None => self.params.push((family, form)),
        }
    }

    /// Training fields shown for the current optimizer, scheduler and
    /// early-stopping choices.
    pub fn visible_training_fields(&self) -> Vec<FieldId> {
        let mut fields = vec![FieldId::Optimizer, FieldId::LearningRate, FieldId::WeightDecay];
        if self.optimizer.uses_momentum() {
            fields.push(FieldId::Momentum);
        }
        fields.push(FieldId::Scheduler);
        match self.scheduler {
            Scheduler::Step => fields.push(FieldId::StepDecay),
            Scheduler::Plateau => fields.push(FieldId::LrPatience),
            Scheduler::None => {}
        }
        fields.extend([
            FieldId::DecayFactor,
            FieldId::TestRatio,
            FieldId::ValRatio,
            FieldId::Epochs,
            FieldId::BatchSize,
            FieldId::EarlyStopping,
        ]);
        if self.early_stopping {
            fields.push(FieldId::EsPatience);
        }
        fields
    }

    pub fn text_mut(&mut self, field: FieldId) -> Option<&mut String> {
        Some(match field {
            FieldId::GraphData => &mut self.graph_data_path,
            FieldId::LearningRate => &mut self.learning_rate,
            FieldId::WeightDecay => &mut self.weight_decay,
            FieldId::Momentum => &mut self.momentum,
            FieldId::StepDecay => &mut self.lr_step_decay,
            FieldId::DecayFactor => &mut self.lr_decay_factor,
            FieldId::LrPatience => &mut self.lr_patience,
            FieldId::TestRatio => &mut self.test_ratio,
            FieldId::ValRatio => &mut self.val_ratio,
            FieldId::Epochs => &mut self.num_epochs,
            FieldId::BatchSize => &mut self.batch_size,
            FieldId::EsPatience => &mut self.es_patience,
            FieldId::Model(name) => return self.active_mut()?.text_mut(name),
            _ => return None,
        })
    }
}

static EMPTY_PARAM_FORM: ParamForm = ParamForm { rows: Vec::new() };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogForm {
    pub destination: LogDestination,
    pub log_dir: String,
    pub api_token: String,
    pub project_id: String,
    pub experiment: String,
}

impl LogForm {
    pub fn from_config(config: &Config) -> Self {
        let training = &config.training;
        Self {
            destination: training.log_destination,
            log_dir: training
                .log_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            api_token: training.wandb_api_key.clone().unwrap_or_default(),
            project_id: training.wandb_project.clone(),
            experiment: if training.experiment_name.is_empty() {
                DEFAULT_EXPERIMENT_NAME.to_string()
            } else {
                training.experiment_name.clone()
            },
        }
    }

    /// Whether a field accepts input under the selected destination.
    pub fn is_enabled(&self, field: FieldId) -> bool {
        match field {
            FieldId::LogDestination => true,
            FieldId::LogDir => self.destination.writes_local(),
            FieldId::ApiToken | FieldId::ProjectId | FieldId::Experiment => {
                self.destination.writes_remote()
            }
            _ => false,
        }
    }
}

/// All step forms of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Forms {
    pub load: LoadForm,
    pub configure: ConfigureForm,
    pub mapping: MappingForm,
    pub plot: PlotForm,
    pub model: ModelForm,
    pub logging: LogForm,
}

impl Forms {
    /// Forms mirroring an existing configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            load: LoadForm::from_config(config),
            configure: ConfigureForm::from_config(config),
            mapping: MappingForm::from_config(config),
            plot: PlotForm::from_config(config),
            model: ModelForm::from_config(config),
            logging: LogForm::from_config(config),
        }
    }

    /// Forms for a fresh session: like [`Forms::from_config`] but with the
    /// wizard's own mapping size presets.
    pub fn initial(config: &Config) -> Self {
        Self {
            mapping: MappingForm {
                kind: config.mapping.mapping,
                ..MappingForm::default()
            },
            ..Self::from_config(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcnParams;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(cycle(0, 3, -1), 2);
        assert_eq!(cycle(2, 3, 1), 0);
        assert_eq!(cycle(0, 0, 1), 0);
    }

    #[test]
    fn test_param_form_prefills_values() {
        let form = ParamForm::build(&GcnParams::default());
        assert_eq!(form.names(), vec!["hidden_channels", "dropout", "temporal_pooling"]);
        assert_eq!(form.row("dropout").unwrap().display(), "0.2");
        assert_eq!(form.row("temporal_pooling").unwrap().display(), "last");
    }

    #[test]
    fn test_choice_rows_are_not_text() {
        let mut form = ParamForm::build(&GcnParams::default());
        assert!(!form.set_text("temporal_pooling", "max"));
        assert!(form.cycle_choice("temporal_pooling", 1));
        assert_eq!(form.row("temporal_pooling").unwrap().display(), "mean");
    }

    #[test]
    fn test_disabled_dates_are_unconstrained() {
        let mut dates = DateRangeFilter::new(date(2024, 1, 10), date(2024, 1, 20));
        dates.set_end(date(2024, 1, 1));
        assert_eq!(dates.end(), date(2024, 1, 1));
        assert_eq!(dates.range(), (None, None));
    }

    #[test]
    fn test_start_clamped_below_end() {
        let mut dates = DateRangeFilter::new(date(2024, 1, 1), date(2024, 1, 9));
        dates.enable_start(true);
        dates.enable_end(true);
        dates.set_start(date(2024, 1, 20));
        assert_eq!(dates.start(), date(2024, 1, 8));
        assert_eq!(dates.end(), date(2024, 1, 9));

        // Only one end enabled: no clamp.
        dates.enable_end(false);
        dates.set_start(date(2024, 1, 20));
        assert_eq!(dates.start(), date(2024, 1, 20));
    }

    #[test]
    fn test_enabling_both_reconciles() {
        let mut dates = DateRangeFilter::new(date(2024, 1, 10), date(2024, 1, 9));
        dates.enable_start(true);
        dates.enable_end(true);
        assert_eq!(dates.end(), date(2024, 1, 11));
        assert_eq!(dates.start_maximum(), Some(date(2024, 1, 10)));
    }

    #[test]
    fn test_initial_forms_use_wizard_presets() {
        let forms = Forms::initial(&Config::default());
        assert_eq!(forms.mapping.grid_size, "20000");
        assert_eq!(forms.mapping.voronoi_large, "30000");

        let forms = Forms::from_config(&Config::default());
        assert_eq!(forms.mapping.grid_size, "1000");
    }

    #[test]
    fn test_momentum_visible_only_for_sgd() {
        let mut form = ModelForm::from_config(&Config::default());
        assert!(!form.visible_training_fields().contains(&FieldId::Momentum));
        form.optimizer = Optimizer::Sgd;
        assert!(form.visible_training_fields().contains(&FieldId::Momentum));
    }

    #[test]
    fn test_scheduler_fields() {
        let mut form = ModelForm::from_config(&Config::default());
        let fields = form.visible_training_fields();
        assert!(fields.contains(&FieldId::StepDecay));
        assert!(!fields.contains(&FieldId::LrPatience));

        form.scheduler = Scheduler::None;
        let fields = form.visible_training_fields();
        assert!(!fields.contains(&FieldId::StepDecay));
        assert!(!fields.contains(&FieldId::LrPatience));
    }
}
