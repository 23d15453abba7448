//! Terminal front-end for the wizard session.
//!
//! The screen is a header with the two main tabs and the step tabs of the
//! active tab, a body showing the current step, and an action bar with the
//! Back / forward controls. All state lives in [`Session`]; this module only
//! turns key presses into session calls and draws what the session holds.
//!
//! # Keys
//!
//! - `Ctrl-N` forward (Next / Process / Map / Generate / Create Model / Train)
//! - `Ctrl-B` back, `Ctrl-T` switch main tab, `Ctrl-←/→` switch step
//! - `Ctrl-P` plot, `Ctrl-S` save the configuration
//! - `↑/↓` move between fields, `←/→` change a choice or date,
//!   `Space` toggle, `Enter` browse for a file
//! - Report viewers: `←/→` file, `PgUp/PgDn` page, `+/-/f` zoom, `o` open,
//!   `e` export

use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Terminal,
};

use super::file_selector::{run_file_selector, start_dir, FileSelectResult, SelectMode};
use crate::app::session::{GRAPH_DATA_EXTENSIONS, SHAPE_FILE_EXTENSIONS};
use crate::app::{Notice, NoticeLevel, Session};
use crate::config::{
    BinType, LogDestination, MappingKind, ModelFamily, Optimizer, PlotKind, Scheduler, TaskType,
};
use crate::pipeline::preview::SUPPORTED_DATA_EXTENSIONS;
use crate::pipeline::TaskKind;
use crate::viewer::{ExportFormat, PdfViewer, Zoom};
use crate::wizard::forms::cycle;
use crate::wizard::{
    DataStep, FieldId, Forms, MainTab, ParamInput, ParamRow, StepId, TrainingStep,
};

const TICK: Duration = Duration::from_millis(100);
const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const DEFAULT_CONFIG_FILE: &str = "stmgraph_config.json";
const LABEL_WIDTH: usize = 26;
const TASK_KINDS: [TaskKind; 6] = [
    TaskKind::Preprocess,
    TaskKind::Map,
    TaskKind::Generate,
    TaskKind::Plot,
    TaskKind::CreateModel,
    TaskKind::Train,
];

// ============================================================================
// Field model
// ============================================================================

/// Targets of the file selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Browse {
    DataFile,
    OutputDir,
    ShapeFile,
    GraphData,
    LogDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Text,
    /// Typed text that can also be picked with the file selector.
    Path(Browse),
    /// Only set through the file selector.
    Browse(Browse),
    Choice,
    Toggle,
    Date,
}

impl Input {
    fn is_text(&self) -> bool {
        matches!(self, Input::Text | Input::Path(_))
    }

    fn browse(&self) -> Option<Browse> {
        match self {
            Input::Path(b) | Input::Browse(b) => Some(*b),
            _ => None,
        }
    }
}

/// One line of a step form as drawn.
#[derive(Debug, Clone, PartialEq)]
struct FieldRow {
    id: FieldId,
    label: String,
    value: String,
    input: Input,
    enabled: bool,
    hint: Option<&'static str>,
}

impl FieldRow {
    fn new(id: FieldId, value: impl Into<String>, input: Input) -> Self {
        Self {
            id,
            label: field_label(id).to_string(),
            value: value.into(),
            input,
            enabled: true,
            hint: None,
        }
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn param(id: FieldId, row: &ParamRow) -> Self {
        let input = match row.input {
            ParamInput::Choice { .. } => Input::Choice,
            ParamInput::Text(_) => Input::Text,
        };
        Self {
            id,
            label: row.descriptor.name.to_string(),
            value: row.display().to_string(),
            input,
            enabled: true,
            hint: Some(row.descriptor.description),
        }
    }
}

fn field_label(id: FieldId) -> &'static str {
    match id {
        FieldId::DataFile => "Raw data file",
        FieldId::TimeColumn => "Time column",
        FieldId::LatColumn => "Latitude column",
        FieldId::LonColumn => "Longitude column",
        FieldId::InputCrs => "Input CRS",
        FieldId::MeterCrs => "Meter CRS",
        FieldId::TaskType => "Task type",
        FieldId::BinType => "Time bin",
        FieldId::UseTimeFeatures => "Use time features",
        FieldId::StartDateEnabled => "Filter start date",
        FieldId::StartDate => "  Start date",
        FieldId::EndDateEnabled => "Filter end date",
        FieldId::EndDate => "  End date",
        FieldId::Horizon => "Horizon",
        FieldId::WindowSize => "Window size",
        FieldId::IntervalStep => "Interval step",
        FieldId::TestMode => "Test mode (bounding box)",
        FieldId::MinLat => "  Min latitude",
        FieldId::MaxLat => "  Max latitude",
        FieldId::MinLon => "  Min longitude",
        FieldId::MaxLon => "  Max longitude",
        FieldId::UseKnowledgeGraph => "Use knowledge graph",
        FieldId::Osm(feature) => match feature {
            crate::config::OsmFeature::Poi => "  OSM points of interest",
            crate::config::OsmFeature::Road => "  OSM roads",
            crate::config::OsmFeature::Junction => "  OSM junctions",
        },
        FieldId::OutputDir => "Output folder",
        FieldId::MappingKind => "Mapping",
        FieldId::GridSize => "Cell size (m)",
        FieldId::ShapeFile => "Districts shape file",
        FieldId::VoronoiSmall => "Small cell size (m)",
        FieldId::VoronoiLarge => "Large cell size (m)",
        FieldId::PlotKind => "Plot type",
        FieldId::Plot(name) | FieldId::Model(name) => name,
        FieldId::ModelFamily => "Model",
        FieldId::GraphData => "Graph data file",
        FieldId::Optimizer => "Optimizer",
        FieldId::LearningRate => "Learning rate",
        FieldId::WeightDecay => "Weight decay",
        FieldId::Momentum => "Momentum",
        FieldId::Scheduler => "LR scheduler",
        FieldId::StepDecay => "LR step size",
        FieldId::DecayFactor => "LR decay factor",
        FieldId::LrPatience => "LR patience",
        FieldId::TestRatio => "Test ratio",
        FieldId::ValRatio => "Validation ratio",
        FieldId::Epochs => "Epochs",
        FieldId::BatchSize => "Batch size",
        FieldId::EarlyStopping => "Early stopping",
        FieldId::EsPatience => "  Patience",
        FieldId::LogDestination => "Log to",
        FieldId::LogDir => "Log folder",
        FieldId::ApiToken => "W&B API token",
        FieldId::ProjectId => "W&B project",
        FieldId::Experiment => "Experiment name",
    }
}

fn checkbox(on: bool) -> &'static str {
    if on {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Rows of the current step's form. Result steps have none.
fn field_rows(step: StepId, forms: &Forms) -> Vec<FieldRow> {
    match step {
        StepId::Data(DataStep::Load) => load_rows(forms),
        StepId::Data(DataStep::Configure) => configure_rows(forms),
        StepId::Data(DataStep::MappingConfig) => mapping_rows(forms),
        StepId::Data(DataStep::Plot) => plot_rows(forms),
        StepId::Training(TrainingStep::ModelParams) => model_rows(forms),
        StepId::Training(TrainingStep::Train) => log_rows(forms),
        StepId::Data(DataStep::PreprocessResult) | StepId::Data(DataStep::MappingResult) => {
            Vec::new()
        }
    }
}

fn load_rows(forms: &Forms) -> Vec<FieldRow> {
    let load = &forms.load;
    let data = load
        .data_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let has_columns = !load.columns.is_empty();
    let column = |id, choice| {
        let value = load.column_name(choice).unwrap_or("(select)");
        FieldRow::new(id, value, Input::Choice).enabled(has_columns)
    };
    vec![
        FieldRow::new(FieldId::DataFile, data, Input::Browse(Browse::DataFile)),
        column(FieldId::TimeColumn, load.time_column),
        column(FieldId::LatColumn, load.lat_column),
        column(FieldId::LonColumn, load.lon_column),
        FieldRow::new(FieldId::InputCrs, load.input_crs.clone(), Input::Text),
        FieldRow::new(FieldId::MeterCrs, load.meter_crs.clone(), Input::Text),
    ]
}

fn configure_rows(forms: &Forms) -> Vec<FieldRow> {
    let c = &forms.configure;
    let mut rows = vec![
        FieldRow::new(FieldId::TaskType, c.task_type.as_str(), Input::Choice),
        FieldRow::new(FieldId::BinType, c.bin_type.as_str(), Input::Choice),
        FieldRow::new(
            FieldId::UseTimeFeatures,
            checkbox(c.use_time_features),
            Input::Toggle,
        ),
        FieldRow::new(
            FieldId::StartDateEnabled,
            checkbox(c.dates.start_enabled()),
            Input::Toggle,
        ),
        FieldRow::new(
            FieldId::StartDate,
            c.dates.start().format("%d-%m-%Y").to_string(),
            Input::Date,
        )
        .enabled(c.dates.start_enabled()),
        FieldRow::new(
            FieldId::EndDateEnabled,
            checkbox(c.dates.end_enabled()),
            Input::Toggle,
        ),
        FieldRow::new(
            FieldId::EndDate,
            c.dates.end().format("%d-%m-%Y").to_string(),
            Input::Date,
        )
        .enabled(c.dates.end_enabled()),
        FieldRow::new(FieldId::Horizon, c.horizon.clone(), Input::Text),
        FieldRow::new(FieldId::WindowSize, c.window_size.clone(), Input::Text),
        FieldRow::new(FieldId::IntervalStep, c.interval_step.clone(), Input::Text),
        FieldRow::new(FieldId::TestMode, checkbox(c.test_mode), Input::Toggle),
    ];
    for (id, text) in [
        (FieldId::MinLat, &c.min_lat),
        (FieldId::MaxLat, &c.max_lat),
        (FieldId::MinLon, &c.min_lon),
        (FieldId::MaxLon, &c.max_lon),
    ] {
        rows.push(FieldRow::new(id, text.clone(), Input::Text).enabled(c.test_mode));
    }
    rows.push(FieldRow::new(
        FieldId::UseKnowledgeGraph,
        checkbox(c.use_knowledge_graph),
        Input::Toggle,
    ));
    for feature in crate::config::OsmFeature::ALL {
        rows.push(
            FieldRow::new(
                FieldId::Osm(feature),
                checkbox(c.osm.contains(&feature)),
                Input::Toggle,
            )
            .enabled(c.use_knowledge_graph),
        );
    }
    rows.push(FieldRow::new(
        FieldId::OutputDir,
        c.output_dir.clone(),
        Input::Path(Browse::OutputDir),
    ));
    rows
}

fn mapping_rows(forms: &Forms) -> Vec<FieldRow> {
    let m = &forms.mapping;
    let mut rows = vec![FieldRow::new(FieldId::MappingKind, m.kind.as_str(), Input::Choice)];
    for id in m.visible_fields() {
        let row = match id {
            FieldId::GridSize => FieldRow::new(id, m.grid_size.clone(), Input::Text),
            FieldId::ShapeFile => {
                FieldRow::new(id, m.shape_file.clone(), Input::Path(Browse::ShapeFile))
            }
            FieldId::VoronoiSmall => FieldRow::new(id, m.voronoi_small.clone(), Input::Text),
            FieldId::VoronoiLarge => FieldRow::new(id, m.voronoi_large.clone(), Input::Text),
            _ => continue,
        };
        rows.push(row);
    }
    rows
}

fn plot_rows(forms: &Forms) -> Vec<FieldRow> {
    let mut rows = vec![FieldRow::new(
        FieldId::PlotKind,
        forms.plot.kind.label(),
        Input::Choice,
    )];
    rows.extend(
        forms
            .plot
            .active()
            .rows
            .iter()
            .map(|row| FieldRow::param(FieldId::Plot(row.descriptor.name), row)),
    );
    rows
}

fn model_rows(forms: &Forms) -> Vec<FieldRow> {
    let m = &forms.model;
    let mut rows = vec![FieldRow::new(
        FieldId::ModelFamily,
        m.family.to_string(),
        Input::Choice,
    )];
    rows.extend(
        m.active()
            .rows
            .iter()
            .map(|row| FieldRow::param(FieldId::Model(row.descriptor.name), row)),
    );
    rows.push(FieldRow::new(
        FieldId::GraphData,
        m.graph_data_path.clone(),
        Input::Path(Browse::GraphData),
    ));
    for id in m.visible_training_fields() {
        let row = match id {
            FieldId::Optimizer => FieldRow::new(id, m.optimizer.as_str(), Input::Choice),
            FieldId::Scheduler => FieldRow::new(id, m.scheduler.as_str(), Input::Choice),
            FieldId::EarlyStopping => {
                FieldRow::new(id, checkbox(m.early_stopping), Input::Toggle)
            }
            _ => {
                let value = match id {
                    FieldId::LearningRate => &m.learning_rate,
                    FieldId::WeightDecay => &m.weight_decay,
                    FieldId::Momentum => &m.momentum,
                    FieldId::StepDecay => &m.lr_step_decay,
                    FieldId::DecayFactor => &m.lr_decay_factor,
                    FieldId::LrPatience => &m.lr_patience,
                    FieldId::TestRatio => &m.test_ratio,
                    FieldId::ValRatio => &m.val_ratio,
                    FieldId::Epochs => &m.num_epochs,
                    FieldId::BatchSize => &m.batch_size,
                    FieldId::EsPatience => &m.es_patience,
                    _ => continue,
                };
                FieldRow::new(id, value.clone(), Input::Text)
            }
        };
        rows.push(row);
    }
    rows
}

fn log_rows(forms: &Forms) -> Vec<FieldRow> {
    let l = &forms.logging;
    let masked: String = "•".repeat(l.api_token.chars().count());
    vec![
        FieldRow::new(FieldId::LogDestination, l.destination.as_str(), Input::Choice),
        FieldRow::new(FieldId::LogDir, l.log_dir.clone(), Input::Path(Browse::LogDir))
            .enabled(l.is_enabled(FieldId::LogDir)),
        FieldRow::new(FieldId::ApiToken, masked, Input::Text)
            .enabled(l.is_enabled(FieldId::ApiToken)),
        FieldRow::new(FieldId::ProjectId, l.project_id.clone(), Input::Text)
            .enabled(l.is_enabled(FieldId::ProjectId)),
        FieldRow::new(FieldId::Experiment, l.experiment.clone(), Input::Text)
            .enabled(l.is_enabled(FieldId::Experiment)),
    ]
}

// ============================================================================
// Form edits
// ============================================================================

fn text_slot(forms: &mut Forms, id: FieldId) -> Option<&mut String> {
    Some(match id {
        FieldId::InputCrs => &mut forms.load.input_crs,
        FieldId::MeterCrs => &mut forms.load.meter_crs,
        FieldId::Horizon => &mut forms.configure.horizon,
        FieldId::WindowSize => &mut forms.configure.window_size,
        FieldId::IntervalStep => &mut forms.configure.interval_step,
        FieldId::MinLat => &mut forms.configure.min_lat,
        FieldId::MaxLat => &mut forms.configure.max_lat,
        FieldId::MinLon => &mut forms.configure.min_lon,
        FieldId::MaxLon => &mut forms.configure.max_lon,
        FieldId::OutputDir => &mut forms.configure.output_dir,
        FieldId::GridSize => &mut forms.mapping.grid_size,
        FieldId::ShapeFile => &mut forms.mapping.shape_file,
        FieldId::VoronoiSmall => &mut forms.mapping.voronoi_small,
        FieldId::VoronoiLarge => &mut forms.mapping.voronoi_large,
        FieldId::Plot(name) => return forms.plot.active_mut().text_mut(name),
        FieldId::LogDir => &mut forms.logging.log_dir,
        FieldId::ApiToken => &mut forms.logging.api_token,
        FieldId::ProjectId => &mut forms.logging.project_id,
        FieldId::Experiment => &mut forms.logging.experiment,
        other => return forms.model.text_mut(other),
    })
}

fn step_choice<T: Copy + PartialEq>(all: &[T], current: T, delta: isize) -> T {
    let index = all.iter().position(|v| *v == current).unwrap_or(0);
    all[cycle(index, all.len(), delta)]
}

fn cycle_choice(forms: &mut Forms, id: FieldId, delta: isize) {
    match id {
        FieldId::TimeColumn | FieldId::LatColumn | FieldId::LonColumn => {
            forms.load.cycle_column(id, delta)
        }
        FieldId::TaskType => {
            forms.configure.task_type = step_choice(&TaskType::ALL, forms.configure.task_type, delta)
        }
        FieldId::BinType => {
            forms.configure.bin_type = step_choice(&BinType::ALL, forms.configure.bin_type, delta)
        }
        FieldId::MappingKind => {
            forms.mapping.kind = step_choice(&MappingKind::ALL, forms.mapping.kind, delta)
        }
        FieldId::PlotKind => forms.plot.kind = step_choice(&PlotKind::ALL, forms.plot.kind, delta),
        FieldId::ModelFamily => {
            forms.model.family = step_choice(&ModelFamily::ALL, forms.model.family, delta)
        }
        FieldId::Optimizer => {
            forms.model.optimizer = step_choice(&Optimizer::ALL, forms.model.optimizer, delta)
        }
        FieldId::Scheduler => {
            forms.model.scheduler = step_choice(&Scheduler::ALL, forms.model.scheduler, delta)
        }
        FieldId::LogDestination => {
            forms.logging.destination =
                step_choice(&LogDestination::ALL, forms.logging.destination, delta)
        }
        FieldId::Plot(name) => {
            forms.plot.active_mut().cycle_choice(name, delta);
        }
        FieldId::Model(name) => {
            if let Some(form) = forms.model.active_mut() {
                form.cycle_choice(name, delta);
            }
        }
        _ => {}
    }
}

fn toggle(forms: &mut Forms, id: FieldId) {
    let c = &mut forms.configure;
    match id {
        FieldId::UseTimeFeatures => c.use_time_features = !c.use_time_features,
        FieldId::StartDateEnabled => {
            let on = !c.dates.start_enabled();
            c.dates.enable_start(on);
        }
        FieldId::EndDateEnabled => {
            let on = !c.dates.end_enabled();
            c.dates.enable_end(on);
        }
        FieldId::TestMode => c.test_mode = !c.test_mode,
        FieldId::UseKnowledgeGraph => c.use_knowledge_graph = !c.use_knowledge_graph,
        FieldId::Osm(feature) => c.toggle_osm(feature),
        FieldId::EarlyStopping => forms.model.early_stopping = !forms.model.early_stopping,
        _ => {}
    }
}

fn shift_date(forms: &mut Forms, id: FieldId, days: i64) {
    match id {
        FieldId::StartDate => forms.configure.dates.shift_start(days),
        FieldId::EndDate => forms.configure.dates.shift_end(days),
        _ => {}
    }
}

// ============================================================================
// UI state
// ============================================================================

struct ExportPrompt {
    path: String,
    format: usize,
}

struct WizardUi {
    focus: usize,
    /// On the plot step, keys go to the viewer instead of the form.
    viewer_focus: bool,
    quit_confirm: bool,
    export: Option<ExportPrompt>,
    save: Option<String>,
    config_path: PathBuf,
    spinner: usize,
    needs_clear: bool,
    last_step: StepId,
}

impl WizardUi {
    fn new(session: &Session, config_path: Option<PathBuf>) -> Self {
        Self {
            focus: 0,
            viewer_focus: false,
            quit_confirm: false,
            export: None,
            save: None,
            config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            spinner: 0,
            needs_clear: false,
            last_step: session.cursor().current(),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

// ============================================================================
// Terminal Setup
// ============================================================================

/// Setup terminal for TUI rendering with panic-safe cleanup.
///
/// Worker threads (`stmgraph-*`) report panics through their task result, so
/// the hook only restores the terminal for panics on the UI thread.
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let on_worker = std::thread::current()
            .name()
            .is_some_and(|name| name.starts_with("stmgraph-"));
        if on_worker {
            tracing::error!("Worker panicked: {panic_info}");
            return;
        }
        teardown_terminal();
        original_hook(panic_info);
    }));

    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state
pub fn teardown_terminal() {
    let _ = disable_raw_mode();
    let _ = stdout().execute(LeaveAlternateScreen);
}

// ============================================================================
// Entry Point
// ============================================================================

/// Run the wizard until the user quits.
///
/// `config_path` is the default target of the save prompt.
pub fn run_wizard(session: &mut Session, config_path: Option<PathBuf>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut ui = WizardUi::new(session, config_path);
    let result = run_wizard_loop(&mut terminal, session, &mut ui);
    teardown_terminal();
    result
}

fn run_wizard_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session: &mut Session,
    ui: &mut WizardUi,
) -> Result<()> {
    loop {
        session.tick();

        if ui.needs_clear {
            terminal.clear()?;
            ui.needs_clear = false;
        }

        let step = session.cursor().current();
        if step != ui.last_step {
            ui.focus = 0;
            ui.viewer_focus = false;
            ui.last_step = step;
        }
        let rows = field_rows(step, session.forms());
        ui.focus = ui.focus.min(rows.len().saturating_sub(1));

        terminal.draw(|f| render_wizard(f, session, ui, &rows))?;
        ui.spinner = ui.spinner.wrapping_add(1);

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Flow::Quit = handle_key(terminal, session, ui, key, &rows)? {
                    return Ok(());
                }
            }
        }
    }
}

// ============================================================================
// Event handling
// ============================================================================

fn handle_key<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    ui: &mut WizardUi,
    key: KeyEvent,
    rows: &[FieldRow],
) -> Result<Flow> {
    if ui.quit_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(Flow::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ui.quit_confirm = false,
            _ => {}
        }
        return Ok(Flow::Continue);
    }

    if session.failure().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            session.dismiss_failure();
        }
        return Ok(Flow::Continue);
    }
    if session.notice().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            session.dismiss_notice();
        }
        return Ok(Flow::Continue);
    }
    if ui.export.is_some() {
        handle_export_key(session, ui, key);
        return Ok(Flow::Continue);
    }
    if ui.save.is_some() {
        handle_save_key(session, ui, key);
        return Ok(Flow::Continue);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('q')) {
        ui.quit_confirm = true;
        return Ok(Flow::Continue);
    }
    if ctrl {
        handle_navigation(session, ui, key.code);
        return Ok(Flow::Continue);
    }

    let step = session.cursor().current();
    if step == StepId::Data(DataStep::Plot) && matches!(key.code, KeyCode::Tab) {
        ui.viewer_focus = !ui.viewer_focus;
        return Ok(Flow::Continue);
    }
    let on_plot = step == StepId::Data(DataStep::Plot);
    if (step.is_result_view() && !on_plot) || (on_plot && ui.viewer_focus) {
        handle_viewer_key(session, ui, key.code);
        return Ok(Flow::Continue);
    }

    handle_form_key(terminal, session, ui, key.code, rows)?;
    Ok(Flow::Continue)
}

fn handle_navigation(session: &mut Session, ui: &mut WizardUi, code: KeyCode) {
    match code {
        KeyCode::Char('n') => {
            session.next();
        }
        KeyCode::Char('b') => {
            session.back();
        }
        KeyCode::Char('t') => {
            let target = match session.cursor().main() {
                MainTab::Data => MainTab::Training,
                MainTab::Training => MainTab::Data,
            };
            session.select_main(target);
        }
        KeyCode::Left | KeyCode::Right => {
            let current = match session.cursor().current() {
                StepId::Data(step) => step.index(),
                StepId::Training(step) => step.index(),
            };
            let target = if code == KeyCode::Left {
                current.checked_sub(1)
            } else {
                Some(current + 1)
            };
            if let Some(index) = target {
                session.select_step(index);
            }
        }
        KeyCode::Char('p') => {
            session.plot();
        }
        KeyCode::Char('s') => {
            ui.save = Some(ui.config_path.display().to_string());
        }
        _ => {}
    }
}

fn handle_form_key<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    ui: &mut WizardUi,
    code: KeyCode,
    rows: &[FieldRow],
) -> Result<()> {
    match code {
        KeyCode::Up | KeyCode::BackTab => {
            ui.focus = ui.focus.saturating_sub(1);
            return Ok(());
        }
        KeyCode::Down | KeyCode::Tab => {
            if ui.focus + 1 < rows.len() {
                ui.focus += 1;
            }
            return Ok(());
        }
        _ => {}
    }

    let Some(row) = rows.get(ui.focus) else {
        return Ok(());
    };
    if !row.enabled {
        return Ok(());
    }
    let id = row.id;

    match (row.input, code) {
        (Input::Choice, KeyCode::Left) => session.edit(|forms| cycle_choice(forms, id, -1)),
        (Input::Choice, KeyCode::Right) | (Input::Choice, KeyCode::Char(' ')) => {
            session.edit(|forms| cycle_choice(forms, id, 1))
        }
        (Input::Toggle, KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Left | KeyCode::Right) => {
            session.edit(|forms| toggle(forms, id))
        }
        (Input::Date, KeyCode::Left) => session.edit(|forms| shift_date(forms, id, -1)),
        (Input::Date, KeyCode::Right) => session.edit(|forms| shift_date(forms, id, 1)),
        (Input::Date, KeyCode::PageUp) => session.edit(|forms| shift_date(forms, id, -30)),
        (Input::Date, KeyCode::PageDown) => session.edit(|forms| shift_date(forms, id, 30)),
        (input, KeyCode::Enter) => {
            if let Some(target) = input.browse() {
                browse(terminal, session, target)?;
                ui.needs_clear = true;
            }
        }
        (input, KeyCode::Char(c)) if input.is_text() => session.edit(|forms| {
            if let Some(text) = text_slot(forms, id) {
                text.push(c);
            }
        }),
        (input, KeyCode::Backspace) if input.is_text() => session.edit(|forms| {
            if let Some(text) = text_slot(forms, id) {
                text.pop();
            }
        }),
        _ => {}
    }
    Ok(())
}

fn browse<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    target: Browse,
) -> Result<()> {
    let forms = session.forms();
    let text_hint = |text: &str| (!text.is_empty()).then(|| PathBuf::from(text));
    let (title, mode, hint) = match target {
        Browse::DataFile => (
            "Select raw data file",
            SelectMode::File(SUPPORTED_DATA_EXTENSIONS),
            forms.load.data_path.clone(),
        ),
        Browse::OutputDir => (
            "Select output folder",
            SelectMode::Directory,
            text_hint(&forms.configure.output_dir),
        ),
        Browse::ShapeFile => (
            "Select districts shape file",
            SelectMode::File(SHAPE_FILE_EXTENSIONS),
            text_hint(&forms.mapping.shape_file),
        ),
        Browse::GraphData => (
            "Select graph data file",
            SelectMode::File(GRAPH_DATA_EXTENSIONS),
            text_hint(&forms.model.graph_data_path),
        ),
        Browse::LogDir => (
            "Select log folder",
            SelectMode::Directory,
            text_hint(&forms.logging.log_dir),
        ),
    };

    let selected = match run_file_selector(terminal, title, mode, start_dir(hint.as_deref()))? {
        FileSelectResult::Selected(path) => path,
        FileSelectResult::Cancelled => return Ok(()),
    };
    match target {
        Browse::DataFile => {
            session.select_data_file(&selected);
        }
        Browse::OutputDir => session.select_output_dir(&selected),
        Browse::ShapeFile => {
            session.select_shape_file(&selected);
        }
        Browse::GraphData => {
            session.select_graph_data(&selected);
        }
        Browse::LogDir => session.select_log_dir(&selected),
    }
    Ok(())
}

fn handle_viewer_key(session: &mut Session, ui: &mut WizardUi, code: KeyCode) {
    let step = session.cursor().current();
    let Some(viewer) = session.viewer_mut(step) else {
        return;
    };
    let outcome = match code {
        KeyCode::Left => viewer.prev_file().map(|_| ()),
        KeyCode::Right => viewer.next_file().map(|_| ()),
        KeyCode::PageUp | KeyCode::Up => {
            viewer.prev_page();
            Ok(())
        }
        KeyCode::PageDown | KeyCode::Down => {
            viewer.next_page();
            Ok(())
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            viewer.zoom_in();
            Ok(())
        }
        KeyCode::Char('-') => {
            viewer.zoom_out();
            Ok(())
        }
        KeyCode::Char('f') => {
            viewer.zoom_fit();
            Ok(())
        }
        KeyCode::Char('o') => viewer.open_external(),
        KeyCode::Char('e') => {
            if viewer.document().is_some() {
                let path = viewer
                    .default_export_path()
                    .map(|p| p.with_extension(ExportFormat::Png.extension()))
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                ui.export = Some(ExportPrompt { path, format: 0 });
            }
            Ok(())
        }
        _ => Ok(()),
    };
    if let Err(e) = outcome {
        session.notify(Notice::warning("Error", e.to_string()));
    }
}

fn handle_export_key(session: &mut Session, ui: &mut WizardUi, key: KeyEvent) {
    let Some(prompt) = ui.export.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => ui.export = None,
        KeyCode::Left => prompt.format = cycle(prompt.format, ExportFormat::ALL.len(), -1),
        KeyCode::Right | KeyCode::Tab => {
            prompt.format = cycle(prompt.format, ExportFormat::ALL.len(), 1)
        }
        KeyCode::Backspace => {
            prompt.path.pop();
        }
        KeyCode::Char(c) => prompt.path.push(c),
        KeyCode::Enter => {
            let path = PathBuf::from(prompt.path.trim());
            let format = ExportFormat::ALL[prompt.format];
            ui.export = None;
            let step = session.cursor().current();
            let outcome = match session.viewer(step) {
                Some(viewer) => viewer.save_as(&path, Some(format), session.rasterizer()),
                None => return,
            };
            match outcome {
                Ok(saved) => session.notify(Notice::info(format!("Saved to {}", saved.display()))),
                Err(e) => session.notify(Notice::warning("Error", e.to_string())),
            }
        }
        _ => {}
    }
}

fn handle_save_key(session: &mut Session, ui: &mut WizardUi, key: KeyEvent) {
    let Some(text) = ui.save.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => ui.save = None,
        KeyCode::Backspace => {
            text.pop();
        }
        KeyCode::Char(c) => text.push(c),
        KeyCode::Enter => {
            let path = PathBuf::from(text.trim());
            ui.save = None;
            match session.save_config(&path) {
                Ok(()) => {
                    session.notify(Notice::info(format!(
                        "Configuration saved to {}",
                        path.display()
                    )));
                    ui.config_path = path;
                }
                Err(e) => session.notify(Notice::error("Save failed", format!("{e:#}"))),
            }
        }
        _ => {}
    }
}

// ============================================================================
// Rendering Helpers
// ============================================================================

/// Create a centered rectangle with fixed dimensions
fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn step_color(step: StepId) -> Color {
    match step {
        StepId::Data(DataStep::Load) | StepId::Data(DataStep::Configure) => Color::Cyan,
        StepId::Data(DataStep::PreprocessResult) | StepId::Data(DataStep::MappingResult) => {
            Color::Green
        }
        StepId::Data(DataStep::MappingConfig) => Color::Yellow,
        StepId::Data(DataStep::Plot) => Color::Magenta,
        StepId::Training(_) => Color::Blue,
    }
}

fn titled_block(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {title} "))
        .title_style(Style::default().fg(color).bold())
        .title_alignment(Alignment::Center)
}

fn key_span(key: &str, enabled: bool) -> Span<'static> {
    let color = if enabled { Color::Cyan } else { Color::DarkGray };
    Span::styled(key.to_string(), Style::default().fg(color))
}

fn desc_span(text: &str) -> Span<'static> {
    Span::styled(format!(" {text}  "), Style::default().fg(Color::DarkGray))
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

// ============================================================================
// Render
// ============================================================================

fn render_wizard(f: &mut Frame, session: &Session, ui: &WizardUi, rows: &[FieldRow]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_main_tabs(f, chunks[0], session);
    render_step_tabs(f, chunks[1], session);
    render_body(f, chunks[2], session, ui, rows);
    render_action_bar(f, chunks[3], session, ui);

    if let Some(failure) = session.failure() {
        render_message_overlay(
            f,
            &format!("{} failed", failure.kind),
            &failure.message,
            Color::Red,
        );
    } else if let Some(notice) = session.notice() {
        let color = match notice.level {
            NoticeLevel::Info => Color::Cyan,
            NoticeLevel::Warning => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        render_message_overlay(f, &notice.title, &notice.message, color);
    } else if let Some(prompt) = &ui.export {
        render_export_overlay(f, prompt);
    } else if let Some(path) = &ui.save {
        render_prompt_overlay(f, "Save Configuration", "File", path);
    }
    if ui.quit_confirm {
        render_quit_confirm_overlay(f);
    }
}

fn render_main_tabs(f: &mut Frame, area: Rect, session: &Session) {
    let cursor = session.cursor();
    let mut spans = vec![Span::styled(
        " STM-Graph ",
        Style::default().fg(Color::Black).bg(Color::Cyan).bold(),
    )];
    for tab in [MainTab::Data, MainTab::Training] {
        let style = if cursor.main() == tab {
            Style::default().fg(Color::Cyan).bold().underlined()
        } else if cursor.is_main_enabled(tab) && session.tabs_enabled() {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(tab.title(), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_step_tabs(f: &mut Frame, area: Rect, session: &Session) {
    let cursor = session.cursor();
    let current = cursor.current();
    let steps: Vec<StepId> = match cursor.main() {
        MainTab::Data => DataStep::ALL.iter().map(|s| StepId::Data(*s)).collect(),
        MainTab::Training => TrainingStep::ALL
            .iter()
            .map(|s| StepId::Training(*s))
            .collect(),
    };
    let mut spans = Vec::new();
    for (i, step) in steps.into_iter().enumerate() {
        let style = if step == current {
            Style::default().fg(step_color(step)).bold()
        } else if cursor.is_step_enabled(step) && session.tabs_enabled() {
            Style::default().fg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if i > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(format!("{} {}", i + 1, step.title()), style));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

fn render_body(f: &mut Frame, area: Rect, session: &Session, ui: &WizardUi, rows: &[FieldRow]) {
    let step = session.cursor().current();
    let color = step_color(step);
    match step {
        StepId::Data(DataStep::Load) => {
            let [left, right] = split_columns(area, 42);
            render_fields(f, left, session, ui, rows, step.title(), color, true);
            render_preview(f, right, session);
        }
        StepId::Data(DataStep::Configure)
        | StepId::Data(DataStep::MappingConfig)
        | StepId::Training(TrainingStep::ModelParams) => {
            render_fields(f, area, session, ui, rows, step.title(), color, true);
        }
        StepId::Data(DataStep::PreprocessResult) | StepId::Data(DataStep::MappingResult) => {
            let [left, right] = split_columns(area, 34);
            render_result_summary(f, left, session, step);
            if let Some(viewer) = session.viewer(step) {
                render_viewer(f, right, viewer, true);
            }
        }
        StepId::Data(DataStep::Plot) => {
            let [left, right] = split_columns(area, 42);
            render_fields(
                f,
                left,
                session,
                ui,
                rows,
                step.title(),
                color,
                !ui.viewer_focus,
            );
            if let Some(viewer) = session.viewer(step) {
                render_viewer(f, right, viewer, ui.viewer_focus);
            }
        }
        StepId::Training(TrainingStep::Train) => {
            let [left, right] = split_columns(area, 40);
            render_fields(f, left, session, ui, rows, step.title(), color, true);
            render_training_output(f, right, session);
        }
    }
}

fn split_columns(area: Rect, left_percent: u16) -> [Rect; 2] {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(left_percent),
            Constraint::Percentage(100 - left_percent),
        ])
        .split(area);
    [chunks[0], chunks[1]]
}

#[allow(clippy::too_many_arguments)]
fn render_fields(
    f: &mut Frame,
    area: Rect,
    session: &Session,
    ui: &WizardUi,
    rows: &[FieldRow],
    title: &str,
    color: Color,
    active: bool,
) {
    let block = titled_block(title, if active { color } else { Color::DarkGray });
    let inner = block.inner(area);
    f.render_widget(block, area);

    let hint_height = 2;
    let list_height = inner.height.saturating_sub(hint_height) as usize;
    let offset = if list_height == 0 {
        0
    } else {
        (ui.focus + 1).saturating_sub(list_height)
    };

    let mut lines = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate().skip(offset).take(list_height) {
        let focused = active && i == ui.focus;
        let marked = session.is_marked(row.id);
        let label_style = if !row.enabled {
            Style::default().fg(Color::DarkGray)
        } else if marked {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut value = row.value.clone();
        if focused && row.input.is_text() {
            value.push('▌');
        }
        let value = match row.input {
            Input::Choice | Input::Date => format!("‹ {value} ›"),
            _ => value,
        };
        let value_style = if focused {
            Style::default().fg(Color::Black).bg(color)
        } else if !row.enabled {
            Style::default().fg(Color::DarkGray)
        } else if marked {
            Style::default().fg(Color::Red).bold()
        } else {
            Style::default().fg(Color::White)
        };
        let marker = if focused { "› " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(color)),
            Span::styled(format!("{:<LABEL_WIDTH$}", row.label), label_style),
            Span::styled(value, value_style),
            Span::styled(if marked { "  ✗" } else { "" }, Style::default().fg(Color::Red)),
        ]));
    }
    if rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "  Nothing to configure here.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(hint_height)])
        .split(inner);
    f.render_widget(Paragraph::new(lines), chunks[0]);

    let hint = rows
        .get(ui.focus)
        .filter(|_| active)
        .map(|row| match (row.hint, row.input) {
            (Some(hint), _) => hint.to_string(),
            (None, Input::Browse(_)) | (None, Input::Path(_)) => "Enter to browse".to_string(),
            (None, Input::Choice) => "←/→ to change".to_string(),
            (None, Input::Date) => "←/→ day, PgUp/PgDn 30 days".to_string(),
            (None, Input::Toggle) => "Space to toggle".to_string(),
            (None, Input::Text) => String::new(),
        })
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray).italic()))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn render_preview(f: &mut Frame, area: Rect, session: &Session) {
    let block = titled_block("Preview", Color::DarkGray);
    let Some(preview) = &session.forms().load.preview else {
        let paragraph = Paragraph::new(Span::styled(
            "  Select a CSV or Parquet file to preview its first rows.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let header = Row::new(
        preview
            .columns
            .iter()
            .map(|c| Cell::from(c.as_str()).style(Style::default().fg(Color::Cyan).bold())),
    );
    let rows = preview
        .rows
        .iter()
        .map(|r| Row::new(r.iter().map(|v| Cell::from(v.as_str()))));
    let widths = vec![Constraint::Min(10); preview.columns.len().max(1)];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(block.title_bottom(format!(
            " {} columns, {} rows scanned ",
            preview.columns.len(),
            preview.scanned_rows
        )));
    f.render_widget(table, area);
}

fn render_result_summary(f: &mut Frame, area: Rect, session: &Session, step: StepId) {
    let results = session.results();
    let stat = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("  {label:<18}"), Style::default().fg(Color::DarkGray)),
            Span::styled(value, Style::default().fg(Color::White)),
        ])
    };
    let mut lines = vec![Line::from("")];
    match step {
        StepId::Data(DataStep::PreprocessResult) => {
            if let Some(processed) = &results.processed {
                lines.push(stat("Records", processed.rows.to_string()));
                lines.push(stat("Columns", processed.columns.to_string()));
                if let Some((start, end)) = &processed.time_range {
                    lines.push(stat("From", start.clone()));
                    lines.push(stat("To", end.clone()));
                }
            }
        }
        _ => {
            if let Some(mapping) = &results.mapping {
                if let Some(mapper) = session.mapper() {
                    lines.push(stat("Strategy", mapper.label().to_string()));
                }
                lines.push(stat("Regions", mapping.regions.to_string()));
                lines.push(stat("Points", mapping.points_total.to_string()));
                lines.push(stat("Mapped points", mapping.points_valid.to_string()));
            }
        }
    }
    let paragraph = Paragraph::new(lines).block(titled_block(step.title(), Color::Green));
    f.render_widget(paragraph, area);
}

fn render_viewer(f: &mut Frame, area: Rect, viewer: &PdfViewer, focused: bool) {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = titled_block("Reports", color);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    match viewer.document() {
        Some(doc) => {
            let (w, h) = doc.page_size(viewer.page());
            let zoom = match viewer.zoom() {
                Zoom::FitWidth => "fit width".to_string(),
                Zoom::Custom(factor) => format!("{:.0}%", factor * 100.0),
            };
            lines.push(Line::from(Span::styled(
                doc.file_name(),
                Style::default().fg(Color::White).bold(),
            )));
            lines.push(Line::from(vec![
                Span::styled("File ", dim),
                Span::raw(format!("{}/{}", viewer.current_index() + 1, viewer.files().len())),
                Span::styled("   Page ", dim),
                Span::raw(format!("{}/{}", viewer.page() + 1, doc.page_count)),
                Span::styled("   Zoom ", dim),
                Span::raw(zoom),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Page size ", dim),
                Span::raw(format!("{w:.0} × {h:.0} pt")),
                Span::styled("   File size ", dim),
                Span::raw(human_size(doc.file_size)),
            ]));
        }
        None if viewer.is_loading() => {
            lines.push(Line::from(Span::styled(
                "Loading…",
                Style::default().fg(Color::Yellow),
            )));
        }
        None => lines.push(Line::from(Span::styled("No report loaded.", dim))),
    }
    if viewer.is_loading() && viewer.document().is_some() {
        lines.push(Line::from(Span::styled(
            "Loading…",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));
    for (i, path) in viewer.files().iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let style = if i == viewer.current_index() {
            Style::default().fg(Color::Cyan)
        } else {
            dim
        };
        let marker = if i == viewer.current_index() { "● " } else { "  " };
        lines.push(Line::from(Span::styled(format!("{marker}{name}"), style)));
    }
    if focused && viewer.document().is_some() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            key_span("←/→", true),
            desc_span("file"),
            key_span("PgUp/PgDn", true),
            desc_span("page"),
            key_span("+/-/f", true),
            desc_span("zoom"),
            key_span("o", true),
            desc_span("open"),
            key_span("e", true),
            desc_span("export"),
        ]));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn render_training_output(f: &mut Frame, area: Rect, session: &Session) {
    let results = session.results();
    let metrics = results
        .training
        .as_ref()
        .map(|report| report.metrics())
        .unwrap_or_default();
    let metrics_height = if metrics.is_empty() {
        0
    } else {
        metrics.len() as u16 + 2
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(metrics_height)])
        .split(area);

    let block = titled_block("Training log", Color::Blue);
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let log = session.log_lines();
    let start = log.len().saturating_sub(visible);
    let mut lines: Vec<Line> = log[start..]
        .iter()
        .map(|l| Line::from(Span::raw(l.as_str())))
        .collect();
    if lines.is_empty() {
        let text = match &results.model {
            Some(created) => format!("  Model {} ready. Press Ctrl-N to train.", created.params.family()),
            None => "  Create a model first.".to_string(),
        };
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(Paragraph::new(lines).block(block), chunks[0]);

    if !metrics.is_empty() {
        let rows = metrics.iter().map(|(name, value)| {
            Row::new(vec![
                Cell::from(name.as_str()).style(Style::default().fg(Color::Gray)),
                Cell::from(format!("{value:.4}")).style(Style::default().fg(Color::Green)),
            ])
        });
        let table = Table::new(rows, [Constraint::Percentage(60), Constraint::Percentage(40)])
            .block(titled_block("Test metrics", Color::Green));
        f.render_widget(table, chunks[1]);
    }
}

fn render_action_bar(f: &mut Frame, area: Rect, session: &Session, ui: &WizardUi) {
    let step = session.cursor().current();
    let mut spans = Vec::new();

    if let Some(kind) = TASK_KINDS.iter().find(|k| session.running(**k)) {
        spans.push(Span::styled(
            format!("{} {}…  ", SPINNER[ui.spinner % SPINNER.len()], kind.label()),
            Style::default().fg(Color::Yellow),
        ));
    }

    spans.push(key_span("Ctrl-B", session.back_enabled()));
    spans.push(desc_span("Back"));
    spans.push(key_span("Ctrl-N", session.forward_enabled()));
    spans.push(desc_span(session.cursor().forward_label()));
    if step == StepId::Data(DataStep::Plot) {
        spans.push(key_span("Ctrl-P", session.plot_enabled()));
        spans.push(desc_span("Plot"));
        spans.push(key_span("Tab", true));
        spans.push(desc_span(if ui.viewer_focus { "form" } else { "viewer" }));
    }
    spans.push(key_span("Ctrl-T", session.tabs_enabled()));
    spans.push(desc_span("tab"));
    spans.push(key_span("Ctrl-S", true));
    spans.push(desc_span("save"));
    spans.push(key_span("Esc", true));
    spans.push(desc_span("quit"));

    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

// ============================================================================
// Overlays
// ============================================================================

fn render_message_overlay(f: &mut Frame, title: &str, message: &str, color: Color) {
    let width = 64u16;
    let text_lines = message
        .lines()
        .map(|l| (l.chars().count() as u16 / (width - 4)) + 1)
        .sum::<u16>();
    let popup = centered_fixed_rect(width, text_lines + 5, f.area());
    f.render_widget(Clear, popup);

    let block = titled_block(title, color).style(Style::default().bg(Color::Black));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let mut content: Vec<Line> = message
        .lines()
        .map(|l| Line::from(Span::styled(format!(" {l}"), Style::default().fg(Color::White))))
        .collect();
    content.push(Line::from(""));
    content.push(
        Line::from(vec![key_span("Enter", true), desc_span("dismiss")]).alignment(Alignment::Center),
    );
    f.render_widget(Paragraph::new(content).wrap(Wrap { trim: false }), inner);
}

fn render_prompt_overlay(f: &mut Frame, title: &str, label: &str, value: &str) {
    let popup = centered_fixed_rect(70, 7, f.area());
    f.render_widget(Clear, popup);
    let block = titled_block(title, Color::Cyan).style(Style::default().bg(Color::Black));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(format!(" {label}: "), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{value}▌"), Style::default().fg(Color::White)),
        ]),
        Line::from(""),
        Line::from(vec![
            key_span("Enter", true),
            desc_span("save"),
            key_span("Esc", true),
            desc_span("cancel"),
        ])
        .alignment(Alignment::Center),
    ];
    f.render_widget(Paragraph::new(content), inner);
}

fn render_export_overlay(f: &mut Frame, prompt: &ExportPrompt) {
    let popup = centered_fixed_rect(70, 9, f.area());
    f.render_widget(Clear, popup);
    let block = titled_block("Save Figure", Color::Cyan).style(Style::default().bg(Color::Black));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let mut formats = vec![Span::styled(" Format: ", Style::default().fg(Color::DarkGray))];
    for (i, format) in ExportFormat::ALL.iter().enumerate() {
        let style = if i == prompt.format {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        formats.push(Span::styled(format!(" {} ", format.filter_label()), style));
        formats.push(Span::raw(" "));
    }
    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(" File: ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{}▌", prompt.path), Style::default().fg(Color::White)),
        ]),
        Line::from(""),
        Line::from(formats),
        Line::from(""),
        Line::from(vec![
            key_span("←/→", true),
            desc_span("format"),
            key_span("Enter", true),
            desc_span("save"),
            key_span("Esc", true),
            desc_span("cancel"),
        ])
        .alignment(Alignment::Center),
    ];
    f.render_widget(Paragraph::new(content), inner);
}

/// Render quit confirmation overlay
fn render_quit_confirm_overlay(f: &mut Frame) {
    let popup = centered_fixed_rect(40, 8, f.area());
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Quit Wizard? ")
        .title_style(Style::default().fg(Color::Red).bold())
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Are you sure you want to quit?",
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("      ", Style::default()),
            Span::styled("Y", Style::default().fg(Color::Cyan)),
            Span::styled(" yes  ", Style::default().fg(Color::DarkGray)),
            Span::styled("N", Style::default().fg(Color::Cyan)),
            Span::styled(" no", Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let paragraph = Paragraph::new(content);
    f.render_widget(paragraph, inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, OsmFeature};
    use ratatui::backend::TestBackend;

    fn forms() -> Forms {
        Forms::initial(&Config::default())
    }

    fn ids(rows: &[FieldRow]) -> Vec<FieldId> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_bounds_rows_follow_test_mode() {
        let mut forms = forms();
        forms.configure.test_mode = false;
        let rows = field_rows(StepId::Data(DataStep::Configure), &forms);
        let min_lat = rows.iter().find(|r| r.id == FieldId::MinLat).unwrap();
        assert!(!min_lat.enabled);

        toggle(&mut forms, FieldId::TestMode);
        let rows = field_rows(StepId::Data(DataStep::Configure), &forms);
        let min_lat = rows.iter().find(|r| r.id == FieldId::MinLat).unwrap();
        assert!(min_lat.enabled);
    }

    #[test]
    fn test_mapping_rows_follow_kind() {
        let mut forms = forms();
        forms.mapping.kind = MappingKind::Grid;
        let rows = field_rows(StepId::Data(DataStep::MappingConfig), &forms);
        assert_eq!(ids(&rows), vec![FieldId::MappingKind, FieldId::GridSize]);

        forms.mapping.kind = MappingKind::Voronoi;
        let rows = field_rows(StepId::Data(DataStep::MappingConfig), &forms);
        assert!(ids(&rows).contains(&FieldId::VoronoiSmall));
        assert!(ids(&rows).contains(&FieldId::VoronoiLarge));
        assert!(!ids(&rows).contains(&FieldId::GridSize));
    }

    #[test]
    fn test_momentum_row_only_for_sgd() {
        let mut forms = forms();
        forms.model.optimizer = Optimizer::Adam;
        let rows = field_rows(StepId::Training(TrainingStep::ModelParams), &forms);
        assert!(!ids(&rows).contains(&FieldId::Momentum));

        forms.model.optimizer = Optimizer::Sgd;
        let rows = field_rows(StepId::Training(TrainingStep::ModelParams), &forms);
        assert!(ids(&rows).contains(&FieldId::Momentum));
    }

    #[test]
    fn test_log_rows_enabled_by_destination() {
        let mut forms = forms();
        forms.logging.destination = LogDestination::Local;
        let rows = log_rows(&forms);
        let enabled: Vec<FieldId> = rows.iter().filter(|r| r.enabled).map(|r| r.id).collect();
        assert_eq!(enabled, vec![FieldId::LogDestination, FieldId::LogDir]);

        forms.logging.destination = LogDestination::Wandb;
        let rows = log_rows(&forms);
        let enabled: Vec<FieldId> = rows.iter().filter(|r| r.enabled).map(|r| r.id).collect();
        assert_eq!(
            enabled,
            vec![
                FieldId::LogDestination,
                FieldId::ApiToken,
                FieldId::ProjectId,
                FieldId::Experiment
            ]
        );
    }

    #[test]
    fn test_api_token_is_masked() {
        let mut forms = forms();
        forms.logging.api_token = "secret".to_string();
        let rows = log_rows(&forms);
        let token = rows.iter().find(|r| r.id == FieldId::ApiToken).unwrap();
        assert_eq!(token.value, "••••••");
    }

    #[test]
    fn test_choice_cycles_wrap() {
        let mut forms = forms();
        forms.mapping.kind = MappingKind::ALL[0];
        cycle_choice(&mut forms, FieldId::MappingKind, -1);
        assert_eq!(forms.mapping.kind, MappingKind::ALL[MappingKind::ALL.len() - 1]);
        cycle_choice(&mut forms, FieldId::MappingKind, 1);
        assert_eq!(forms.mapping.kind, MappingKind::ALL[0]);
    }

    #[test]
    fn test_toggle_osm_feature() {
        let mut forms = forms();
        let before = forms.configure.osm.contains(&OsmFeature::Road);
        toggle(&mut forms, FieldId::Osm(OsmFeature::Road));
        assert_eq!(forms.configure.osm.contains(&OsmFeature::Road), !before);
    }

    #[test]
    fn test_text_slot_routes_fields() {
        let mut forms = forms();
        text_slot(&mut forms, FieldId::Horizon).unwrap().push('7');
        assert!(forms.configure.horizon.ends_with('7'));
        forms.model.learning_rate.clear();
        text_slot(&mut forms, FieldId::LearningRate)
            .unwrap()
            .push_str("0.01");
        assert_eq!(forms.model.learning_rate, "0.01");
        assert!(text_slot(&mut forms, FieldId::TestMode).is_none());
    }

    #[test]
    fn test_centered_rect_clamps() {
        let area = Rect::new(0, 0, 20, 10);
        let rect = centered_fixed_rect(40, 8, area);
        assert_eq!(rect.width, 20);
        assert_eq!(rect.y, 1);
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_quit_overlay_renders() {
        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(render_quit_confirm_overlay).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Are you sure you want to quit?"));
    }

    #[test]
    fn test_form_path_hint_resolves() {
        assert_eq!(Input::Path(Browse::LogDir).browse(), Some(Browse::LogDir));
        assert!(Input::Path(Browse::LogDir).is_text());
        assert!(!Input::Browse(Browse::DataFile).is_text());
    }
}
