//! Wizard session: cursor, forms, task dispatch and results in one place.
//!
//! The session is driven by the UI thread. Every user edit goes through
//! [`Session::edit`] so the current step is re-validated, and every UI tick
//! calls [`Session::tick`] to merge finished tasks, viewer loads and log
//! lines.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline::{
    is_supported_data_file, load_preview, tasks, CreatedModel, GeneratedData, TaskKind,
    TaskOutput,
};
use crate::toolkit::{GraphToolkit, MappingOutput, MappingStrategy, ProcessedData, TrainingReport};
use crate::viewer::{PdfViewer, Rasterizer, ViewerError, ViewerEvent};
use crate::wizard::{
    validate, BuildGuard, DataStep, FieldId, Forms, ForwardAction, MainTab, StepId, TrainingStep,
    Validation, WizardCursor,
};
use crate::worker::log_tail::DEFAULT_WATCH_INTERVAL;
use crate::worker::{Completion, Dispatcher, LogFileWatcher, LogPrinter};

pub const SHAPE_FILE_EXTENSIONS: &[&str] = &["csv", "shp"];
pub const GRAPH_DATA_EXTENSIONS: &[&str] = &["pt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message the UI shows as a dismissable overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Information".to_string(),
            message: message.into(),
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// A background task that returned an error or panicked.
///
/// The wizard stays on the step that dispatched it; nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: TaskKind,
    pub message: String,
}

/// Outputs of finished tasks, consumed by later steps.
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub processed: Option<ProcessedData>,
    pub mapping: Option<MappingOutput>,
    pub generated: Option<GeneratedData>,
    pub plot_path: Option<PathBuf>,
    pub model: Option<CreatedModel>,
    pub training: Option<TrainingReport>,
}

/// Report viewers of the result steps.
#[derive(Default)]
struct Views {
    built: BuildGuard,
    preprocess: PdfViewer,
    mapping: PdfViewer,
    plot: PdfViewer,
}

type BoxedTask = Box<dyn FnOnce() -> Result<TaskOutput> + Send + 'static>;

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

fn invalid_file(allowed: &[&str]) -> Notice {
    Notice::warning(
        "Invalid File",
        format!("Please select file in .{} format!", allowed.join(" or .")),
    )
}

pub struct Session {
    config: Config,
    cursor: WizardCursor,
    forms: Forms,
    results: Results,
    views: Views,
    validation: Validation,
    plot_validation: Validation,
    mapper: Option<MappingStrategy>,
    failure: Option<TaskFailure>,
    notices: VecDeque<Notice>,
    log_lines: Vec<String>,
    tasks: Dispatcher<TaskKind, TaskOutput>,
    toolkit: Arc<dyn GraphToolkit>,
    rasterizer: Arc<dyn Rasterizer>,
    log_watch: Option<LogFileWatcher>,
    log_printer: Option<LogPrinter>,
    log_watch_interval: Duration,
}

impl Session {
    pub fn new(
        config: Config,
        forms: Forms,
        toolkit: Arc<dyn GraphToolkit>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let mut session = Self {
            config,
            cursor: WizardCursor::new(),
            forms,
            results: Results::default(),
            views: Views::default(),
            validation: Validation::default(),
            plot_validation: Validation::default(),
            mapper: None,
            failure: None,
            notices: VecDeque::new(),
            log_lines: Vec::new(),
            tasks: Dispatcher::new(),
            toolkit,
            rasterizer,
            log_watch: None,
            log_printer: None,
            log_watch_interval: DEFAULT_WATCH_INTERVAL,
        };
        session.show_step();
        session
    }

    /// Poll interval of the training log folder watcher.
    pub fn set_log_watch_interval(&mut self, interval: Duration) {
        self.log_watch_interval = interval;
    }

    // ------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cursor(&self) -> &WizardCursor {
        &self.cursor
    }

    pub fn forms(&self) -> &Forms {
        &self.forms
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    pub fn plot_validation(&self) -> &Validation {
        &self.plot_validation
    }

    pub fn is_marked(&self, field: FieldId) -> bool {
        self.validation.is_marked(field) || self.plot_validation.is_marked(field)
    }

    pub fn mapper(&self) -> Option<&MappingStrategy> {
        self.mapper.as_ref()
    }

    pub fn busy(&self) -> bool {
        !self.tasks.is_idle()
    }

    pub fn running(&self, kind: TaskKind) -> bool {
        self.tasks.is_running(kind)
    }

    pub fn forward_enabled(&self) -> bool {
        !self.busy() && self.validation.ok
    }

    pub fn back_enabled(&self) -> bool {
        !self.busy() && self.cursor.can_go_back()
    }

    pub fn tabs_enabled(&self) -> bool {
        !self.busy()
    }

    pub fn plot_enabled(&self) -> bool {
        !self.busy()
            && self.cursor.current() == StepId::Data(DataStep::Plot)
            && self.plot_validation.ok
            && self.results.generated.is_some()
            && self.results.mapping.is_some()
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    /// Viewer shown on a result step, if that step has one.
    pub fn viewer(&self, step: StepId) -> Option<&PdfViewer> {
        match step {
            StepId::Data(DataStep::PreprocessResult) => Some(&self.views.preprocess),
            StepId::Data(DataStep::MappingResult) => Some(&self.views.mapping),
            StepId::Data(DataStep::Plot) => Some(&self.views.plot),
            _ => None,
        }
    }

    pub fn viewer_mut(&mut self, step: StepId) -> Option<&mut PdfViewer> {
        match step {
            StepId::Data(DataStep::PreprocessResult) => Some(&mut self.views.preprocess),
            StepId::Data(DataStep::MappingResult) => Some(&mut self.views.mapping),
            StepId::Data(DataStep::Plot) => Some(&mut self.views.plot),
            _ => None,
        }
    }

    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Apply an edit to the step forms, then re-validate the current step.
    pub fn edit<R>(&mut self, change: impl FnOnce(&mut Forms) -> R) -> R {
        let result = change(&mut self.forms);
        self.revalidate();
        result
    }

    /// Run the current step's validator and update forward enablement.
    pub fn revalidate(&mut self) {
        let config = &mut self.config;
        let forms = &self.forms;
        let step = self.cursor.current();

        self.validation = match step {
            StepId::Data(DataStep::Load) => validate::validate_load(&forms.load, config),
            StepId::Data(DataStep::Configure) => {
                validate::validate_configure(&forms.configure, config)
            }
            StepId::Data(DataStep::MappingConfig) => {
                let (validation, mapper) = validate::validate_mapping(&forms.mapping, config);
                self.mapper = mapper;
                validation
            }
            StepId::Training(TrainingStep::ModelParams) => {
                validate::validate_model_params(&forms.model, config)
            }
            StepId::Training(TrainingStep::Train) => {
                validate::validate_logging(&forms.logging, config)
            }
            StepId::Data(
                DataStep::PreprocessResult | DataStep::MappingResult | DataStep::Plot,
            ) => Validation::pass(),
        };

        if step == StepId::Data(DataStep::Plot) {
            self.plot_validation = validate::validate_plot(&forms.plot, config);
        }
        debug!(step = step.title(), ok = self.validation.ok, "Validated");
    }

    /// Load a raw data file and its preview into the Load step.
    pub fn select_data_file(&mut self, path: &Path) -> bool {
        if !is_supported_data_file(path) {
            self.notices.push_back(invalid_file(&["csv", "parquet"]));
            return false;
        }
        match load_preview(path) {
            Ok(preview) => {
                info!(path = %path.display(), columns = preview.columns.len(), "Loaded data preview");
                self.edit(|forms| forms.load.set_preview(path.to_path_buf(), preview));
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read data file");
                self.notices
                    .push_back(Notice::error("Invalid File", format!("{e:#}")));
                false
            }
        }
    }

    pub fn select_shape_file(&mut self, path: &Path) -> bool {
        if !has_extension(path, SHAPE_FILE_EXTENSIONS) {
            self.notices.push_back(invalid_file(SHAPE_FILE_EXTENSIONS));
            return false;
        }
        let text = path.display().to_string();
        self.edit(|forms| forms.mapping.shape_file = text);
        true
    }

    pub fn select_graph_data(&mut self, path: &Path) -> bool {
        if !has_extension(path, GRAPH_DATA_EXTENSIONS) {
            self.notices.push_back(invalid_file(GRAPH_DATA_EXTENSIONS));
            return false;
        }
        let text = path.display().to_string();
        self.edit(|forms| forms.model.graph_data_path = text);
        true
    }

    pub fn select_output_dir(&mut self, path: &Path) {
        let text = path.display().to_string();
        self.edit(|forms| forms.configure.output_dir = text);
    }

    pub fn select_log_dir(&mut self, path: &Path) {
        let text = path.display().to_string();
        self.edit(|forms| forms.logging.log_dir = text);
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// The forward action: advance, dispatch, or enter training.
    pub fn next(&mut self) -> bool {
        if !self.forward_enabled() {
            return false;
        }
        match self.cursor.forward_action() {
            ForwardAction::Advance => {
                let moved = self.cursor.advance();
                if moved {
                    self.show_step();
                }
                moved
            }
            ForwardAction::Dispatch(kind) => self.dispatch(kind),
            ForwardAction::EnterTraining => {
                self.cursor.enter_training();
                self.show_step();
                true
            }
        }
    }

    pub fn back(&mut self) -> bool {
        if !self.back_enabled() {
            return false;
        }
        self.cursor.back();
        self.show_step();
        true
    }

    pub fn select_main(&mut self, tab: MainTab) -> bool {
        if !self.tabs_enabled() || !self.cursor.select_main(tab) {
            return false;
        }
        self.show_step();
        true
    }

    pub fn select_step(&mut self, index: usize) -> bool {
        if !self.tabs_enabled() || !self.cursor.select_step(index) {
            return false;
        }
        self.show_step();
        true
    }

    /// The Plot step's own action.
    pub fn plot(&mut self) -> bool {
        self.plot_enabled() && self.dispatch(TaskKind::Plot)
    }

    /// Prepare the step the cursor points at, building its view on first visit.
    fn show_step(&mut self) {
        let step = self.cursor.current();
        if self.views.built.first_build(step) {
            debug!(step = step.title(), "Building step view");
            match step {
                StepId::Data(DataStep::PreprocessResult) => {
                    let folder = self.config.preprocess_dir();
                    self.open_report_folder(step, folder);
                }
                StepId::Data(DataStep::MappingResult) => {
                    let folder = self.config.mapping_dir();
                    self.open_report_folder(step, folder);
                }
                StepId::Training(TrainingStep::ModelParams) => self.prefill_graph_data(),
                _ => {}
            }
        }
        self.revalidate();
    }

    fn open_report_folder(&mut self, step: StepId, folder: Option<PathBuf>) {
        let Some(folder) = folder else {
            return;
        };
        let Some(viewer) = self.viewer_mut(step) else {
            return;
        };
        if let Err(e) = viewer.load_folder(&folder) {
            warn!(folder = %folder.display(), error = %e, "Cannot show reports");
            let title = match e {
                ViewerError::NoPdfs(_) => "No PDFs",
                _ => "Error",
            };
            self.notices.push_back(Notice::warning(title, e.to_string()));
        }
    }

    fn prefill_graph_data(&mut self) {
        let dataset_path = self
            .results
            .generated
            .as_ref()
            .and_then(|g| g.dataset.path.clone());
        if let Some(path) = dataset_path {
            if self.forms.model.graph_data_path.trim().is_empty() {
                self.forms.model.graph_data_path = path.display().to_string();
            }
        }
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Start a background task on a snapshot of the configuration.
    pub fn dispatch(&mut self, kind: TaskKind) -> bool {
        let task = match self.build_task(kind) {
            Ok(task) => task,
            Err(e) => {
                self.notices
                    .push_back(Notice::error(kind.label(), format!("{e:#}")));
                return false;
            }
        };

        if let Err(e) = self.tasks.spawn(kind, task) {
            self.notices
                .push_back(Notice::error(kind.label(), e.to_string()));
            return false;
        }

        info!(task = %kind, "Task dispatched");
        self.failure = None;
        if kind == TaskKind::Train {
            self.start_log_tail();
        }
        true
    }

    fn build_task(&self, kind: TaskKind) -> Result<BoxedTask> {
        let config = self.config.clone();
        let toolkit = Arc::clone(&self.toolkit);
        let rasterizer = Arc::clone(&self.rasterizer);

        let task: BoxedTask = match kind {
            TaskKind::Preprocess => Box::new(move || {
                tasks::preprocess(&config, toolkit.as_ref(), rasterizer.as_ref())
                    .map(TaskOutput::Preprocessed)
            }),
            TaskKind::Map => {
                let strategy = self
                    .mapper
                    .clone()
                    .context("Mapping strategy is not configured")?;
                let points = self
                    .results
                    .processed
                    .clone()
                    .context("Run preprocessing first")?;
                Box::new(move || {
                    tasks::map(
                        &config,
                        &strategy,
                        &points,
                        toolkit.as_ref(),
                        rasterizer.as_ref(),
                    )
                    .map(TaskOutput::Mapped)
                })
            }
            TaskKind::Generate => {
                let mapping = self.results.mapping.clone().context("Run mapping first")?;
                Box::new(move || {
                    tasks::generate(&config, &mapping, toolkit.as_ref()).map(TaskOutput::Generated)
                })
            }
            TaskKind::Plot => {
                let generated = self
                    .results
                    .generated
                    .clone()
                    .context("Generate the dataset first")?;
                let mapping = self.results.mapping.clone().context("Run mapping first")?;
                Box::new(move || {
                    tasks::plot(&config, &generated, &mapping, toolkit.as_ref())
                        .map(TaskOutput::Plotted)
                })
            }
            TaskKind::CreateModel => {
                let static_features = self
                    .results
                    .generated
                    .as_ref()
                    .map_or(0, GeneratedData::static_feature_count);
                Box::new(move || {
                    tasks::create_model(&config, static_features, toolkit.as_ref())
                        .map(TaskOutput::ModelCreated)
                })
            }
            TaskKind::Train => {
                let created = self
                    .results
                    .model
                    .clone()
                    .ok_or_else(|| anyhow!("Create the model first"))?;
                Box::new(move || {
                    tasks::train(&config, &created.model, &created.dataset, toolkit.as_ref())
                        .map(TaskOutput::Trained)
                })
            }
        };
        Ok(task)
    }

    /// Merge finished work into the session. Call once per UI tick.
    pub fn tick(&mut self) {
        for completion in self.tasks.poll() {
            self.apply(completion);
        }

        let mut events = Vec::new();
        events.extend(self.views.preprocess.poll());
        events.extend(self.views.mapping.poll());
        events.extend(self.views.plot.poll());
        for event in events {
            if let ViewerEvent::Failed { message, .. } = event {
                self.notices.push_back(Notice::warning("Error", message));
            }
        }

        self.pump_log_tail();
    }

    /// Tick until no task is running or `timeout` elapses.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if !self.busy() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn apply(&mut self, completion: Completion<TaskKind, TaskOutput>) {
        let kind = completion.kind;
        let output = match completion.result {
            Ok(output) => output,
            Err(e) => {
                warn!(task = %kind, error = %e, "Task failed");
                if kind == TaskKind::Train {
                    self.stop_log_tail();
                }
                self.failure = Some(TaskFailure {
                    kind,
                    message: e.to_string(),
                });
                return;
            }
        };

        info!(task = %kind, "Task finished");
        match output {
            TaskOutput::Preprocessed(processed) => self.results.processed = Some(processed),
            TaskOutput::Mapped(mapping) => self.results.mapping = Some(mapping),
            TaskOutput::Generated(generated) => {
                self.notices.push_back(Notice::info(format!(
                    "{}\n\nYou can skip the plot step and go to the Training tab \
                     if you do not want to visualize the graph data.",
                    generated.summary()
                )));
                self.results.generated = Some(generated);
            }
            TaskOutput::Plotted(path) => {
                if let Err(e) = self.views.plot.load_file(&path) {
                    self.notices.push_back(Notice::warning("Error", e.to_string()));
                }
                self.results.plot_path = Some(path);
            }
            TaskOutput::ModelCreated(created) => {
                self.config.training.store(created.params.clone());
                self.forms
                    .model
                    .reload_family(&self.config, created.params.family());
                self.notices
                    .push_back(Notice::info("Model created successfully."));
                self.results.model = Some(created);
            }
            TaskOutput::Trained(report) => {
                self.stop_log_tail();
                self.notices
                    .push_back(Notice::info("Training process done and stopped."));
                self.results.training = Some(report);
            }
        }

        if self.cursor.complete(kind) {
            self.show_step();
        }
    }

    /// Queue a message for the UI.
    pub fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    pub fn dismiss_failure(&mut self) -> Option<TaskFailure> {
        self.failure.take()
    }

    // ------------------------------------------------------------------
    // Training log
    // ------------------------------------------------------------------

    fn start_log_tail(&mut self) {
        self.stop_log_tail();
        self.log_lines.clear();

        let training = &self.config.training;
        if !training.log_destination.writes_local() {
            return;
        }
        let Some(dir) = training.log_dir.clone() else {
            return;
        };
        match LogFileWatcher::start(&dir, self.log_watch_interval) {
            Ok(watcher) => self.log_watch = Some(watcher),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Cannot watch log folder"),
        }
    }

    fn pump_log_tail(&mut self) {
        if let Some(found) = self.log_watch.as_ref().and_then(LogFileWatcher::try_found) {
            if let Some(mut watcher) = self.log_watch.take() {
                watcher.stop();
            }
            match LogPrinter::start(&found) {
                Ok(printer) => {
                    info!(log = %found.display(), "Tailing training log");
                    self.log_printer = Some(printer);
                }
                Err(e) => self
                    .log_lines
                    .push(format!("[Error tailing file: {e}]")),
            }
        }

        if let Some(printer) = &self.log_printer {
            self.log_lines.extend(printer.drain());
        }
    }

    fn stop_log_tail(&mut self) {
        if let Some(mut watcher) = self.log_watch.take() {
            watcher.stop();
        }
        if let Some(mut printer) = self.log_printer.take() {
            printer.stop();
            self.log_lines.extend(printer.drain());
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn save_config(&self, path: &Path) -> Result<()> {
        self.config
            .save(path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))
    }
}
