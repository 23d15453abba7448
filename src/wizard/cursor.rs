//! Wizard cursor: which step is showing and where "Next" leads.

use std::collections::HashSet;

use crate::pipeline::TaskKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MainTab {
    Data,
    Training,
}

impl MainTab {
    pub fn title(&self) -> &'static str {
        match self {
            MainTab::Data => "Data",
            MainTab::Training => "Training",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataStep {
    Load,
    Configure,
    PreprocessResult,
    MappingConfig,
    MappingResult,
    Plot,
}

impl DataStep {
    pub const ALL: [DataStep; 6] = [
        DataStep::Load,
        DataStep::Configure,
        DataStep::PreprocessResult,
        DataStep::MappingConfig,
        DataStep::MappingResult,
        DataStep::Plot,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn title(&self) -> &'static str {
        match self {
            DataStep::Load => "Load",
            DataStep::Configure => "Configure",
            DataStep::PreprocessResult => "Preprocess",
            DataStep::MappingConfig => "Mapping",
            DataStep::MappingResult => "Mapped",
            DataStep::Plot => "Plot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrainingStep {
    ModelParams,
    Train,
}

impl TrainingStep {
    pub const ALL: [TrainingStep; 2] = [TrainingStep::ModelParams, TrainingStep::Train];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrainingStep::ModelParams => "Model",
            TrainingStep::Train => "Train",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    Data(DataStep),
    Training(TrainingStep),
}

impl StepId {
    pub fn title(&self) -> &'static str {
        match self {
            StepId::Data(step) => step.title(),
            StepId::Training(step) => step.title(),
        }
    }

    /// Result views have nothing to validate; their forward action is
    /// enabled as soon as they are shown.
    pub fn has_validator(&self) -> bool {
        !self.is_result_view()
    }

    pub fn is_result_view(&self) -> bool {
        matches!(
            self,
            StepId::Data(DataStep::PreprocessResult | DataStep::MappingResult | DataStep::Plot)
        )
    }
}

/// What the forward action does on a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardAction {
    Advance,
    Dispatch(TaskKind),
    EnterTraining,
}

impl ForwardAction {
    pub fn for_step(step: StepId) -> Self {
        match step {
            StepId::Data(DataStep::Load) => ForwardAction::Advance,
            StepId::Data(DataStep::Configure) => ForwardAction::Dispatch(TaskKind::Preprocess),
            StepId::Data(DataStep::PreprocessResult) => ForwardAction::Advance,
            StepId::Data(DataStep::MappingConfig) => ForwardAction::Dispatch(TaskKind::Map),
            StepId::Data(DataStep::MappingResult) => ForwardAction::Dispatch(TaskKind::Generate),
            StepId::Data(DataStep::Plot) => ForwardAction::EnterTraining,
            StepId::Training(TrainingStep::ModelParams) => {
                ForwardAction::Dispatch(TaskKind::CreateModel)
            }
            StepId::Training(TrainingStep::Train) => ForwardAction::Dispatch(TaskKind::Train),
        }
    }
}

pub fn forward_label(step: StepId) -> &'static str {
    match step {
        StepId::Data(DataStep::MappingConfig) => "Map",
        StepId::Data(DataStep::MappingResult) => "Generate",
        StepId::Data(DataStep::Plot) => "To Train",
        StepId::Training(TrainingStep::Train) => "Train",
        _ => "Next",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardCursor {
    main: MainTab,
    data: usize,
    training: usize,
    data_reached: usize,
    training_reached: usize,
    training_unlocked: bool,
}

impl Default for WizardCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardCursor {
    pub fn new() -> Self {
        Self {
            main: MainTab::Data,
            data: 0,
            training: 0,
            data_reached: 0,
            training_reached: 0,
            training_unlocked: false,
        }
    }

    pub fn main(&self) -> MainTab {
        self.main
    }

    pub fn data_step(&self) -> DataStep {
        DataStep::ALL[self.data]
    }

    pub fn training_step(&self) -> TrainingStep {
        TrainingStep::ALL[self.training]
    }

    pub fn current(&self) -> StepId {
        match self.main {
            MainTab::Data => StepId::Data(self.data_step()),
            MainTab::Training => StepId::Training(self.training_step()),
        }
    }

    pub fn forward_action(&self) -> ForwardAction {
        ForwardAction::for_step(self.current())
    }

    pub fn forward_label(&self) -> &'static str {
        forward_label(self.current())
    }

    fn position(&self) -> (usize, usize) {
        match self.main {
            MainTab::Data => (self.data, DataStep::ALL.len()),
            MainTab::Training => (self.training, TrainingStep::ALL.len()),
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.position().0 > 0
    }

    /// Step back by one within the current sequence.
    pub fn back(&mut self) -> bool {
        if !self.can_go_back() {
            return false;
        }
        match self.main {
            MainTab::Data => self.data -= 1,
            MainTab::Training => self.training -= 1,
        }
        true
    }

    /// Step forward by one within the current sequence.
    pub fn advance(&mut self) -> bool {
        let (index, len) = self.position();
        if index + 1 >= len {
            return false;
        }
        match self.main {
            MainTab::Data => {
                self.data += 1;
                self.data_reached = self.data_reached.max(self.data);
            }
            MainTab::Training => {
                self.training += 1;
                self.training_reached = self.training_reached.max(self.training);
            }
        }
        true
    }

    /// Advance after `kind` finished, if the cursor is still on the step that
    /// dispatched it. Training is terminal and never advances.
    pub fn complete(&mut self, kind: TaskKind) -> bool {
        if kind == TaskKind::Train || self.forward_action() != ForwardAction::Dispatch(kind) {
            return false;
        }
        self.advance()
    }

    /// Switch to the training sequence, unlocking it.
    pub fn enter_training(&mut self) {
        self.training_unlocked = true;
        self.main = MainTab::Training;
    }

    pub fn training_unlocked(&self) -> bool {
        self.training_unlocked
    }

    pub fn is_main_enabled(&self, tab: MainTab) -> bool {
        match tab {
            MainTab::Data => true,
            MainTab::Training => self.training_unlocked,
        }
    }

    pub fn select_main(&mut self, tab: MainTab) -> bool {
        if !self.is_main_enabled(tab) {
            return false;
        }
        self.main = tab;
        true
    }

    /// Whether a step tab has been visited and can be clicked.
    pub fn is_step_enabled(&self, step: StepId) -> bool {
        match step {
            StepId::Data(s) => s.index() <= self.data_reached,
            StepId::Training(s) => self.training_unlocked && s.index() <= self.training_reached,
        }
    }

    /// Jump to a visited step of the current sequence.
    pub fn select_step(&mut self, index: usize) -> bool {
        let step = match self.main {
            MainTab::Data => DataStep::ALL.get(index).copied().map(StepId::Data),
            MainTab::Training => TrainingStep::ALL.get(index).copied().map(StepId::Training),
        };
        match step {
            Some(step) if self.is_step_enabled(step) => {
                match self.main {
                    MainTab::Data => self.data = index,
                    MainTab::Training => self.training = index,
                }
                true
            }
            _ => false,
        }
    }
}

/// Per-step "already built" flags for lazily constructed views.
#[derive(Debug, Clone, Default)]
pub struct BuildGuard {
    built: HashSet<StepId>,
}

impl BuildGuard {
    /// True exactly once per step: the first time it is asked.
    pub fn first_build(&mut self, step: StepId) -> bool {
        self.built.insert(step)
    }

    pub fn is_built(&self, step: StepId) -> bool {
        self.built.contains(&step)
    }
}
