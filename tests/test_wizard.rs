//! Tests for the wizard cursor

use stmgraph::pipeline::TaskKind;
use stmgraph::wizard::{
    forward_label, BuildGuard, DataStep, ForwardAction, MainTab, StepId, TrainingStep,
    WizardCursor,
};

fn data(step: DataStep) -> StepId {
    StepId::Data(step)
}

#[test]
fn test_cursor_starts_on_load() {
    let cursor = WizardCursor::new();
    assert_eq!(cursor.current(), data(DataStep::Load));
    assert_eq!(cursor.main(), MainTab::Data);
    assert!(!cursor.can_go_back());
    assert!(!cursor.training_unlocked());
    assert!(!cursor.is_main_enabled(MainTab::Training));
}

#[test]
fn test_forward_actions_per_step() {
    let expected = [
        (data(DataStep::Load), ForwardAction::Advance),
        (
            data(DataStep::Configure),
            ForwardAction::Dispatch(TaskKind::Preprocess),
        ),
        (data(DataStep::PreprocessResult), ForwardAction::Advance),
        (
            data(DataStep::MappingConfig),
            ForwardAction::Dispatch(TaskKind::Map),
        ),
        (
            data(DataStep::MappingResult),
            ForwardAction::Dispatch(TaskKind::Generate),
        ),
        (data(DataStep::Plot), ForwardAction::EnterTraining),
        (
            StepId::Training(TrainingStep::ModelParams),
            ForwardAction::Dispatch(TaskKind::CreateModel),
        ),
        (
            StepId::Training(TrainingStep::Train),
            ForwardAction::Dispatch(TaskKind::Train),
        ),
    ];
    for (step, action) in expected {
        assert_eq!(ForwardAction::for_step(step), action, "{step:?}");
    }
}

#[test]
fn test_forward_labels() {
    assert_eq!(forward_label(data(DataStep::Load)), "Next");
    assert_eq!(forward_label(data(DataStep::MappingConfig)), "Map");
    assert_eq!(forward_label(data(DataStep::MappingResult)), "Generate");
    assert_eq!(forward_label(data(DataStep::Plot)), "To Train");
    assert_eq!(
        forward_label(StepId::Training(TrainingStep::Train)),
        "Train"
    );
}

#[test]
fn test_complete_advances_only_from_dispatching_step() {
    let mut cursor = WizardCursor::new();
    assert!(cursor.advance());
    assert_eq!(cursor.current(), data(DataStep::Configure));

    // A mapping completion does not move the cursor off Configure.
    assert!(!cursor.complete(TaskKind::Map));
    assert!(cursor.complete(TaskKind::Preprocess));
    assert_eq!(cursor.current(), data(DataStep::PreprocessResult));
}

#[test]
fn test_training_completion_is_terminal() {
    let mut cursor = WizardCursor::new();
    cursor.enter_training();
    assert!(cursor.advance());
    assert_eq!(cursor.current(), StepId::Training(TrainingStep::Train));
    assert!(!cursor.complete(TaskKind::Train));
    assert_eq!(cursor.current(), StepId::Training(TrainingStep::Train));
    assert!(!cursor.advance());
}

#[test]
fn test_back_stays_within_sequence() {
    let mut cursor = WizardCursor::new();
    cursor.advance();
    cursor.advance();
    assert!(cursor.back());
    assert_eq!(cursor.current(), data(DataStep::Configure));

    cursor.enter_training();
    assert!(!cursor.can_go_back());
    assert!(!cursor.back());
    assert_eq!(cursor.main(), MainTab::Training);
}

#[test]
fn test_step_tabs_follow_furthest_visit() {
    let mut cursor = WizardCursor::new();
    for _ in 0..3 {
        cursor.advance();
    }
    assert!(cursor.is_step_enabled(data(DataStep::MappingConfig)));
    assert!(!cursor.is_step_enabled(data(DataStep::MappingResult)));

    assert!(cursor.select_step(DataStep::Load.index()));
    // Going back keeps later steps reachable.
    assert!(cursor.select_step(DataStep::MappingConfig.index()));
    assert!(!cursor.select_step(DataStep::Plot.index()));
    assert!(!cursor.select_step(42));
}

#[test]
fn test_training_tab_unlocks_once() {
    let mut cursor = WizardCursor::new();
    assert!(!cursor.select_main(MainTab::Training));
    assert!(!cursor.is_step_enabled(StepId::Training(TrainingStep::ModelParams)));

    cursor.enter_training();
    assert!(cursor.is_step_enabled(StepId::Training(TrainingStep::ModelParams)));
    assert!(cursor.select_main(MainTab::Data));
    assert!(cursor.select_main(MainTab::Training));
    assert_eq!(cursor.current(), StepId::Training(TrainingStep::ModelParams));
}

#[test]
fn test_result_views_have_no_validator() {
    for step in DataStep::ALL {
        let id = data(step);
        let result = matches!(
            step,
            DataStep::PreprocessResult | DataStep::MappingResult | DataStep::Plot
        );
        assert_eq!(id.is_result_view(), result);
        assert_eq!(id.has_validator(), !result);
    }
    assert!(StepId::Training(TrainingStep::Train).has_validator());
}

#[test]
fn test_build_guard_fires_once_per_step() {
    let mut guard = BuildGuard::default();
    let step = data(DataStep::PreprocessResult);
    assert!(!guard.is_built(step));
    assert!(guard.first_build(step));
    assert!(!guard.first_build(step));
    assert!(guard.is_built(step));
    assert!(guard.first_build(data(DataStep::MappingResult)));
}
