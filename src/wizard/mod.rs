//! Wizard model: step cursor, form state and validators.
//!
//! Nothing in here touches the terminal; the TUI in `cli::wizard` and the
//! [`crate::app::Session`] drive it.

pub mod cursor;
pub mod forms;
pub mod validate;

pub use cursor::{
    forward_label, BuildGuard, DataStep, ForwardAction, MainTab, StepId, TrainingStep,
    WizardCursor,
};
pub use forms::{
    ConfigureForm, DateRangeFilter, FieldId, Forms, LoadForm, LogForm, MappingForm, ModelForm,
    ParamForm, ParamInput, ParamRow, PlotForm,
};
pub use validate::{
    check_bounds, is_valid_crs, normalize_crs, validate_configure, validate_load,
    validate_logging, validate_mapping, validate_model_params, validate_plot, Validation,
};
