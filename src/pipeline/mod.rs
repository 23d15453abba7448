//! Pipeline module - the background tasks behind the wizard steps

pub mod artifacts;
pub mod preview;
pub mod tasks;

use std::fmt;
use std::path::PathBuf;

use crate::toolkit::{MappingOutput, ProcessedData, TrainingReport};

pub use preview::{is_supported_data_file, load_preview, DataPreview};
pub use tasks::{CreatedModel, GeneratedData};

/// Kinds of background work. At most one of each runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Preprocess,
    Map,
    Generate,
    Plot,
    CreateModel,
    Train,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Preprocess => "Preprocessing",
            TaskKind::Map => "Mapping",
            TaskKind::Generate => "Data generation",
            TaskKind::Plot => "Plotting",
            TaskKind::CreateModel => "Model creation",
            TaskKind::Train => "Training",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a finished task hands back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Preprocessed(ProcessedData),
    Mapped(MappingOutput),
    Generated(GeneratedData),
    Plotted(PathBuf),
    ModelCreated(CreatedModel),
    Trained(TrainingReport),
}
