//! Model-family parameter blocks and training settings.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ConfigError;
use super::params::{ParamBlock, ParamDescriptor, ParamKind, ParamValue};

pub const TEMPORAL_POOLING_CHOICES: &[&str] = &["last", "mean", "max"];
pub const DEFAULT_EXPERIMENT_NAME: &str = "stm_graph_experiment";

// ============================================================================
// Model families
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    #[default]
    Gcn,
    Tgcn,
    Stgcn,
    Dcrnn,
    Agcrn,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::Gcn,
        ModelFamily::Tgcn,
        ModelFamily::Stgcn,
        ModelFamily::Dcrnn,
        ModelFamily::Agcrn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gcn => "gcn",
            ModelFamily::Tgcn => "tgcn",
            ModelFamily::Stgcn => "stgcn",
            ModelFamily::Dcrnn => "dcrnn",
            ModelFamily::Agcrn => "agcrn",
        }
    }

    /// GCN and TGCN consume the 3-D (static features folded in) dataset layout.
    pub fn uses_3d_dataset(&self) -> bool {
        matches!(self, ModelFamily::Gcn | ModelFamily::Tgcn)
    }

    /// AGCRN learns node embeddings sized to the batch, so batches must not shrink.
    pub fn needs_fixed_batch_size(&self) -> bool {
        matches!(self, ModelFamily::Agcrn)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalPooling {
    #[default]
    Last,
    Mean,
    Max,
}

impl TemporalPooling {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalPooling::Last => "last",
            TemporalPooling::Mean => "mean",
            TemporalPooling::Max => "max",
        }
    }

    fn parse(name: &str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "last" => Ok(TemporalPooling::Last),
            "mean" => Ok(TemporalPooling::Mean),
            "max" => Ok(TemporalPooling::Max),
            _ => Err(super::params::type_error(name, "one of last, mean, max")),
        }
    }
}

// ============================================================================
// Parameter blocks
// ============================================================================

const IN_CHANNELS: ParamDescriptor = ParamDescriptor::derived("in_channels", "Number of input features");
const OUT_CHANNELS: ParamDescriptor =
    ParamDescriptor::derived("out_channels", "Number of output features");
const NUM_NODES: ParamDescriptor = ParamDescriptor::derived("num_nodes", "Number of nodes in the graph");
const DROPOUT: ParamDescriptor = ParamDescriptor::new("dropout", "Dropout rate (float)", ParamKind::Float);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcnParams {
    pub hidden_channels: u32,
    pub dropout: f64,
    pub in_channels: u32,
    pub out_channels: u32,
    pub temporal_pooling: TemporalPooling,
}

impl Default for GcnParams {
    fn default() -> Self {
        Self {
            hidden_channels: 64,
            dropout: 0.2,
            in_channels: 1,
            out_channels: 1,
            temporal_pooling: TemporalPooling::Last,
        }
    }
}

static GCN_PARAMS: [ParamDescriptor; 5] = [
    ParamDescriptor::new("hidden_channels", "Size of hidden layers", ParamKind::Int),
    DROPOUT,
    IN_CHANNELS,
    OUT_CHANNELS,
    ParamDescriptor::new(
        "temporal_pooling",
        "Method to pool temporal dimension",
        ParamKind::Choice(TEMPORAL_POOLING_CHOICES),
    ),
];

impl ParamBlock for GcnParams {
    fn block_name(&self) -> &'static str {
        "gcn"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &GCN_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "hidden_channels" => ParamValue::Int(self.hidden_channels.into()),
            "dropout" => ParamValue::Float(self.dropout),
            "in_channels" => ParamValue::Int(self.in_channels.into()),
            "out_channels" => ParamValue::Int(self.out_channels.into()),
            "temporal_pooling" => ParamValue::Text(self.temporal_pooling.as_str().to_string()),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "hidden_channels" => self.hidden_channels = value.as_unsigned(name)?,
            "dropout" => self.dropout = value.as_float(name)?,
            "in_channels" => self.in_channels = value.as_unsigned(name)?,
            "out_channels" => self.out_channels = value.as_unsigned(name)?,
            "temporal_pooling" => {
                self.temporal_pooling = TemporalPooling::parse(name, value.as_text(name)?)?
            }
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TgcnParams {
    pub batch_size: u32,
    pub in_channels: u32,
    pub out_channels: u32,
}

impl Default for TgcnParams {
    fn default() -> Self {
        Self {
            batch_size: 1,
            in_channels: 1,
            out_channels: 1,
        }
    }
}

static TGCN_PARAMS: [ParamDescriptor; 3] = [
    ParamDescriptor::new("batch_size", "Size of the batch", ParamKind::Int),
    IN_CHANNELS,
    OUT_CHANNELS,
];

impl ParamBlock for TgcnParams {
    fn block_name(&self) -> &'static str {
        "tgcn"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &TGCN_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "batch_size" => ParamValue::Int(self.batch_size.into()),
            "in_channels" => ParamValue::Int(self.in_channels.into()),
            "out_channels" => ParamValue::Int(self.out_channels.into()),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "batch_size" => self.batch_size = value.as_unsigned(name)?,
            "in_channels" => self.in_channels = value.as_unsigned(name)?,
            "out_channels" => self.out_channels = value.as_unsigned(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StgcnParams {
    pub hidden_channels: u32,
    pub dropout: f64,
    pub num_st_blocks: u32,
    pub in_channels: u32,
    pub out_channels: u32,
    pub kernel_size: u32,
    #[serde(rename = "K")]
    pub cheb_order: u32,
    pub num_nodes: u32,
    pub history_window: u32,
}

impl Default for StgcnParams {
    fn default() -> Self {
        Self {
            hidden_channels: 64,
            dropout: 0.0,
            num_st_blocks: 2,
            in_channels: 1,
            out_channels: 1,
            kernel_size: 3,
            cheb_order: 3,
            num_nodes: 1,
            history_window: 3,
        }
    }
}

static STGCN_PARAMS: [ParamDescriptor; 9] = [
    ParamDescriptor::new("hidden_channels", "Size of hidden layers", ParamKind::Int),
    DROPOUT,
    ParamDescriptor::new("num_st_blocks", "Number of ST-Conv blocks", ParamKind::Int),
    IN_CHANNELS,
    OUT_CHANNELS,
    ParamDescriptor::derived(
        "kernel_size",
        "Size of temporal convolution kernel, should be same as window size",
    ),
    ParamDescriptor::derived("K", "Order of Chebyshev polynomials, should be same as window size"),
    NUM_NODES,
    ParamDescriptor::derived(
        "history_window",
        "Number of time steps in history, should be same as window size",
    ),
];

impl ParamBlock for StgcnParams {
    fn block_name(&self) -> &'static str {
        "stgcn"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &STGCN_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "hidden_channels" => ParamValue::Int(self.hidden_channels.into()),
            "dropout" => ParamValue::Float(self.dropout),
            "num_st_blocks" => ParamValue::Int(self.num_st_blocks.into()),
            "in_channels" => ParamValue::Int(self.in_channels.into()),
            "out_channels" => ParamValue::Int(self.out_channels.into()),
            "kernel_size" => ParamValue::Int(self.kernel_size.into()),
            "K" => ParamValue::Int(self.cheb_order.into()),
            "num_nodes" => ParamValue::Int(self.num_nodes.into()),
            "history_window" => ParamValue::Int(self.history_window.into()),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "hidden_channels" => self.hidden_channels = value.as_unsigned(name)?,
            "dropout" => self.dropout = value.as_float(name)?,
            "num_st_blocks" => self.num_st_blocks = value.as_unsigned(name)?,
            "in_channels" => self.in_channels = value.as_unsigned(name)?,
            "out_channels" => self.out_channels = value.as_unsigned(name)?,
            "kernel_size" => self.kernel_size = value.as_unsigned(name)?,
            "K" => self.cheb_order = value.as_unsigned(name)?,
            "num_nodes" => self.num_nodes = value.as_unsigned(name)?,
            "history_window" => self.history_window = value.as_unsigned(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcrnnParams {
    pub hidden_dim: u32,
    pub dropout: f64,
    pub in_channels: u32,
    pub out_channels: u32,
    #[serde(rename = "K")]
    pub kernel: u32,
}

impl Default for DcrnnParams {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            dropout: 0.0,
            in_channels: 1,
            out_channels: 1,
            kernel: 3,
        }
    }
}

static DCRNN_PARAMS: [ParamDescriptor; 5] = [
    ParamDescriptor::new("hidden_dim", "Size of hidden layers", ParamKind::Int),
    DROPOUT,
    IN_CHANNELS,
    OUT_CHANNELS,
    ParamDescriptor::derived("K", "Kernel size, should be same as window size"),
];

impl ParamBlock for DcrnnParams {
    fn block_name(&self) -> &'static str {
        "dcrnn"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &DCRNN_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "hidden_dim" => ParamValue::Int(self.hidden_dim.into()),
            "dropout" => ParamValue::Float(self.dropout),
            "in_channels" => ParamValue::Int(self.in_channels.into()),
            "out_channels" => ParamValue::Int(self.out_channels.into()),
            "K" => ParamValue::Int(self.kernel.into()),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "hidden_dim" => self.hidden_dim = value.as_unsigned(name)?,
            "dropout" => self.dropout = value.as_float(name)?,
            "in_channels" => self.in_channels = value.as_unsigned(name)?,
            "out_channels" => self.out_channels = value.as_unsigned(name)?,
            "K" => self.kernel = value.as_unsigned(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgcrnParams {
    pub hidden_dim: u32,
    pub embedding_dim: u32,
    pub in_channels: u32,
    pub out_channels: u32,
    pub num_nodes: u32,
    #[serde(rename = "k")]
    pub kernel: u32,
}

impl Default for AgcrnParams {
    fn default() -> Self {
        Self {
            hidden_dim: 64,
            embedding_dim: 8,
            in_channels: 1,
            out_channels: 1,
            num_nodes: 1,
            kernel: 3,
        }
    }
}

static AGCRN_PARAMS: [ParamDescriptor; 6] = [
    ParamDescriptor::new("hidden_dim", "Size of hidden layers", ParamKind::Int),
    ParamDescriptor::new("embedding_dim", "Number of node embedding dimensions", ParamKind::Int),
    IN_CHANNELS,
    OUT_CHANNELS,
    NUM_NODES,
    ParamDescriptor::derived("k", "Kernel size, should be same as window size"),
];

impl ParamBlock for AgcrnParams {
    fn block_name(&self) -> &'static str {
        "agcrn"
    }

    fn descriptors(&self) -> &'static [ParamDescriptor] {
        &AGCRN_PARAMS
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        Some(match name {
            "hidden_dim" => ParamValue::Int(self.hidden_dim.into()),
            "embedding_dim" => ParamValue::Int(self.embedding_dim.into()),
            "in_channels" => ParamValue::Int(self.in_channels.into()),
            "out_channels" => ParamValue::Int(self.out_channels.into()),
            "num_nodes" => ParamValue::Int(self.num_nodes.into()),
            "k" => ParamValue::Int(self.kernel.into()),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError> {
        match name {
            "hidden_dim" => self.hidden_dim = value.as_unsigned(name)?,
            "embedding_dim" => self.embedding_dim = value.as_unsigned(name)?,
            "in_channels" => self.in_channels = value.as_unsigned(name)?,
            "out_channels" => self.out_channels = value.as_unsigned(name)?,
            "num_nodes" => self.num_nodes = value.as_unsigned(name)?,
            "k" => self.kernel = value.as_unsigned(name)?,
            _ => return Err(self.unknown(name)),
        }
        Ok(())
    }
}

// ============================================================================
// Active model selection
// ============================================================================

/// Parameters of the selected model family, tagged by family.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParams {
    Gcn(GcnParams),
    Tgcn(TgcnParams),
    Stgcn(StgcnParams),
    Dcrnn(DcrnnParams),
    Agcrn(AgcrnParams),
}

impl ModelParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelParams::Gcn(_) => ModelFamily::Gcn,
            ModelParams::Tgcn(_) => ModelFamily::Tgcn,
            ModelParams::Stgcn(_) => ModelFamily::Stgcn,
            ModelParams::Dcrnn(_) => ModelFamily::Dcrnn,
            ModelParams::Agcrn(_) => ModelFamily::Agcrn,
        }
    }

    pub fn block(&self) -> &dyn ParamBlock {
        match self {
            ModelParams::Gcn(p) => p,
            ModelParams::Tgcn(p) => p,
            ModelParams::Stgcn(p) => p,
            ModelParams::Dcrnn(p) => p,
            ModelParams::Agcrn(p) => p,
        }
    }

    pub fn block_mut(&mut self) -> &mut dyn ParamBlock {
        match self {
            ModelParams::Gcn(p) => p,
            ModelParams::Tgcn(p) => p,
            ModelParams::Stgcn(p) => p,
            ModelParams::Dcrnn(p) => p,
            ModelParams::Agcrn(p) => p,
        }
    }

    /// Fill the dataset-derived parameters.
    ///
    /// `feature_shape` is the shape of the first feature tensor; its last
    /// dimension gives the input channels and its first the node count.
    /// Kernel-like parameters follow the history window.
    pub fn derive_from_dataset(
        &mut self,
        feature_shape: &[usize],
        window_size: u32,
    ) -> Result<(), ConfigError> {
        let block = self.block_mut();
        if let Some(&channels) = feature_shape.last() {
            block.set("in_channels", ParamValue::Int(channels as i64))?;
        }
        if block.descriptor("num_nodes").is_some() {
            if let Some(&nodes) = feature_shape.first() {
                block.set("num_nodes", ParamValue::Int(nodes as i64))?;
            }
        }
        for name in ["k", "K", "kernel_size", "history_window"] {
            if block.descriptor(name).is_some() {
                block.set(name, ParamValue::Int(window_size.into()))?;
            }
        }
        Ok(())
    }

    /// Keyword arguments for the model factory.
    pub fn to_kwargs(&self) -> Result<Map<String, Value>, ConfigError> {
        let value = match self {
            ModelParams::Gcn(p) => serde_json::to_value(p)?,
            ModelParams::Tgcn(p) => serde_json::to_value(p)?,
            ModelParams::Stgcn(p) => serde_json::to_value(p)?,
            ModelParams::Dcrnn(p) => serde_json::to_value(p)?,
            ModelParams::Agcrn(p) => serde_json::to_value(p)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

// ============================================================================
// Training settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimizer {
    #[default]
    Adam,
    AdamW,
    Sgd,
    RmsProp,
}

impl Optimizer {
    pub const ALL: [Optimizer; 4] = [
        Optimizer::Adam,
        Optimizer::AdamW,
        Optimizer::Sgd,
        Optimizer::RmsProp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Optimizer::Adam => "adam",
            Optimizer::AdamW => "adamw",
            Optimizer::Sgd => "sgd",
            Optimizer::RmsProp => "rmsprop",
        }
    }

    pub fn uses_momentum(&self) -> bool {
        matches!(self, Optimizer::Sgd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    #[default]
    Step,
    Plateau,
    None,
}

impl Scheduler {
    pub const ALL: [Scheduler; 3] = [Scheduler::Step, Scheduler::Plateau, Scheduler::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::Step => "step",
            Scheduler::Plateau => "plateau",
            Scheduler::None => "none",
        }
    }
}

/// Where training logs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    #[default]
    Local,
    Wandb,
    Both,
}

impl LogDestination {
    pub const ALL: [LogDestination; 3] = [
        LogDestination::Local,
        LogDestination::Wandb,
        LogDestination::Both,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogDestination::Local => "local",
            LogDestination::Wandb => "wandb",
            LogDestination::Both => "both",
        }
    }

    pub fn writes_local(&self) -> bool {
        matches!(self, LogDestination::Local | LogDestination::Both)
    }

    pub fn writes_remote(&self) -> bool {
        matches!(self, LogDestination::Wandb | LogDestination::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub model: ModelFamily,
    pub gcn: GcnParams,
    pub tgcn: TgcnParams,
    pub stgcn: StgcnParams,
    pub dcrnn: DcrnnParams,
    pub agcrn: AgcrnParams,
    pub graph_data_path: Option<PathBuf>,
    pub optimizer: Optimizer,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub momentum: f64,
    pub scheduler_type: Scheduler,
    pub lr_step_decay: u32,
    pub lr_decay_factor: f64,
    pub lr_patience: u32,
    pub test_ratio: f64,
    pub val_ratio: f64,
    pub num_epochs: u32,
    pub early_stopping: bool,
    pub es_patience: u32,
    pub batch_size: u32,
    pub log_destination: LogDestination,
    pub wandb_api_key: Option<String>,
    pub wandb_project: String,
    pub experiment_name: String,
    pub use_wandb: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            model: ModelFamily::Gcn,
            gcn: GcnParams::default(),
            tgcn: TgcnParams::default(),
            stgcn: StgcnParams::default(),
            dcrnn: DcrnnParams::default(),
            agcrn: AgcrnParams::default(),
            graph_data_path: None,
            optimizer: Optimizer::Adam,
            learning_rate: 0.001,
            weight_decay: 0.0,
            momentum: 0.9,
            scheduler_type: Scheduler::Step,
            lr_step_decay: 2,
            lr_decay_factor: 0.1,
            lr_patience: 2,
            test_ratio: 0.15,
            val_ratio: 0.15,
            num_epochs: 10,
            early_stopping: false,
            es_patience: 50,
            batch_size: 8,
            log_destination: LogDestination::Local,
            wandb_api_key: None,
            wandb_project: "stm_graph".to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            use_wandb: false,
            log_dir: None,
        }
    }
}

impl TrainingSettings {
    /// Snapshot of the selected family's block. Only this block is read by
    /// model creation and training.
    pub fn active(&self) -> ModelParams {
        match self.model {
            ModelFamily::Gcn => ModelParams::Gcn(self.gcn.clone()),
            ModelFamily::Tgcn => ModelParams::Tgcn(self.tgcn.clone()),
            ModelFamily::Stgcn => ModelParams::Stgcn(self.stgcn.clone()),
            ModelFamily::Dcrnn => ModelParams::Dcrnn(self.dcrnn.clone()),
            ModelFamily::Agcrn => ModelParams::Agcrn(self.agcrn.clone()),
        }
    }

    /// Write a block back into its family slot.
    pub fn store(&mut self, params: ModelParams) {
        match params {
            ModelParams::Gcn(p) => self.gcn = p,
            ModelParams::Tgcn(p) => self.tgcn = p,
            ModelParams::Stgcn(p) => self.stgcn = p,
            ModelParams::Dcrnn(p) => self.dcrnn = p,
            ModelParams::Agcrn(p) => self.agcrn = p,
        }
    }

    pub fn block(&self, family: ModelFamily) -> &dyn ParamBlock {
        match family {
            ModelFamily::Gcn => &self.gcn,
            ModelFamily::Tgcn => &self.tgcn,
            ModelFamily::Stgcn => &self.stgcn,
            ModelFamily::Dcrnn => &self.dcrnn,
            ModelFamily::Agcrn => &self.agcrn,
        }
    }

    pub fn block_mut(&mut self, family: ModelFamily) -> &mut dyn ParamBlock {
        match family {
            ModelFamily::Gcn => &mut self.gcn,
            ModelFamily::Tgcn => &mut self.tgcn,
            ModelFamily::Stgcn => &mut self.stgcn,
            ModelFamily::Dcrnn => &mut self.dcrnn,
            ModelFamily::Agcrn => &mut self.agcrn,
        }
    }
}
