//! Command-line argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::toolkit::bridge::DEFAULT_PYTHON;

/// STM-Graph - build spatio-temporal graph datasets and train GNNs on them
#[derive(Parser, Debug)]
#[command(name = "stmgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (JSON) to start from.
    /// Without it the wizard starts from the built-in defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Command that starts a stm_graph bridge server.
    /// Without it the bundled bridge script is run with --python.
    #[arg(long, global = true)]
    pub bridge: Option<String>,

    /// Python interpreter for the bundled bridge script
    #[arg(long, global = true, default_value = DEFAULT_PYTHON)]
    pub python: String,

    /// Write the application log here instead of the per-user log folder
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Program used to render PDF pages to PNG
    #[arg(long, global = true, default_value = "pdftocairo")]
    pub pdftocairo: String,

    /// Ghostscript program used to rasterize oversized PDF reports
    #[arg(long, global = true, default_value = "gs")]
    pub ghostscript: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the interactive wizard (the default)
    Wizard,

    /// Run the whole data and training pipeline from a configuration file
    Run {
        /// Skip the confirmation prompt before training
        #[arg(long, default_value = "false")]
        no_confirm: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output file path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

impl Cli {
    /// The subcommand to run, defaulting to the wizard.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Wizard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_wizard() {
        let cli = Cli::parse_from(["stmgraph"]);
        assert_eq!(cli.command(), Commands::Wizard);
        assert!(cli.bridge.is_none());
        assert_eq!(cli.python, DEFAULT_PYTHON);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_run_with_global_config() {
        let cli = Cli::parse_from(["stmgraph", "run", "--config", "cfg.json", "--no-confirm"]);
        assert_eq!(cli.command(), Commands::Run { no_confirm: true });
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
    }

    #[test]
    fn test_custom_bridge_command() {
        let cli = Cli::parse_from(["stmgraph", "--bridge", "python3 -m my_bridge", "run"]);
        assert_eq!(cli.bridge.as_deref(), Some("python3 -m my_bridge"));
    }

    #[test]
    fn test_init_config() {
        let cli = Cli::parse_from(["stmgraph", "init-config", "out.json", "--force"]);
        assert_eq!(
            cli.command(),
            Commands::InitConfig {
                path: PathBuf::from("out.json"),
                force: true
            }
        );
    }
}
