//! STM-Graph CLI
//!
//! Starts the terminal wizard by default; `run` executes the whole pipeline
//! from a configuration file and `init-config` writes the defaults.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;

use stmgraph::app::Session;
use stmgraph::cli::{run_headless, run_wizard, Cli, Commands};
use stmgraph::config::Config;
use stmgraph::logging;
use stmgraph::pipeline::is_supported_data_file;
use stmgraph::toolkit::PythonBridge;
use stmgraph::utils::{print_completion, print_success};
use stmgraph::viewer::ExternalRasterizer;
use stmgraph::wizard::Forms;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command();
    if let Commands::InitConfig { path, force } = &command {
        return init_config(path, *force);
    }

    if matches!(command, Commands::Run { .. }) && cli.config.is_none() {
        bail!("`run` needs a configuration file. Use -c/--config to specify one.");
    }

    let (_guard, log_path) = logging::init(cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let forms = match &cli.config {
        Some(_) => Forms::from_config(&config),
        None => Forms::initial(&config),
    };
    let toolkit = Arc::new(match &cli.bridge {
        Some(command) => PythonBridge::from_command_line(command)?,
        None => PythonBridge::bundled(&cli.python, &logging::app_data_dir()?)?,
    });
    let rasterizer = Arc::new(ExternalRasterizer::new(
        cli.pdftocairo.clone(),
        cli.ghostscript.clone(),
    ));
    let data_path = config.data_path.clone();
    let mut session = Session::new(config, forms, toolkit, rasterizer);

    match command {
        Commands::Wizard => {
            // Re-read the configured data file so its columns can be changed.
            if let Some(path) = data_path.filter(|p| p.is_file() && is_supported_data_file(p)) {
                session.select_data_file(&path);
            }
            tracing::info!("Starting wizard");
            run_wizard(&mut session, cli.config.clone())?;
            println!("Log written to {}", log_path.display());
        }
        Commands::Run { no_confirm } => {
            tracing::info!("Starting headless run");
            if let Some(summary) = run_headless(&mut session, no_confirm)? {
                summary.display();
                print_completion();
            }
        }
        Commands::InitConfig { .. } => {}
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    Config::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    print_success(&format!(
        "Default configuration written to {}",
        style(path.display()).cyan()
    ));
    Ok(())
}
