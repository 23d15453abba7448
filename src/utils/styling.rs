//! Terminal styling for the headless runner

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

use crate::config::Config;

pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static MAP: Emoji<'_, '_> = Emoji("🗺️  ", "");
pub static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");

const BOX_WIDTH: usize = 60;

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("STM-Graph").cyan().bold(),
        style(format!("v{version}")).dim()
    );
    println!(
        "    {}",
        style("Spatio-temporal graph datasets and GNN training").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print the configuration card
pub fn print_config(config: &Config) {
    let line = "─".repeat(BOX_WIDTH - 2);
    let value_width = BOX_WIDTH - 16;
    let path = |p: Option<&Path>| {
        p.map(|p| truncate_path(p, value_width))
            .unwrap_or_else(|| "(not set)".to_string())
    };

    println!("    ┌{}┐", line);
    println!("    │ {:<w$}│", style("Configuration").cyan().bold(), w = BOX_WIDTH - 3);
    println!("    ├{}┤", line);
    println!(
        "    │  {}Data:   {:<w$}│",
        FOLDER,
        path(config.data_path.as_deref()),
        w = value_width
    );
    println!(
        "    │  {}Output: {:<w$}│",
        SAVE,
        path(config.output_dir.as_deref()),
        w = value_width
    );
    println!(
        "    │  {}Map:    {:<w$}│",
        MAP,
        config.mapping.mapping.as_str(),
        w = value_width
    );
    println!(
        "    │  {}Model:  {:<w$}│",
        BRAIN,
        format!(
            "{} ({}, {} epochs)",
            config.training.model,
            config.app_type.as_str(),
            config.training.num_epochs
        ),
        w = value_width
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("took {}", format_duration(elapsed))).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("STM-Graph run complete!").green().bold()
    );
    println!();
}

pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    } else {
        format!("{secs:.1}s")
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - max_len + 3).collect();
        format!("...{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_tail() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("/a/very/long/path.csv", 10), "...ath.csv");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
