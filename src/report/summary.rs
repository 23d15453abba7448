//! Run summary for the headless runner

use std::path::PathBuf;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::app::Results;
use crate::pipeline::TaskKind;
use crate::toolkit::MappingStrategy;
use crate::utils::format_duration;

/// What a full pipeline run produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub records: Option<usize>,
    pub strategy: Option<String>,
    pub regions: Option<usize>,
    pub points_mapped: Option<(usize, usize)>,
    pub nodes: Option<usize>,
    pub edges: Option<usize>,
    pub snapshots: Option<usize>,
    pub dataset_path: Option<PathBuf>,
    pub plot_path: Option<PathBuf>,
    pub model: Option<String>,
    pub metrics: Vec<(String, f64)>,
    pub timings: Vec<(TaskKind, Duration)>,
}

impl RunSummary {
    pub fn record(&mut self, kind: TaskKind, elapsed: Duration) {
        self.timings.push((kind, elapsed));
    }

    /// Copy the interesting numbers out of the session results.
    pub fn collect(&mut self, results: &Results, strategy: Option<&MappingStrategy>) {
        self.records = results.processed.as_ref().map(|p| p.rows);
        self.strategy = strategy.map(|s| s.label().to_string());
        if let Some(mapping) = &results.mapping {
            self.regions = Some(mapping.regions);
            self.points_mapped = Some((mapping.points_valid, mapping.points_total));
        }
        if let Some(generated) = &results.generated {
            self.nodes = Some(generated.graph.num_nodes);
            self.edges = Some(generated.graph.num_edges);
            self.snapshots = Some(generated.dataset.time_steps);
            self.dataset_path = generated.dataset.path.clone();
        }
        self.plot_path = results.plot_path.clone();
        self.model = results
            .model
            .as_ref()
            .map(|m| m.params.family().to_string());
        self.metrics = results
            .training
            .as_ref()
            .map(|t| t.metrics())
            .unwrap_or_default();
    }

    pub fn total_time(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        let mut row = |label: &str, value: String| {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        };
        if let Some(records) = self.records {
            row("📁 Records", records.to_string());
        }
        if let Some(strategy) = &self.strategy {
            row("🗺️  Mapping", strategy.clone());
        }
        if let Some(regions) = self.regions {
            row("🔲 Regions", regions.to_string());
        }
        if let Some((valid, total)) = self.points_mapped {
            row("📍 Points mapped", format!("{valid} / {total}"));
        }
        if let (Some(nodes), Some(edges)) = (self.nodes, self.edges) {
            row("🔗 Graph", format!("{nodes} nodes, {edges} edges"));
        }
        if let Some(snapshots) = self.snapshots {
            row("⏱️  Snapshots", snapshots.to_string());
        }
        if let Some(path) = &self.dataset_path {
            row("💾 Dataset", path.display().to_string());
        }
        if let Some(path) = &self.plot_path {
            row("📊 Plot", path.display().to_string());
        }
        if let Some(model) = &self.model {
            row("🧠 Model", model.clone());
        }

        for (name, value) in &self.metrics {
            table.add_row(vec![
                Cell::new(format!("✅ {name}")),
                Cell::new(format!("{value:.4}"))
                    .fg(Color::Green)
                    .add_attribute(Attribute::Bold),
            ]);
        }
        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        // Indent the table
        for line in self.table().to_string().lines() {
            println!("    {}", line);
        }

        if !self.timings.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("⏱").cyan(),
                style("STEP TIMINGS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for (kind, elapsed) in &self.timings {
                println!(
                    "      {:<18} {}",
                    kind.label(),
                    style(format_duration(*elapsed)).yellow()
                );
            }
            println!(
                "      {:<18} {}",
                style("Total").bold(),
                style(format_duration(self.total_time())).yellow().bold()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_metrics() {
        let summary = RunSummary {
            records: Some(1200),
            metrics: vec![("test_accuracy".to_string(), 0.875)],
            ..Default::default()
        };
        let rendered = summary.table().to_string();
        assert!(rendered.contains("1200"));
        assert!(rendered.contains("test_accuracy"));
        assert!(rendered.contains("0.8750"));
    }

    #[test]
    fn test_total_time_sums_steps() {
        let mut summary = RunSummary::default();
        summary.record(TaskKind::Preprocess, Duration::from_secs(2));
        summary.record(TaskKind::Map, Duration::from_secs(3));
        assert_eq!(summary.total_time(), Duration::from_secs(5));
    }
}
