//! Shared test utilities: a scripted graph toolkit and fixture writers

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use lopdf::{dictionary, Document, Object};
use serde_json::json;
use tempfile::TempDir;

use stmgraph::app::Session;
use stmgraph::config::Config;
use stmgraph::toolkit::{
    DatasetRequest, FeatureTable, GraphData, GraphRequest, GraphToolkit, Handle,
    LoadDatasetRequest, MappingOutput, MappingRequest, ModelHandle, ModelRequest,
    OsmFeatureRequest, PlotRequest, PreprocessRequest, ProcessedData, TemporalDataset,
    TrainRequest, TrainingReport,
};
use stmgraph::viewer::Rasterizer;
use stmgraph::wizard::Forms;

/// A PDF with one page per `(width, height)` entry.
pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = sizes
        .iter()
        .map(|&(width, height)| {
            let media_box: Vec<Object> = [0, 0, width, height]
                .into_iter()
                .map(Object::Integer)
                .collect();
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box,
            }))
        })
        .collect();
    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(kids.len() as i64),
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A one-page A4 PDF.
pub fn one_page_pdf() -> Vec<u8> {
    pdf_with_pages(&[(595, 842)])
}

/// A two-page PDF with differently sized pages.
pub fn two_page_pdf() -> Vec<u8> {
    pdf_with_pages(&[(595, 842), (842, 595)])
}

/// A PDF 1.5 file whose page tree and pages live in an object stream,
/// indexed by a cross-reference stream.
pub fn object_stream_pdf(pages: usize, size: (u32, u32)) -> Vec<u8> {
    let first_page = 3;
    let stream_id = first_page + pages;
    let xref_id = stream_id + 1;

    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", first_page + i)).collect();
    let mut members = vec![(
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {pages} >>",
            kids.join(" ")
        ),
    )];
    for i in 0..pages {
        members.push((
            first_page + i,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] >>",
                size.0, size.1
            ),
        ));
    }

    let mut header = String::new();
    let mut body = String::new();
    for (num, text) in &members {
        header.push_str(&format!("{num} {} ", body.len()));
        body.push_str(text);
        body.push('\n');
    }
    let content = format!("{header}{body}");

    let mut out = b"%PDF-1.5\n".to_vec();
    let catalog_offset = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let stream_offset = out.len();
    out.extend_from_slice(
        format!(
            "{stream_id} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n",
            members.len(),
            header.len(),
            content.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(content.as_bytes());
    out.extend_from_slice(b"\nendstream\nendobj\n");

    // Cross-reference stream rows: type (1 byte), field 2 (4 bytes), field 3 (2 bytes).
    let xref_offset = out.len();
    let mut rows = Vec::new();
    let mut row = |kind: u8, field: usize, extra: usize| {
        rows.push(kind);
        rows.extend_from_slice(&(field as u32).to_be_bytes());
        rows.extend_from_slice(&(extra as u16).to_be_bytes());
    };
    row(0, 0, 65535);
    row(1, catalog_offset, 0);
    for index in 0..members.len() {
        row(2, stream_id, index);
    }
    row(1, stream_offset, 0);
    row(1, xref_offset, 0);

    out.extend_from_slice(
        format!(
            "{xref_id} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            xref_id + 1,
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}

pub const TRAINING_LOG_LINES: [&str; 2] = ["epoch 1 loss 0.52", "epoch 2 loss 0.31"];

/// Graph toolkit that writes small artifacts instead of calling Python.
#[derive(Default)]
pub struct FakeToolkit {
    pub calls: Mutex<Vec<String>>,
    /// Operation name that should fail.
    pub fail: Option<&'static str>,
    /// How long `train` keeps running after writing its log.
    pub train_time: Duration,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self {
            train_time: Duration::from_millis(600),
            ..Self::default()
        }
    }

    pub fn failing(op: &'static str) -> Self {
        Self {
            fail: Some(op),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.fail == Some(op) {
            bail!("{op} exploded");
        }
        Ok(())
    }
}

fn write_pdf(dir: &Path, name: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), one_page_pdf()).unwrap();
}

impl GraphToolkit for FakeToolkit {
    fn preprocess(&self, request: &PreprocessRequest) -> Result<ProcessedData> {
        self.enter("preprocess")?;
        write_pdf(&request.output_dir.join("preprocess"), "points.pdf");
        Ok(ProcessedData {
            handle: Handle::new("points"),
            rows: 120,
            columns: 4,
            time_range: Some(("2024-01-01".to_string(), "2024-01-31".to_string())),
        })
    }

    fn create_mapping(&self, request: &MappingRequest) -> Result<MappingOutput> {
        self.enter("create_mapping")?;
        let dir = request.out_dir.join("mapping");
        write_pdf(&dir, "partitions.pdf");
        write_pdf(&dir, "points.pdf");
        Ok(MappingOutput {
            partitions: Handle::new("partitions"),
            points: Handle::new("mapped_points"),
            assignment: Handle::new("assignment"),
            regions: 16,
            points_total: 120,
            points_valid: 118,
        })
    }

    fn extract_osm_features(&self, _request: &OsmFeatureRequest) -> Result<FeatureTable> {
        self.enter("extract_osm_features")?;
        Ok(FeatureTable {
            handle: Handle::new("osm"),
            columns: 3,
            path: None,
        })
    }

    fn build_graph(&self, _request: &GraphRequest) -> Result<GraphData> {
        self.enter("build_graph")?;
        Ok(GraphData {
            handle: Handle::new("graph"),
            num_nodes: 16,
            num_edges: 48,
        })
    }

    fn create_temporal_dataset(&self, request: &DatasetRequest) -> Result<TemporalDataset> {
        self.enter("create_temporal_dataset")?;
        let path = request.out_dir.join(format!("{}.pt", request.dataset_name));
        fs::write(&path, b"dataset").unwrap();
        Ok(TemporalDataset {
            handle: Handle::new("dataset"),
            path: Some(path),
            time_steps: 30,
            feature_shape: vec![16, 5, 1],
        })
    }

    fn load_temporal_dataset(&self, request: &LoadDatasetRequest) -> Result<TemporalDataset> {
        self.enter("load_temporal_dataset")?;
        Ok(TemporalDataset {
            handle: Handle::new("loaded"),
            path: Some(request.path.clone()),
            time_steps: 30,
            feature_shape: vec![16, 5, 1],
        })
    }

    fn plot(&self, request: &PlotRequest) -> Result<PathBuf> {
        self.enter("plot")?;
        let dir = request.out_dir.join("graph");
        write_pdf(&dir, &format!("{}.pdf", request.filename));
        Ok(dir.join(format!("{}.pdf", request.filename)))
    }

    fn create_model(&self, request: &ModelRequest) -> Result<ModelHandle> {
        self.enter("create_model")?;
        Ok(ModelHandle {
            handle: Handle::new("model"),
            family: request.model_name,
            parameters: Some(1024),
        })
    }

    fn train(&self, request: &TrainRequest) -> Result<TrainingReport> {
        self.enter("train")?;
        if let Some(dir) = &request.log_dir {
            fs::create_dir_all(dir).unwrap();
            let text: String = TRAINING_LOG_LINES.iter().map(|l| format!("{l}\n")).collect();
            fs::write(dir.join("training.log"), text).unwrap();
        }
        thread::sleep(self.train_time);
        Ok(TrainingReport {
            summary: json!({"test_accuracy": 0.9, "test_f1": 0.85}),
        })
    }
}

/// Rasterizer that copies bytes around instead of rendering.
#[derive(Default)]
pub struct FakeRasterizer;

impl Rasterizer for FakeRasterizer {
    fn render_png(&self, _pdf: &Path, _page: usize, _size: (u32, u32), out: &Path) -> Result<()> {
        fs::write(out, b"\x89PNG\r\n\x1a\nfake")?;
        Ok(())
    }

    fn rasterize_pdf(&self, input: &Path, output: &Path, _dpi: u32) -> Result<()> {
        fs::copy(input, output)?;
        Ok(())
    }
}

/// Write a small CSV of geo-referenced events.
pub fn write_events_csv(dir: &Path) -> PathBuf {
    let path = dir.join("events.csv");
    let mut text = String::from("pickup_time,latitude,longitude,fare\n");
    for i in 0..20 {
        text.push_str(&format!(
            "2024-01-{:02} 08:00:00,40.{:03},-73.{:03},{}.5\n",
            i % 28 + 1,
            700 + i,
            900 + i,
            i
        ));
    }
    fs::write(&path, text).unwrap();
    path
}

/// A configuration that passes every validator.
pub fn ready_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.data_path = Some(write_events_csv(dir.path()));
    config.output_dir = Some(dir.path().join("out"));
    config.time_column = Some("pickup_time".to_string());
    config.lat_column = Some("latitude".to_string());
    config.long_column = Some("longitude".to_string());
    config.training.log_dir = Some(dir.path().join("logs"));
    config
}

pub fn session_with(config: Config, toolkit: Arc<FakeToolkit>) -> Session {
    let forms = Forms::from_config(&config);
    let mut session = Session::new(config, forms, toolkit, Arc::new(FakeRasterizer));
    session.set_log_watch_interval(Duration::from_millis(10));
    session
}
