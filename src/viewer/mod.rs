//! PDF artifact viewer.
//!
//! Holds an ordered list of report files and the currently loaded document.
//! Loads run on a worker; a load always fully replaces the previous document,
//! and the previous document stays visible until the new one has loaded.

pub mod document;
pub mod export;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::artifacts;
use crate::worker::{DispatchError, Dispatcher, Ticket};

pub use document::PdfDocument;
pub use export::{
    export_pixel_size, resolve_export_target, svg_with_png, ExportFormat, ExternalRasterizer,
    Rasterizer,
};

pub const ZOOM_IN_FACTOR: f64 = 1.25;
pub const ZOOM_OUT_FACTOR: f64 = 0.8;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Folder contains no PDF files.")]
    NoPdfs(PathBuf),

    #[error("Cannot read folder {path}: {source}")]
    ReadFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a PDF:\n{}", .0.display())]
    NotPdf(PathBuf),

    #[error("File is not a valid PDF: {}", .0.display())]
    NotPdfData(PathBuf),

    #[error("Cannot read PDF structure of {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown file type")]
    UnknownFileType,

    #[error("No document loaded")]
    NothingLoaded,

    #[error("Failed to copy PDF: {0}")]
    Copy(#[source] std::io::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render page: {0}")]
    Render(String),

    #[error("Failed to open system viewer: {0}")]
    Open(#[source] std::io::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zoom {
    FitWidth,
    Custom(f64),
}

impl Zoom {
    /// Scale used for rendering exports.
    pub fn factor(&self) -> f64 {
        match self {
            Zoom::FitWidth => 1.0,
            Zoom::Custom(f) => *f,
        }
    }
}

/// Outcome of an asynchronous load, reported by [`PdfViewer::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Loaded(PathBuf),
    Failed { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LoadSlot;

pub struct PdfViewer {
    files: Vec<PathBuf>,
    current: usize,
    document: Option<PdfDocument>,
    loading: Option<(Ticket, PathBuf)>,
    zoom: Zoom,
    page: usize,
    loader: Dispatcher<LoadSlot, PdfDocument>,
}

impl Default for PdfViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfViewer {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            current: 0,
            document: None,
            loading: None,
            zoom: Zoom::FitWidth,
            page: 0,
            loader: Dispatcher::new(),
        }
    }

    // ------------------------------------------------------------------
    // File list
    // ------------------------------------------------------------------

    /// Show the PDFs in `folder`, starting with the first.
    pub fn load_folder(&mut self, folder: &Path) -> Result<(), ViewerError> {
        let files = artifacts::list_pdfs(folder).map_err(|source| ViewerError::ReadFolder {
            path: folder.to_path_buf(),
            source,
        })?;
        let files = artifacts::prefer_rasterized(files);
        if files.is_empty() {
            return Err(ViewerError::NoPdfs(folder.to_path_buf()));
        }

        info!(folder = %folder.display(), count = files.len(), "Loading report folder");
        self.files = files;
        self.current = 0;
        self.request_load()
    }

    /// Show a single PDF file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ViewerError> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !path.is_file() || !is_pdf {
            return Err(ViewerError::NotPdf(path.to_path_buf()));
        }

        self.files = vec![path.to_path_buf()];
        self.current = 0;
        self.request_load()
    }

    pub fn has_next_file(&self) -> bool {
        self.current + 1 < self.files.len()
    }

    pub fn has_prev_file(&self) -> bool {
        !self.files.is_empty() && self.current > 0
    }

    pub fn next_file(&mut self) -> Result<bool, ViewerError> {
        if !self.has_next_file() {
            return Ok(false);
        }
        self.current += 1;
        self.request_load()?;
        Ok(true)
    }

    pub fn prev_file(&mut self) -> Result<bool, ViewerError> {
        if !self.has_prev_file() {
            return Ok(false);
        }
        self.current -= 1;
        self.request_load()?;
        Ok(true)
    }

    fn request_load(&mut self) -> Result<(), ViewerError> {
        let path = self.files[self.current].clone();
        let target = path.clone();
        let ticket = self.loader.supersede(LoadSlot, move || {
            PdfDocument::load(&target).map_err(anyhow::Error::from)
        })?;
        self.loading = Some((ticket, path));
        Ok(())
    }

    /// Apply finished loads. Call once per UI tick.
    pub fn poll(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        for completion in self.loader.poll() {
            let Some((ticket, path)) = self.loading.take() else {
                continue;
            };
            if ticket != completion.ticket {
                self.loading = Some((ticket, path));
                continue;
            }

            match completion.result {
                Ok(document) => {
                    self.document = Some(document);
                    self.zoom = Zoom::FitWidth;
                    self.page = 0;
                    events.push(ViewerEvent::Loaded(path));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "PDF load failed");
                    events.push(ViewerEvent::Failed {
                        message: format!("Failed to load:\n{}", path.display()),
                        path,
                    });
                }
            }
        }
        events
    }

    /// Block until the pending load finishes or `timeout` elapses.
    pub fn wait_loaded(&mut self, timeout: Duration) -> Vec<ViewerEvent> {
        let deadline = std::time::Instant::now() + timeout;
        let mut events = Vec::new();
        while self.is_loading() && std::time::Instant::now() < deadline {
            events.extend(self.poll());
            if self.is_loading() {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        events
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.files.get(self.current).map(PathBuf::as_path)
    }

    pub fn document(&self) -> Option<&PdfDocument> {
        self.document.as_ref()
    }

    // ------------------------------------------------------------------
    // Page and zoom
    // ------------------------------------------------------------------

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn zoom_in(&mut self) {
        self.zoom = Zoom::Custom(self.zoom.factor() * ZOOM_IN_FACTOR);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = Zoom::Custom(self.zoom.factor() * ZOOM_OUT_FACTOR);
    }

    pub fn zoom_fit(&mut self) {
        self.zoom = Zoom::FitWidth;
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn next_page(&mut self) -> bool {
        match &self.document {
            Some(doc) if self.page + 1 < doc.page_count => {
                self.page += 1;
                true
            }
            _ => false,
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.document.is_some() && self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Default export location: the current file name in the working directory.
    pub fn default_export_path(&self) -> Option<PathBuf> {
        let name = self.document.as_ref()?.path.file_stem()?.to_owned();
        Some(std::env::current_dir().ok()?.join(name))
    }

    /// Export the current page (PNG/SVG) or copy the whole PDF.
    pub fn save_as(
        &self,
        path: &Path,
        selected: Option<ExportFormat>,
        rasterizer: &dyn Rasterizer,
    ) -> Result<PathBuf, ViewerError> {
        let document = self.document.as_ref().ok_or(ViewerError::NothingLoaded)?;
        let (target, format) = resolve_export_target(path, selected)?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ViewerError::Write {
                path: target.clone(),
                source,
            })?;
        }

        let size = export_pixel_size(document.page_size(self.page), self.zoom.factor());
        match format {
            ExportFormat::Pdf => {
                fs::copy(&document.path, &target).map_err(ViewerError::Copy)?;
            }
            ExportFormat::Png => {
                rasterizer
                    .render_png(&document.path, self.page, size, &target)
                    .map_err(|e| ViewerError::Render(format!("{e:#}")))?;
            }
            ExportFormat::Svg => {
                let scratch = target.with_extension("render.png");
                rasterizer
                    .render_png(&document.path, self.page, size, &scratch)
                    .map_err(|e| ViewerError::Render(format!("{e:#}")))?;
                let png = fs::read(&scratch).map_err(|source| ViewerError::Read {
                    path: scratch.clone(),
                    source,
                });
                let _ = fs::remove_file(&scratch);
                fs::write(&target, svg_with_png(&png?, size)).map_err(|source| {
                    ViewerError::Write {
                        path: target.clone(),
                        source,
                    }
                })?;
            }
        }

        info!(target = %target.display(), ?format, "Exported page");
        Ok(target)
    }

    /// Open the current document in the desktop's PDF viewer.
    pub fn open_external(&self) -> Result<(), ViewerError> {
        let document = self.document.as_ref().ok_or(ViewerError::NothingLoaded)?;
        open::that(&document.path).map_err(ViewerError::Open)
    }
}
