//! Page export and external rasterization.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use super::ViewerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Svg,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Png, ExportFormat::Svg, ExportFormat::Pdf];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn filter_label(&self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG Image (*.png)",
            ExportFormat::Svg => "SVG Image (*.svg)",
            ExportFormat::Pdf => "PDF File (*.pdf)",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "svg" => Some(ExportFormat::Svg),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

/// Decide the output path and format of an export.
///
/// A known extension wins. Otherwise the selected filter's extension replaces
/// whatever extension the path had.
pub fn resolve_export_target(
    path: &Path,
    selected: Option<ExportFormat>,
) -> Result<(PathBuf, ExportFormat), ViewerError> {
    let from_path = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ExportFormat::from_extension);
    if let Some(format) = from_path {
        return Ok((path.to_path_buf(), format));
    }

    match selected {
        Some(format) => Ok((path.with_extension(format.extension()), format)),
        None => Err(ViewerError::UnknownFileType),
    }
}

/// Pixel size of a rendered page: points times scale, truncated.
pub fn export_pixel_size(page_points: (f64, f64), scale: f64) -> (u32, u32) {
    let w = (page_points.0 * scale).max(1.0) as u32;
    let h = (page_points.1 * scale).max(1.0) as u32;
    (w, h)
}

/// SVG document wrapping a PNG image as a base64 data URI.
pub fn svg_with_png(png: &[u8], size: (u32, u32)) -> String {
    let (w, h) = size;
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" ",
            "xmlns:xlink=\"http://www.w3.org/1999/xlink\" ",
            "width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            "  <image width=\"{w}\" height=\"{h}\" xlink:href=\"data:image/png;base64,{data}\"/>\n",
            "</svg>\n"
        ),
        w = w,
        h = h,
        data = STANDARD.encode(png)
    )
}

/// Renders PDF pages to images.
pub trait Rasterizer: Send + Sync {
    /// Render one page (0-based) to a PNG of exactly `size` pixels.
    fn render_png(&self, pdf: &Path, page: usize, size: (u32, u32), out: &Path) -> Result<()>;

    /// Re-encode a whole PDF with every page as an image at `dpi`.
    fn rasterize_pdf(&self, input: &Path, output: &Path, dpi: u32) -> Result<()>;
}

/// Rasterizer backed by `pdftocairo` (poppler) and ghostscript.
#[derive(Debug, Clone)]
pub struct ExternalRasterizer {
    pdftocairo: String,
    ghostscript: String,
}

impl Default for ExternalRasterizer {
    fn default() -> Self {
        Self::new("pdftocairo", "gs")
    }
}

impl ExternalRasterizer {
    pub fn new(pdftocairo: impl Into<String>, ghostscript: impl Into<String>) -> Self {
        Self {
            pdftocairo: pdftocairo.into(),
            ghostscript: ghostscript.into(),
        }
    }
}

fn run(mut command: Command, program: &str) -> Result<()> {
    debug!(?command, "Running rasterizer");
    let output = command
        .output()
        .with_context(|| format!("Failed to run {program}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(())
}

impl Rasterizer for ExternalRasterizer {
    fn render_png(&self, pdf: &Path, page: usize, size: (u32, u32), out: &Path) -> Result<()> {
        // pdftocairo appends ".png" to the output root itself.
        let root = out.with_extension("");
        let page = (page + 1).to_string();
        let mut command = Command::new(&self.pdftocairo);
        command
            .args(["-png", "-singlefile", "-f", &page, "-l", &page])
            .args(["-scale-to-x", &size.0.to_string()])
            .args(["-scale-to-y", &size.1.to_string()])
            .arg(pdf)
            .arg(&root);
        run(command, &self.pdftocairo)?;

        let produced = root.with_extension("png");
        if produced != out {
            fs::rename(&produced, out)
                .with_context(|| format!("Failed to move {}", produced.display()))?;
        }
        Ok(())
    }

    fn rasterize_pdf(&self, input: &Path, output: &Path, dpi: u32) -> Result<()> {
        let mut command = Command::new(&self.ghostscript);
        command
            .args(["-dNOPAUSE", "-dBATCH", "-dQUIET", "-sDEVICE=pdfimage24"])
            .arg(format!("-r{dpi}"))
            .arg(format!("-sOutputFile={}", output.display()))
            .arg(input);
        run(command, &self.ghostscript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extension_wins_over_filter() {
        let (path, format) =
            resolve_export_target(Path::new("/tmp/page.svg"), Some(ExportFormat::Png)).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/page.svg"));
        assert_eq!(format, ExportFormat::Svg);
    }

    #[test]
    fn test_filter_replaces_unknown_extension() {
        let (path, format) =
            resolve_export_target(Path::new("/tmp/page.txt"), Some(ExportFormat::Pdf)).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/page.pdf"));
        assert_eq!(format, ExportFormat::Pdf);

        let (path, _) = resolve_export_target(Path::new("report"), Some(ExportFormat::Png)).unwrap();
        assert_eq!(path, PathBuf::from("report.png"));
    }

    #[test]
    fn test_unknown_without_filter() {
        let err = resolve_export_target(Path::new("page.txt"), None).unwrap_err();
        assert_eq!(err.to_string(), "Unknown file type");
    }

    #[test]
    fn test_pixel_size_scales_points() {
        assert_eq!(export_pixel_size((612.0, 792.0), 1.0), (612, 792));
        assert_eq!(export_pixel_size((612.0, 792.0), 1.25), (765, 990));
    }

    #[test]
    fn test_svg_embeds_png() {
        let svg = svg_with_png(b"\x89PNG", (10, 20));
        assert!(svg.contains("width=\"10\" height=\"20\""));
        assert!(svg.contains("data:image/png;base64,iVBORw=="));
    }
}
