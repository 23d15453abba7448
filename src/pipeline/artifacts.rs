//! Report artifacts written by the toolkit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::viewer::Rasterizer;

/// PDFs at or above this size get a rasterized companion for faster viewing.
pub const RASTERIZE_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;
pub const RASTERIZE_DPI: u32 = 200;
pub const RASTERIZED_SUFFIX: &str = "_rasterized";

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Sorted PDF files directly inside `folder`.
pub fn list_pdfs(folder: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Companion path `<stem>_rasterized.pdf` for a PDF.
pub fn rasterized_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{RASTERIZED_SUFFIX}.pdf"))
}

/// Keep `<name>_rasterized.pdf` in place of `<name>.pdf` when both exist.
pub fn prefer_rasterized(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let shadowed: Vec<PathBuf> = files
        .iter()
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.ends_with(RASTERIZED_SUFFIX))
        })
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let original = stem.strip_suffix(RASTERIZED_SUFFIX)?;
            Some(path.with_file_name(format!("{original}.pdf")))
        })
        .collect();

    files
        .into_iter()
        .filter(|path| !shadowed.contains(path))
        .collect()
}

/// Write rasterized companions for oversized PDFs in `folder`.
///
/// Returns the companions created. A failing rasterizer is logged and skipped;
/// the original PDF stays viewable.
pub fn rasterize_oversized(folder: &Path, rasterizer: &dyn Rasterizer) -> Vec<PathBuf> {
    let files = match list_pdfs(folder) {
        Ok(files) => files,
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "Cannot list report folder");
            return Vec::new();
        }
    };

    let mut created = Vec::new();
    for path in files {
        let is_companion = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(RASTERIZED_SUFFIX));
        if is_companion {
            continue;
        }
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size < RASTERIZE_THRESHOLD_BYTES {
            continue;
        }

        let target = rasterized_path(&path);
        match rasterizer.rasterize_pdf(&path, &target, RASTERIZE_DPI) {
            Ok(()) => {
                info!(source = %path.display(), size, "Rasterized oversized report");
                created.push(target);
            }
            Err(e) => {
                warn!(source = %path.display(), error = %format!("{e:#}"), "Rasterization skipped");
            }
        }
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterized_path() {
        assert_eq!(
            rasterized_path(Path::new("out/preprocess/density.pdf")),
            PathBuf::from("out/preprocess/density_rasterized.pdf")
        );
    }

    #[test]
    fn test_prefer_rasterized_replaces_original() {
        let files = vec![
            PathBuf::from("a.pdf"),
            PathBuf::from("a_rasterized.pdf"),
            PathBuf::from("b.pdf"),
        ];
        assert_eq!(
            prefer_rasterized(files),
            vec![PathBuf::from("a_rasterized.pdf"), PathBuf::from("b.pdf")]
        );
    }
}
