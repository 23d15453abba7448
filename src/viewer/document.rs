//! PDF structure: page count and page sizes.
//!
//! Rendering is delegated to an external rasterizer; the viewer only needs
//! enough structure to navigate pages and size exports.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};

use super::ViewerError;

/// US Letter, used when a page declares no MediaBox.
pub const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Page tree depth limit when looking up inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfDocument {
    pub path: PathBuf,
    pub page_count: usize,
    /// Page sizes in points, one per page.
    page_sizes: Vec<(f64, f64)>,
    pub file_size: u64,
}

impl PdfDocument {
    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let data = fs::read(path).map_err(|source| ViewerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &data)
    }

    pub fn parse(path: &Path, data: &[u8]) -> Result<Self, ViewerError> {
        if !data.starts_with(b"%PDF-") {
            return Err(ViewerError::NotPdfData(path.to_path_buf()));
        }
        let malformed = |reason: String| ViewerError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let document = Document::load_mem(data).map_err(|e| malformed(e.to_string()))?;
        let page_sizes: Vec<(f64, f64)> = document
            .get_pages()
            .into_values()
            .map(|id| page_size(&document, id).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();
        if page_sizes.is_empty() {
            return Err(malformed("document has no pages".to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            page_count: page_sizes.len(),
            page_sizes,
            file_size: data.len() as u64,
        })
    }

    /// Size of a page in points.
    pub fn page_size(&self, page: usize) -> (f64, f64) {
        self.page_sizes
            .get(page)
            .or_else(|| self.page_sizes.first())
            .copied()
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// MediaBox size of a page, following inheritance up the page tree.
/// A 90 or 270 degree `/Rotate` swaps width and height.
fn page_size(document: &Document, page: ObjectId) -> Option<(f64, f64)> {
    let (width, height) = box_size(document, inherited(document, page, b"MediaBox")?)?;
    let rotate = inherited(document, page, b"Rotate")
        .and_then(|value| number(resolve(document, value)?))
        .unwrap_or(0.0);
    if (rotate as i64).rem_euclid(180) == 90 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

fn inherited<'a>(document: &'a Document, page: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = document.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn box_size(document: &Document, value: &Object) -> Option<(f64, f64)> {
    let corners: Vec<f64> = resolve(document, value)?
        .as_array()
        .ok()?
        .iter()
        .filter_map(|item| number(resolve(document, item)?))
        .collect();
    match corners[..] {
        [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Build a PDF whose page tree carries `tree_box` and whose pages carry
    /// their own boxes where given.
    fn build(tree_box: Option<[i64; 4]>, pages: &[(Option<[i64; 4]>, i64)]) -> Vec<u8> {
        let to_array = |b: [i64; 4]| Object::Array(b.iter().map(|&v| Object::Integer(v)).collect());
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = pages
            .iter()
            .map(|&(media_box, rotate)| {
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                };
                if let Some(b) = media_box {
                    page.set("MediaBox", to_array(b));
                }
                if rotate != 0 {
                    page.set("Rotate", Object::Integer(rotate));
                }
                Object::Reference(doc.add_object(page))
            })
            .collect();
        let mut tree = dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(kids.len() as i64),
            "Kids" => kids,
        };
        if let Some(b) = tree_box {
            tree.set("MediaBox", to_array(b));
        }
        doc.objects.insert(pages_id, Object::Dictionary(tree));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_page_count_and_sizes() {
        let data = build(None, &[(Some([0, 0, 595, 842]), 0), (Some([0, 0, 842, 595]), 0)]);
        let doc = PdfDocument::parse(Path::new("a.pdf"), &data).unwrap();
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.page_size(0), (595.0, 842.0));
        assert_eq!(doc.page_size(1), (842.0, 595.0));
        assert_eq!(doc.page_size(7), (595.0, 842.0));
    }

    #[test]
    fn test_media_box_inherited_from_page_tree() {
        let data = build(Some([0, 0, 400, 300]), &[(None, 0), (Some([10, 10, 110, 60]), 0)]);
        let doc = PdfDocument::parse(Path::new("a.pdf"), &data).unwrap();
        assert_eq!(doc.page_size(0), (400.0, 300.0));
        assert_eq!(doc.page_size(1), (100.0, 50.0));
    }

    #[test]
    fn test_rotated_page_swaps_size() {
        let data = build(None, &[(Some([0, 0, 595, 842]), 90), (Some([0, 0, 595, 842]), 180)]);
        let doc = PdfDocument::parse(Path::new("a.pdf"), &data).unwrap();
        assert_eq!(doc.page_size(0), (842.0, 595.0));
        assert_eq!(doc.page_size(1), (595.0, 842.0));
    }

    #[test]
    fn test_default_size_without_media_box() {
        let data = build(None, &[(None, 0)]);
        let doc = PdfDocument::parse(Path::new("a.pdf"), &data).unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.page_size(0), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = PdfDocument::parse(Path::new("a.pdf"), b"hello").unwrap_err();
        assert!(matches!(err, ViewerError::NotPdfData(_)));
    }

    #[test]
    fn test_truncated_pdf_is_malformed() {
        let err = PdfDocument::parse(Path::new("a.pdf"), b"%PDF-1.7\n1 0 obj\n").unwrap_err();
        assert!(matches!(err, ViewerError::Malformed { .. }));
    }
}
