//! Merges a chapter's downloaded images into a single PDF.
//!
//! Each image becomes one PDF page sized to the image's pixel
//! dimensions, so nothing is rescaled or recompressed beyond the PDF
//! embedding itself. Page order follows the input path order.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::image_crate::GenericImageView;
use printpdf::image_crate::io::Reader as ImageReader;
use printpdf::{Image, ImageTransform, Mm, PdfDocument};

use crate::error::ArchiveError;

/// Render density for page sizing; images are embedded 1:1 at this dpi.
const DPI: f64 = 96.0;

fn px_to_mm(px: u32) -> f64 {
    px as f64 * 25.4 / DPI
}

/// Converts an ordered image sequence into a single PDF at `pdf_path`.
pub fn images_to_pdf(image_paths: &[PathBuf], pdf_path: &Path) -> Result<(), ArchiveError> {
    if image_paths.is_empty() {
        return Err(ArchiveError::NoImages);
    }

    let title = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("chapter");

    let mut document: Option<printpdf::PdfDocumentReference> = None;
    for path in image_paths {
        let decoded = ImageReader::open(path)
            .map_err(|e| ArchiveError::ReadImage {
                path: path.clone(),
                source: e,
            })?
            .with_guessed_format()
            .map_err(|e| ArchiveError::ReadImage {
                path: path.clone(),
                source: e,
            })?
            .decode()
            .map_err(|e| ArchiveError::DecodeImage {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let (width, height) = decoded.dimensions();
        let page_width = Mm(px_to_mm(width) as f32);
        let page_height = Mm(px_to_mm(height) as f32);

        let (doc, page, layer) = match document.take() {
            None => {
                let (doc, page, layer) = PdfDocument::new(title, page_width, page_height, "images");
                (doc, page, layer)
            }
            Some(doc) => {
                let (page, layer) = doc.add_page(page_width, page_height, "images");
                (doc, page, layer)
            }
        };

        let pdf_image = Image::from_dynamic_image(&decoded);
        pdf_image.add_to_layer(
            doc.get_page(page).get_layer(layer),
            ImageTransform {
                dpi: Some(DPI as f32),
                ..Default::default()
            },
        );
        document = Some(doc);
    }

    // The emptiness check above guarantees at least one page was added.
    let doc = document.expect("document built from at least one image");

    let file = File::create(pdf_path).map_err(|e| ArchiveError::WritePdf {
        path: pdf_path.to_path_buf(),
        message: e.to_string(),
    })?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ArchiveError::WritePdf {
            path: pdf_path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(())
}

/// Removes the source images of an archived chapter and prunes the
/// chapter directory when it is left empty.
///
/// Returns the paths that could not be removed.
pub fn remove_images(image_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut failed = Vec::new();
    for path in image_paths {
        if std::fs::remove_file(path).is_err() {
            failed.push(path.clone());
        }
    }

    if let Some(dir) = image_paths.first().and_then(|p| p.parent()) {
        let is_empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            let _ = std::fs::remove_dir(dir);
        }
    }

    failed
}
