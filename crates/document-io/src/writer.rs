//! Output assembly: redacted rasters muxed back into a container that
//! mirrors the input pagination.

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use shared_types::{PageRaster, TextSpan};

use crate::sniff::SourceKind;
use crate::{DocumentError, DocumentResult};

const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Sink for redacted pages, fed strictly in ascending page order.
pub trait OutputWriter: Send {
    /// Append the next page. `text_spans`, when present, is the scrubbed
    /// text layer to embed for extraction parity.
    fn write_page(
        &mut self,
        raster: &PageRaster,
        dpi: u32,
        text_spans: Option<&[TextSpan]>,
    ) -> DocumentResult<()>;

    /// Assemble and return the output container bytes.
    fn finish(self: Box<Self>) -> DocumentResult<Vec<u8>>;
}

/// Construct the writer matching an input container: paginated sources get
/// a paginated output, raster sources a raster output.
pub fn writer_for(kind: SourceKind) -> Box<dyn OutputWriter> {
    match kind {
        SourceKind::Pdf => Box::new(PdfPageWriter::new()),
        _ => Box::new(ImageWriter::new()),
    }
}

struct PendingPage {
    jpeg: Vec<u8>,
    width_px: u32,
    height_px: u32,
    dpi: u32,
    spans: Vec<TextSpan>,
}

/// Builds a PDF embedding each redacted page raster as a JPEG XObject at
/// its rasterization DPI, plus an invisible (render mode 3) scrubbed text
/// layer so text extraction sees only neutral glyphs.
#[derive(Default)]
pub struct PdfPageWriter {
    pages: Vec<PendingPage>,
}

impl PdfPageWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputWriter for PdfPageWriter {
    fn write_page(
        &mut self,
        raster: &PageRaster,
        dpi: u32,
        text_spans: Option<&[TextSpan]>,
    ) -> DocumentResult<()> {
        let img = RgbImage::from_raw(raster.width(), raster.height(), raster.to_vec())
            .ok_or_else(|| DocumentError::WriteFailed("raster buffer size mismatch".into()))?;
        let mut jpeg = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut jpeg, image::ImageFormat::Jpeg)
            .map_err(|e| DocumentError::WriteFailed(e.to_string()))?;

        self.pages.push(PendingPage {
            jpeg: jpeg.into_inner(),
            width_px: raster.width(),
            height_px: raster.height(),
            dpi: dpi.max(1),
            spans: text_spans.map(|s| s.to_vec()).unwrap_or_default(),
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> DocumentResult<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(DocumentError::WriteFailed("no pages written".into()));
        }

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in &self.pages {
            let scale = PDF_POINTS_PER_INCH / page.dpi as f32;
            let width_pts = page.width_px as f32 * scale;
            let height_pts = page.height_px as f32 * scale;

            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width_px as i64,
                    "Height" => page.height_px as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                page.jpeg.clone(),
            ));

            let mut operations = vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pts),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(height_pts),
                        Object::Real(0.0),
                        Object::Real(0.0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ];

            if !page.spans.is_empty() {
                operations.push(Operation::new("BT", vec![]));
                // Render mode 3: invisible text, extractable but unseen.
                operations.push(Operation::new("Tr", vec![Object::Integer(3)]));
                for span in &page.spans {
                    let font_size = span.font_size.unwrap_or(span.bbox.height as f32) * scale;
                    let x = span.bbox.x as f32 * scale;
                    let baseline =
                        height_pts - (span.bbox.y + span.bbox.height) as f32 * scale;
                    operations.push(Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Real(font_size.max(1.0))],
                    ));
                    operations.push(Operation::new(
                        "Tm",
                        vec![
                            Object::Real(1.0),
                            Object::Real(0.0),
                            Object::Real(0.0),
                            Object::Real(1.0),
                            Object::Real(x),
                            Object::Real(baseline),
                        ],
                    ));
                    // The single-byte text encoding cannot carry the
                    // scrub glyph (U+25A0); it and anything else
                    // non-encodable become equal-width spaces.
                    let encoded: String = span
                        .text
                        .chars()
                        .map(|c| {
                            if c.is_ascii() && !c.is_ascii_control() {
                                c
                            } else {
                                ' '
                            }
                        })
                        .collect();
                    operations.push(Operation::new(
                        "Tj",
                        vec![Object::String(
                            encoded.into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ));
                }
                operations.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content
                    .encode()
                    .map_err(|e| DocumentError::WriteFailed(e.to_string()))?,
            ));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(width_pts),
                    Object::Real(height_pts),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                },
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| DocumentError::WriteFailed(e.to_string()))?;
        Ok(buffer)
    }
}

/// Single-page raster output: PNG at native resolution.
#[derive(Default)]
pub struct ImageWriter {
    png: Option<Vec<u8>>,
}

impl ImageWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputWriter for ImageWriter {
    fn write_page(
        &mut self,
        raster: &PageRaster,
        _dpi: u32,
        _text_spans: Option<&[TextSpan]>,
    ) -> DocumentResult<()> {
        if self.png.is_some() {
            return Err(DocumentError::WriteFailed(
                "raster output holds exactly one page".into(),
            ));
        }
        let img = RgbImage::from_raw(raster.width(), raster.height(), raster.to_vec())
            .ok_or_else(|| DocumentError::WriteFailed("raster buffer size mismatch".into()))?;
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| DocumentError::WriteFailed(e.to_string()))?;
        self.png = Some(out.into_inner());
        Ok(())
    }

    fn finish(self: Box<Self>) -> DocumentResult<Vec<u8>> {
        self.png
            .ok_or_else(|| DocumentError::WriteFailed("no pages written".into()))
    }
}
