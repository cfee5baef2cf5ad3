//! Paginated PDF documents.
//!
//! Pages rasterize at the configured target DPI: embedded image XObjects
//! are composited onto a white canvas by their placement CTM (the dominant
//! scanned-document case). Text runs from the content stream become
//! positioned text spans; full vector rendering, when needed, is supplied
//! by an external rasterizer the same way detectors are supplied.

use image::RgbImage;
use lopdf::content::Content;
use lopdf::{Object, ObjectId};
use tracing::warn;

use shared_types::{BoundingBox, PageRaster, PageView, TextSpan};

use crate::pdf_content::{walk_content, ImagePlacement, TextRun};
use crate::reader::{DocumentReader, LoaderConfig};
use crate::sniff::SourceKind;
use crate::{DocumentError, DocumentResult};

/// PDF user space is 72 units per inch.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// US Letter, used when a page carries no MediaBox.
const FALLBACK_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

pub struct PdfReader {
    doc: lopdf::Document,
    pages: Vec<ObjectId>,
    config: LoaderConfig,
}

impl PdfReader {
    pub fn open(bytes: &[u8], config: &LoaderConfig) -> DocumentResult<Self> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| DocumentError::CorruptInput(e.to_string()))?;
        // get_pages is keyed by 1-based page number in ascending order.
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(DocumentError::CorruptInput("document has no pages".into()));
        }
        Ok(Self {
            doc,
            pages,
            config: config.clone(),
        })
    }

    /// Look up a page attribute, walking the Pages tree for inheritable
    /// keys (MediaBox, Resources) and resolving one level of indirection.
    fn page_attr(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        loop {
            let dict = self.doc.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return match value {
                    Object::Reference(id) => self.doc.get_object(*id).ok().cloned(),
                    other => Some(other.clone()),
                };
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return None,
            }
        }
    }

    fn media_box(&self, page_id: ObjectId) -> (f32, f32) {
        let corners = self
            .page_attr(page_id, b"MediaBox")
            .and_then(|obj| obj.as_array().ok().cloned())
            .and_then(|arr| {
                let nums: Vec<f32> = arr.iter().filter_map(number).collect();
                (nums.len() == 4).then_some(nums)
            });

        match corners {
            Some(nums) => {
                let width = (nums[2] - nums[0]).abs();
                let height = (nums[3] - nums[1]).abs();
                if width > 0.0 && height > 0.0 {
                    (width, height)
                } else {
                    FALLBACK_MEDIA_BOX
                }
            }
            None => {
                warn!("page has no usable MediaBox, assuming US Letter");
                FALLBACK_MEDIA_BOX
            }
        }
    }

    fn resolve_image_stream(&self, page_id: ObjectId, name: &[u8]) -> Option<lopdf::Stream> {
        let resources = self.page_attr(page_id, b"Resources")?;
        let resources = resources.as_dict().ok()?;
        let xobjects = match resources.get(b"XObject").ok()? {
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok()?.clone(),
            Object::Dictionary(dict) => dict.clone(),
            _ => return None,
        };
        let stream = match xobjects.get(name).ok()? {
            Object::Reference(id) => match self.doc.get_object(*id).ok()? {
                Object::Stream(stream) => stream.clone(),
                _ => return None,
            },
            Object::Stream(stream) => stream.clone(),
            _ => return None,
        };
        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image");
        is_image.then_some(stream)
    }

    fn composite_images(
        &self,
        page_id: ObjectId,
        placements: &[ImagePlacement],
        canvas: &mut RgbImage,
        page_height_pts: f32,
        scale: f32,
    ) {
        for placement in placements {
            // Unit-square placement under an axis-aligned CTM.
            let (w_pts, h_pts) = (placement.ctm.a, placement.ctm.d);
            if w_pts <= 0.0 || h_pts <= 0.0 {
                warn!("skipping rotated or degenerate image placement");
                continue;
            }
            let Some(stream) = self.resolve_image_stream(page_id, &placement.name) else {
                continue;
            };
            let Some(decoded) = decode_image_xobject(&stream) else {
                warn!("undecodable image XObject, leaving region blank");
                continue;
            };

            let target_w = ((w_pts * scale).round() as u32).max(1);
            let target_h = ((h_pts * scale).round() as u32).max(1);
            let x = (placement.ctm.e * scale).round().max(0.0) as i64;
            let y = ((page_height_pts - placement.ctm.f - h_pts) * scale)
                .round()
                .max(0.0) as i64;

            let resized = image::imageops::resize(
                &decoded,
                target_w,
                target_h,
                image::imageops::FilterType::Triangle,
            );
            image::imageops::overlay(canvas, &resized, x, y);
        }
    }

    fn runs_to_spans(
        &self,
        runs: &[TextRun],
        page_width_px: u32,
        page_height_pts: f32,
        scale: f32,
    ) -> Vec<TextSpan> {
        let page_height_px = ((page_height_pts * scale).round() as u32).max(1);
        let mut positioned: Vec<(BoundingBox, String)> = Vec::new();

        for run in runs {
            let x = (run.x * scale).round().max(0.0) as u32;
            // Glyphs sit on the baseline and extend one font-size up.
            let top_pts = page_height_pts - run.y - run.height;
            let y = (top_pts * scale).round().max(0.0) as u32;
            let width = ((run.width * scale).round() as u32).max(1);
            let height = ((run.height * scale).round() as u32).max(1);

            let Some(bbox) =
                BoundingBox::new(x, y, width, height).clip_to(page_width_px, page_height_px)
            else {
                continue;
            };
            positioned.push((bbox, run.text.clone()));
        }

        // Natural reading order: top-to-bottom, then left-to-right.
        positioned.sort_by_key(|(bbox, _)| (bbox.y, bbox.x));
        positioned
            .into_iter()
            .enumerate()
            .map(|(i, (bbox, text))| TextSpan {
                text,
                bbox,
                language: None,
                font_size: Some(bbox.height as f32),
                reading_order: i as u32,
            })
            .collect()
    }
}

impl DocumentReader for PdfReader {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, page_index: u32) -> DocumentResult<PageView> {
        let page_id = *self.pages.get(page_index as usize).ok_or_else(|| {
            DocumentError::PageOutOfRange {
                page_index,
                page_count: self.page_count(),
            }
        })?;

        let (width_pts, height_pts) = self.media_box(page_id);
        let scale = self.config.target_dpi as f32 / PDF_POINTS_PER_INCH;
        let width_px = ((width_pts * scale).round() as u32).max(1);
        let height_px = ((height_pts * scale).round() as u32).max(1);

        let content_bytes =
            self.doc
                .get_page_content(page_id)
                .map_err(|e| DocumentError::PageDecodeFailed {
                    page_index,
                    detail: e.to_string(),
                })?;
        let content =
            Content::decode(&content_bytes).map_err(|e| DocumentError::PageDecodeFailed {
                page_index,
                detail: e.to_string(),
            })?;
        let geometry = walk_content(&content);

        let mut canvas = RgbImage::from_pixel(width_px, height_px, image::Rgb([0xff, 0xff, 0xff]));
        self.composite_images(page_id, &geometry.images, &mut canvas, height_pts, scale);

        let raster = PageRaster::from_rgb8(width_px, height_px, canvas.into_raw()).ok_or_else(
            || DocumentError::PageDecodeFailed {
                page_index,
                detail: "raster buffer size mismatch".into(),
            },
        )?;

        let mut view = PageView::new(page_index, self.config.target_dpi, raster);
        // Text spans are populated iff the page carries an embedded text
        // layer; otherwise detection falls back to OCR.
        let spans = self.runs_to_spans(&geometry.text_runs, width_px, height_pts, scale);
        if !geometry.text_runs.is_empty() {
            view = view.with_text_spans(spans);
        }
        Ok(view)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Pdf
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode an image XObject stream to RGB pixels.
///
/// Raw DeviceRGB/DeviceGray samples are mapped directly; anything else
/// (typically DCTDecode) goes through the image codec.
fn decode_image_xobject(stream: &lopdf::Stream) -> Option<RgbImage> {
    let width = match stream.dict.get(b"Width") {
        Ok(Object::Integer(w)) if *w > 0 => *w as u32,
        _ => return None,
    };
    let height = match stream.dict.get(b"Height") {
        Ok(Object::Integer(h)) if *h > 0 => *h as u32,
        _ => return None,
    };
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let bits = match stream.dict.get(b"BitsPerComponent") {
        Ok(Object::Integer(b)) => *b as u8,
        _ => 8,
    };
    let color_space = stream.dict.get(b"ColorSpace");
    let is_rgb = matches!(color_space, Ok(Object::Name(n)) if n == b"DeviceRGB");
    let is_gray = matches!(color_space, Ok(Object::Name(n)) if n == b"DeviceGray");

    let pixel_count = width as usize * height as usize;
    if is_rgb && bits == 8 && data.len() == pixel_count * 3 {
        RgbImage::from_raw(width, height, data)
    } else if is_gray && bits == 8 && data.len() == pixel_count {
        let rgb: Vec<u8> = data.iter().flat_map(|&g| [g, g, g]).collect();
        RgbImage::from_raw(width, height, rgb)
    } else {
        image::load_from_memory(&data).ok().map(|img| img.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Stream};

    /// Build a PDF where each entry of `page_texts` becomes one page with
    /// a single positioned text run.
    fn text_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = page_texts
            .iter()
            .map(|text| {
                let content = Content {
                    operations: vec![
                        lopdf::content::Operation::new("BT", vec![]),
                        lopdf::content::Operation::new(
                            "Tf",
                            vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                        ),
                        lopdf::content::Operation::new(
                            "Td",
                            vec![Object::Integer(72), Object::Integer(700)],
                        ),
                        lopdf::content::Operation::new(
                            "Tj",
                            vec![Object::String(
                                text.bytes().collect(),
                                lopdf::StringFormat::Literal,
                            )],
                        ),
                        lopdf::content::Operation::new("ET", vec![]),
                    ],
                };
                let content_id = doc.add_object(Stream::new(
                    dictionary! {},
                    content.encode().unwrap(),
                ));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => Object::Reference(content_id),
                });
                Object::Reference(page_id)
            })
            .collect();

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
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn dpi_72() -> LoaderConfig {
        LoaderConfig {
            target_dpi: 72,
            raster_dpi: 96,
        }
    }

    #[test]
    fn test_page_count_and_dimensions() {
        let bytes = text_pdf(&["first", "second", "third"]);
        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();

        assert_eq!(reader.page_count(), 3);
        let page = reader.page(0).unwrap();
        assert_eq!((page.width_px, page.height_px), (612, 792));
        assert_eq!(page.dpi, 72);
    }

    #[test]
    fn test_target_dpi_scales_raster() {
        let bytes = text_pdf(&["scaled"]);
        let reader = PdfReader::open(
            &bytes,
            &LoaderConfig {
                target_dpi: 144,
                raster_dpi: 96,
            },
        )
        .unwrap();
        let page = reader.page(0).unwrap();
        assert_eq!((page.width_px, page.height_px), (1224, 1584));
    }

    #[test]
    fn test_text_span_extraction() {
        let bytes = text_pdf(&["John Doe"]);
        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();
        let page = reader.page(0).unwrap();

        let spans = page.text_spans.as_ref().expect("embedded text layer");
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.text, "John Doe");
        // Baseline at y=700 with 12pt glyphs: top at 792 - 712 = 80.
        assert_eq!(span.bbox.x, 72);
        assert_eq!(span.bbox.y, 80);
        assert_eq!(span.bbox.height, 12);
        assert!(page.is_valid());
    }

    #[test]
    fn test_spans_land_on_their_page() {
        let bytes = text_pdf(&["plain page", "123-45-6789"]);
        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();

        let page0 = reader.page(0).unwrap();
        let page1 = reader.page(1).unwrap();
        assert_eq!(page0.text_spans.as_ref().unwrap()[0].text, "plain page");
        assert_eq!(page1.text_spans.as_ref().unwrap()[0].text, "123-45-6789");
        assert_eq!(page1.page_index, 1);
    }

    #[test]
    fn test_restartable_pages() {
        let bytes = text_pdf(&["same bytes"]);
        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();
        let a = reader.page(0).unwrap();
        let b = reader.page(0).unwrap();
        assert_eq!(a.raster.as_bytes(), b.raster.as_bytes());
        assert_eq!(a.text_spans, b.text_spans);
    }

    #[test]
    fn test_out_of_range_page() {
        let bytes = text_pdf(&["only page"]);
        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();
        assert!(matches!(
            reader.page(5),
            Err(DocumentError::PageOutOfRange { page_count: 1, .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            PdfReader::open(b"%PDF-1.4 not really", &dpi_72()),
            Err(DocumentError::CorruptInput(_))
        ));
    }

    #[test]
    fn test_embedded_image_composites_onto_canvas() {
        // One page with a full-page 2x2 DeviceRGB red image.
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0xff, 0, 0].repeat(4),
        ));
        let content = Content {
            operations: vec![
                lopdf::content::Operation::new("q", vec![]),
                lopdf::content::Operation::new(
                    "cm",
                    vec![
                        Object::Real(612.0),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(792.0),
                        Object::Real(0.0),
                        Object::Real(0.0),
                    ],
                ),
                lopdf::content::Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                lopdf::content::Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
            },
            "Contents" => Object::Reference(content_id),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let reader = PdfReader::open(&bytes, &dpi_72()).unwrap();
        let page = reader.page(0).unwrap();

        // Center pixel should be red, not the white canvas default.
        let center = (page.height_px / 2 * page.width_px + page.width_px / 2) as usize * 3;
        let px = &page.raster.as_bytes()[center..center + 3];
        assert_eq!(px, &[0xff, 0, 0]);
        // No text layer on a scanned page.
        assert!(page.text_spans.is_none());
    }
}
