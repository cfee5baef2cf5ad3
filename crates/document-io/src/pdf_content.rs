//! Content-stream geometry: where text runs and images land on the page.
//!
//! PDF positions text through a text matrix composed with the current
//! transformation matrix. The walker tracks both (plus the graphics-state
//! stack) and reports every text-showing operator and image placement in
//! user-space coordinates, which the reader then maps to raster pixels.

use lopdf::content::Content;
use lopdf::Object;

/// Width heuristics for glyph runs, as a fraction of the font size.
const CHAR_WIDTH_RATIO_ASCII: f32 = 0.55;
const CHAR_WIDTH_RATIO_WIDE: f32 = 1.0;

const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Row-major 2D affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        Some(Self {
            a: number(&operands[0])?,
            b: number(&operands[1])?,
            c: number(&operands[2])?,
            d: number(&operands[3])?,
            e: number(&operands[4])?,
            f: number(&operands[5])?,
        })
    }

    /// Compose so the result maps `p -> base(self(p))`, the PDF `cm`
    /// concatenation order.
    pub fn concat(&self, base: &Matrix) -> Matrix {
        Matrix {
            a: base.a * self.a + base.c * self.b,
            b: base.b * self.a + base.d * self.b,
            c: base.a * self.c + base.c * self.d,
            d: base.b * self.c + base.d * self.d,
            e: base.a * self.e + base.c * self.f + base.e,
            f: base.b * self.e + base.d * self.f + base.f,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

/// One text-showing operator, in user-space coordinates (y-up, origin at
/// the page's lower-left). `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An image XObject invocation with the CTM active at its `Do`.
#[derive(Debug, Clone)]
pub struct ImagePlacement {
    pub name: Vec<u8>,
    pub ctm: Matrix,
}

/// Everything the reader needs from one page's content stream.
#[derive(Debug, Default)]
pub struct ContentGeometry {
    pub text_runs: Vec<TextRun>,
    pub images: Vec<ImagePlacement>,
}

/// Width estimate for a decoded glyph run.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| {
            if c.is_ascii() {
                font_size * CHAR_WIDTH_RATIO_ASCII
            } else {
                font_size * CHAR_WIDTH_RATIO_WIDE
            }
        })
        .sum()
}

/// Decode a PDF string object's bytes to text.
///
/// UTF-16BE strings are marked with a BOM; everything else is treated as a
/// single-byte Latin-1-compatible encoding.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xfe && bytes[1] == 0xff {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

struct WalkState {
    ctm: Matrix,
    gs_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
    in_text: bool,
}

impl WalkState {
    fn new() -> Self {
        Self {
            ctm: Matrix::identity(),
            gs_stack: Vec::new(),
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            font_size: DEFAULT_FONT_SIZE,
            leading: 0.0,
            in_text: false,
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Record one shown string and advance the text matrix past it.
    fn show_text(&mut self, bytes: &[u8], out: &mut Vec<TextRun>) {
        let text = decode_pdf_string(bytes);
        if text.trim().is_empty() {
            // Still advance positioning for blank runs.
            let advance = estimate_text_width(&text, self.font_size);
            self.text_matrix = Matrix::translation(advance, 0.0).concat(&self.text_matrix);
            return;
        }

        let width_text = estimate_text_width(&text, self.font_size);
        let (x, y) = self.ctm.transform_point(self.text_matrix.e, self.text_matrix.f);

        // Axis-aligned approximation of the effective scales.
        let x_scale = (self.text_matrix.a * self.ctm.a).abs().max(0.001);
        let y_scale = (self.text_matrix.d * self.ctm.d).abs().max(0.001);

        out.push(TextRun {
            text,
            x,
            y,
            width: width_text * x_scale,
            height: self.font_size * y_scale,
        });

        self.text_matrix = Matrix::translation(width_text, 0.0).concat(&self.text_matrix);
    }
}

/// Walk one page's decoded content operations.
pub fn walk_content(content: &Content) -> ContentGeometry {
    let mut geometry = ContentGeometry::default();
    let mut state = WalkState::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => state.gs_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.gs_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    state.ctm = m.concat(&state.ctm);
                }
            }
            "BT" => {
                state.in_text = true;
                state.text_matrix = Matrix::identity();
                state.line_matrix = Matrix::identity();
            }
            "ET" => state.in_text = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Some(size) = number(&op.operands[1]) {
                        state.font_size = size.abs().max(0.1);
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Tm" if state.in_text => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" if state.in_text => {
                if let (Some(tx), Some(ty)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    state.next_line(tx, ty);
                }
            }
            "TD" if state.in_text => {
                if let (Some(tx), Some(ty)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    state.leading = -ty;
                    state.next_line(tx, ty);
                }
            }
            "T*" if state.in_text => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
            }
            "Tj" if state.in_text => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    state.show_text(bytes, &mut geometry.text_runs);
                }
            }
            "'" if state.in_text => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    state.show_text(bytes, &mut geometry.text_runs);
                }
            }
            "\"" if state.in_text => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    state.show_text(bytes, &mut geometry.text_runs);
                }
            }
            "TJ" if state.in_text => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                state.show_text(bytes, &mut geometry.text_runs);
                            }
                            Object::Integer(n) => {
                                let shift = -(*n as f32) / 1000.0 * state.font_size;
                                state.text_matrix =
                                    Matrix::translation(shift, 0.0).concat(&state.text_matrix);
                            }
                            Object::Real(n) => {
                                let shift = -n / 1000.0 * state.font_size;
                                state.text_matrix =
                                    Matrix::translation(shift, 0.0).concat(&state.text_matrix);
                            }
                            _ => {}
                        }
                    }
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    geometry.images.push(ImagePlacement {
                        name: name.clone(),
                        ctm: state.ctm,
                    });
                }
            }
            _ => {}
        }
    }

    geometry
}
