//! Integer pixel rectangles in page coordinates (top-left origin, y-down).

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page pixel coordinates.
///
/// A box is well-formed when both dimensions are positive; a box attached to
/// a page must additionally lie entirely within the page bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Both dimensions are positive.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The box lies entirely within a page of the given dimensions.
    pub fn fits_page(&self, page_width: u32, page_height: u32) -> bool {
        self.is_well_formed() && self.right() <= page_width && self.bottom() <= page_height
    }

    /// Intersection rectangle, or `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x1 < x2 && y1 < y2 {
            Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        self.intersection(other).map_or(0, |b| b.area())
    }

    /// Smallest axis-aligned box covering both inputs.
    pub fn union_with(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Intersection-over-union. Zero when either box is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = self.intersection_area(other);
        if inter == 0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f64 / union as f64
    }

    /// Fraction of this box's own area covered by `other`.
    pub fn overlap_fraction(&self, other: &BoundingBox) -> f64 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / area as f64
    }

    /// Clip to page bounds. Returns `None` when nothing remains.
    pub fn clip_to(&self, page_width: u32, page_height: u32) -> Option<BoundingBox> {
        if self.x >= page_width || self.y >= page_height {
            return None;
        }
        let width = self.width.min(page_width - self.x);
        let height = self.height.min(page_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(BoundingBox::new(self.x, self.y, width, height))
    }
}
