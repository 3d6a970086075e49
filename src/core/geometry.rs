use serde::Serialize;

/// Smallest side a shrunk box may have, in pixels.
pub const MIN_BOX_SIDE: i32 = 20;

/// Axis-aligned box in pixel space, top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from detector-style corner coordinates, truncating toward zero.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let x = x1 as i32;
        let y = y1 as i32;
        Self {
            x,
            y,
            width: x2 as i32 - x,
            height: y2 as i32 - y,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Shrink toward the centre by `ratio` of each dimension.
    ///
    /// Each side loses `trunc(dim * ratio / 2)` pixels; the resulting width
    /// and height never go below [`MIN_BOX_SIDE`].
    pub fn shrink(&self, ratio: f32) -> Self {
        let reduce_w = (self.width as f64 * ratio as f64 / 2.0) as i32;
        let reduce_h = (self.height as f64 * ratio as f64 / 2.0) as i32;

        Self {
            x: self.x + reduce_w,
            y: self.y + reduce_h,
            width: (self.width - reduce_w * 2).max(MIN_BOX_SIDE),
            height: (self.height - reduce_h * 2).max(MIN_BOX_SIDE),
        }
    }

    /// Inverse of [`shrink`](Self::shrink) for the same ratio.
    pub fn expand(&self, ratio: f32) -> Self {
        let ratio = ratio as f64;
        let factor = ratio / (2.0 * (1.0 - ratio));
        let expand_w = (self.width as f64 * factor) as i32;
        let expand_h = (self.height as f64 * factor) as i32;

        Self {
            x: self.x - expand_w,
            y: self.y - expand_h,
            width: self.width + expand_w * 2,
            height: self.height + expand_h * 2,
        }
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x_left = self.x.max(other.x);
        let y_top = self.y.max(other.y);
        let x_right = self.right().min(other.right());
        let y_bottom = self.bottom().min(other.bottom());

        if x_right <= x_left || y_bottom <= y_top {
            return 0.0;
        }

        let intersection = (x_right - x_left) as i64 * (y_bottom - y_top) as i64;
        let union = self.area() + other.area() - intersection;

        if union > 0 {
            (intersection as f64 / union as f64) as f32
        } else {
            0.0
        }
    }

    /// Clip to a `width` x `height` image. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// Index of the largest-area box; the first one wins ties.
pub fn largest_index(boxes: &[BoundingBox]) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (idx, bbox) in boxes.iter().enumerate() {
        let area = bbox.area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((idx, area)),
        }
    }
    best.map(|(idx, _)| idx)
}
