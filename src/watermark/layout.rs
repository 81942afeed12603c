use kurbo::{Affine, Point};

use crate::watermark::WatermarkStyle;

/// Placement of every caption tile for one canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayout {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Caption font size in pixels.
    pub font_size_px: u32,
    /// Maps tile space (origin at canvas center, rotated) into canvas pixels.
    pub transform: Affine,
    /// Baseline-center anchors of each caption, in tile space.
    pub anchors: Vec<Point>,
}

impl TileLayout {
    /// Anchors mapped into canvas pixel space.
    pub fn canvas_anchors(&self) -> impl Iterator<Item = Point> + '_ {
        self.anchors.iter().map(|p| self.transform * *p)
    }
}

/// Compute the tiled caption grid for a `width` x `height` canvas.
///
/// The grid starts one full canvas dimension before the center in each axis and steps by
/// half the width horizontally and a quarter of the height vertically, so the rotated grid
/// still covers the corners. Zero-sized canvases produce no tiles.
pub fn tile_layout(width: u32, height: u32, style: &WatermarkStyle) -> TileLayout {
    let w = f64::from(width);
    let h = f64::from(height);

    let transform =
        Affine::translate((w / 2.0, h / 2.0)) * Affine::rotate(style.angle_deg.to_radians());
    let font_size_px = (width / style.font_divisor.max(1)).max(1);

    let mut anchors = Vec::new();
    if width > 0 && height > 0 {
        let step_x = w / 2.0;
        let step_y = h / 4.0;
        let mut x = -w;
        while x < w {
            let mut y = -h;
            while y < h {
                anchors.push(Point::new(x, y));
                y += step_y;
            }
            x += step_x;
        }
    }

    TileLayout {
        width,
        height,
        font_size_px,
        transform,
        anchors,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/watermark/layout.rs"]
mod tests;
