//! Watermark placement geometry.
//!
//! All positions are the top-left corner of a block's axis-aligned bounding
//! box in canvas pixels. They may be negative or lie past the canvas when a
//! block overhangs an edge; the compositor clips.

use super::config::WatermarkPosition;

/// Dimensions of the canvas being watermarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Bounding box of one rotated text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    pub width: u32,
    pub height: u32,
}

/// Calculated placement position (top-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Center of a block of `block` size placed here.
    pub fn center_of(&self, block: &BlockSize) -> (f32, f32) {
        (
            self.x as f32 + block.width as f32 / 2.0,
            self.y as f32 + block.height as f32 / 2.0,
        )
    }
}

/// Position of a single block anchored at the center or a corner.
///
/// Corner variants keep `margin` pixels between the block's bounding box and
/// both adjacent edges. Returns `None` for tile mode.
pub fn anchored_position(
    position: WatermarkPosition,
    canvas: &CanvasSize,
    block: &BlockSize,
    margin: u32,
) -> Option<PlacementPosition> {
    let cw = canvas.width as i32;
    let ch = canvas.height as i32;
    let bw = block.width as i32;
    let bh = block.height as i32;
    let m = margin as i32;

    let (x, y) = match position {
        WatermarkPosition::Tile => return None,
        WatermarkPosition::Center => ((cw - bw) / 2, (ch - bh) / 2),
        WatermarkPosition::TopLeft => (m, m),
        WatermarkPosition::TopRight => (cw - bw - m, m),
        WatermarkPosition::BottomLeft => (m, ch - bh - m),
        WatermarkPosition::BottomRight => (cw - bw - m, ch - bh - m),
    };
    Some(PlacementPosition::new(x, y))
}

/// Positions of a regular tile grid.
///
/// The grid step is the block size plus `spacing` on each axis, one block is
/// centered on the canvas, and the grid extends one block past every edge.
/// Gaps between neighbouring blocks are exactly `spacing` wide, so no square
/// with a side longer than `spacing` fits between blocks anywhere on the
/// canvas.
pub fn tile_positions(
    canvas: &CanvasSize,
    block: &BlockSize,
    spacing: u32,
) -> Vec<PlacementPosition> {
    let xs = axis_offsets(canvas.width, block.width, spacing);
    let ys = axis_offsets(canvas.height, block.height, spacing);

    let mut positions = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        for &x in &xs {
            positions.push(PlacementPosition::new(x, y));
        }
    }
    positions
}

/// Block offsets along one axis: every block that overlaps `[0, extent)`
/// plus one more on each side.
fn axis_offsets(extent: u32, block: u32, spacing: u32) -> Vec<i32> {
    let extent = extent as i64;
    let block = block.max(1) as i64;
    let step = block + spacing as i64;
    let origin = (extent - block) / 2;

    // One before the first block whose right edge passes 0
    let first = (-origin - block).div_euclid(step);
    // One after the last block starting before `extent`
    let last = (extent - 1 - origin).div_euclid(step) + 1;

    (first..=last)
        .map(|k| (origin + k * step) as i32)
        .collect()
}

/// Check if a block at the given position overlaps the canvas at all.
pub fn is_visible(pos: &PlacementPosition, canvas: &CanvasSize, block: &BlockSize) -> bool {
    let right = pos.x as i64 + block.width as i64;
    let bottom = pos.y as i64 + block.height as i64;
    right > 0
        && bottom > 0
        && (pos.x as i64) < canvas.width as i64
        && (pos.y as i64) < canvas.height as i64
}
