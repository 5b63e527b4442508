//! Format-agnostic watermark placement and drawing.
//!
//! The renderer knows nothing about images or documents. It measures the
//! text block once, plans where blocks go on a canvas of a given size, and
//! asks the [`Canvas`] to draw each one.

use super::canvas::Canvas;
use super::config::{WatermarkConfig, WatermarkPosition};
use super::font::FontHandle;
use super::position::{
    anchored_position, is_visible, tile_positions, BlockSize, CanvasSize, PlacementPosition,
};
use super::text_renderer::{stamp_size, TextStyle};
use crate::error::Result;

/// A validated config resolved to canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub style: TextStyle,
    pub position: WatermarkPosition,
    /// Gap between tiles in canvas pixels
    pub spacing: u32,
    /// Distance from the edges for corner placements in canvas pixels
    pub margin: u32,
}

impl RenderSettings {
    /// Resolve `config` for a canvas with `scale` pixels per config unit.
    pub fn from_config(config: &WatermarkConfig, scale: f32, margin: u32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        Self {
            style: TextStyle {
                text: config.text.clone(),
                font_size: config.font_size as f32 * scale,
                color: config.color(),
                opacity: config.opacity,
                angle: config.angle,
            },
            position: config.position,
            spacing: ((config.spacing as f32 * scale).round() as u32).max(1),
            margin,
        }
    }
}

/// Where the blocks go on one canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementPlan {
    pub block: BlockSize,
    pub positions: Vec<PlacementPosition>,
}

#[derive(Debug, Clone)]
pub struct WatermarkRenderer {
    font: FontHandle,
}

impl WatermarkRenderer {
    pub fn new(font: FontHandle) -> Self {
        Self { font }
    }

    pub fn font(&self) -> &FontHandle {
        &self.font
    }

    /// Bounding box of one rotated text block.
    pub fn block_size(&self, settings: &RenderSettings) -> BlockSize {
        let (width, height) = stamp_size(self.font.font(), &settings.style);
        BlockSize { width, height }
    }

    /// Plan block positions on a canvas. Tile plans include the blocks just
    /// past each edge.
    pub fn plan(&self, settings: &RenderSettings, canvas: CanvasSize) -> PlacementPlan {
        let block = self.block_size(settings);
        let anchored = anchored_position(settings.position, &canvas, &block, settings.margin);
        let positions = match anchored {
            Some(position) => vec![position],
            None => tile_positions(&canvas, &block, settings.spacing),
        };
        PlacementPlan { block, positions }
    }

    /// Draw the watermark on `canvas`. Returns the number of blocks drawn.
    pub fn render<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        settings: &RenderSettings,
    ) -> Result<usize> {
        let size = canvas.size();
        let plan = self.plan(settings, size);

        let mut drawn = 0;
        for position in plan
            .positions
            .iter()
            .filter(|p| is_visible(p, &size, &plan.block))
        {
            canvas.draw_text(&settings.style, position.center_of(&plan.block))?;
            drawn += 1;
        }
        Ok(drawn)
    }
}
