//! Watermark geometry and compositing engine.
//!
//! Everything in this module is independent of the document format being
//! watermarked. Adapters hand the [`WatermarkRenderer`] a [`Canvas`] of some
//! size and the renderer decides where text blocks go and draws them.
//!
//! # Positions
//!
//! - `tile` repeats the text on a regular grid across the whole canvas
//! - `center` places one block in the middle
//! - `top_left`, `top_right`, `bottom_left`, `bottom_right` place one block
//!   a fixed margin away from the indicated corner
//!
//! # Example
//!
//! ```ignore
//! let font = FontResolver::for_profile(FontProfile::Auto).resolve(None)?;
//! let renderer = WatermarkRenderer::new(font);
//! let settings = RenderSettings::from_config(&config, 1.0, IMAGE_CORNER_MARGIN);
//!
//! let mut canvas = OverlayCanvas::new(renderer.font(), CanvasSize::new(800, 600));
//! renderer.render(&mut canvas, &settings)?;
//! compositor::composite(&mut image, canvas.layer());
//! ```

pub mod canvas;
pub mod compositor;
pub mod config;
pub mod font;
pub mod position;
pub mod renderer;
pub mod text_renderer;

// Re-export main types for convenience
pub use canvas::{Canvas, OverlayCanvas};
pub use config::{WatermarkConfig, WatermarkPosition};
pub use font::{FontCandidate, FontHandle, FontProfile, FontResolver, FontSource};
pub use position::{BlockSize, CanvasSize, PlacementPosition};
pub use renderer::{PlacementPlan, RenderSettings, WatermarkRenderer};
pub use text_renderer::{parse_hex_color, Color, TextStyle};
