//! Watermark configuration types.
//!
//! A [`WatermarkConfig`] describes one text watermark: the text itself, its
//! style, and where it goes. It is validated as a whole before any rendering
//! starts.

use serde::{Deserialize, Serialize};

use super::text_renderer::{parse_hex_color, Color};
use crate::constants::{
    DEFAULT_ANGLE, DEFAULT_FONT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_OPACITY, DEFAULT_SPACING,
    MAX_ANGLE, MAX_FONT_SIZE, MAX_SPACING, MAX_TEXT_CHARS, MIN_ANGLE, MIN_FONT_SIZE, MIN_SPACING,
};
use crate::error::{Result, WatermarkError};

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_font_color() -> String {
    DEFAULT_FONT_COLOR.to_string()
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_angle() -> f32 {
    DEFAULT_ANGLE
}

fn default_spacing() -> u32 {
    DEFAULT_SPACING
}

/// Where the watermark goes on each canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    /// Repeating grid across the whole canvas
    #[default]
    Tile,
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl WatermarkPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tile => "tile",
            Self::Center => "center",
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
        }
    }
}

impl std::str::FromStr for WatermarkPosition {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "tile" | "tiled" => Ok(Self::Tile),
            "center" => Ok(Self::Center),
            "top_left" => Ok(Self::TopLeft),
            "top_right" => Ok(Self::TopRight),
            "bottom_left" => Ok(Self::BottomLeft),
            "bottom_right" => Ok(Self::BottomRight),
            other => Err(WatermarkError::InvalidConfig(format!(
                "unknown position '{}'",
                other
            ))),
        }
    }
}

/// Text watermark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub text: String,

    /// Font size in points for documents, pixels for images (10-200)
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Text color as `#RGB` or `#RRGGBB`
    #[serde(default = "default_font_color")]
    pub font_color: String,

    /// 0.0 (invisible) to 1.0 (opaque)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Counter-clockwise rotation in degrees (-180 to 180)
    #[serde(default = "default_angle")]
    pub angle: f32,

    /// Gap between tiles (20-500), tile mode only
    #[serde(default = "default_spacing")]
    pub spacing: u32,

    #[serde(default)]
    pub position: WatermarkPosition,
}

impl WatermarkConfig {
    /// Config with default style for the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            font_color: default_font_color(),
            opacity: default_opacity(),
            angle: default_angle(),
            spacing: default_spacing(),
            position: WatermarkPosition::default(),
        }
    }

    /// Validate every field. The first out-of-range value rejects the config.
    pub fn validate(&self) -> Result<()> {
        let chars = self.text.chars().count();
        if self.text.trim().is_empty() {
            return Err(invalid("text cannot be empty"));
        }
        if chars > MAX_TEXT_CHARS {
            return Err(invalid(format!(
                "text must be at most {} characters, got {}",
                MAX_TEXT_CHARS, chars
            )));
        }

        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(invalid(format!(
                "font_size must be between {} and {}, got {}",
                MIN_FONT_SIZE, MAX_FONT_SIZE, self.font_size
            )));
        }

        if parse_hex_color(&self.font_color).is_none() {
            return Err(invalid(format!(
                "font_color must be in #RGB or #RRGGBB format, got '{}'",
                self.font_color
            )));
        }

        // Check for NaN/Infinity and valid range
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(invalid(format!(
                "opacity must be a finite value between 0.0 and 1.0, got {}",
                self.opacity
            )));
        }

        if !self.angle.is_finite() || !(MIN_ANGLE..=MAX_ANGLE).contains(&self.angle) {
            return Err(invalid(format!(
                "angle must be a finite value between {} and {}, got {}",
                MIN_ANGLE, MAX_ANGLE, self.angle
            )));
        }

        if !(MIN_SPACING..=MAX_SPACING).contains(&self.spacing) {
            return Err(invalid(format!(
                "spacing must be between {} and {}, got {}",
                MIN_SPACING, MAX_SPACING, self.spacing
            )));
        }

        Ok(())
    }

    /// Parsed font color. Falls back to the default gray for an unvalidated
    /// config.
    pub fn color(&self) -> Color {
        parse_hex_color(&self.font_color).unwrap_or(Color {
            r: 0x80,
            g: 0x80,
            b: 0x80,
        })
    }
}

fn invalid(message: impl Into<String>) -> WatermarkError {
    WatermarkError::InvalidConfig(message.into())
}
