//! Font resolution across heterogeneous hosts.
//!
//! The resolver never inspects the environment while rendering. Each
//! deployment profile yields an ordered candidate list at construction time;
//! `resolve` walks that list once and caches the result.

use ab_glyph::{FontArc, FontVec};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::error::{Result, WatermarkError};

/// DejaVu Sans, shipped inside the binary as the last-resort candidate.
const BUNDLED_FONT_DATA: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");

static BUNDLED_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

/// Fonts installed in the service container image.
const CONTAINER_FONTS: &[&str] = &["/usr/share/fonts/chinese/LXGWWenKai-Regular.ttf"];

const WINDOWS_FONTS: &[&str] = &[
    "C:/Windows/Fonts/msyh.ttc",
    "C:/Windows/Fonts/msyhbd.ttc",
    "C:/Windows/Fonts/simhei.ttf",
    "C:/Windows/Fonts/simsun.ttc",
    "C:/Windows/Fonts/simkai.ttf",
    "C:/Windows/Fonts/STZHONGS.TTF",
];

const MACOS_FONTS: &[&str] = &[
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
];

const LINUX_FONT_ROOT: &str = "/usr/share/fonts";

/// File name fragments of fonts likely to cover CJK text.
const CJK_HINTS: &[&str] = &["cjk", "wenkai", "wqy", "noto", "droid", "han", "hei", "ming"];

/// Parse the bundled fallback font.
pub fn bundled_font() -> Option<FontArc> {
    BUNDLED_FONT
        .get_or_init(|| FontArc::try_from_slice(BUNDLED_FONT_DATA).ok())
        .clone()
}

/// Deployment profile selecting which candidates the resolver tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontProfile {
    /// Profile matching the compile target
    #[default]
    Auto,
    Container,
    Linux,
    Macos,
    Windows,
    BundledOnly,
}

impl FontProfile {
    /// Ordered candidate list for this profile. The bundled font is always
    /// last.
    pub fn candidates(&self) -> Vec<FontCandidate> {
        let mut candidates = match self {
            Self::Auto => return Self::host().candidates(),
            Self::Container => {
                let mut list = paths(CONTAINER_FONTS, "container");
                list.push(FontCandidate::discover(LINUX_FONT_ROOT, "container"));
                list
            }
            Self::Linux => {
                let mut list = paths(CONTAINER_FONTS, "linux");
                list.push(FontCandidate::discover(LINUX_FONT_ROOT, "linux"));
                list
            }
            Self::Macos => paths(MACOS_FONTS, "macos"),
            Self::Windows => paths(WINDOWS_FONTS, "windows"),
            Self::BundledOnly => Vec::new(),
        };
        candidates.push(FontCandidate::bundled());
        candidates
    }

    fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Linux
        }
    }
}

fn paths(list: &[&str], platform: &'static str) -> Vec<FontCandidate> {
    list.iter()
        .map(|p| FontCandidate::path(*p, platform))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// A single font file
    Path(PathBuf),
    /// Every font file below a directory, CJK-capable names first
    Discover(PathBuf),
    Bundled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontCandidate {
    pub source: FontSource,
    pub platform: &'static str,
}

impl FontCandidate {
    pub fn path(path: impl Into<PathBuf>, platform: &'static str) -> Self {
        Self {
            source: FontSource::Path(path.into()),
            platform,
        }
    }

    pub fn discover(root: impl Into<PathBuf>, platform: &'static str) -> Self {
        Self {
            source: FontSource::Discover(root.into()),
            platform,
        }
    }

    pub fn bundled() -> Self {
        Self {
            source: FontSource::Bundled,
            platform: "bundled",
        }
    }
}

/// Where a resolved font came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontOrigin {
    Override(PathBuf),
    File(PathBuf),
    Bundled,
}

impl fmt::Display for FontOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override(path) => write!(f, "override:{}", path.display()),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Bundled => f.write_str("bundled"),
        }
    }
}

/// A loaded typeface. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct FontHandle {
    font: FontArc,
    origin: FontOrigin,
}

impl FontHandle {
    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn origin(&self) -> &FontOrigin {
        &self.origin
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("origin", &self.origin)
            .finish()
    }
}

pub struct FontResolver {
    candidates: Vec<FontCandidate>,
    resolved: Mutex<HashMap<Option<PathBuf>, FontHandle>>,
}

impl FontResolver {
    pub fn new(candidates: Vec<FontCandidate>) -> Self {
        Self {
            candidates,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_profile(profile: FontProfile) -> Self {
        Self::new(profile.candidates())
    }

    pub fn candidates(&self) -> &[FontCandidate] {
        &self.candidates
    }

    /// Resolve a font, preferring `override_path` when given.
    ///
    /// An unreadable override is an error; it never falls back to the
    /// candidate list.
    pub fn resolve(&self, override_path: Option<&Path>) -> Result<FontHandle> {
        let key = override_path.map(Path::to_path_buf);
        if let Some(handle) = self.resolved.lock().get(&key) {
            return Ok(handle.clone());
        }

        let handle = match override_path {
            Some(path) => FontHandle {
                font: load_font_file(path).map_err(|reason| {
                    WatermarkError::FontResolutionFailed(format!(
                        "custom font {}: {}",
                        path.display(),
                        reason
                    ))
                })?,
                origin: FontOrigin::Override(path.to_path_buf()),
            },
            None => self.resolve_candidates()?,
        };

        tracing::info!(font = %handle.origin, "Resolved watermark font");
        self.resolved.lock().insert(key, handle.clone());
        Ok(handle)
    }

    fn resolve_candidates(&self) -> Result<FontHandle> {
        for candidate in &self.candidates {
            match &candidate.source {
                FontSource::Path(path) => {
                    if let Some(handle) = try_file(path, candidate.platform) {
                        return Ok(handle);
                    }
                }
                FontSource::Discover(root) => {
                    for path in discover_fonts(root) {
                        if let Some(handle) = try_file(&path, candidate.platform) {
                            return Ok(handle);
                        }
                    }
                }
                FontSource::Bundled => {
                    if let Some(font) = bundled_font() {
                        return Ok(FontHandle {
                            font,
                            origin: FontOrigin::Bundled,
                        });
                    }
                }
            }
        }

        Err(WatermarkError::FontResolutionFailed(format!(
            "none of {} font candidates could be loaded",
            self.candidates.len()
        )))
    }
}

fn try_file(path: &Path, platform: &str) -> Option<FontHandle> {
    if !path.is_file() {
        return None;
    }
    match load_font_file(path) {
        Ok(font) => Some(FontHandle {
            font,
            origin: FontOrigin::File(path.to_path_buf()),
        }),
        Err(reason) => {
            tracing::debug!(path = %path.display(), platform, %reason, "Skipping font candidate");
            None
        }
    }
}

/// Load a font file. Collections (`.ttc`, `.otc`) use their first face.
fn load_font_file(path: &Path) -> std::result::Result<FontArc, String> {
    let data = std::fs::read(path).map_err(|e| e.to_string())?;
    FontVec::try_from_vec_and_index(data, 0)
        .map(FontArc::new)
        .map_err(|e| e.to_string())
}

/// Font files below `root`, likely CJK-capable names first, then by path.
fn discover_fonts(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                .unwrap_or(false)
        })
        .collect();

    found.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let cjk = CJK_HINTS.iter().any(|hint| name.contains(hint));
        (!cjk, path.clone())
    });
    found
}
