//! Title font loading, measurement and drawing.
//!
//! A named TrueType font is looked up on disk first. If that fails for any
//! reason the built-in bitmap font is used instead, so rendering a title
//! never fails because of fonts.

use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Baseline, Text};
use image::{Rgb, RgbImage};
use log::{debug, info, warn};
use rusttype::{point, Scale};
use thiserror::Error;
use walkdir::WalkDir;

/// Bitmap font used when the named font cannot be loaded.
pub const BUILTIN_FONT: &MonoFont<'static> = &FONT_10X20;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("font `{0}` not found")]
    NotFound(String),
    #[error("failed to read font file {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a supported font file", .0.display())]
    Unsupported(PathBuf),
    #[error("invalid font size {0}")]
    InvalidSize(f32),
}

/// Pixel box of rendered text, relative to the draw origin (top-left anchor).
/// `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBounds {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

pub enum TitleFont {
    TrueType {
        font: rusttype::Font<'static>,
        scale: Scale,
    },
    Builtin(&'static MonoFont<'static>),
}

impl TitleFont {
    /// Resolves `name` as a path, then as a file name under the system font directories.
    pub fn load(name: &str, size: f32) -> Result<Self, FontError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(FontError::InvalidSize(size));
        }
        let path = find_font(name).ok_or_else(|| FontError::NotFound(name.to_string()))?;
        Self::from_path(&path, size)
    }

    pub fn from_path(path: &Path, size: f32) -> Result<Self, FontError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(FontError::InvalidSize(size));
        }
        let bytes = fs::read(path).map_err(|source| FontError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let font = rusttype::Font::try_from_vec(bytes)
            .ok_or_else(|| FontError::Unsupported(path.to_path_buf()))?;
        info!("Loaded font {} at size {size}", path.display());
        Ok(Self::TrueType {
            font,
            scale: Scale::uniform(size),
        })
    }

    /// Same as [`TitleFont::load`], but any failure yields the built-in font.
    pub fn load_or_builtin(name: &str, size: f32) -> Self {
        match Self::load(name, size) {
            Ok(font) => font,
            Err(e) => {
                warn!("{e}; using built-in font");
                Self::Builtin(BUILTIN_FONT)
            }
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin(_))
    }

    /// Bounds of `text` drawn with its top-left anchor at the origin.
    pub fn measure(&self, text: &str) -> TextBounds {
        if text.is_empty() {
            return TextBounds::default();
        }
        match self {
            Self::TrueType { font, scale } => {
                let ascent = font.v_metrics(*scale).ascent;
                let mut bounds: Option<TextBounds> = None;
                for glyph in font.layout(text, *scale, point(0.0, ascent)) {
                    let Some(bb) = glyph.pixel_bounding_box() else {
                        continue;
                    };
                    let b = bounds.get_or_insert(TextBounds {
                        left: bb.min.x,
                        top: bb.min.y,
                        right: bb.max.x,
                        bottom: bb.max.y,
                    });
                    b.left = b.left.min(bb.min.x);
                    b.top = b.top.min(bb.min.y);
                    b.right = b.right.max(bb.max.x);
                    b.bottom = b.bottom.max(bb.max.y);
                }
                bounds.unwrap_or_default()
            }
            Self::Builtin(mono) => {
                let style = MonoTextStyle::new(*mono, BinaryColor::On);
                let bb = style
                    .measure_string(text, Point::zero(), Baseline::Top)
                    .bounding_box;
                TextBounds {
                    left: bb.top_left.x,
                    top: bb.top_left.y,
                    right: bb.top_left.x + bb.size.width as i32,
                    bottom: bb.top_left.y + bb.size.height as i32,
                }
            }
        }
    }

    /// Draws `text` with its top-left anchor at `(x, y)`. Anything outside the canvas is clipped.
    pub fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        match self {
            Self::TrueType { font, scale } => {
                let ascent = font.v_metrics(*scale).ascent;
                let origin = point(x as f32, y as f32 + ascent);
                for glyph in font.layout(text, *scale, origin) {
                    let Some(bb) = glyph.pixel_bounding_box() else {
                        continue;
                    };
                    glyph.draw(|gx, gy, v| {
                        blend(canvas, bb.min.x + gx as i32, bb.min.y + gy as i32, color, v);
                    });
                }
            }
            Self::Builtin(mono) => {
                let style = MonoTextStyle::new(*mono, BinaryColor::On);
                let mut target = CanvasTarget { canvas, color };
                Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
                    .draw(&mut target)
                    .unwrap_or_else(|never| match never {});
            }
        }
    }
}

fn blend(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let a = coverage.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x, y);
    for c in 0..3 {
        dst.0[c] = (color.0[c] as f32 * a + dst.0[c] as f32 * (1.0 - a)).round() as u8;
    }
}

/// Lets embedded-graphics draw straight into an image buffer.
struct CanvasTarget<'a> {
    canvas: &'a mut RgbImage,
    color: Rgb<u8>,
}

impl OriginDimensions for CanvasTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.canvas.width(), self.canvas.height())
    }
}

impl DrawTarget for CanvasTarget<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if c.is_off() || p.x < 0 || p.y < 0 {
                continue;
            }
            let (x, y) = (p.x as u32, p.y as u32);
            if x < self.canvas.width() && y < self.canvas.height() {
                self.canvas.put_pixel(x, y, self.color);
            }
        }
        Ok(())
    }
}

/// Directories searched for fonts given by file name.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(windir) = std::env::var_os("WINDIR") {
        dirs.push(PathBuf::from(windir).join("Fonts"));
    }
    dirs.extend(
        [
            "/usr/share/fonts",
            "/usr/local/share/fonts",
            "/Library/Fonts",
            "/System/Library/Fonts",
        ]
        .iter()
        .map(PathBuf::from),
    );
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        let home = PathBuf::from(home);
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

fn find_font(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    find_font_in(name, &system_font_dirs())
}

/// Case-insensitive file name search under `dirs`.
pub fn find_font_in(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let wanted = name.to_lowercase();
    dirs.iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| WalkDir::new(dir).follow_links(true).into_iter())
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|f| f.to_lowercase() == wanted)
                .unwrap_or(false)
        })
        .map(|entry| {
            debug!("Found font {}", entry.path().display());
            entry.into_path()
        })
}

/// Any common TrueType font installed on this machine.
#[cfg(test)]
pub(crate) fn installed_truetype(size: f32) -> Option<TitleFont> {
    let names = [
        "DejaVuSans.ttf",
        "LiberationSans-Regular.ttf",
        "arial.ttf",
        "Arial.ttf",
        "Helvetica.ttc",
        "FreeSans.ttf",
        "NotoSans-Regular.ttf",
    ];
    let font = names.iter().find_map(|name| TitleFont::load(name, size).ok());
    if font.is_none() {
        eprintln!("no TrueType font installed; skipping TrueType checks");
    }
    font
}
