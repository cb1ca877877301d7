use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use log::info;

use crate::font::{TextBounds, TitleFont};
use crate::qr::{render_qr, QrConfig};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Clone, Debug, PartialEq)]
pub struct ComposeConfig {
    pub qr: QrConfig,
    /// Blank band above the QR code that holds the title.
    pub header_height: u32,
    /// Top of the title text, in pixels from the top of the canvas.
    pub title_y: i32,
    pub font_name: String,
    pub font_size: f32,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            qr: QrConfig::default(),
            header_height: 50,
            title_y: 10,
            font_name: "arial.ttf".to_string(),
            font_size: 25.0,
        }
    }
}

/// Left edge of the draw origin that centers `bounds` on a canvas `canvas_width` wide.
/// Negative when the text is wider than the canvas.
pub fn centered_x(canvas_width: u32, bounds: TextBounds) -> i32 {
    (canvas_width as i32 - bounds.width()).div_euclid(2) - bounds.left
}

/// Places `qr` under a white header band and draws `title` centered in it.
pub fn compose_with_font(
    qr: &RgbImage,
    title: &str,
    font: &TitleFont,
    config: &ComposeConfig,
) -> RgbImage {
    let (width, height) = qr.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height + config.header_height, WHITE);
    imageops::replace(&mut canvas, qr, 0, config.header_height as i64);

    let bounds = font.measure(title);
    let x = centered_x(width, bounds);
    font.draw(&mut canvas, x, config.title_y, title, BLACK);

    canvas
}

/// Renders the full titled QR image in memory.
pub fn compose(payload: &str, title: &str, config: &ComposeConfig) -> Result<RgbImage> {
    let qr = render_qr(payload, &config.qr)?;
    let font = TitleFont::load_or_builtin(&config.font_name, config.font_size);
    Ok(compose_with_font(&qr, title, &font, config))
}

/// Renders the titled QR image and writes it to `output`, replacing any existing file.
/// The image format follows the file extension.
pub fn generate(payload: &str, output: &Path, title: &str, config: &ComposeConfig) -> Result<()> {
    let canvas = compose(payload, title, config)?;
    info!(
        "Saving {}x{} image to {}",
        canvas.width(),
        canvas.height(),
        output.display()
    );
    canvas
        .save(output)
        .with_context(|| format!("Failed to save image to {}", output.display()))?;
    Ok(())
}
