use anyhow::{bail, Context, Result};
use image::RgbImage;
use log::{debug, info};
use ndarray::Array2;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};
use rayon::prelude::*;

/// Highest normal QR version.
pub const MAX_VERSION: i16 = 40;

/// Largest raster side, in pixels, that will be allocated.
pub const MAX_RASTER_SIDE: u32 = 20_000;

/// How a payload is turned into a QR symbol and then into pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QrConfig {
    /// Smallest version to try. Larger versions are used when the payload does not fit.
    pub version: i16,
    pub ec_level: EcLevel,
    /// Pixels per module.
    pub box_size: u32,
    /// Quiet zone width, in modules.
    pub border: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            version: 1,
            ec_level: EcLevel::L,
            box_size: 10,
            border: 4,
        }
    }
}

impl QrConfig {
    /// Side in pixels of the raster for a symbol `width` modules wide.
    pub fn raster_side(&self, width: usize) -> Result<u32> {
        if self.box_size == 0 {
            bail!("Box size must be at least 1 pixel");
        }
        let side = u32::try_from(width)
            .ok()
            .and_then(|w| self.border.checked_mul(2)?.checked_add(w))
            .and_then(|modules| modules.checked_mul(self.box_size))
            .filter(|&side| side <= MAX_RASTER_SIDE);
        match side {
            Some(side) => Ok(side),
            None => bail!(
                "QR raster for {width} modules with border {} and box size {} exceeds {MAX_RASTER_SIDE} pixels",
                self.border,
                self.box_size
            ),
        }
    }
}

/// Dark/light modules of an encoded symbol, row-major (`[[y, x]]`).
pub struct QrMatrix {
    modules: Array2<bool>,
    version: i16,
}

impl QrMatrix {
    /// Encodes `text`, starting at `config.version` and moving up until the data fits.
    pub fn encode(text: &str, config: &QrConfig) -> Result<Self> {
        if !(1..=MAX_VERSION).contains(&config.version) {
            bail!("QR version must be between 1 and {MAX_VERSION}, got {}", config.version);
        }

        let code = fit_version(text, config)?;
        let version = match code.version() {
            Version::Normal(v) | Version::Micro(v) => v,
        };
        info!(
            "Encoded {} bytes at version {version} (requested {})",
            text.len(),
            config.version
        );

        let colors = code.to_colors();
        let width = code.width();

        let flat: Vec<bool> = colors
            .iter()
            .map(|c| matches!(c, qrcode::Color::Dark))
            .collect();

        let modules = Array2::from_shape_vec((width, width), flat)
            .context("Failed to construct ndarray for QR modules")?;

        Ok(Self { modules, version })
    }

    /// Modules per side, excluding the quiet zone.
    pub fn width(&self) -> usize {
        self.modules.nrows()
    }

    pub fn version(&self) -> i16 {
        self.version
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[[y, x]]
    }

    /// Black-on-white raster with `config.box_size` pixels per module and a
    /// `config.border`-module quiet zone. Rows are filled in parallel.
    pub fn render_to_image(&self, config: &QrConfig) -> Result<RgbImage> {
        let side = config.raster_side(self.width())?;
        let (box_size, border) = (config.box_size, config.border);
        let width = self.width() as u32;
        let row_len = side as usize * 3;

        let mut buf = vec![255u8; row_len * side as usize];
        buf.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                let Some(my) = (y as u32 / box_size).checked_sub(border).filter(|&m| m < width)
                else {
                    return;
                };
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let dark = (x as u32 / box_size)
                        .checked_sub(border)
                        .filter(|&mx| mx < width)
                        .is_some_and(|mx| self.is_dark(mx as usize, my as usize));
                    if dark {
                        px.fill(0);
                    }
                }
            });

        RgbImage::from_raw(side, side, buf).context("QR raster buffer does not match its size")
    }
}

fn fit_version(text: &str, config: &QrConfig) -> Result<QrCode> {
    for version in config.version..=MAX_VERSION {
        match QrCode::with_version(text, Version::Normal(version), config.ec_level) {
            Ok(code) => return Ok(code),
            Err(QrError::DataTooLong) => {
                debug!("Payload does not fit version {version}, trying the next one");
            }
            Err(e) => return Err(e).context("Failed to generate QR code"),
        }
    }
    bail!(
        "Payload of {} bytes does not fit any QR version from {} to {MAX_VERSION}",
        text.len(),
        config.version
    )
}

/// Encodes `text` and rasterizes it with the geometry from `config`.
pub fn render_qr(text: &str, config: &QrConfig) -> Result<RgbImage> {
    let matrix = QrMatrix::encode(text, config)?;
    let img = matrix.render_to_image(config)?;
    info!("Rendered QR raster: {}x{}", img.width(), img.height());
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn decode(img: &RgbImage) -> String {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            img.width() as usize,
            img.height() as usize,
            |x, y| img.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_meta, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn version_one_geometry() {
        let config = QrConfig::default();
        let matrix = QrMatrix::encode("HELLO WORLD", &config).unwrap();
        assert_eq!(matrix.version(), 1);
        assert_eq!(matrix.width(), 21);

        let img = matrix.render_to_image(&config).unwrap();
        assert_eq!(img.dimensions(), (290, 290));
        assert_eq!(config.raster_side(matrix.width()).unwrap(), 290);
    }

    #[test]
    fn quiet_zone_is_white_and_finder_is_black() {
        let config = QrConfig::default();
        let img = render_qr("HELLO WORLD", &config).unwrap();

        for i in 0..40 {
            assert_eq!(*img.get_pixel(i, i), Rgb([255, 255, 255]));
            assert_eq!(*img.get_pixel(289 - i, 289 - i), Rgb([255, 255, 255]));
        }
        // Top-left corner of the top-left finder pattern.
        assert_eq!(*img.get_pixel(40, 40), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(49, 49), Rgb([0, 0, 0]));
    }

    #[test]
    fn raster_decodes_to_payload() {
        let config = QrConfig::default();
        for payload in ["HELLO WORLD", "https://example.com/", "Scaneame e inscribite!!"] {
            let img = render_qr(payload, &config).unwrap();
            assert_eq!(decode(&img), payload);
        }
    }

    #[test]
    fn long_payload_is_promoted() {
        let config = QrConfig::default();
        // 20 bytes in byte mode exceeds the 17 byte capacity of 1-L.
        let matrix = QrMatrix::encode("https://example.com/", &config).unwrap();
        assert_eq!(matrix.version(), 2);
        assert_eq!(matrix.width(), 25);
    }

    #[test]
    fn never_drops_below_requested_version() {
        let config = QrConfig {
            version: 5,
            ..QrConfig::default()
        };
        let matrix = QrMatrix::encode("A", &config).unwrap();
        assert_eq!(matrix.version(), 5);
        assert_eq!(matrix.width(), 37);
    }

    #[test]
    fn oversized_payload_fails() {
        let config = QrConfig {
            ec_level: EcLevel::H,
            ..QrConfig::default()
        };
        let payload = "x".repeat(5000);
        assert!(QrMatrix::encode(&payload, &config).is_err());
    }

    #[test]
    fn rejects_bad_config() {
        let bad_version = QrConfig {
            version: 0,
            ..QrConfig::default()
        };
        assert!(render_qr("A", &bad_version).is_err());

        let bad_box = QrConfig {
            box_size: 0,
            ..QrConfig::default()
        };
        assert!(render_qr("A", &bad_box).is_err());
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        let huge_box = QrConfig {
            box_size: 300_000_000,
            ..QrConfig::default()
        };
        assert!(render_qr("HELLO WORLD", &huge_box).is_err());

        let huge_border = QrConfig {
            border: u32::MAX / 2,
            ..QrConfig::default()
        };
        assert!(render_qr("HELLO WORLD", &huge_border).is_err());

        let too_many_pixels = QrConfig {
            box_size: 100_000,
            ..QrConfig::default()
        };
        assert!(render_qr("HELLO WORLD", &too_many_pixels).is_err());

        let largest = QrConfig {
            box_size: 1,
            border: (MAX_RASTER_SIDE - 21) / 2,
            ..QrConfig::default()
        };
        assert_eq!(largest.raster_side(21).unwrap(), MAX_RASTER_SIDE - 1);
    }

    #[test]
    fn custom_border_and_box_size() {
        let config = QrConfig {
            box_size: 3,
            border: 1,
            ..QrConfig::default()
        };
        let img = render_qr("HELLO WORLD", &config).unwrap();
        assert_eq!(img.dimensions(), (69, 69));
        assert_eq!(*img.get_pixel(2, 2), Rgb([255, 255, 255]));
        assert_eq!(*img.get_pixel(3, 3), Rgb([0, 0, 0]));
    }
}
