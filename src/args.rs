use clap::{Parser, ValueEnum};
use qrcode::EcLevel;
use std::path::PathBuf;
use titled_qr::{ComposeConfig, QrConfig};

#[derive(ValueEnum, Clone, Debug)]
#[clap(rename_all = "UPPER")]
pub enum EcArg {
    L,
    M,
    Q,
    H,
}

impl From<EcArg> for EcLevel {
    fn from(v: EcArg) -> Self {
        match v {
            EcArg::L => EcLevel::L,
            EcArg::M => EcLevel::M,
            EcArg::Q => EcLevel::Q,
            EcArg::H => EcLevel::H,
        }
    }
}

#[derive(Parser)]
#[command(name = "titled-qr")]
#[command(about = "Generate a QR code image with a centered title above it")]
pub struct Args {
    /// Text to encode in the QR code
    #[arg(short, long, default_value = "https://portaltorneos-riocuarto.com.ar/")]
    pub text: String,

    /// Output image path, format follows the extension
    #[arg(short, long, default_value = "Inscripcionmixto.png")]
    pub output: PathBuf,

    /// Title drawn above the QR code
    #[arg(short = 'T', long, default_value = "Scaneame e inscribite!!")]
    pub title: String,

    /// QR code error correction level (L, M, Q, H)
    #[arg(short = 'e', long, default_value = "L")]
    pub error_correction: EcArg,

    /// Smallest QR version to use (1-40), larger ones are picked if the text does not fit
    #[arg(short = 'v', long, default_value = "1", value_parser = clap::value_parser!(i16).range(1..=40))]
    pub qr_version: i16,

    /// Pixels per QR module (default: 10)
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub box_size: u32,

    /// Quiet zone width in modules (default: 4)
    #[arg(short = 'B', long, default_value = "4", value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub border: u32,

    /// Title font, a path or a file name searched in the system font directories
    #[arg(short, long, default_value = "arial.ttf")]
    pub font: String,

    /// Title font size in pixels (default: 25)
    #[arg(short = 's', long, default_value = "25")]
    pub font_size: f32,
}

impl Args {
    pub fn compose_config(&self) -> ComposeConfig {
        ComposeConfig {
            qr: QrConfig {
                version: self.qr_version,
                ec_level: self.error_correction.clone().into(),
                box_size: self.box_size,
                border: self.border,
            },
            font_name: self.font.clone(),
            font_size: self.font_size,
            ..ComposeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flyer() {
        let args = Args::try_parse_from(["titled-qr"]).unwrap();
        assert_eq!(args.text, "https://portaltorneos-riocuarto.com.ar/");
        assert_eq!(args.output, PathBuf::from("Inscripcionmixto.png"));
        assert_eq!(args.title, "Scaneame e inscribite!!");
        assert_eq!(args.compose_config(), ComposeConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let args = Args::try_parse_from([
            "titled-qr", "-t", "hello", "-o", "x.png", "-T", "Hi", "-e", "H", "-v", "3", "-b", "4",
            "-B", "2", "-f", "DejaVuSans.ttf", "-s", "18",
        ])
        .unwrap();
        let config = args.compose_config();
        assert_eq!(config.qr.ec_level, EcLevel::H);
        assert_eq!(config.qr.version, 3);
        assert_eq!(config.qr.box_size, 4);
        assert_eq!(config.qr.border, 2);
        assert_eq!(config.font_name, "DejaVuSans.ttf");
        assert_eq!(config.font_size, 18.0);
        assert_eq!(config.header_height, 50);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Args::try_parse_from(["titled-qr", "-v", "41"]).is_err());
        assert!(Args::try_parse_from(["titled-qr", "-v", "0"]).is_err());
        assert!(Args::try_parse_from(["titled-qr", "-b", "0"]).is_err());
        assert!(Args::try_parse_from(["titled-qr", "-b", "300000000"]).is_err());
        assert!(Args::try_parse_from(["titled-qr", "-B", "2147483647"]).is_err());
    }
}
