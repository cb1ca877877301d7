//! Render a QR code with a centered title band above it.

pub mod compose;
pub mod font;
pub mod qr;

pub use compose::{compose, generate, ComposeConfig};
pub use font::{FontError, TitleFont};
pub use qr::{render_qr, QrConfig, QrMatrix};
