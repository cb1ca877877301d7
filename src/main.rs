mod args;

use anyhow::Result;
use args::Args;
use clap::Parser;
use titled_qr::generate;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.font_size.is_finite() || args.font_size <= 0.0 {
        return Err(anyhow::anyhow!("Font size must be positive"));
    }

    println!("Generating QR code for: {}", args.text);
    generate(&args.text, &args.output, &args.title, &args.compose_config())?;

    println!("QR code with title generated as: {}", args.output.display());
    Ok(())
}
