//! Generate a QR code and save it as PNG and SVG
//!
//! Usage: cargo run --example generate_qr

use qrgen::{BlobRegistry, DirectorySink, Downloader, GeneratorPanel, QrEncoder, Status};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let blobs = BlobRegistry::new();
    let sink = DirectorySink::new("qr_output", blobs.clone());
    let mut panel = GeneratorPanel::new(QrEncoder::new(), Downloader::new(sink, blobs));

    panel.set_input("Hello from qrgen!");
    if panel.trigger_generate().await? != Status::Ready {
        anyhow::bail!("generation failed: {:?}", panel.session().error_message());
    }

    panel.export_raster()?;
    println!("✓ QR code saved to qr_output/qrcode.png");

    // Vector export re-encodes whatever is in the input right now.
    panel.set_input("https://example.com");
    panel.export_vector().await?;
    println!("✓ SVG for https://example.com saved to qr_output/qrcode.svg");

    Ok(())
}
