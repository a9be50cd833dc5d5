//! qrgen - QR code generator panel with PNG and SVG export
//!
//! Type some text or a URL, generate a scannable QR code, and save it as a
//! raster (PNG) or vector (SVG) file.
//!
//! # Features
//!
//! - **Generator panel**: explicit `Idle → Generating → Ready/Failed` state
//!   machine with a single-flight guard
//! - **Encode service**: `qrcode`-backed raster data URLs and SVG markup,
//!   behind a trait so the panel can be driven by any encoder
//! - **Downloads**: anchors delivered to a pluggable sink, with object URLs
//!   that are revoked as soon as the download is handed off
//! - **Async-first**: encoding runs off the event loop on Tokio
//!
//! # Example
//!
//! ```no_run
//! use qrgen::{BlobRegistry, DirectorySink, Downloader, GeneratorPanel, QrEncoder, Status};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let blobs = BlobRegistry::new();
//!     let sink = DirectorySink::new(".", blobs.clone());
//!     let mut panel = GeneratorPanel::new(QrEncoder::new(), Downloader::new(sink, blobs));
//!
//!     panel.set_input("https://example.com");
//!     if panel.trigger_generate().await? == Status::Ready {
//!         panel.export_raster()?;
//!         panel.export_vector().await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod output;
pub mod panel;
pub mod qr;

// Re-exports for convenience
pub use error::{Error, Result};

pub use config::{ExportOptions, LogRotation, LoggingOptions, QrgenConfig, RenderOptions};
pub use download::{Anchor, Blob, BlobRegistry, DirectorySink, DownloadSink, Downloader, MemorySink};
pub use output::{PanelView, RenderedPanel, render_panel};
pub use panel::{GeneratorPanel, Key, KeyOutcome, Modifiers, Session, SessionState, Status};
pub use qr::{Color, DataUrl, EncodeService, QrDecoder, QrEncoder, RenderSpec};
