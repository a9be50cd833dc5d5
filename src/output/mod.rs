//! Helpers for rendering the panel for display
//!
//! [`PanelView`] is the framework-independent description of what the page
//! shows for a session: the primary button, the loading indicator, the
//! error banner, the preview and the export buttons. [`render_panel`] turns
//! it into JSON plus human-readable terminal lines.

use crate::panel::{FailureKind, Session, Status};
use serde::Serialize;
use serde_json::Value;

/// Primary button label when idle
pub const GENERATE_LABEL: &str = "Generate QR Code";
/// Primary button label while generating
pub const GENERATING_LABEL: &str = "Generating...";
/// Loading indicator caption
pub const LOADING_TEXT: &str = "Creating your QR code...";
/// Caption above the preview
pub const PREVIEW_CAPTION: &str = "Your QR Code:";

/// The two download buttons shown under the preview
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportButtons {
    /// Raster export label
    pub png: &'static str,
    /// Vector export label
    pub svg: &'static str,
}

/// What the panel displays for the current session
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PanelView {
    /// Current phase
    pub status: Status,
    /// Primary button label
    pub button_label: &'static str,
    /// Whether the primary button accepts clicks
    pub button_enabled: bool,
    /// Loading caption, only while generating
    pub loading: Option<&'static str>,
    /// Error banner text
    pub error: Option<&'static str>,
    /// Failure kind behind the banner
    pub failure: Option<FailureKind>,
    /// Preview image source (PNG data URL)
    pub image: Option<String>,
    /// Export buttons, only when an image is shown
    pub exports: Option<ExportButtons>,
}

impl PanelView {
    /// Build the view for a session
    pub fn from_session(session: &Session) -> Self {
        let generating = session.status() == Status::Generating;
        let image = session.image().map(|url| url.as_str().to_owned());

        Self {
            status: session.status(),
            button_label: if generating { GENERATING_LABEL } else { GENERATE_LABEL },
            button_enabled: session.can_generate(),
            loading: generating.then_some(LOADING_TEXT),
            error: session.error_message(),
            failure: session.failure_kind(),
            exports: image.as_ref().map(|_| ExportButtons {
                png: "Download PNG",
                svg: "Download SVG",
            }),
            image,
        }
    }

    /// Whether the result area below the input is shown at all
    pub fn has_result_area(&self) -> bool {
        self.loading.is_some() || self.error.is_some() || self.image.is_some()
    }
}

/// Combined structured and human-readable representation of the panel
#[derive(Debug, Clone)]
pub struct RenderedPanel {
    /// Structured JSON representation suitable for downstream consumers
    pub json: Value,
    /// Human-readable lines for terminal presentation
    pub human: Vec<String>,
}

/// Render a session into both JSON and human-readable forms.
pub fn render_panel(session: &Session) -> RenderedPanel {
    let view = PanelView::from_session(session);
    let json = serde_json::to_value(&view).unwrap_or(Value::Null);

    let mut human = Vec::new();
    let button_state = if view.button_enabled { "" } else { " (disabled)" };
    human.push(format!("[{}]{}", view.button_label, button_state));

    if let Some(loading) = view.loading {
        human.push(format!("  {loading}"));
    }
    if let Some(error) = view.error {
        human.push(format!("  ! {error}"));
    }
    if let Some(image) = view.image.as_deref() {
        human.push(format!("  {PREVIEW_CAPTION}"));
        human.push(format!("  image: {} ({} bytes)", mime_of(image), image.len()));
    }
    if let Some(exports) = &view.exports {
        human.push(format!("  [{}] [{}]", exports.png, exports.svg));
    }

    RenderedPanel { json, human }
}

fn mime_of(data_url: &str) -> &str {
    data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .unwrap_or("unknown")
}
