use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use qrgen::error::{RASTER_FAILURE_MESSAGE, VALIDATION_MESSAGE, VECTOR_FAILURE_MESSAGE};
use qrgen::{
    Anchor, BlobRegistry, DataUrl, DirectorySink, DownloadSink, Downloader, EncodeService, Error,
    GeneratorPanel, MemorySink, QrDecoder, QrEncoder, RenderSpec, Result, Status,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Raster(String),
    Vector(String),
}

/// Encoder double that records every call and fails on demand
#[derive(Clone, Default)]
struct ScriptedEncoder {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_raster: bool,
    fail_vector: bool,
    markup: Option<String>,
}

impl ScriptedEncoder {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl EncodeService for ScriptedEncoder {
    async fn encode_to_raster(&self, text: &str, spec: &RenderSpec) -> Result<DataUrl> {
        assert_eq!(spec, &RenderSpec::default());
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(Call::Raster(text.to_string()));
        if self.fail_raster {
            return Err(Error::QrEncode("data too long".into()));
        }
        Ok(DataUrl::from_bytes("image/png", text.as_bytes()))
    }

    async fn encode_to_vector_markup(&self, text: &str, spec: &RenderSpec) -> Result<String> {
        assert_eq!(spec, &RenderSpec::default());
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(Call::Vector(text.to_string()));
        if self.fail_vector {
            return Err(Error::QrEncode("data too long".into()));
        }
        Ok(self
            .markup
            .clone()
            .unwrap_or_else(|| format!("<svg>{text}</svg>")))
    }
}

fn panel_with(encoder: ScriptedEncoder) -> (GeneratorPanel<ScriptedEncoder, MemorySink>, BlobRegistry) {
    let blobs = BlobRegistry::new();
    let downloader = Downloader::new(MemorySink::new(blobs.clone()), blobs.clone());
    (GeneratorPanel::new(encoder, downloader), blobs)
}

#[tokio::test]
async fn blank_input_fails_validation_without_encoding() {
    for input in ["", " ", "   ", "\t\n", "\u{3000}", "\u{FEFF}", " \u{FEFF}\n"] {
        let encoder = ScriptedEncoder::default();
        let (mut panel, _) = panel_with(encoder.clone());
        panel.set_input(input);

        let status = panel.trigger_generate().await.expect("generate");

        assert_eq!(status, Status::Failed, "input {input:?}");
        assert!(panel.session().image().is_none());
        assert_eq!(panel.session().error_message(), Some(VALIDATION_MESSAGE));
        assert!(encoder.calls().is_empty(), "encoder called for {input:?}");
    }
}

#[tokio::test]
async fn successful_generate_is_ready() {
    let encoder = ScriptedEncoder::default();
    let (mut panel, _) = panel_with(encoder.clone());
    panel.set_input("https://example.com");

    let status = panel.trigger_generate().await.expect("generate");

    assert_eq!(status, Status::Ready);
    let image = panel.session().image().expect("image");
    assert!(!image.is_empty());
    assert!(panel.session().error_message().is_none());
    assert_eq!(encoder.calls(), vec![Call::Raster("https://example.com".into())]);
}

#[tokio::test]
async fn failed_encode_hides_detail() {
    let encoder = ScriptedEncoder {
        fail_raster: true,
        ..ScriptedEncoder::default()
    };
    let (mut panel, _) = panel_with(encoder);
    panel.set_input("hello");

    assert_eq!(panel.trigger_generate().await.unwrap(), Status::Failed);
    assert!(panel.session().image().is_none());
    assert_eq!(panel.session().error_message(), Some(RASTER_FAILURE_MESSAGE));
}

#[tokio::test]
async fn retry_after_failure_clears_error() {
    let (mut panel, _) = panel_with(ScriptedEncoder::default());
    panel.set_input("   ");
    assert_eq!(panel.trigger_generate().await.unwrap(), Status::Failed);

    panel.set_input("fixed");
    assert_eq!(panel.trigger_generate().await.unwrap(), Status::Ready);
    assert!(panel.session().error_message().is_none());
}

#[tokio::test]
async fn raster_export_requires_ready() {
    let (mut panel, _) = panel_with(ScriptedEncoder::default());

    // Idle
    assert!(!panel.export_raster().unwrap());

    // Failed
    panel.set_input("");
    panel.trigger_generate().await.unwrap();
    assert!(!panel.export_raster().unwrap());

    // Generating
    panel.set_input("hello");
    let ticket = panel.begin_generate().unwrap().expect("ticket");
    assert!(!panel.export_raster().unwrap());

    assert!(panel.downloader().sink().saved().is_empty());

    let url = DataUrl::from_bytes("image/png", b"png");
    panel.complete_generate(ticket, Ok(url.clone())).unwrap();
    assert!(panel.export_raster().unwrap());

    let saved = panel.downloader().sink().saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].anchor.download, "qrcode.png");
    assert_eq!(saved[0].anchor.href, url.as_str());
    assert_eq!(saved[0].bytes, b"png");
}

#[tokio::test]
async fn vector_export_uses_current_input_and_revokes_blob() {
    let encoder = ScriptedEncoder {
        markup: Some("<svg>S</svg>".into()),
        ..ScriptedEncoder::default()
    };
    let (mut panel, blobs) = panel_with(encoder.clone());

    panel.set_input("cached");
    panel.trigger_generate().await.unwrap();
    let cached = panel.session().image().cloned();

    panel.set_input("hello");
    assert!(panel.export_vector().await.unwrap());

    assert_eq!(
        encoder.calls(),
        vec![Call::Raster("cached".into()), Call::Vector("hello".into())]
    );
    let saved = panel.downloader().sink().saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].anchor.download, "qrcode.svg");
    assert!(saved[0].anchor.href.starts_with("blob:"));
    assert_eq!(saved[0].bytes, b"<svg>S</svg>");
    assert_eq!(blobs.live_count(), 0, "object URL must be revoked");

    // The cached raster is untouched.
    assert_eq!(panel.session().status(), Status::Ready);
    assert_eq!(panel.session().image().cloned(), cached);
}

#[tokio::test]
async fn vector_export_works_from_idle() {
    let encoder = ScriptedEncoder::default();
    let (mut panel, _) = panel_with(encoder.clone());
    panel.set_input("hello");

    assert!(panel.export_vector().await.unwrap());
    assert_eq!(encoder.calls(), vec![Call::Vector("hello".into())]);
    assert_eq!(panel.session().status(), Status::Idle);
}

#[tokio::test]
async fn vector_export_failure_sets_banner() {
    let encoder = ScriptedEncoder {
        fail_vector: true,
        ..ScriptedEncoder::default()
    };
    let (mut panel, blobs) = panel_with(encoder);
    panel.set_input("hello");
    panel.trigger_generate().await.unwrap();

    assert!(!panel.export_vector().await.unwrap());
    assert_eq!(panel.session().status(), Status::Failed);
    assert_eq!(panel.session().error_message(), Some(VECTOR_FAILURE_MESSAGE));
    assert!(panel.downloader().sink().saved().is_empty());
    assert_eq!(blobs.live_count(), 0);
}

#[tokio::test]
async fn vector_export_failure_mid_generation_keeps_generating() {
    let encoder = ScriptedEncoder {
        fail_vector: true,
        ..ScriptedEncoder::default()
    };
    let (mut panel, blobs) = panel_with(encoder.clone());
    panel.set_input("hello");

    let ticket = panel.begin_generate().unwrap().expect("ticket");
    assert!(!panel.export_vector().await.unwrap());
    assert_eq!(panel.session().status(), Status::Generating);
    assert!(panel.session().error_message().is_none());
    assert_eq!(blobs.live_count(), 0);

    // The in-flight generation still settles normally.
    let url = DataUrl::from_bytes("image/png", b"png");
    assert_eq!(panel.complete_generate(ticket, Ok(url)).unwrap(), Status::Ready);
    assert_eq!(encoder.calls(), vec![Call::Vector("hello".into())]);
}

/// Sink that refuses every download
struct RefusingSink;

impl DownloadSink for RefusingSink {
    fn activate(&self, _anchor: &Anchor) -> Result<()> {
        Err(Error::Download("disk full".into()))
    }
}

#[tokio::test]
async fn vector_delivery_failure_sets_banner() {
    let encoder = ScriptedEncoder::default();
    let blobs = BlobRegistry::new();
    let mut panel = GeneratorPanel::new(
        encoder.clone(),
        Downloader::new(RefusingSink, blobs.clone()),
    );
    panel.set_input("hello");
    assert_eq!(panel.trigger_generate().await.unwrap(), Status::Ready);

    assert!(!panel.export_vector().await.unwrap());
    assert_eq!(panel.session().status(), Status::Failed);
    assert_eq!(panel.session().error_message(), Some(VECTOR_FAILURE_MESSAGE));
    assert!(panel.session().image().is_none());
    assert!(!panel.export_raster().unwrap(), "cached PNG is gone after the failure");
    assert_eq!(blobs.live_count(), 0, "object URL must be revoked");
    assert_eq!(
        encoder.calls(),
        vec![Call::Raster("hello".into()), Call::Vector("hello".into())]
    );
}

#[tokio::test]
async fn vector_export_with_blank_input_is_noop() {
    let encoder = ScriptedEncoder::default();
    let (mut panel, _) = panel_with(encoder.clone());
    for input in ["  ", "\u{FEFF}"] {
        panel.set_input(input);
        assert!(!panel.export_vector().await.unwrap());
    }
    assert!(encoder.calls().is_empty());
    assert_eq!(panel.session().status(), Status::Idle);
}

#[tokio::test]
async fn single_flight_guard() {
    let encoder = ScriptedEncoder::default();
    let (mut panel, _) = panel_with(encoder.clone());
    panel.set_input("first");

    let ticket = panel.begin_generate().unwrap().expect("ticket");
    assert!(matches!(panel.trigger_generate().await, Err(Error::Busy)));

    // Editing mid-flight neither cancels nor changes what is being encoded.
    panel.set_input("second");
    assert_eq!(panel.session().status(), Status::Generating);
    let outcome = panel.encoder().encode_to_raster(ticket.text(), panel.render_spec()).await;
    panel.complete_generate(ticket, outcome).unwrap();

    assert_eq!(panel.session().status(), Status::Ready);
    assert_eq!(panel.session().input(), "second");
    assert_eq!(encoder.calls(), vec![Call::Raster("first".into())]);
}

#[tokio::test]
async fn real_encoder_writes_scannable_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = BlobRegistry::new();
    let sink = DirectorySink::new(dir.path(), blobs.clone());
    let mut panel = GeneratorPanel::new(QrEncoder::new(), Downloader::new(sink, blobs.clone()));

    panel.set_input("https://example.com");
    assert_eq!(panel.trigger_generate().await.unwrap(), Status::Ready);

    let image = panel.session().image().expect("image").clone();
    assert_eq!(
        QrDecoder::new().decode_data_url(&image).unwrap(),
        "https://example.com"
    );

    assert!(panel.export_raster().unwrap());
    assert!(panel.export_vector().await.unwrap());

    let png = std::fs::read(dir.path().join("qrcode.png")).unwrap();
    assert_eq!(png, image.decode().unwrap());
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 400));

    let svg = std::fs::read_to_string(dir.path().join("qrcode.svg")).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("width=\"400\""));
    assert_eq!(blobs.live_count(), 0);
}
