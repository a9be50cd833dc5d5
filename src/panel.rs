//! Generator panel: the generate/export state machine
//!
//! A [`GeneratorPanel`] owns one [`Session`] and drives it through
//! `Idle → Generating → {Ready, Failed} → Generating → …`. The session state
//! is a tagged enum, so an image exists only while `Ready` and an error
//! message only while `Failed`.
//!
//! Generation is split into [`GeneratorPanel::begin_generate`] and
//! [`GeneratorPanel::complete_generate`] so an event loop can run the encode
//! call outside the panel borrow; [`GeneratorPanel::trigger_generate`] does
//! both in one await. At most one generation is in flight: a second begin
//! while `Generating` is rejected with [`Error::Busy`].

use crate::config::QrgenConfig;
use crate::download::{Blob, DownloadSink, Downloader};
use crate::error::{
    Error, RASTER_FAILURE_MESSAGE, Result, VALIDATION_MESSAGE, VECTOR_FAILURE_MESSAGE,
};
use crate::qr::{DataUrl, EncodeService, RenderSpec};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SVG_MIME: &str = "image/svg+xml";

/// Coarse phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing generated yet
    Idle,
    /// An encode call is in flight
    Generating,
    /// A raster image is available
    Ready,
    /// The last action failed; a banner message is set
    Failed,
}

/// Why a session is in the failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Input was blank at generate time
    Validation,
    /// The encode collaborator (or vector delivery) failed
    Encode,
}

/// Phase plus the data that only exists in that phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing generated yet
    Idle,
    /// Waiting on the encode call identified by `ticket`
    Generating {
        /// Id of the in-flight generation
        ticket: u64,
    },
    /// Raster image ready for display and export
    Ready {
        /// PNG data URL
        image: DataUrl,
    },
    /// Last action failed
    Failed {
        /// Which kind of failure
        kind: FailureKind,
        /// Static banner text
        message: &'static str,
    },
}

/// Transient UI state for one panel
#[derive(Debug, Clone)]
pub struct Session {
    input: String,
    state: SessionState,
    next_ticket: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            input: String::new(),
            state: SessionState::Idle,
            next_ticket: 1,
        }
    }
}

impl Session {
    /// Raw input text
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Full state with payload
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current phase
    pub fn status(&self) -> Status {
        match self.state {
            SessionState::Idle => Status::Idle,
            SessionState::Generating { .. } => Status::Generating,
            SessionState::Ready { .. } => Status::Ready,
            SessionState::Failed { .. } => Status::Failed,
        }
    }

    /// Generated image, present only when `Ready`
    pub fn image(&self) -> Option<&DataUrl> {
        match &self.state {
            SessionState::Ready { image } => Some(image),
            _ => None,
        }
    }

    /// Banner message, present only when `Failed`
    pub fn error_message(&self) -> Option<&'static str> {
        match self.state {
            SessionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Failure kind, present only when `Failed`
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.state {
            SessionState::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Whether the generate trigger is enabled
    pub fn can_generate(&self) -> bool {
        !matches!(self.state, SessionState::Generating { .. })
    }

    fn fail(&mut self, kind: FailureKind, message: &'static str) {
        self.state = SessionState::Failed { kind, message };
    }

    /// Fail with the banner `err` maps to, or `fallback` when it has none.
    fn fail_with(&mut self, err: &Error, fallback: &'static str) {
        let kind = match err {
            Error::Validation(_) => FailureKind::Validation,
            _ => FailureKind::Encode,
        };
        self.fail(kind, err.user_message().unwrap_or(fallback));
    }
}

/// An accepted generate request; carries the text snapshot to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateTicket {
    id: u64,
    text: String,
}

impl GenerateTicket {
    /// Generation id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Text captured when the generation started
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Keyboard modifiers held with a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift held
    pub shift: bool,
    /// Control held
    pub ctrl: bool,
    /// Alt/Option held
    pub alt: bool,
}

impl Modifiers {
    /// No modifier held
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    /// Shift only
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };

    fn any(self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// A key press in the text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Return / Enter
    Enter,
    /// Delete the last character
    Backspace,
    /// A printable character
    Char(char),
}

/// What a key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Input text changed
    Edited,
    /// Plain Enter triggered generation; the resulting phase
    Submitted(Status),
}

/// Filenames used for the two exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNames {
    /// Raster export filename
    pub png: String,
    /// Vector export filename
    pub svg: String,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            png: "qrcode.png".to_string(),
            svg: "qrcode.svg".to_string(),
        }
    }
}

/// The generator panel: session state plus its collaborators
pub struct GeneratorPanel<E, S> {
    session: Session,
    encoder: E,
    downloader: Downloader<S>,
    spec: RenderSpec,
    names: ExportNames,
    delay: Duration,
}

impl<E: EncodeService, S: DownloadSink> GeneratorPanel<E, S> {
    /// Panel with the fixed 400px / margin 2 / black-on-white parameters
    pub fn new(encoder: E, downloader: Downloader<S>) -> Self {
        Self {
            session: Session::default(),
            encoder,
            downloader,
            spec: RenderSpec::default(),
            names: ExportNames::default(),
            delay: Duration::ZERO,
        }
    }

    /// Panel with rendering and export parameters taken from `config`
    pub fn with_config(encoder: E, downloader: Downloader<S>, config: &QrgenConfig) -> Result<Self> {
        let mut panel = Self::new(encoder, downloader);
        panel.spec = config.render_spec()?;
        panel.delay = config.render.generate_delay();
        panel.names = ExportNames {
            png: config.export.png_filename.clone(),
            svg: config.export.svg_filename.clone(),
        };
        Ok(panel)
    }

    /// Current session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Rendering parameters passed to the encoder
    pub fn render_spec(&self) -> &RenderSpec {
        &self.spec
    }

    /// Export filenames
    pub fn export_names(&self) -> &ExportNames {
        &self.names
    }

    /// The download mechanism
    pub fn downloader(&self) -> &Downloader<S> {
        &self.downloader
    }

    /// The encode collaborator
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Replace the input text. Never cancels an in-flight generation.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.session.input = text.into();
    }

    /// Start a generation.
    ///
    /// Returns `Ok(None)` when the input is blank (the session is now
    /// `Failed` with the validation message) and `Err(Error::Busy)` when a
    /// generation is already in flight.
    pub fn begin_generate(&mut self) -> Result<Option<GenerateTicket>> {
        if let SessionState::Generating { ticket } = self.session.state {
            warn!(ticket, "Generate rejected: generation already in flight");
            return Err(Error::Busy);
        }

        if is_blank(&self.session.input) {
            debug!("Generate rejected: blank input");
            let err = Error::Validation("input is blank".to_string());
            self.session.fail_with(&err, VALIDATION_MESSAGE);
            return Ok(None);
        }

        let id = self.session.next_ticket;
        self.session.next_ticket += 1;
        self.session.state = SessionState::Generating { ticket: id };
        debug!(ticket = id, chars = self.session.input.chars().count(), "Generation started");

        Ok(Some(GenerateTicket {
            id,
            text: self.session.input.clone(),
        }))
    }

    /// Finish the generation identified by `ticket` with the encoder's outcome.
    pub fn complete_generate(
        &mut self,
        ticket: GenerateTicket,
        outcome: Result<DataUrl>,
    ) -> Result<Status> {
        match self.session.state {
            SessionState::Generating { ticket: current } if current == ticket.id => {}
            _ => return Err(Error::StaleTicket(ticket.id)),
        }

        match outcome {
            Ok(image) if !image.is_empty() => {
                info!(ticket = ticket.id, bytes = image.as_str().len(), "QR code generated");
                self.session.state = SessionState::Ready { image };
            }
            Ok(_) => {
                error!(ticket = ticket.id, "Encoder returned an empty image");
                let err = Error::QrEncode("empty image".to_string());
                self.session.fail_with(&err, RASTER_FAILURE_MESSAGE);
            }
            Err(err) => {
                error!(ticket = ticket.id, "QR generation failed: {err}");
                self.session.fail_with(&err, RASTER_FAILURE_MESSAGE);
            }
        }

        Ok(self.session.status())
    }

    /// Validate, encode the current input as a raster image, and settle the session.
    pub async fn trigger_generate(&mut self) -> Result<Status> {
        let Some(ticket) = self.begin_generate()? else {
            return Ok(self.session.status());
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.encoder.encode_to_raster(ticket.text(), &self.spec).await;
        self.complete_generate(ticket, outcome)
    }

    /// Save the generated raster image. Returns `false` (and does nothing)
    /// unless the session is `Ready`.
    pub fn export_raster(&self) -> Result<bool> {
        let Some(image) = self.session.image() else {
            debug!(status = ?self.session.status(), "Raster export skipped: no image");
            return Ok(false);
        };

        self.downloader.save_data_url(image, &self.names.png)?;
        info!(filename = %self.names.png, "Raster export delivered");
        Ok(true)
    }

    /// Re-encode the current input as SVG and save it.
    ///
    /// Independent of the cached raster image. Returns `false` when the input
    /// is blank or the export failed; failures move the session to `Failed`
    /// unless a generation is in flight. A failure from `Ready` drops the
    /// cached image, so [`export_raster`](Self::export_raster) is a no-op
    /// until the next successful generate.
    pub async fn export_vector(&mut self) -> Result<bool> {
        if is_blank(&self.session.input) {
            debug!("Vector export skipped: blank input");
            return Ok(false);
        }

        let result = match self
            .encoder
            .encode_to_vector_markup(&self.session.input, &self.spec)
            .await
        {
            Ok(markup) => self
                .downloader
                .save_blob(Blob::new(SVG_MIME, markup), &self.names.svg),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                info!(filename = %self.names.svg, "Vector export delivered");
                Ok(true)
            }
            Err(err) => {
                error!("SVG export failed: {err}");
                if self.session.can_generate() {
                    self.session.fail(FailureKind::Encode, VECTOR_FAILURE_MESSAGE);
                } else {
                    warn!("Generation in flight; leaving session state untouched");
                }
                Ok(false)
            }
        }
    }

    /// Apply a key press to the input. Plain Enter generates; Enter with
    /// any modifier inserts a newline.
    pub async fn handle_key(&mut self, key: Key, modifiers: Modifiers) -> Result<KeyOutcome> {
        match key {
            Key::Enter if !modifiers.any() => {
                let status = self.trigger_generate().await?;
                Ok(KeyOutcome::Submitted(status))
            }
            Key::Enter => {
                self.session.input.push('\n');
                Ok(KeyOutcome::Edited)
            }
            Key::Backspace => {
                self.session.input.pop();
                Ok(KeyOutcome::Edited)
            }
            Key::Char(c) => {
                self.session.input.push(c);
                Ok(KeyOutcome::Edited)
            }
        }
    }
}

/// Blank means empty or only whitespace, where a byte-order mark counts as
/// whitespace and U+0085 does not (the browser `String.trim` set).
fn is_blank(text: &str) -> bool {
    text.chars()
        .all(|c| c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{0085}'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{BlobRegistry, MemorySink};
    use crate::qr::QrEncoder;

    fn panel() -> GeneratorPanel<QrEncoder, MemorySink> {
        let blobs = BlobRegistry::new();
        GeneratorPanel::new(
            QrEncoder::new(),
            Downloader::new(MemorySink::new(blobs.clone()), blobs),
        )
    }

    #[test]
    fn fresh_session_is_idle() {
        let panel = panel();
        assert_eq!(panel.session().status(), Status::Idle);
        assert!(panel.session().image().is_none());
        assert!(panel.session().error_message().is_none());
        assert!(panel.session().can_generate());
    }

    #[test]
    fn begin_rejects_second_generation() {
        let mut panel = panel();
        panel.set_input("hello");
        let ticket = panel.begin_generate().unwrap().unwrap();
        assert!(!panel.session().can_generate());
        assert!(matches!(panel.begin_generate(), Err(Error::Busy)));

        // Editing mid-flight keeps the snapshot.
        panel.set_input("changed");
        assert_eq!(ticket.text(), "hello");
        assert_eq!(panel.session().status(), Status::Generating);
    }

    #[test]
    fn stale_ticket_is_rejected() {
        let mut panel = panel();
        panel.set_input("a");
        let first = panel.begin_generate().unwrap().unwrap();
        let url = DataUrl::from_bytes("image/png", b"x");
        panel.complete_generate(first.clone(), Ok(url.clone())).unwrap();

        assert!(matches!(
            panel.complete_generate(first, Ok(url)),
            Err(Error::StaleTicket(1))
        ));
        assert_eq!(panel.session().status(), Status::Ready);
    }

    #[test]
    fn empty_image_counts_as_failure() {
        let mut panel = panel();
        panel.set_input("a");
        let ticket = panel.begin_generate().unwrap().unwrap();
        let empty = DataUrl::parse("data:image/png;base64,").unwrap();
        let status = panel.complete_generate(ticket, Ok(empty)).unwrap();
        assert_eq!(status, Status::Failed);
        assert_eq!(panel.session().error_message(), Some(RASTER_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn shift_enter_inserts_newline() {
        let mut panel = panel();
        for c in "ab".chars() {
            panel.handle_key(Key::Char(c), Modifiers::NONE).await.unwrap();
        }
        let outcome = panel.handle_key(Key::Enter, Modifiers::SHIFT).await.unwrap();
        assert_eq!(outcome, KeyOutcome::Edited);
        panel.handle_key(Key::Char('c'), Modifiers::NONE).await.unwrap();
        assert_eq!(panel.session().input(), "ab\nc");
        assert_eq!(panel.session().status(), Status::Idle);

        panel.handle_key(Key::Backspace, Modifiers::NONE).await.unwrap();
        assert_eq!(panel.session().input(), "ab\n");
    }

    #[tokio::test]
    async fn ctrl_and_alt_enter_insert_newlines() {
        let mut panel = panel();
        panel.set_input("a");
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        let alt = Modifiers {
            alt: true,
            ..Modifiers::NONE
        };
        assert_eq!(
            panel.handle_key(Key::Enter, ctrl).await.unwrap(),
            KeyOutcome::Edited
        );
        assert_eq!(
            panel.handle_key(Key::Enter, alt).await.unwrap(),
            KeyOutcome::Edited
        );
        assert_eq!(panel.session().input(), "a\n\n");
        assert_eq!(panel.session().status(), Status::Idle);
    }

    #[test]
    fn blank_matches_browser_trim() {
        for blank in ["", " ", "\t\r\n", "\u{FEFF}", "\u{00A0}\u{3000}", "\u{2028}"] {
            assert!(is_blank(blank), "{blank:?} should be blank");
        }
        for text in ["a", " a ", "\u{0085}", "\u{200B}"] {
            assert!(!is_blank(text), "{text:?} should not be blank");
        }
    }

    #[tokio::test]
    async fn plain_enter_generates() {
        let mut panel = panel();
        panel.set_input("https://example.com");
        let outcome = panel.handle_key(Key::Enter, Modifiers::NONE).await.unwrap();
        assert_eq!(outcome, KeyOutcome::Submitted(Status::Ready));
        assert!(panel.session().image().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_delay_is_applied() {
        let blobs = BlobRegistry::new();
        let mut config = QrgenConfig::default();
        config.render.generate_delay_ms = 300;
        let mut panel = GeneratorPanel::with_config(
            QrEncoder::new(),
            Downloader::new(MemorySink::new(blobs.clone()), blobs),
            &config,
        )
        .unwrap();

        panel.set_input("hello");
        let started = tokio::time::Instant::now();
        assert_eq!(panel.trigger_generate().await.unwrap(), Status::Ready);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
