//! qrgen runtime configuration handling

use crate::error::{Error, Result};
use crate::qr::{
    Color, DEFAULT_MARGIN, DEFAULT_WIDTH, MAX_MARGIN, MAX_WIDTH, RenderSpec, parse_ec_level,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrgenConfig {
    /// QR rendering parameters
    pub render: RenderOptions,
    /// Where and under which names exports are saved
    pub export: ExportOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QrgenConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrgen.toml / qrgen.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrgen.toml", "qrgen.yaml", "qrgen.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrgen");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.render.apply_env_overrides();
        self.export.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Produce the resolved parameters handed to the encoder.
    pub fn render_spec(&self) -> Result<RenderSpec> {
        self.render.to_render_spec()
    }
}

/// User-facing rendering options merged into a [`RenderSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Image width in pixels
    pub width: u32,
    /// Quiet zone in modules
    pub margin: u32,
    /// Dark module color (`#RRGGBBAA`)
    pub dark: Color,
    /// Light module color (`#RRGGBBAA`)
    pub light: Color,
    /// Error correction level (`L`, `M`, `Q`, `H`)
    pub ecc: String,
    /// Pause before encoding so a loading indicator is visible
    pub generate_delay_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            margin: DEFAULT_MARGIN,
            dark: Color::BLACK,
            light: Color::WHITE,
            ecc: "M".to_string(),
            generate_delay_ms: 0,
        }
    }
}

impl RenderOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(width) = env::var("QRGEN_WIDTH") {
            if let Ok(parsed) = width.parse::<u32>() {
                self.width = parsed;
            }
        }
        if let Ok(margin) = env::var("QRGEN_MARGIN") {
            if let Ok(parsed) = margin.parse::<u32>() {
                self.margin = parsed;
            }
        }
        if let Ok(dark) = env::var("QRGEN_DARK") {
            match Color::from_hex(&dark) {
                Ok(color) => self.dark = color,
                Err(err) => tracing::warn!("Ignoring QRGEN_DARK: {err}"),
            }
        }
        if let Ok(light) = env::var("QRGEN_LIGHT") {
            match Color::from_hex(&light) {
                Ok(color) => self.light = color,
                Err(err) => tracing::warn!("Ignoring QRGEN_LIGHT: {err}"),
            }
        }
        if let Ok(ecc) = env::var("QRGEN_ECC") {
            self.ecc = ecc;
        }
        if let Ok(delay) = env::var("QRGEN_GENERATE_DELAY_MS") {
            if let Ok(parsed) = delay.parse::<u64>() {
                self.generate_delay_ms = parsed;
            }
        }
    }

    /// Resolve into encoder parameters.
    pub fn to_render_spec(&self) -> Result<RenderSpec> {
        let ecc = parse_ec_level(&self.ecc).ok_or_else(|| {
            Error::Config(format!(
                "Unknown error correction level '{}'. Use L, M, Q, or H",
                self.ecc
            ))
        })?;

        if self.width == 0 || self.width > MAX_WIDTH {
            return Err(Error::Config(format!(
                "Render width {} out of range, expected 1..={MAX_WIDTH}",
                self.width
            )));
        }

        if self.margin > MAX_MARGIN {
            return Err(Error::Config(format!(
                "Render margin {} out of range, expected 0..={MAX_MARGIN}",
                self.margin
            )));
        }

        Ok(RenderSpec {
            width: self.width,
            margin: self.margin,
            dark: self.dark,
            light: self.light,
            ecc,
        })
    }

    /// Cosmetic delay applied before each raster generation
    pub fn generate_delay(&self) -> Duration {
        Duration::from_millis(self.generate_delay_ms)
    }
}

/// Export destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Directory downloads are written into
    pub output_dir: PathBuf,
    /// Filename for raster exports
    pub png_filename: String,
    /// Filename for vector exports
    pub svg_filename: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            png_filename: "qrcode.png".to_string(),
            svg_filename: "qrcode.svg".to_string(),
        }
    }
}

impl ExportOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("QRGEN_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRGEN_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRGEN_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRGEN_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QRGEN_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("QRGEN_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_parameters() {
        let spec = QrgenConfig::default().render_spec().unwrap();
        assert_eq!(spec, RenderSpec::default());
        assert_eq!(spec.width, 400);
        assert_eq!(spec.margin, 2);
        assert_eq!(spec.dark.to_string(), "#000000FF");
        assert_eq!(spec.light.to_string(), "#FFFFFFFF");
    }

    #[test]
    fn parses_toml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrgen.toml");
        fs::write(
            &path,
            r##"
[render]
width = 256
dark = "#0f172a"
ecc = "h"

[export]
output_dir = "out"

[logging]
rotation = "daily"
"##,
        )
        .unwrap();

        let config = QrgenConfig::from_file(&path).unwrap();
        assert_eq!(config.render.width, 256);
        assert_eq!(config.render.margin, 2);
        assert_eq!(config.export.output_dir, PathBuf::from("out"));
        assert_eq!(config.export.png_filename, "qrcode.png");
        assert_eq!(config.logging.rotation, Some(LogRotation::Daily));

        let spec = config.render_spec().unwrap();
        assert_eq!(spec.dark, Color::rgba(0x0f, 0x17, 0x2a, 255));
        assert_eq!(spec.ecc, qrcode::EcLevel::H);
    }

    #[test]
    fn parses_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrgen.yaml");
        fs::write(&path, "render:\n  margin: 4\n  generate_delay_ms: 300\n").unwrap();

        let config = QrgenConfig::from_file(&path).unwrap();
        assert_eq!(config.render.margin, 4);
        assert_eq!(config.render.generate_delay(), Duration::from_millis(300));
    }

    #[test]
    fn rejects_bad_values() {
        let options = RenderOptions {
            ecc: "Z".to_string(),
            ..RenderOptions::default()
        };
        assert!(matches!(options.to_render_spec(), Err(Error::Config(_))));

        for (width, margin) in [(0, 2), (200_000, 2), (400, 10_000)] {
            let options = RenderOptions {
                width,
                margin,
                ..RenderOptions::default()
            };
            assert!(
                matches!(options.to_render_spec(), Err(Error::Config(_))),
                "width {width} margin {margin} should be rejected"
            );
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrgen.toml");
        fs::write(&path, "[render]\ndark = \"nope\"\n").unwrap();
        assert!(QrgenConfig::from_file(&path).is_err());

        let ini = dir.path().join("qrgen.ini");
        fs::write(&ini, "").unwrap();
        assert!(QrgenConfig::from_file(&ini).is_err());
    }
}
