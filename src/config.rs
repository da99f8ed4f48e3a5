//! qrledger runtime configuration handling

use crate::error::{Error, Result};
use crate::qr::{DEFAULT_BORDER, DEFAULT_MODULE_SIZE, ErrorCorrection, QrEncoder};
use crate::record::{DEFAULT_DELIMITER, FieldLabels};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Where artifacts, workbooks and state documents live
    pub storage: StorageOptions,
    /// QR rendering parameters
    pub encoder: EncoderOptions,
    /// Workbook layout
    pub workbook: WorkbookOptions,
    /// Form field definitions
    pub fields: FieldOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl LedgerConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrledger.toml / qrledger.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrledger.toml", "qrledger.yaml", "qrledger.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrledger");
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
        self.storage.apply_env_overrides();
        self.encoder.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Configure all storage directories under one root. Handy for tests and demos.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            storage: StorageOptions {
                image_dir: root.join("qr_code_images"),
                excel_dir: root.join("excel_files"),
                state_dir: root.to_path_buf(),
            },
            ..Self::default()
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Directory for standalone artifact PNGs
    pub image_dir: PathBuf,
    /// Root directory for dated workbook subdirectories
    pub excel_dir: PathBuf,
    /// Directory for `labels_config.json` and `excel_path_config.json`
    pub state_dir: PathBuf,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("qr_code_images"),
            excel_dir: PathBuf::from("excel_files"),
            state_dir: PathBuf::from("."),
        }
    }
}

impl StorageOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("QRLEDGER_IMAGE_DIR") {
            self.image_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("QRLEDGER_EXCEL_DIR") {
            self.excel_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("QRLEDGER_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
    }
}

/// QR rendering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Error correction level
    pub ecc: ErrorCorrection,
    /// Pixels per module
    pub module_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
    /// Edge length of the preview image shown by a front end
    pub display_size: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            ecc: ErrorCorrection::H,
            module_size: DEFAULT_MODULE_SIZE,
            border: DEFAULT_BORDER,
            display_size: 200,
        }
    }
}

impl EncoderOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(ecc) = env::var("QRLEDGER_ECC") {
            match ecc.parse::<ErrorCorrection>() {
                Ok(parsed) => self.ecc = parsed,
                Err(e) => tracing::warn!("Ignoring QRLEDGER_ECC: {e}"),
            }
        }
    }

    /// Encoder built from these options
    pub fn encoder(&self) -> QrEncoder {
        QrEncoder::with_ecc_level(self.ecc).with_geometry(self.module_size, self.border)
    }
}

/// Workbook layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookOptions {
    /// Title of the single worksheet
    pub sheet_title: String,
    /// Header of the trailing image column
    pub image_header: String,
    /// Embedded image width in pixels
    pub image_width: u32,
    /// Embedded image height in pixels
    pub image_height: u32,
    /// Height of appended rows in points
    pub row_height: f64,
    /// Width of each text column
    pub text_column_width: f64,
    /// Width of the image column
    pub image_column_width: f64,
}

impl Default for WorkbookOptions {
    fn default() -> Self {
        Self {
            sheet_title: "QR Codes".to_string(),
            image_header: "QR Code Image".to_string(),
            image_width: 100,
            image_height: 100,
            row_height: 80.0,
            text_column_width: 20.0,
            image_column_width: 15.0,
        }
    }
}

/// Form field definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    /// Stable field keys in display order
    pub keys: Vec<String>,
    /// Delimiter used to join non-empty values into the payload
    pub delimiter: char,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            keys: ["A", "B", "C", "D", "E"].map(String::from).to_vec(),
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl FieldOptions {
    /// Labels used when no labels document has been persisted yet
    pub fn default_labels(&self) -> Result<FieldLabels> {
        FieldLabels::with_default_labels(&self.keys)
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRLEDGER_LOG_LEVEL`)
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
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRLEDGER_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRLEDGER_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QRLEDGER_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("QRLEDGER_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::parse(&rotation) {
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
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}
