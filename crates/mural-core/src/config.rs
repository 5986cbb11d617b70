//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An RGBA color as stored in config and painted into chunks.
pub type Rgba = [u8; 4];

/// Top-level Mural configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_height: Option<u32>,

    /// Color every pixel starts as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Rgba>,

    /// Color applied to delta entries that carry no explicit color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paint: Option<Rgba>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory chunk blobs are persisted to. Default: `~/.mural/canvas`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::MuralError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::MuralError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Canvas width in pixels.
    pub fn canvas_width(&self) -> u32 {
        self.canvas.as_ref().and_then(|c| c.width).unwrap_or(3840)
    }

    /// Canvas height in pixels.
    pub fn canvas_height(&self) -> u32 {
        self.canvas.as_ref().and_then(|c| c.height).unwrap_or(2160)
    }

    /// Chunk width in pixels.
    pub fn chunk_width(&self) -> u32 {
        self.canvas
            .as_ref()
            .and_then(|c| c.chunk_width)
            .unwrap_or(256)
    }

    /// Chunk height in pixels.
    pub fn chunk_height(&self) -> u32 {
        self.canvas
            .as_ref()
            .and_then(|c| c.chunk_height)
            .unwrap_or(240)
    }

    /// Default fill color for a freshly initialized canvas.
    pub fn fill_color(&self) -> Rgba {
        self.canvas
            .as_ref()
            .and_then(|c| c.fill)
            .unwrap_or([33, 33, 33, 255])
    }

    /// Paint color applied when a delta entry omits its color.
    pub fn paint_color(&self) -> Rgba {
        self.canvas
            .as_ref()
            .and_then(|c| c.paint)
            .unwrap_or([255, 0, 0, 255])
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or_else(default_port)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    /// Directory the chunk store lives in.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("canvas"))
    }

    /// Log level override from config.
    pub fn log_level(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.level.clone())
    }

    /// Reject geometry the chunk addressing cannot represent.
    ///
    /// Chunk indices are derived from linear byte offsets, which only lines up
    /// with pixel coordinates when the canvas dimensions are whole multiples
    /// of the chunk dimensions.
    pub fn validate(&self) -> crate::error::Result<()> {
        let (w, h) = (self.canvas_width(), self.canvas_height());
        let (cw, ch) = (self.chunk_width(), self.chunk_height());

        if w == 0 || h == 0 || cw == 0 || ch == 0 {
            return Err(crate::error::MuralError::Config(
                "canvas and chunk dimensions must be nonzero".into(),
            ));
        }
        if w % cw != 0 {
            return Err(crate::error::MuralError::Config(format!(
                "canvas width {w} is not a multiple of chunk width {cw}"
            )));
        }
        if h % ch != 0 {
            return Err(crate::error::MuralError::Config(format!(
                "canvas height {h} is not a multiple of chunk height {ch}"
            )));
        }
        Ok(())
    }
}

/// Mural's data directory: `~/.mural`.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mural")
}
