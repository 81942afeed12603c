use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::app::{AppOptions, DEFAULT_AUTH_DELAY, DEFAULT_MAX_UPLOAD_BYTES};
use crate::foundation::error::{MemoraError, MemoraResult};
use crate::restore::RestorerConfig;
use crate::watermark::WatermarkStyle;

/// File name of the optional config inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variables consulted for the model API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Overrides the default data directory.
pub const HOME_VAR: &str = "MEMORA_HOME";

/// User-tunable settings, read from `<data_dir>/config.json`.
///
/// Every field is optional in the file; missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MemoraConfig {
    /// Where downloads are written.
    pub downloads_dir: PathBuf,
    pub watermark: WatermarkStyle,
    pub model: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub auth_delay_ms: u64,
}

impl Default for MemoraConfig {
    fn default() -> Self {
        let restorer = RestorerConfig::new("");
        Self {
            downloads_dir: PathBuf::from("."),
            watermark: WatermarkStyle::default(),
            model: restorer.model,
            api_base_url: restorer.base_url,
            request_timeout_secs: restorer.timeout.as_secs(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            auth_delay_ms: DEFAULT_AUTH_DELAY.as_millis() as u64,
        }
    }
}

impl MemoraConfig {
    /// Read `<data_dir>/config.json`, or defaults when it does not exist.
    pub fn load(data_dir: &Path) -> MemoraResult<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("read config '{}'", path.display()))
                    .into());
            }
        };
        let cfg: Self = serde_json::from_str(&s)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> MemoraResult<()> {
        if self.model.trim().is_empty() {
            return Err(MemoraError::validation("config model must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(MemoraError::validation(
                "config request_timeout_secs must be > 0",
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(MemoraError::validation(
                "config max_upload_bytes must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.watermark.opacity) {
            return Err(MemoraError::validation(
                "config watermark.opacity must be within [0, 1]",
            ));
        }
        if self.watermark.font_divisor == 0 {
            return Err(MemoraError::validation(
                "config watermark.font_divisor must be > 0",
            ));
        }
        Ok(())
    }

    pub fn app_options(&self) -> AppOptions {
        AppOptions {
            max_upload_bytes: self.max_upload_bytes,
            auth_delay: Duration::from_millis(self.auth_delay_ms),
        }
    }

    pub fn restorer_config(&self, api_key: impl Into<String>) -> RestorerConfig {
        RestorerConfig {
            api_key: api_key.into(),
            base_url: self.api_base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// `$MEMORA_HOME`, else `./.memora`.
pub fn default_data_dir() -> PathBuf {
    match std::env::var_os(HOME_VAR) {
        Some(v) if !v.is_empty() => PathBuf::from(v),
        _ => PathBuf::from(".memora"),
    }
}

/// First non-empty API key among [`API_KEY_VARS`].
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
