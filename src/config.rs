use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Landing page of the challenge.
pub const CHALLENGE_URL: &str = "https://www.theautomationchallenge.com/";

/// Login credentials, loaded once before the run.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Load an `{"email": ..., "password": ...}` record from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::CredentialsError(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::CredentialsError(format!("{}: {e}", path.display())))
    }
}

// The password must not leak into logs through Debug formatting.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct RunnerConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Default timeout for page-level waits (default: 30s).
    pub default_timeout: Duration,
    /// Landing page to drive.
    pub challenge_url: String,
    /// Retry policy for a full fill, validate, submit pass over one row.
    pub row_retry: RetryPolicy,
    /// Retry policy for clearing the reCAPTCHA popup.
    pub gate_retry: RetryPolicy,
    /// Pause after a failed row before moving to the next one.
    pub row_pause: Duration,
    /// Where failure screenshots go; disabled when unset.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
            challenge_url: CHALLENGE_URL.to_owned(),
            row_retry: RetryPolicy::default(),
            gate_retry: RetryPolicy::default(),
            row_pause: Duration::from_millis(500),
            screenshot_dir: None,
        }
    }
}

impl RunnerConfig {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }
}

pub struct RunnerBuilder {
    config: RunnerConfig,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the default timeout for page-level waits.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn challenge_url(mut self, url: impl Into<String>) -> Self {
        self.config.challenge_url = url.into();
        self
    }

    pub fn row_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.row_retry = policy;
        self
    }

    pub fn gate_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.gate_retry = policy;
        self
    }

    pub fn row_pause(mut self, pause: Duration) -> Self {
        self.config.row_pause = pause;
        self
    }

    pub fn screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.screenshot_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> RunnerConfig {
        self.config
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
