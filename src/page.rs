use std::path::Path;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Wrapper around a chromiumoxide Page with the small API the challenge
/// flows need. Cloning shares the underlying page session, so every flow
/// can hold its own handle to the single tab.
#[derive(Clone)]
pub struct Page {
    inner: CrPage,
    default_timeout: Duration,
}

impl Page {
    pub(crate) fn new(inner: CrPage, default_timeout: Duration) -> Self {
        Self {
            inner,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Wait until the DOM has finished parsing (readyState leaves
    /// "loading"). Polls every 100ms up to `timeout`. Evaluation can fail
    /// transiently mid-navigation; that counts as not ready.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<()> {
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();
        loop {
            let state: String = self
                .evaluate_value("document.readyState")
                .await
                .unwrap_or_default();
            if state == "interactive" || state == "complete" {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::Timeout("document to finish loading".into()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    // ── Script evaluation ───────────────────────────────────────────

    /// Evaluate a JavaScript expression without caring about the result.
    pub async fn evaluate_void(&self, expression: &str) -> Result<()> {
        self.inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    /// Evaluate a JavaScript expression yielding a primitive (string,
    /// number, boolean) and deserialize it.
    pub async fn evaluate_value<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| Error::JsError(e.to_string()))
    }

    /// Evaluate a JavaScript expression that `JSON.stringify`s its result,
    /// then parse the payload. Objects and arrays only round-trip reliably
    /// as JSON strings.
    pub async fn evaluate_json<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let json: String = self.evaluate_value(expression).await?;
        serde_json::from_str(&json).map_err(|e| Error::JsError(e.to_string()))
    }

    /// Click the first visible `button` or `[role="button"]` whose trimmed
    /// text matches `text`: exactly, or by case-insensitive containment when
    /// `exact` is false. Returns whether a matching button was found. The
    /// click runs in page JS so overlays cannot swallow it.
    pub async fn click_button_with_text(&self, text: &str, exact: bool) -> Result<bool> {
        let js = format!(
            r#"
            (() => {{
                const wanted = {wanted};
                const exact = {exact};
                const candidates = Array.from(
                    document.querySelectorAll('button, [role="button"]')
                );
                for (const el of candidates) {{
                    if (el.offsetParent === null) continue;
                    const label = (el.innerText || el.textContent || '').trim();
                    const hit = exact
                        ? label === wanted
                        : label.toLowerCase().includes(wanted.toLowerCase());
                    if (hit) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()
            "#,
            wanted = js_string(text),
            exact = exact,
        );
        self.evaluate_value(&js).await
    }

    // ── Observations ────────────────────────────────────────────────

    /// Take a screenshot of the visible viewport and save it to a file.
    pub async fn screenshot_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.inner
            .save_screenshot(params, path)
            .await
            .map_err(|e| Error::ScreenshotError(e.to_string()))?;
        Ok(())
    }
}

/// Quote and escape a string for direct embedding in a JS snippet.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_backslashes() {
        assert_eq!(js_string("plain"), r#""plain""#);
        assert_eq!(js_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(js_string(r"a\b"), r#""a\\b""#);
    }
}
