//! Detection and clearing of the challenge's reCAPTCHA popup.
//!
//! The popup is not a real reCAPTCHA: it is a page modal with one button
//! that can interpose at any moment during a round. Clearing it is
//! best-effort. When it cannot be cleared the caller proceeds anyway and
//! lets validation or submission surface the fallout.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::page::{js_string, Page};
use crate::retry::RetryPolicy;
use crate::selectors;

/// Page operations the gate needs. Implemented for [`Page`]; kept as a
/// trait so the resolve loop can run against a scripted fake.
#[async_trait]
pub trait CaptchaProbe {
    /// Whether the reCAPTCHA popup is currently visible.
    async fn captcha_visible(&self) -> Result<bool>;

    /// Click the popup's control. Returns whether a control was found.
    async fn click_captcha_control(&self) -> Result<bool>;
}

#[async_trait]
impl CaptchaProbe for Page {
    async fn captcha_visible(&self) -> Result<bool> {
        let js = format!(
            "Array.from(document.querySelectorAll({popup})).some(p => \
             p.offsetParent !== null && (p.textContent || '').includes({marker}))",
            popup = js_string(selectors::POPUP),
            marker = js_string(selectors::CAPTCHA_MARKER),
        );
        self.evaluate_value(&js).await
    }

    async fn click_captcha_control(&self) -> Result<bool> {
        let js = format!(
            r#"
            (() => {{
                const popups = Array.from(document.querySelectorAll({popup}));
                const gate = popups.find(p => p.offsetParent !== null &&
                    (p.textContent || '').includes({marker}));
                if (!gate) return false;
                const control = gate.querySelector({button});
                if (!control) return false;
                control.click();
                return true;
            }})()
            "#,
            popup = js_string(selectors::POPUP),
            marker = js_string(selectors::CAPTCHA_MARKER),
            button = js_string(selectors::POPUP_BUTTON),
        );
        self.evaluate_value(&js).await
    }
}

/// Clears the reCAPTCHA popup when it is up.
#[derive(Debug, Clone)]
pub struct CaptchaGate {
    policy: RetryPolicy,
    /// How long to poll before concluding the popup is absent.
    detect_timeout: Duration,
    /// Delay before clicking, so the popup finishes rendering.
    settle_before_click: Duration,
    /// Delay after clicking, so the page can process the click.
    settle_after_click: Duration,
}

impl CaptchaGate {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            detect_timeout: Duration::from_secs(1),
            settle_before_click: Duration::from_secs(1),
            settle_after_click: Duration::from_secs(2),
        }
    }

    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    pub fn with_settle(mut self, before_click: Duration, after_click: Duration) -> Self {
        self.settle_before_click = before_click;
        self.settle_after_click = after_click;
        self
    }

    /// Detect and clear the popup, retrying the whole cycle up to the
    /// policy's attempt bound. `true` means the way is clear, either because
    /// the popup never showed or because a click dismissed it. `false` means
    /// the attempts are spent and the popup is still up. Never returns an
    /// error: probe failures count as unresolved.
    pub async fn resolve<P: CaptchaProbe>(&self, probe: &P) -> bool {
        let max = self.policy.max_attempts.max(1);
        for attempt_no in 1..=max {
            if !self.present_within(probe, self.detect_timeout).await {
                return true;
            }
            debug!("captcha popup detected (attempt {attempt_no}/{max})");
            if self.clear_once(probe).await {
                debug!("captcha popup cleared");
                return true;
            }
            if attempt_no < max {
                tokio::time::sleep(self.policy.delay_for(attempt_no)).await;
            }
        }
        warn!("captcha popup still present after {max} attempts; proceeding anyway");
        false
    }

    /// Poll for the popup until it shows up or `timeout` passes. A failing
    /// visibility check reads as absent.
    async fn present_within<P: CaptchaProbe>(&self, probe: &P, timeout: Duration) -> bool {
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();
        loop {
            match probe.captcha_visible().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!("captcha visibility check failed: {e}");
                    return false;
                }
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One settle, click, settle, re-check cycle.
    async fn clear_once<P: CaptchaProbe>(&self, probe: &P) -> bool {
        tokio::time::sleep(self.settle_before_click).await;
        match probe.click_captcha_control().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("captcha popup has no clickable control");
                return false;
            }
            Err(e) => {
                warn!("captcha control click failed: {e}");
                return false;
            }
        }
        tokio::time::sleep(self.settle_after_click).await;
        match probe.captcha_visible().await {
            Ok(visible) => !visible,
            Err(e) => {
                warn!("captcha re-check failed: {e}");
                false
            }
        }
    }
}

impl Default for CaptchaGate {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Scripted probe. Visibility answers are consumed in order with the
    /// last one repeating; clicks are counted.
    struct FakePopup {
        visibility: Mutex<Vec<bool>>,
        clicks: Mutex<u32>,
        control_present: bool,
    }

    impl FakePopup {
        fn new(visibility: Vec<bool>) -> Self {
            Self {
                visibility: Mutex::new(visibility),
                clicks: Mutex::new(0),
                control_present: true,
            }
        }

        fn clicks(&self) -> u32 {
            *self.clicks.lock().unwrap()
        }
    }

    #[async_trait]
    impl CaptchaProbe for FakePopup {
        async fn captcha_visible(&self) -> Result<bool> {
            let mut seq = self.visibility.lock().unwrap();
            if seq.len() > 1 {
                Ok(seq.remove(0))
            } else {
                Ok(seq.first().copied().unwrap_or(false))
            }
        }

        async fn click_captcha_control(&self) -> Result<bool> {
            *self.clicks.lock().unwrap() += 1;
            Ok(self.control_present)
        }
    }

    fn fast_gate(max_attempts: u32) -> CaptchaGate {
        CaptchaGate::new(RetryPolicy::fixed(max_attempts, Duration::from_millis(1)))
            .with_detect_timeout(Duration::from_millis(5))
            .with_settle(Duration::from_millis(1), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn absent_popup_resolves_without_clicking() {
        let probe = FakePopup::new(vec![false]);
        assert!(fast_gate(3).resolve(&probe).await);
        assert_eq!(probe.clicks(), 0);
    }

    #[tokio::test]
    async fn popup_cleared_by_the_click_resolves_true() {
        let probe = FakePopup::new(vec![true, false]);
        assert!(fast_gate(3).resolve(&probe).await);
        assert_eq!(probe.clicks(), 1);
    }

    #[tokio::test]
    async fn persistent_popup_soft_fails_after_exhausting_attempts() {
        let probe = FakePopup::new(vec![true]);
        assert!(!fast_gate(3).resolve(&probe).await);
        assert_eq!(probe.clicks(), 3);
    }

    #[tokio::test]
    async fn missing_control_counts_as_unresolved() {
        let mut probe = FakePopup::new(vec![true]);
        probe.control_present = false;
        assert!(!fast_gate(2).resolve(&probe).await);
        assert_eq!(probe.clicks(), 2);
    }

    #[tokio::test]
    async fn probe_errors_never_escape_resolve() {
        struct FailingProbe;

        #[async_trait]
        impl CaptchaProbe for FailingProbe {
            async fn captcha_visible(&self) -> Result<bool> {
                Err(Error::JsError("page went away".into()))
            }
            async fn click_captcha_control(&self) -> Result<bool> {
                Err(Error::JsError("page went away".into()))
            }
        }

        // A failing visibility check reads as absent, so the gate reports
        // the way clear and leaves the fallout to validation.
        assert!(fast_gate(2).resolve(&FailingProbe).await);
    }
}
