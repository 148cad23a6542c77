//! Scripted login: landing page, signup modal, login form, challenge start.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::page::{js_string, Page};
use crate::selectors;

/// How long the post-login Start button gets to appear.
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives the site's login modal and lands on the form.
pub struct LoginFlow {
    page: Page,
}

impl LoginFlow {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Run the whole flow. Every step names itself in its error; a failed
    /// login is fatal to the run.
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        self.page
            .wait_for_ready(self.page.default_timeout())
            .await?;

        // Opens the signup/login modal.
        self.click_button(selectors::START_BUTTON, false).await?;
        // The modal defaults to signup; switch it to the login form.
        self.click_button(selectors::OR_LOGIN_BUTTON, true).await?;

        self.fill_login_input(selectors::EMAIL_PLACEHOLDER, &credentials.email)
            .await?;
        self.fill_login_input(selectors::PASSWORD_PLACEHOLDER, &credentials.password)
            .await?;
        debug!("credentials entered for {}", credentials.email);

        self.click_button(selectors::LOG_IN_BUTTON, false).await?;
        self.page
            .wait_for_ready(self.page.default_timeout())
            .await?;

        // A fresh Start button begins the actual round.
        self.click_button_within(selectors::START_BUTTON, START_TIMEOUT)
            .await?;
        self.page
            .wait_for_ready(self.page.default_timeout())
            .await?;

        info!("logged in and challenge started");
        Ok(())
    }

    async fn click_button(&self, label: &str, exact: bool) -> Result<()> {
        if self.page.click_button_with_text(label, exact).await? {
            Ok(())
        } else {
            Err(Error::LoginError(format!("no visible '{label}' button")))
        }
    }

    /// Poll for the button until it can be clicked or the deadline passes.
    async fn click_button_within(&self, label: &str, timeout: Duration) -> Result<()> {
        let interval = Duration::from_millis(250);
        let start = Instant::now();
        loop {
            if self.page.click_button_with_text(label, false).await? {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::LoginError(format!(
                    "'{label}' button did not appear within {timeout:?}"
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Fill the placeholder-matched input, preferring one inside a visible
    /// popup over stray matches elsewhere on the page.
    async fn fill_login_input(&self, placeholder: &str, value: &str) -> Result<()> {
        let js = format!(
            r#"
            (() => {{
                const matches = scope => Array.from(
                    scope.querySelectorAll('input[placeholder=' + JSON.stringify({placeholder}) + ']')
                ).filter(el => el.offsetParent !== null);

                const popups = Array.from(document.querySelectorAll({popup}))
                    .filter(p => p.offsetParent !== null);
                let input = null;
                for (const popup of popups) {{
                    const found = matches(popup);
                    if (found.length > 0) {{
                        input = found[0];
                        break;
                    }}
                }}
                if (!input) {{
                    const found = matches(document);
                    if (found.length > 0) input = found[0];
                }}
                if (!input) return false;

                input.focus();
                input.value = {value};
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            placeholder = js_string(placeholder),
            popup = js_string(selectors::POPUP),
            value = js_string(value),
        );
        if self.page.evaluate_value(&js).await? {
            Ok(())
        } else {
            Err(Error::LoginError(format!("no visible '{placeholder}' input")))
        }
    }
}
