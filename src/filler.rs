//! Discovery, filling, validation, and submission of the challenge form.

use std::time::Duration;

use tracing::{debug, warn};

use crate::captcha::CaptchaGate;
use crate::error::{Error, Result};
use crate::form::{match_field, DiscoveredField, FieldKey, FormFieldSet};
use crate::page::{js_string, Page};
use crate::selectors;

/// How long the DOM gets to settle before a scan.
const STABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// One pass over every form input, resolving a label for each: first a Text
/// sibling inside the closest Group container, then the nearest text-bearing
/// div within a 100px vertical radius. Ties fall to DOM order. Best effort,
/// bounded by the page's own markup.
const DISCOVER_JS: &str = r#"
JSON.stringify((() => {
    const inputs = Array.from(document.querySelectorAll('input.bubble-element.Input'));
    return inputs.map((input, index) => {
        let label = '';

        const container = input.closest('div.bubble-element.Group');
        if (container) {
            const text = container.querySelector('div.bubble-element.Text');
            if (text) {
                label = (text.textContent || '').trim();
            }
        }

        if (!label) {
            const rect = input.getBoundingClientRect();
            const nearby = Array.from(document.querySelectorAll('div')).filter(div => {
                const other = div.getBoundingClientRect();
                return Math.abs(rect.top - other.top) < 100 &&
                    (div.textContent || '').trim().length > 0;
            });
            if (nearby.length > 0) {
                label = (nearby[0].textContent || '').trim();
            }
        }

        return {
            index: index,
            label: label || null,
            tabindex: input.getAttribute('tabindex'),
            visible: input.offsetParent !== null
        };
    });
})())
"#;

/// Finds the form's inputs by their on-page labels and drives them.
///
/// The form re-renders between submissions: input order, tabindex values,
/// and decoy fields all shift. Nothing discovered here survives a page
/// mutation, so every operation re-scans before it acts.
pub struct FormFiller {
    page: Page,
    gate: CaptchaGate,
}

impl FormFiller {
    pub fn new(page: Page, gate: CaptchaGate) -> Self {
        Self { page, gate }
    }

    /// Wait for the DOM to settle and clear the reCAPTCHA popup if one is up.
    pub async fn wait_for_stability(&self) -> Result<()> {
        self.page.wait_for_ready(STABILITY_TIMEOUT).await?;
        self.gate.resolve(&self.page).await;
        Ok(())
    }

    /// Scan the live page for inputs and their best-guess labels.
    pub async fn discover(&self) -> Result<Vec<DiscoveredField>> {
        self.wait_for_stability().await?;
        let fields: Vec<DiscoveredField> = self.page.evaluate_json(DISCOVER_JS).await?;
        debug!(
            "discovered {} inputs ({} labeled)",
            fields.len(),
            fields.iter().filter(|f| f.label.is_some()).count()
        );
        Ok(fields)
    }

    /// Fill every non-empty field of `set`. True iff all of them landed;
    /// partial success is failure.
    pub async fn fill_all(&self, set: &FormFieldSet) -> Result<bool> {
        self.gate.resolve(&self.page).await;

        let mut attempted = 0usize;
        let mut filled = 0usize;
        for (key, value) in set.entries() {
            if value.is_empty() {
                continue;
            }
            attempted += 1;
            if self.fill_field(key, value).await? {
                filled += 1;
            } else {
                warn!("could not fill '{}'", key.label());
            }
        }
        debug!("filled {filled}/{attempted} fields");
        Ok(filled == attempted)
    }

    /// Fill one field: re-discover, match by label, set the value through
    /// its tabindex, and fall back to a forced fill inside the labeled
    /// container when that misses.
    async fn fill_field(&self, key: FieldKey, value: &str) -> Result<bool> {
        let fields = self.discover().await?;
        let Some(field) = match_field(&fields, key.label()) else {
            return Ok(false);
        };

        if let Some(tabindex) = field.tabindex.as_deref() {
            let js = fill_by_tabindex_js(tabindex, value);
            if self.page.evaluate_value(&js).await? {
                return Ok(true);
            }
        }

        let js = force_fill_in_container_js(key.label(), value);
        self.page.evaluate_value(&js).await
    }

    /// Re-discover and read back every non-empty field, comparing by exact
    /// string equality. Keeps checking after a mismatch so every divergence
    /// gets logged.
    pub async fn validate_all(&self, set: &FormFieldSet) -> Result<bool> {
        let fields = self.discover().await?;
        let mut all_valid = true;

        for (key, expected) in set.entries() {
            if expected.is_empty() {
                continue;
            }
            let Some(field) = match_field(&fields, key.label()) else {
                warn!("'{}' not found during validation", key.label());
                all_valid = false;
                continue;
            };
            let Some(tabindex) = field.tabindex.as_deref() else {
                warn!("'{}' has no tabindex to read back", key.label());
                all_valid = false;
                continue;
            };
            let actual: String = self
                .page
                .evaluate_value(&read_by_tabindex_js(tabindex))
                .await?;
            if actual != expected {
                warn!(
                    "'{}' holds {actual:?}, expected {expected:?}",
                    key.label()
                );
                all_valid = false;
            }
        }
        Ok(all_valid)
    }

    /// Clear the gate once more, click Submit, and wait for the page to
    /// settle. A missing Submit button aborts the row.
    pub async fn submit(&self) -> Result<()> {
        self.gate.resolve(&self.page).await;

        if !self
            .page
            .click_button_with_text(selectors::SUBMIT_BUTTON, false)
            .await?
        {
            return Err(Error::SubmitError("no visible Submit button".into()));
        }
        self.page.wait_for_ready(STABILITY_TIMEOUT).await
    }
}

/// Set an input's value by tabindex, with the synthetic events the page's
/// reactivity needs to notice the change. Bare property assignment is
/// invisible to it.
fn fill_by_tabindex_js(tabindex: &str, value: &str) -> String {
    format!(
        r#"
        (() => {{
            const selector = 'input[tabindex=' + JSON.stringify({tabindex}) + ']';
            const input = document.querySelector(selector);
            if (!input || input.offsetParent === null) {{
                return false;
            }}
            input.value = {value};
            input.dispatchEvent(new Event('input', {{ bubbles: true }}));
            input.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()
        "#,
        tabindex = js_string(tabindex),
        value = js_string(value),
    )
}

fn read_by_tabindex_js(tabindex: &str) -> String {
    format!(
        r#"
        (() => {{
            const selector = 'input[tabindex=' + JSON.stringify({tabindex}) + ']';
            const input = document.querySelector(selector);
            return input ? input.value : '';
        }})()
        "#,
        tabindex = js_string(tabindex),
    )
}

/// Fallback when tabindex re-selection misses: force the value into the
/// first input nested in a Group container whose text mentions the label.
fn force_fill_in_container_js(label: &str, value: &str) -> String {
    format!(
        r#"
        (() => {{
            const groups = Array.from(document.querySelectorAll('div.bubble-element.Group'));
            for (const group of groups) {{
                if (!(group.textContent || '').includes({label})) continue;
                const input = group.querySelector('input.bubble-element.Input');
                if (!input) continue;
                input.value = {value};
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }}
            return false;
        }})()
        "#,
        label = js_string(label),
        value = js_string(value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_scripts_json_escape_their_arguments() {
        let js = fill_by_tabindex_js("40000", r#"O'Brien "and" Co"#);
        assert!(js.contains(r#""40000""#));
        assert!(js.contains(r#"\"and\""#));

        let js = force_fill_in_container_js("Company Name", "plain");
        assert!(js.contains(r#""Company Name""#));
        assert!(js.contains(r#""plain""#));
    }
}
