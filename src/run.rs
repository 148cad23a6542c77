//! Row-by-row processing and the run tally.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::captcha::CaptchaGate;
use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::filler::FormFiller;
use crate::page::Page;
use crate::retry::{self, RetryPolicy};
use crate::sheet::Spreadsheet;

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
}

impl RunResult {
    /// Percentage of rows that submitted cleanly. A run over zero rows has
    /// a rate of 0, not NaN.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }
}

/// Drives the full challenge: every spreadsheet row through fill, validate,
/// submit, with per-row retries and a tally that survives row failures.
pub struct ChallengeRunner {
    page: Page,
    sheet: Spreadsheet,
    filler: FormFiller,
    row_retry: RetryPolicy,
    row_pause: Duration,
    screenshot_dir: Option<PathBuf>,
}

impl ChallengeRunner {
    pub fn new(page: Page, sheet: Spreadsheet, config: &RunnerConfig) -> Self {
        let gate = CaptchaGate::new(config.gate_retry);
        let filler = FormFiller::new(page.clone(), gate);
        Self {
            page,
            sheet,
            filler,
            row_retry: config.row_retry,
            row_pause: config.row_pause,
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }

    /// Process one row: fill, validate, submit, retrying the whole sequence
    /// under the row policy. Each attempt re-fills from scratch; writing the
    /// same value twice is harmless. The final error propagates once the
    /// attempts are spent.
    pub async fn process_row(&self, index: usize) -> Result<()> {
        let set = self.sheet.field_set(index)?;
        debug!("row {} data: {:?}", index + 1, set);
        let set = &set;

        retry::attempt(self.row_retry, |attempt_no| async move {
            debug!("row {} attempt {attempt_no}", index + 1);
            self.filler.wait_for_stability().await?;

            if !self.filler.fill_all(set).await? {
                return Err(Error::FieldFillError(format!("row {}", index + 1)));
            }
            if !self.filler.validate_all(set).await? {
                return Err(Error::ValidationError(format!("row {}", index + 1)));
            }
            self.filler.submit().await
        })
        .await
    }

    /// Process every row in order. Row failures are tallied, never fatal.
    pub async fn run_all(&self) -> RunResult {
        let total = self.sheet.row_count();
        info!("starting run over {total} rows");

        let result = drive_rows(total, self.row_pause, |index| self.attempt_row(index)).await;

        info!(
            "run finished: {} submitted, {} failed out of {}",
            result.success, result.errors, result.total
        );
        info!("success rate: {:.2}%", result.success_rate());
        result
    }

    async fn attempt_row(&self, index: usize) -> Result<()> {
        info!("processing row {} of {}", index + 1, self.sheet.row_count());
        match self.process_row(index).await {
            Ok(()) => {
                info!("row {} submitted", index + 1);
                Ok(())
            }
            Err(err) => {
                self.capture_failure(index).await;
                Err(err)
            }
        }
    }

    /// Best-effort screenshot of the page as the row died.
    async fn capture_failure(&self, index: usize) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let path = dir.join(format!("row-{:02}-failed.png", index + 1));
        match self.page.screenshot_to_file(&path).await {
            Ok(()) => info!("failure screenshot saved to {}", path.display()),
            Err(err) => warn!("could not save failure screenshot: {err}"),
        }
    }
}

/// Sequential row loop: run `attempt` for each index, count outcomes, and
/// pause after a failure so the page can recover. One row's exhaustion
/// never aborts the rest.
pub(crate) async fn drive_rows<F, Fut>(total: usize, pause: Duration, mut attempt: F) -> RunResult
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut success = 0usize;
    let mut errors = 0usize;

    for index in 0..total {
        match attempt(index).await {
            Ok(()) => success += 1,
            Err(err) => {
                errors += 1;
                warn!("row {} failed after retries: {err}; continuing", index + 1);
                tokio::time::sleep(pause).await;
            }
        }
    }

    RunResult {
        total,
        success,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NO_PAUSE: Duration = Duration::from_millis(0);

    #[tokio::test]
    async fn tally_counts_every_row_exactly_once() {
        let result = drive_rows(3, NO_PAUSE, |index| async move {
            if index == 1 {
                Err(Error::FieldFillError(format!("row {}", index + 1)))
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(
            result,
            RunResult {
                total: 3,
                success: 2,
                errors: 1
            }
        );
        assert_eq!(result.success + result.errors, result.total);
        assert_eq!(format!("{:.2}", result.success_rate()), "66.67");
    }

    #[tokio::test]
    async fn a_failing_row_never_stops_the_loop() {
        let calls = AtomicUsize::new(0);
        let result = drive_rows(4, NO_PAUSE, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::SubmitError("button vanished".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.errors, 4);
        assert_eq!(result.success, 0);
    }

    #[tokio::test]
    async fn empty_run_has_a_defined_zero_rate() {
        let result = drive_rows(0, NO_PAUSE, |_| async { Ok(()) }).await;
        assert_eq!(
            result,
            RunResult {
                total: 0,
                success: 0,
                errors: 0
            }
        );
        assert_eq!(result.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_spans_the_percentage_range() {
        let all = RunResult {
            total: 5,
            success: 5,
            errors: 0,
        };
        assert_eq!(all.success_rate(), 100.0);

        let none = RunResult {
            total: 5,
            success: 0,
            errors: 5,
        };
        assert_eq!(none.success_rate(), 0.0);

        let some = RunResult {
            total: 8,
            success: 3,
            errors: 5,
        };
        assert!(some.success_rate() > 0.0 && some.success_rate() < 100.0);
    }
}
