use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use challenge_runner::{
    Browser, ChallengeRunner, Credentials, LoginFlow, RetryPolicy, RunnerConfig, Spreadsheet,
};

#[derive(Parser)]
#[command(name = "challenge-runner")]
#[command(about = "Fill The Automation Challenge form from a spreadsheet", long_about = None)]
struct Cli {
    /// Spreadsheet with one row per submission
    #[arg(long, default_value = "data/challenge.xlsx")]
    data: PathBuf,

    /// JSON file holding {"email": ..., "password": ...}
    #[arg(long, default_value = "data/login.json")]
    credentials: PathBuf,

    /// Challenge URL
    #[arg(long)]
    url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Chrome or Chromium executable to launch
    #[arg(long)]
    chrome: Option<String>,

    /// Attempts per row before it counts as failed
    #[arg(long, default_value_t = 3)]
    row_attempts: u32,

    /// Attempts to clear the captcha popup each time it appears
    #[arg(long, default_value_t = 3)]
    gate_attempts: u32,

    /// Save a screenshot here whenever a row fails
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    let credentials = Credentials::from_file(&cli.credentials)
        .with_context(|| format!("loading credentials from {}", cli.credentials.display()))?;
    let sheet = Spreadsheet::open(&cli.data)
        .with_context(|| format!("opening spreadsheet {}", cli.data.display()))?;
    info!("loaded {} rows from {}", sheet.row_count(), cli.data.display());

    let config = runner_config(cli)?;

    let browser = Browser::launch(&config).await.context("launching browser")?;
    let page = browser
        .new_page(&config.challenge_url)
        .await
        .context("opening challenge page")?;

    LoginFlow::new(page.clone())
        .login(&credentials)
        .await
        .context("logging in")?;

    let runner = ChallengeRunner::new(page, sheet, &config);
    let result = runner.run_all().await;

    info!(
        "done: total {}, success {}, errors {}, success rate {:.2}%",
        result.total,
        result.success,
        result.errors,
        result.success_rate()
    );

    Ok(())
}

/// Translate flags into a runner configuration. Both retry flags become
/// fixed one-second policies.
fn runner_config(cli: Cli) -> anyhow::Result<RunnerConfig> {
    let mut builder = RunnerConfig::builder()
        .headless(!cli.headed)
        .row_retry(RetryPolicy::fixed(cli.row_attempts, Duration::from_secs(1)))
        .gate_retry(RetryPolicy::fixed(cli.gate_attempts, Duration::from_secs(1)));
    if let Some(url) = cli.url {
        builder = builder.challenge_url(url);
    }
    if let Some(chrome) = cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    if let Some(dir) = cli.screenshot_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating screenshot dir {}", dir.display()))?;
        builder = builder.screenshot_dir(dir);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_runner::CHALLENGE_URL;

    #[test]
    fn flags_reach_the_runner_config() {
        let cli = Cli::try_parse_from([
            "challenge-runner",
            "--row-attempts",
            "5",
            "--gate-attempts",
            "2",
            "--headed",
            "--url",
            "https://example.test/",
            "--chrome",
            "/usr/bin/chromium",
        ])
        .expect("Failed to parse args");
        let config = runner_config(cli).expect("Failed to build config");

        assert!(!config.headless);
        assert_eq!(config.challenge_url, "https://example.test/");
        assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(
            config.row_retry,
            RetryPolicy::fixed(5, Duration::from_secs(1))
        );
        assert_eq!(
            config.gate_retry,
            RetryPolicy::fixed(2, Duration::from_secs(1))
        );
    }

    #[test]
    fn defaults_run_headless_with_three_attempts_each() {
        let cli = Cli::try_parse_from(["challenge-runner"]).expect("Failed to parse args");
        let config = runner_config(cli).expect("Failed to build config");

        assert!(config.headless);
        assert_eq!(config.row_retry.max_attempts, 3);
        assert_eq!(config.gate_retry.max_attempts, 3);
        assert_eq!(config.challenge_url, CHALLENGE_URL);
        assert!(config.screenshot_dir.is_none());
    }
}
