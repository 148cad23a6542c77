//! Automates The Automation Challenge: logs in, reads rows from a
//! spreadsheet, fills the dynamically rendered form row by row while
//! clearing the reCAPTCHA popup when it appears, submits, and tallies the
//! outcome.

pub mod browser;
pub mod captcha;
pub mod config;
pub mod error;
pub mod filler;
pub mod form;
pub mod login;
pub mod page;
pub mod retry;
pub mod run;
pub mod selectors;
pub mod sheet;

pub use browser::Browser;
pub use captcha::{CaptchaGate, CaptchaProbe};
pub use config::{Credentials, RunnerBuilder, RunnerConfig, CHALLENGE_URL};
pub use error::{Error, Result};
pub use filler::FormFiller;
pub use form::{DiscoveredField, FieldKey, FormFieldSet};
pub use login::LoginFlow;
pub use page::Page;
pub use retry::RetryPolicy;
pub use run::{ChallengeRunner, RunResult};
pub use sheet::{Row, Spreadsheet};
