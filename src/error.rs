use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotError(String),

    #[error("Data source unreadable: {0}")]
    DataSourceError(String),

    #[error("Credentials unreadable: {0}")]
    CredentialsError(String),

    #[error("Login failed: {0}")]
    LoginError(String),

    #[error("Field fill failed: {0}")]
    FieldFillError(String),

    #[error("Field validation failed: {0}")]
    ValidationError(String),

    #[error("Submit failed: {0}")]
    SubmitError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
