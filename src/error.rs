use std::time::Duration;
use thiserror::Error;

use crate::models::ExtractionLog;

/// Failures reported by a [`crate::scraper::BrowserSession`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("browser transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Run-level failures. Anything below this level degrades to a sentinel
/// or a fallback value instead.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("required element `{selector}` did not appear within {waited:?}")]
    ResourceTimeout { selector: String, waited: Duration },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid CSS selector `{0}`")]
    InvalidSelector(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ScrapeError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ScrapeError::ResourceTimeout { .. } => {
                Some("The page layout may have changed; check the selectors in config/local.toml")
            }
            ScrapeError::Session(SessionError::Transport(_)) => {
                Some("Is chromedriver running? Set TRAVEL_BROWSER__WEBDRIVER_URL to its address")
            }
            ScrapeError::InvalidSelector(_) => Some("Fix the selector under [selectors] in the config"),
            _ => None,
        }
    }
}

/// A run that aborted. The log collected up to the failure travels with it.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: ScrapeError,
    pub log: ExtractionLog,
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
