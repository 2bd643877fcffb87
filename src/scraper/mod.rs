pub mod classify;
pub mod cleaner;
pub mod geo;
pub mod parsers;
pub mod snapshot;
pub mod stabilizer;
pub mod webdriver;

use crate::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;

pub use self::snapshot::SnapshotSession;
pub use self::webdriver::WebDriverSession;

// ── Session trait ─────────────────────────────────────────────────────────────

/// Opaque reference to a live element inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// A rendered page driven by some browser. Exclusively owned for one run.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Serialized DOM as currently rendered.
    async fn dom_snapshot(&mut self) -> Result<String, SessionError>;

    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError>;

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;

    async fn element_count(&mut self, selector: &str) -> Result<usize, SessionError> {
        Ok(self.find_all(selector).await?.len())
    }

    /// `Ok(false)` when the deadline passes without a match.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}
