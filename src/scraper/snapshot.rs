//! Session over a saved, already rendered page. Nothing ever changes, so
//! scrolling is a no-op and waits resolve immediately.

use crate::error::SessionError;
use crate::scraper::parsers::inner_text;
use crate::scraper::{BrowserSession, ElementHandle};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SnapshotSession {
    html: String,
    visited: Vec<String>,
    clicks: Vec<ElementHandle>,
    closed: bool,
}

impl SnapshotSession {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    #[cfg(test)]
    pub fn clicks(&self) -> &[ElementHandle] {
        &self.clicks
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Protocol("session already closed".into()));
        }
        Ok(())
    }

    fn parse_selector(selector: &str) -> Result<Selector, SessionError> {
        Selector::parse(selector)
            .map_err(|e| SessionError::Protocol(format!("invalid selector {}: {:?}", selector, e)))
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>, SessionError> {
        let sel = Self::parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc.select(&sel).map(inner_text).collect())
    }

    /// Handles are "<index>@<selector>" so text lookups can re-run the query.
    fn resolve(&self, element: &ElementHandle) -> Result<String, SessionError> {
        let not_found = || SessionError::ElementNotFound(element.0.clone());
        let (index, selector) = element.0.split_once('@').ok_or_else(not_found)?;
        let index: usize = index.parse().map_err(|_| not_found())?;
        self.texts(selector)?.into_iter().nth(index).ok_or_else(not_found)
    }
}

#[async_trait]
impl BrowserSession for SnapshotSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.visited.push(url.to_string());
        Ok(())
    }

    async fn dom_snapshot(&mut self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(self.html.clone())
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError> {
        self.ensure_open()?;
        let count = self.texts(selector)?.len();
        Ok((0..count)
            .map(|i| ElementHandle(format!("{}@{}", i, selector)))
            .collect())
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError> {
        self.resolve(element)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.resolve(element)?;
        self.clicks.push(element.clone());
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(!self.texts(selector)?.is_empty())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            debug!(
                "Snapshot session closed after {} page(s) and {} click(s)",
                self.visited.len(),
                self.clicks.len()
            );
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<ul><li class="x">one</li><li class="x">two</li></ul>"#;

    #[tokio::test]
    async fn test_find_and_read_elements() {
        let mut s = SnapshotSession::new(PAGE);
        let found = s.find_all("li.x").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(s.element_text(&found[1]).await.unwrap(), "two");
        assert_eq!(s.element_count("li.x").await.unwrap(), 2);
        assert!(s.wait_for("li.x", Duration::from_secs(1)).await.unwrap());
        assert!(!s.wait_for("li.y", Duration::from_secs(1)).await.unwrap());
    }

    #[test]
    fn test_unknown_handle_is_not_found() {
        let mut s = SnapshotSession::new(PAGE);
        let err = tokio_test::block_on(s.element_text(&ElementHandle("9@li.x".into()))).unwrap_err();
        assert!(matches!(err, SessionError::ElementNotFound(_)));
    }

    #[test]
    fn test_closed_session_refuses_commands() {
        let mut s = SnapshotSession::new(PAGE);
        tokio_test::block_on(s.close()).unwrap();
        assert!(s.is_closed());
        let err = tokio_test::block_on(s.navigate("file:///tmp/page.html")).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
        assert!(s.visited().is_empty());
        // Closing twice is harmless.
        tokio_test::block_on(s.close()).unwrap();
    }
}
