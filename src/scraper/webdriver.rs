//! Minimal W3C WebDriver client (chromedriver, geckodriver, ...).

use crate::config::BrowserConfig;
use crate::error::SessionError;
use crate::scraper::{BrowserSession, ElementHandle};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Key under which W3C WebDriver serializes element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a4f5cd3fef3";

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_INTO_VIEW: &str =
    "arguments[0].scrollIntoView({behavior: 'auto', block: 'center', inline: 'nearest'});";

pub struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
    poll_interval: Duration,
}

impl WebDriverSession {
    /// Open a new browser session on the configured WebDriver server.
    pub async fn start(config: &BrowserConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let mut session = Self {
            client,
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
            session_id: None,
            poll_interval: config.poll_interval(),
        };

        let value = session
            .command(Method::POST, "/session", Some(capabilities(config)))
            .await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| SessionError::Protocol("new session response has no sessionId".into()))?;

        info!("WebDriver session {} started at {}", id, session.base_url);
        session.session_id = Some(id.to_string());
        Ok(session)
    }

    fn session_path(&self, suffix: &str) -> Result<String, SessionError> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| SessionError::Protocol("session already closed".into()))?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, SessionError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let mut payload: Value = request.send().await?.json().await?;

        if let Some(code) = payload["value"]["error"].as_str() {
            let message = payload["value"]["message"].as_str().unwrap_or_default();
            return Err(map_error(code, message));
        }
        Ok(payload.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }

    async fn session_command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value, SessionError> {
        let path = self.session_path(suffix)?;
        self.command(method, &path, body).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        self.session_command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }
}

fn capabilities(config: &BrowserConfig) -> Value {
    let mut args = vec![
        "--disable-gpu".to_string(),
        format!("--window-size={}", config.window_size),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        format!("user-agent={}", config.user_agent),
    ];
    if config.headless {
        args.insert(0, "--headless".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "normal",
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": { "profile.managed_default_content_settings.images": 2 }
                }
            }
        }
    })
}

fn map_error(code: &str, message: &str) -> SessionError {
    match code {
        "no such element" | "stale element reference" => {
            SessionError::ElementNotFound(message.to_string())
        }
        "timeout" | "script timeout" => SessionError::Timeout(message.to_string()),
        _ => SessionError::Protocol(format!("{}: {}", code, message)),
    }
}

fn element_ref(element: &ElementHandle) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

fn parse_elements(value: &Value) -> Vec<ElementHandle> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item[ELEMENT_KEY].as_str())
                .map(|id| ElementHandle(id.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        info!("Navigating to {}", url);
        self.session_command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn dom_snapshot(&mut self) -> Result<String, SessionError> {
        let value = self.session_command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::Protocol("page source is not a string".into()))
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError> {
        let value = self
            .session_command(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        Ok(parse_elements(&value))
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError> {
        let suffix = format!("/element/{}/text", element.0);
        let value = self.session_command(Method::GET, &suffix, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.execute(SCROLL_INTO_VIEW, vec![element_ref(element)]).await?;
        let suffix = format!("/element/{}/click", element.0);
        self.session_command(Method::POST, &suffix, Some(json!({}))).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.execute(SCROLL_TO_BOTTOM, vec![]).await?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.find_all(selector).await?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("wait_for({}) gave up after {:?}", selector, timeout);
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        let path = format!("/session/{}", id);
        if let Err(e) = self.command(Method::DELETE, &path, None).await {
            warn!("Failed to close WebDriver session {}: {}", id, e);
            return Err(e);
        }
        info!("WebDriver session {} closed", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements() {
        let value = json!([
            { ELEMENT_KEY: "a-1" },
            { ELEMENT_KEY: "a-2" },
            { "unexpected": "x" }
        ]);
        assert_eq!(
            parse_elements(&value),
            vec![ElementHandle("a-1".into()), ElementHandle("a-2".into())]
        );
        assert!(parse_elements(&json!(null)).is_empty());
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(map_error("no such element", "x"), SessionError::ElementNotFound(_)));
        assert!(matches!(map_error("timeout", "x"), SessionError::Timeout(_)));
        assert!(matches!(map_error("invalid session id", "x"), SessionError::Protocol(_)));
    }

    #[test]
    fn test_capabilities_headless_flag() {
        let caps = capabilities(&BrowserConfig::default());
        let args = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless");

        let caps = capabilities(&BrowserConfig { headless: false, ..Default::default() });
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().all(|a| a != "--headless"));
    }

    #[tokio::test]
    async fn test_start_without_server_is_transport_error() {
        let config = BrowserConfig {
            webdriver_url: "http://127.0.0.1:9".into(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let err = WebDriverSession::start(&config).await.err().unwrap();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
