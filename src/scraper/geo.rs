use crate::config::GeoConfig;
use crate::models::is_sentinel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

const MAPS_SEARCH: &str = "https://www.google.com/maps/search/";

/// Resolves a place name to a map link. Failures yield `None`, never an error.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn resolve(&self, name: &str, hint_location: Option<&str>) -> Option<String>;
}

/// Lookup that never resolves; used when map links are switched off.
pub struct NoGeoLookup;

#[async_trait]
impl GeoLookup for NoGeoLookup {
    async fn resolve(&self, _name: &str, _hint_location: Option<&str>) -> Option<String> {
        None
    }
}

// ── Nominatim ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct NominatimLookup {
    client: reqwest::Client,
    endpoint: String,
    retries: usize,
}

impl NominatimLookup {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build geocoding client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retries: config.retries,
        })
    }

    async fn search(&self, query: &str) -> Result<Option<Place>> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[("q", query), ("format", "json"), ("limit", "1")],
        )?;
        let places: Vec<Place> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(places.into_iter().next())
    }
}

#[async_trait]
impl GeoLookup for NominatimLookup {
    async fn resolve(&self, name: &str, hint_location: Option<&str>) -> Option<String> {
        if name.trim().is_empty() || is_sentinel(name) {
            return None;
        }
        let query = match hint_location {
            Some(city) => format!("{}, {}", name, city),
            None => name.to_string(),
        };

        let strategy = ExponentialBackoff::from_millis(250).map(jitter).take(self.retries);
        match Retry::start(strategy, || self.search(&query)).await {
            Ok(place) => {
                debug!("geocoded '{}' → {:?}", query, place);
                Some(maps_link(name, &query, place.as_ref()))
            }
            Err(e) => {
                warn!("Geocoding failed for '{}': {:#}", query, e);
                None
            }
        }
    }
}

/// Link pinned to coordinates when the place was found, a plain search otherwise.
/// The query is percent-encoded (`%20` for spaces); coordinates go in as `lat,lon`.
fn maps_link(name: &str, query: &str, place: Option<&Place>) -> String {
    match place {
        Some(p) => format!(
            "{}?api=1&query={}&query_place_id={},{}",
            MAPS_SEARCH,
            urlencoding::encode(name),
            p.lat.trim(),
            p.lon.trim()
        ),
        None => format!("{}?api=1&query={}", MAPS_SEARCH, urlencoding::encode(query)),
    }
}

/// First comma-separated segment of an address, used as the city hint.
pub fn location_hint(address: &str) -> Option<&str> {
    if is_sentinel(address) {
        return None;
    }
    address.split(',').next().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_link_with_coordinates() {
        let place = Place { lat: "18.92".into(), lon: "72.83".into() };
        let link = maps_link("Taj Mahal Palace", "Taj Mahal Palace, Colaba", Some(&place));
        assert_eq!(
            link,
            "https://www.google.com/maps/search/?api=1&query=Taj%20Mahal%20Palace&query_place_id=18.92,72.83"
        );
    }

    #[test]
    fn test_maps_link_without_hit_uses_full_query() {
        let link = maps_link("Inn & Suites", "Inn & Suites, Goa", None);
        assert_eq!(link, "https://www.google.com/maps/search/?api=1&query=Inn%20%26%20Suites%2C%20Goa");
    }

    #[test]
    fn test_location_hint() {
        assert_eq!(location_hint("Colaba, Mumbai"), Some("Colaba"));
        assert_eq!(location_hint("N/A"), None);
        assert_eq!(location_hint(""), None);
    }

    #[tokio::test]
    async fn test_sentinel_name_never_queries() {
        let lookup = NominatimLookup::new(&GeoConfig {
            endpoint: "http://127.0.0.1:9/search".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(lookup.resolve("N/A", Some("Goa")).await, None);
    }

    #[tokio::test]
    async fn test_transport_failure_yields_none() {
        let lookup = NominatimLookup::new(&GeoConfig {
            endpoint: "http://127.0.0.1:9/search".into(),
            retries: 0,
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(lookup.resolve("Backpacker Inn", Some("Goa")).await, None);
    }
}
