use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub waits: WaitConfig,
    pub stabilizer: StabilizerConfig,
    pub pricing: PricingConfig,
    pub geo: GeoConfig,
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
}

/// WebDriver endpoint and browser launch options
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_size: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

/// Bounded waits on page elements. Only the `*_required` ones abort a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WaitConfig {
    pub bus_dropdown_secs: f64,
    pub bus_fares_required_secs: f64,
    pub train_names_required_secs: f64,
    pub cookie_banner_secs: f64,
    pub price_filter_secs: f64,
    pub settle_secs: f64,
    pub dropdown_click_pause_secs: f64,
}

/// Scroll-until-stable loop for virtualized hotel lists
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub pause_ms: u64,
    pub stagnation_secs: u64,
    pub ceiling_secs: u64,
}

/// Fixed markups added to parsed base prices
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    pub bus_markup: i64,
    /// Applied to the "SL" class only.
    pub sleeper_class_markup: i64,
    pub other_class_markup: i64,
}

/// Address → map link lookup
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub bus: BusSelectors,
    pub train: TrainSelectors,
    pub hotel: HotelSelectors,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusSelectors {
    pub title: String,
    pub subtitle: String,
    pub departure: String,
    pub arrival: String,
    pub source: String,
    pub duration: String,
    pub destination: String,
    pub fare: String,
    pub gov_dropdown: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainSelectors {
    pub name: String,
    pub duration: String,
    pub time_block: String,
    pub price_container: String,
    pub price_entry: String,
    pub days_container: String,
    pub running_day: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HotelSelectors {
    pub card: String,
    pub title: String,
    pub address: String,
    pub price: String,
    pub property_type: String,
    pub rating_stars: String,
    pub price_filter: String,
    pub cookie_accept: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_size: "1920,1080".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            request_timeout_secs: 60,
            poll_interval_ms: 250,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            bus_dropdown_secs: 10.0,
            bus_fares_required_secs: 20.0,
            train_names_required_secs: 25.0,
            cookie_banner_secs: 10.0,
            price_filter_secs: 5.0,
            settle_secs: 1.0,
            dropdown_click_pause_secs: 2.5,
        }
    }
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            pause_ms: 2000,
            stagnation_secs: 10,
            ceiling_secs: 300,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            bus_markup: 300,
            sleeper_class_markup: 150,
            other_class_markup: 400,
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "HotelLocatorScript/1.0".to_string(),
            timeout_secs: 10,
            retries: 1,
        }
    }
}

impl Default for BusSelectors {
    fn default() -> Self {
        Self {
            title: ".title".to_string(),
            subtitle: ".sub-title".to_string(),
            departure: ".departure-time".to_string(),
            arrival: ".arrival-time".to_string(),
            source: ".source-name".to_string(),
            duration: ".travel-time".to_string(),
            destination: ".destination-name".to_string(),
            fare: "span.fare".to_string(),
            gov_dropdown: "a.btn.dark.filled.primary.sm.rounded-sm.inactive.button".to_string(),
        }
    }
}

impl Default for TrainSelectors {
    fn default() -> Self {
        Self {
            name: ".name".to_string(),
            duration: ".duration".to_string(),
            time_block: ".trainTime".to_string(),
            price_container: ".react-horizontal-scrolling-menu--scroll-container".to_string(),
            price_entry: ".avail-cls".to_string(),
            days_container: ".days-of-run".to_string(),
            running_day: ".running".to_string(),
        }
    }
}

impl Default for HotelSelectors {
    fn default() -> Self {
        Self {
            card: r#"div[data-testid="property-card"]"#.to_string(),
            title: r#"[data-testid="title"]"#.to_string(),
            address: r#"[data-testid="address"]"#.to_string(),
            price: r#"[data-testid="price-and-discounted-price"]"#.to_string(),
            property_type: r#"[data-testid="property-card-container"] h4"#.to_string(),
            rating_stars: r#"[data-testid="rating-stars"]"#.to_string(),
            price_filter: r#"div[data-testid="filters-group-slider"] span[role="status"]"#
                .to_string(),
            cookie_accept: "#onetrust-accept-btn-handler".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

// ── Derived values ───────────────────────────────────────────────────────────

impl BrowserConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

impl StabilizerConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn stagnation_threshold(&self) -> Duration {
        Duration::from_secs(self.stagnation_secs)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }
}

/// Seconds from config → `Duration`, clamping negatives to zero.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TRAVEL").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Ignoring unreadable configuration ({}), using defaults", e);
            AppConfig::default()
        });
        Ok(app_cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_site_behaviour() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pricing.bus_markup, 300);
        assert_eq!(cfg.pricing.sleeper_class_markup, 150);
        assert_eq!(cfg.pricing.other_class_markup, 400);
        assert_eq!(cfg.stabilizer.stagnation_threshold(), Duration::from_secs(10));
        assert_eq!(cfg.stabilizer.ceiling(), Duration::from_secs(300));
        assert_eq!(cfg.stabilizer.pause(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[pricing]\nbus_markup = 250\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.pricing.bus_markup, 250);
        assert_eq!(cfg.pricing.other_class_markup, 400);
        assert_eq!(cfg.selectors.bus.fare, "span.fare");
    }

    #[test]
    fn test_secs_clamps_negative() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(2.5), Duration::from_millis(2500));
    }
}
