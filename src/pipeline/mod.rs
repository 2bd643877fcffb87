//! Pipeline orchestrator: browser session → extraction → records.
//!
//! ## Run shape
//!
//! Every `run_*` entry point:
//!   1. starts a fresh `ExtractionLog`
//!   2. drives the session (navigate, bounded waits, snapshot)
//!   3. assembles records from the snapshot
//!   4. closes the session, on success and on failure alike
//!
//! Only a required wait that times out, or a session-level error, aborts a
//! run. Per-card and per-field problems degrade to sentinels, fallbacks and
//! log entries.
//!
//! The `assemble_*` functions are pure over an HTML snapshot and back the
//! offline `parse` command.

pub mod align;
pub mod rating;

use crate::config::{AppConfig, secs};
use crate::error::{Result, RunFailure, ScrapeError, SessionError};
use crate::models::{
    BusPartition, BusRecord, ExtractionLog, HotelRecord, ListingKind, PriceFilterRange,
    RouteType, TrainRecord,
};
use crate::scraper::BrowserSession;
use crate::scraper::classify::{GOVERNMENT_BUS, LabelKind, classify};
use crate::scraper::cleaner::{
    adjust_class_fares, adjust_price, parse_base_price, parse_class_fare, parse_price_filter,
};
use crate::scraper::geo::{GeoLookup, location_hint};
use crate::scraper::parsers::{parse_bus_page, parse_hotel_cards, parse_train_page};
use crate::scraper::stabilizer::{ListStabilizer, ScrollState, stabilize};
use crate::utils::Timer;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use self::align::{AlignPolicy, AlignedRow, Column, align};
use self::rating::{RandomSource, estimate_rating};

const BOOKING_PREFIX: &str = "https://www.booking.com";

/// Records of one successful run plus its diagnostics.
#[derive(Debug)]
pub struct RunReport<T> {
    pub records: T,
    pub log: ExtractionLog,
    pub elapsed: Duration,
}

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ── Buses ─────────────────────────────────────────────────────────────────

    pub async fn run_bus<S>(
        &self,
        session: &mut S,
        url: &str,
        route: RouteType,
    ) -> std::result::Result<RunReport<BusPartition>, RunFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let timer = Timer::start("Bus scraping");
        let mut log = ExtractionLog::new();
        let result = self.drive_bus(session, url, route, &mut log).await;
        release(session, &mut log).await;
        finish(result, log, &timer)
    }

    async fn drive_bus<S>(
        &self,
        session: &mut S,
        url: &str,
        route: RouteType,
        log: &mut ExtractionLog,
    ) -> Result<BusPartition>
    where
        S: BrowserSession + ?Sized,
    {
        let waits = &self.config.waits;
        let fare = &self.config.selectors.bus.fare;

        log.info(format!("Navigating to URL: {}", url));
        session.navigate(url).await?;
        self.expand_government_buses(session, log).await;

        log.info(format!("Waiting for final page content ('{}')...", fare));
        require(session, fare, secs(waits.bus_fares_required_secs)).await?;
        sleep(secs(waits.settle_secs)).await;

        let html = session.dom_snapshot().await?;
        self.assemble_bus(&html, route, log)
    }

    /// Government operators hide their buses behind "show" buttons. Best effort.
    async fn expand_government_buses<S>(&self, session: &mut S, log: &mut ExtractionLog)
    where
        S: BrowserSession + ?Sized,
    {
        let selector = &self.config.selectors.bus.gov_dropdown;
        let waits = &self.config.waits;
        log.info("Attempting to expand government bus sections (if needed)...");

        match session.wait_for(selector, secs(waits.bus_dropdown_secs)).await {
            Ok(true) => {}
            Ok(false) => {
                log.info("Timed out waiting for government bus dropdown buttons.");
                return;
            }
            Err(e) => {
                log.warn(format!("Error in expand_government_buses: {}", e));
                return;
            }
        }

        let buttons = match session.find_all(selector).await {
            Ok(b) => b,
            Err(e) => {
                log.warn(format!("Error in expand_government_buses: {}", e));
                return;
            }
        };
        log.info(format!("Found {} potential government dropdown button(s).", buttons.len()));

        for (i, button) in buttons.iter().enumerate() {
            let text = session.element_text(button).await.unwrap_or_default();
            if text.to_lowercase().contains("hide") {
                log.info(format!("Skipped clicking dropdown #{} (text: '{}')", i + 1, text));
                continue;
            }
            match session.click(button).await {
                Ok(()) => {
                    log.info(format!("Clicked dropdown #{} (text was: '{}').", i + 1, text));
                    sleep(secs(waits.dropdown_click_pause_secs)).await;
                }
                Err(e) => {
                    log.warn(format!("Error with dropdown button #{}: {}", i + 1, e));
                }
            }
        }
    }

    pub fn assemble_bus(
        &self,
        html: &str,
        route: RouteType,
        log: &mut ExtractionLog,
    ) -> Result<BusPartition> {
        log.info("Parsing HTML and extracting bus data...");
        let raw = parse_bus_page(html, &self.config.selectors.bus)?;
        let markup = self.config.pricing.bus_markup;

        let titles = raw
            .titles
            .iter()
            .map(|t| classify(t, LabelKind::BusOperator, log))
            .collect();
        let bus_types = raw
            .bus_types
            .iter()
            .map(|t| classify(t, LabelKind::BusType, log))
            .collect();
        let fares = raw
            .fares
            .iter()
            .map(|f| {
                if parse_base_price(f).is_none() {
                    log.warn(format!("Price '{}' is not numeric; kept as is.", f));
                }
                adjust_price(f, markup)
            })
            .collect();

        let rows = align(
            [
                Column::new("Titles", titles),
                Column::new("Subtitles", bus_types),
                Column::new("Departures", raw.departures),
                Column::new("Arrivals", raw.arrivals),
                Column::new("Sources", raw.sources),
                Column::new("Durations", raw.durations),
                Column::new("Destinations", raw.destinations),
                Column::new("Fares", fares),
            ],
            AlignPolicy::TruncateToMin,
            &route.tag(ListingKind::Bus),
            log,
        );

        let records: Vec<BusRecord> = rows.into_iter().map(bus_record).collect();
        log.info(format!("Bus scraping finished. Found {} bus entries.", records.len()));
        Ok(partition_buses(records))
    }

    // ── Trains ────────────────────────────────────────────────────────────────

    pub async fn run_train<S>(
        &self,
        session: &mut S,
        url: &str,
        route: RouteType,
    ) -> std::result::Result<RunReport<Vec<TrainRecord>>, RunFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let timer = Timer::start("Train scraping");
        let mut log = ExtractionLog::new();
        let result = self.drive_train(session, url, route, &mut log).await;
        release(session, &mut log).await;
        finish(result, log, &timer)
    }

    async fn drive_train<S>(
        &self,
        session: &mut S,
        url: &str,
        route: RouteType,
        log: &mut ExtractionLog,
    ) -> Result<Vec<TrainRecord>>
    where
        S: BrowserSession + ?Sized,
    {
        let waits = &self.config.waits;
        let name = &self.config.selectors.train.name;

        log.info(format!("Navigating to URL: {}", url));
        session.navigate(url).await?;

        log.info(format!("Waiting for final train page content ('{}')...", name));
        require(session, name, secs(waits.train_names_required_secs)).await?;
        sleep(secs(waits.settle_secs)).await;

        let html = session.dom_snapshot().await?;
        self.assemble_train(&html, route, log)
    }

    pub fn assemble_train(
        &self,
        html: &str,
        route: RouteType,
        log: &mut ExtractionLog,
    ) -> Result<Vec<TrainRecord>> {
        log.info("Parsing HTML and extracting train data...");
        let raw = parse_train_page(html, &self.config.selectors.train)?;
        let pricing = &self.config.pricing;

        let types = raw
            .names
            .iter()
            .map(|n| classify(n, LabelKind::TrainType, log))
            .collect();
        let prices = raw
            .fare_groups
            .iter()
            .map(|group| {
                for entry in group.iter().filter(|e| parse_class_fare(e).is_none()) {
                    log.warn(format!("Fare '{}' is not numeric; kept as is.", entry));
                }
                adjust_class_fares(group, pricing)
            })
            .collect();

        let rows = align(
            [
                Column::new("Names", raw.names),
                Column::new("Types", types),
                Column::new("Departures", raw.departures),
                Column::new("Arrivals", raw.arrivals),
                Column::new("Sources", raw.sources),
                Column::new("Durations", raw.durations),
                Column::new("Destinations", raw.destinations),
                Column::new("Prices", prices),
                Column::new("Frequencies", raw.frequencies),
            ],
            AlignPolicy::PadToMax,
            &route.tag(ListingKind::Train),
            log,
        );

        let records: Vec<TrainRecord> = rows.into_iter().map(train_record).collect();
        log.info(format!("Train scraping finished. Found {} train entries.", records.len()));
        Ok(records)
    }

    // ── Hotels ────────────────────────────────────────────────────────────────

    pub async fn run_hotel<S>(
        &self,
        session: &mut S,
        url: &str,
        geo: &dyn GeoLookup,
        rng: &mut dyn RandomSource,
    ) -> std::result::Result<RunReport<Vec<HotelRecord>>, RunFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let timer = Timer::start("Hotel scraping");
        let mut log = ExtractionLog::new();
        let result = self.drive_hotel(session, url, geo, rng, &mut log).await;
        release(session, &mut log).await;
        finish(result, log, &timer)
    }

    async fn drive_hotel<S>(
        &self,
        session: &mut S,
        url: &str,
        geo: &dyn GeoLookup,
        rng: &mut dyn RandomSource,
        log: &mut ExtractionLog,
    ) -> Result<Vec<HotelRecord>>
    where
        S: BrowserSession + ?Sized,
    {
        validate_hotel_url(url)?;
        log.info(format!("Navigating to hotel URL: {}", url));
        session.navigate(url).await?;
        self.collect_hotels(session, geo, rng, log).await
    }

    /// Hotel extraction against a page that is already loaded, such as a
    /// saved snapshot. No URL check and no navigation.
    pub async fn replay_hotel<S>(
        &self,
        session: &mut S,
        geo: &dyn GeoLookup,
        rng: &mut dyn RandomSource,
    ) -> std::result::Result<RunReport<Vec<HotelRecord>>, RunFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let timer = Timer::start("Hotel snapshot parsing");
        let mut log = ExtractionLog::new();
        let result = self.collect_hotels(session, geo, rng, &mut log).await;
        release(session, &mut log).await;
        finish(result, log, &timer)
    }

    async fn collect_hotels<S>(
        &self,
        session: &mut S,
        geo: &dyn GeoLookup,
        rng: &mut dyn RandomSource,
        log: &mut ExtractionLog,
    ) -> Result<Vec<HotelRecord>>
    where
        S: BrowserSession + ?Sized,
    {
        let card = &self.config.selectors.hotel.card;
        self.accept_cookies(session, log).await;

        let machine = ListStabilizer::from_config(&self.config.stabilizer);
        let scrolled = stabilize(session, card, machine, log).await;
        debug!(
            "scroll loop ended {:?} with {} cards after {:?}",
            scrolled.state, scrolled.items, scrolled.elapsed
        );
        if scrolled.state == ScrollState::TimedOut && scrolled.items == 0 {
            log.warn("No hotel cards were visible when scrolling stopped.");
        }

        let range = self.price_filter_range(session, log).await;
        sleep(secs(self.config.waits.settle_secs)).await;

        let html = session.dom_snapshot().await?;
        self.assemble_hotels(&html, range, geo, rng, log).await
    }

    async fn accept_cookies<S>(&self, session: &mut S, log: &mut ExtractionLog)
    where
        S: BrowserSession + ?Sized,
    {
        let selector = &self.config.selectors.hotel.cookie_accept;
        let found = session
            .wait_for(selector, secs(self.config.waits.cookie_banner_secs))
            .await
            .unwrap_or(false);
        if !found {
            log.info("Cookie consent banner not found.");
            return;
        }

        let clicked = match session.find_all(selector).await {
            Ok(buttons) => match buttons.first() {
                Some(button) => session.click(button).await,
                None => Err(SessionError::ElementNotFound(selector.clone())),
            },
            Err(e) => Err(e),
        };
        match clicked {
            Ok(()) => sleep(secs(self.config.waits.settle_secs)).await,
            Err(e) => log.warn(format!("Could not accept cookie banner: {}", e)),
        }
    }

    /// Bounds shown on the price filter slider, once it has loaded.
    async fn price_filter_range<S>(&self, session: &mut S, log: &mut ExtractionLog) -> PriceFilterRange
    where
        S: BrowserSession + ?Sized,
    {
        let selector = &self.config.selectors.hotel.price_filter;
        let timeout = secs(self.config.waits.price_filter_secs);

        let text = match session.wait_for(selector, timeout).await {
            Ok(true) => match session.find_all(selector).await {
                Ok(found) => match found.first() {
                    Some(el) => session.element_text(el).await,
                    None => Err(SessionError::ElementNotFound(selector.clone())),
                },
                Err(e) => Err(e),
            },
            Ok(false) | Err(SessionError::Timeout(_)) => {
                log.warn("Warning: Price filter slider not found on page. Cannot estimate ratings.");
                return PriceFilterRange::unknown();
            }
            Err(e) => Err(e),
        };

        match text.map(|t| parse_price_filter(&t)) {
            Ok(Some(range)) => {
                log.info(format!(
                    "Found price filter range: Min={}, Max={}.",
                    range.min.unwrap_or_default(),
                    range.max.unwrap_or_default()
                ));
                range
            }
            Ok(None) => {
                log.warn("Warning: Could not get price filter. Reason: no numeric range in slider text");
                PriceFilterRange::unknown()
            }
            Err(e) => {
                log.warn(format!("Warning: Could not get price filter. Reason: {}", e));
                PriceFilterRange::unknown()
            }
        }
    }

    pub async fn assemble_hotels(
        &self,
        html: &str,
        range: PriceFilterRange,
        geo: &dyn GeoLookup,
        rng: &mut dyn RandomSource,
        log: &mut ExtractionLog,
    ) -> Result<Vec<HotelRecord>> {
        let cards = parse_hotel_cards(html, &self.config.selectors.hotel)?;
        log.info(format!("Found {} hotel cards to process.", cards.len()));

        let mut records = Vec::with_capacity(cards.len());
        for (i, card) in cards.into_iter().enumerate() {
            let rating = match card.stars {
                Some(stars) => stars.to_string(),
                None => estimate_rating(&card.price, range, rng, i, log),
            };
            let map_link = geo.resolve(&card.title, location_hint(&card.address)).await;

            records.push(HotelRecord {
                name: card.title,
                address: card.address,
                rating,
                price: card.price,
                property_type: card.property_type,
                map_link,
            });
        }
        Ok(records)
    }
}

// ── Run helpers ───────────────────────────────────────────────────────────────

/// Wait on an element the run cannot continue without.
async fn require<S>(session: &mut S, selector: &str, timeout: Duration) -> Result<()>
where
    S: BrowserSession + ?Sized,
{
    match session.wait_for(selector, timeout).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(SessionError::Timeout(_)) => Err(ScrapeError::ResourceTimeout {
            selector: selector.to_string(),
            waited: timeout,
        }),
        Err(e) => Err(e.into()),
    }
}

async fn release<S>(session: &mut S, log: &mut ExtractionLog)
where
    S: BrowserSession + ?Sized,
{
    match session.close().await {
        Ok(()) => log.info("Browser session closed."),
        Err(e) => log.warn(format!("Browser session did not close cleanly: {}", e)),
    }
}

fn finish<T>(
    result: Result<T>,
    mut log: ExtractionLog,
    timer: &Timer,
) -> std::result::Result<RunReport<T>, RunFailure> {
    match result {
        Ok(records) => Ok(RunReport {
            records,
            log,
            elapsed: timer.elapsed(),
        }),
        Err(error) => {
            log.error(format!("Run aborted: {}", error));
            Err(RunFailure { error, log })
        }
    }
}

pub fn validate_hotel_url(url: &str) -> Result<()> {
    if url.starts_with(BOOKING_PREFIX) {
        Ok(())
    } else {
        Err(ScrapeError::InvalidUrl(format!(
            "expected a {} search URL, got '{}'",
            BOOKING_PREFIX, url
        )))
    }
}

// ── Record construction ───────────────────────────────────────────────────────

fn bus_record(row: AlignedRow<8>) -> BusRecord {
    let [name, bus_type, departure, arrival, origin, duration, destination, price] = row.fields;
    BusRecord {
        name,
        bus_type,
        departure,
        arrival,
        origin,
        duration,
        destination,
        price,
        route_type: row.route_type,
    }
}

fn train_record(row: AlignedRow<9>) -> TrainRecord {
    let [name, train_type, departure, arrival, origin, duration, destination, prices, frequency] =
        row.fields;
    TrainRecord {
        name,
        train_type,
        departure,
        arrival,
        origin,
        duration,
        destination,
        prices,
        frequency,
        route_type: row.route_type,
    }
}

/// Government/RTC operators: canonical government label, or "RTC" anywhere
/// in the name or type column.
pub fn is_government(bus: &BusRecord) -> bool {
    bus.name == GOVERNMENT_BUS
        || bus.name.to_lowercase().contains("rtc")
        || bus.bus_type.to_lowercase().contains("rtc")
}

pub fn partition_buses(records: Vec<BusRecord>) -> BusPartition {
    let (government, private) = records.into_iter().partition(is_government);
    BusPartition { government, private }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
