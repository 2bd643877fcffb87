use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Marker for a field that was structurally absent from the card.
pub const SENTINEL: &str = "N/A";

pub fn sentinel() -> String {
    SENTINEL.to_string()
}

pub fn is_sentinel(s: &str) -> bool {
    s == SENTINEL
}

// ── Listing kinds ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Bus,
    Train,
    Hotel,
}

impl ListingKind {
    pub fn label(self) -> &'static str {
        match self {
            ListingKind::Bus => "Bus",
            ListingKind::Train => "Train",
            ListingKind::Hotel => "Hotel",
        }
    }
}

/// Caller-supplied tag separating direct results from connecting ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RouteType {
    #[default]
    Route,
    Enroute,
}

impl RouteType {
    /// "Bus-Route", "Train-Enroute", ...
    pub fn tag(self, kind: ListingKind) -> String {
        let suffix = match self {
            RouteType::Route => "Route",
            RouteType::Enroute => "Enroute",
        };
        format!("{}-{}", kind.label(), suffix)
    }
}

// ── Output records ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BusRecord {
    #[serde(rename = "Bus Name")]
    pub name: String,
    #[serde(rename = "Bus Type")]
    pub bus_type: String,
    #[serde(rename = "Departure")]
    pub departure: String,
    #[serde(rename = "Arrival")]
    pub arrival: String,
    #[serde(rename = "Starting Place")]
    pub origin: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Ending Place")]
    pub destination: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Route Type")]
    pub route_type: String,
}

#[cfg(test)]
impl BusRecord {
    pub const COLUMNS: [&'static str; 9] = [
        "Bus Name", "Bus Type", "Departure", "Arrival", "Starting Place",
        "Duration", "Ending Place", "Price", "Route Type",
    ];
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrainRecord {
    #[serde(rename = "Train Name")]
    pub name: String,
    #[serde(rename = "Train Type")]
    pub train_type: String,
    #[serde(rename = "Departure")]
    pub departure: String,
    #[serde(rename = "Arrival")]
    pub arrival: String,
    #[serde(rename = "Starting Station")]
    pub origin: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Destination Station")]
    pub destination: String,
    #[serde(rename = "Prices")]
    pub prices: String,
    #[serde(rename = "Frequency")]
    pub frequency: String,
    #[serde(rename = "Route Type")]
    pub route_type: String,
}

#[cfg(test)]
impl TrainRecord {
    pub const COLUMNS: [&'static str; 10] = [
        "Train Name", "Train Type", "Departure", "Arrival", "Starting Station",
        "Duration", "Destination Station", "Prices", "Frequency", "Route Type",
    ];
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HotelRecord {
    #[serde(rename = "Hotel Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Rating")]
    pub rating: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Type")]
    pub property_type: String,
    #[serde(rename = "Google Maps Link")]
    pub map_link: Option<String>,
}

#[cfg(test)]
impl HotelRecord {
    pub const COLUMNS: [&'static str; 6] = [
        "Hotel Name", "Address", "Rating", "Price", "Type", "Google Maps Link",
    ];
}

/// Bus rows split by operator kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusPartition {
    pub government: Vec<BusRecord>,
    pub private: Vec<BusRecord>,
}

impl BusPartition {
    pub fn len(&self) -> usize {
        self.government.len() + self.private.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Hotel price filter ────────────────────────────────────────────────────────

/// Bounds read from the page's price filter slider. Either side may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceFilterRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl PriceFilterRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Option<(u64, u64)> {
        Some((self.min?, self.max?))
    }
}

// ── Extraction log ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.at.format("%H:%M:%S"), self.level, self.message)
    }
}

/// Run-scoped, append-only diagnostics shown to the user after a run.
/// Entries never influence extracted values.
#[derive(Debug, Clone, Default)]
pub struct ExtractionLog {
    entries: Vec<LogEntry>,
}

impl ExtractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.push(LogLevel::Error, message);
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.entries.push(LogEntry {
            at: Local::now().naive_local(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at warning level or above.
    pub fn problems(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.level != LogLevel::Info)
    }

    #[cfg(test)]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_tag() {
        assert_eq!(RouteType::Route.tag(ListingKind::Bus), "Bus-Route");
        assert_eq!(RouteType::Enroute.tag(ListingKind::Train), "Train-Enroute");
    }

    #[test]
    fn test_price_filter_bounds() {
        assert_eq!(PriceFilterRange::new(0, 100).bounds(), Some((0, 100)));
        let half = PriceFilterRange { min: Some(10), max: None };
        assert_eq!(half.bounds(), None);
        assert_eq!(PriceFilterRange::unknown().bounds(), None);
    }

    #[test]
    fn test_log_is_ordered_and_levelled() {
        let mut log = ExtractionLog::new();
        log.info("first");
        log.warn("second");
        log.error("third");

        let messages: Vec<&str> = log.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(log.problems().count(), 2);
        assert!(log.contains("sec"));
    }
}
