//! Pseudo-ratings for hotel cards that show no star block.
//!
//! The card's price is placed inside the page's price-filter range and a
//! rating is drawn from the band it falls in. The midpoint is `max / 2`,
//! not `(min + max) / 2`.

use crate::models::{ExtractionLog, PriceFilterRange, is_sentinel};
use crate::scraper::cleaner::parse_digits;

/// Uniform draws in `[low, high]`. Injected so tests can pin the draw.
pub trait RandomSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

/// Thread-local generator from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        rand::random_range(low..=high)
    }
}

pub const LOW_BAND: (f64, f64) = (3.0, 3.5);
pub const HIGH_BAND: (f64, f64) = (3.5, 4.0);
pub const OUTSIDE_BAND: (f64, f64) = (2.5, 3.0);
pub const NEUTRAL_BAND: (f64, f64) = (3.0, 4.0);
pub const FAILURE_BAND: (f64, f64) = (2.5, 3.5);

/// Band for a known price, or the neutral band when anything is unknown.
pub fn rating_band(price: Option<u64>, range: PriceFilterRange) -> (f64, f64) {
    let (Some(price), Some((min, max))) = (price, range.bounds()) else {
        return NEUTRAL_BAND;
    };
    let price = price as f64;
    let (min, max) = (min as f64, max as f64);
    let mid = max / 2.0;

    if min <= price && price <= mid {
        LOW_BAND
    } else if mid < price && price <= max {
        HIGH_BAND
    } else {
        OUTSIDE_BAND
    }
}

fn draw(rng: &mut dyn RandomSource, (low, high): (f64, f64)) -> String {
    format!("{:.1}", rng.uniform(low, high).clamp(low, high))
}

/// Rating for a card whose price text is `raw_price` (cleaned, or the sentinel).
/// Never fails: unreadable prices draw from the failure band and are logged.
pub fn estimate_rating(
    raw_price: &str,
    range: PriceFilterRange,
    rng: &mut dyn RandomSource,
    card_index: usize,
    log: &mut ExtractionLog,
) -> String {
    if raw_price.trim().is_empty() || is_sentinel(raw_price) {
        return draw(rng, rating_band(None, range));
    }
    match parse_digits(raw_price) {
        Some(price) => draw(rng, rating_band(Some(price), range)),
        None => {
            log.warn(format!(
                "Card {}: Failed rating estimation due to error: price '{}' is not numeric",
                card_index, raw_price
            ));
            draw(rng, FAILURE_BAND)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
