use crate::config::PricingConfig;
use crate::models::{PriceFilterRange, SENTINEL, sentinel};

// ── Field cleaners ────────────────────────────────────────────────────────────
//
// Each cleaner is idempotent: cleaning an already clean value is a no-op.

/// First rendered line of the card title.
pub fn clean_title(s: &str) -> String {
    s.lines().next().unwrap_or_default().trim().to_string()
}

/// Multi-line address folded onto one line.
pub fn clean_address(s: &str) -> String {
    s.trim().replace('\n', ", ")
}

/// Keep digits and separators only: "₹ 4,250" → "4,250"
pub fn clean_price(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn clean_plain(s: &str) -> String {
    s.trim().to_string()
}

/// Run a cleaner over raw text, mapping empty results to the sentinel.
pub fn clean_or_sentinel(raw: Option<&str>, clean: fn(&str) -> String) -> String {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => {
            let cleaned = clean(text);
            if cleaned.is_empty() { sentinel() } else { cleaned }
        }
        _ => sentinel(),
    }
}

// ── Price parsing ─────────────────────────────────────────────────────────────

/// Parse a currency-formatted price into its truncated integer base.
/// "₹1,200" → 1200 | "1200.75" → 1200 | "abc" → None
pub fn parse_base_price(s: &str) -> Option<i64> {
    let cleaned = s.replace('₹', "").replace(',', "");
    let value: f64 = cleaned.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.trunc() as i64)
}

/// Digits-only integer: "₹ 12,400" → 12400. Used for hotel prices and filter bounds.
pub fn parse_digits(s: &str) -> Option<u64> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

// ── Price adjustment ──────────────────────────────────────────────────────────

/// "{base} - {base + markup}", or the raw text unchanged when it does not parse.
pub fn adjust_price(raw: &str, markup: i64) -> String {
    match parse_base_price(raw) {
        Some(base) => format!("{} - {}", base, base.saturating_add(markup)),
        None => raw.to_string(),
    }
}

pub fn class_markup(class: &str, pricing: &PricingConfig) -> i64 {
    if class == "SL" {
        pricing.sleeper_class_markup
    } else {
        pricing.other_class_markup
    }
}

/// Split "<class> ₹<amount>" into its class and truncated base amount.
/// "3A ₹1,245" → ("3A", 1245) | "2A ₹ Regret" → None | "WL 12" → None
pub fn parse_class_fare(entry: &str) -> Option<(&str, i64)> {
    let (class, amount) = entry.split_once('₹')?;
    if amount.contains('₹') {
        return None;
    }
    Some((class.trim(), parse_base_price(amount)?))
}

/// One fare entry such as "3A ₹1,245" → "3A 1245 - 1645".
/// Entries that do not parse pass through.
pub fn adjust_class_fare(entry: &str, pricing: &PricingConfig) -> String {
    match parse_class_fare(entry) {
        Some((class, base)) => {
            let max = base.saturating_add(class_markup(class, pricing));
            format!("{} {} - {}", class, base, max)
        }
        None => entry.to_string(),
    }
}

/// All fare entries of one train joined with "; ", or the sentinel when there are none.
pub fn adjust_class_fares(entries: &[String], pricing: &PricingConfig) -> String {
    if entries.is_empty() {
        return sentinel();
    }
    entries
        .iter()
        .map(|e| adjust_class_fare(e, pricing))
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Train helpers ─────────────────────────────────────────────────────────────

/// "10:30 HYB" → ("10:30", "HYB"). Slices by character, not byte.
pub fn split_time_and_station(raw: &str) -> (String, String) {
    let time: String = raw.chars().take(5).collect();
    let station: String = raw.chars().skip(6).collect();
    (time, station.trim().to_string())
}

/// Seven running days collapse to "D" (daily).
pub fn running_days(days: &[String]) -> String {
    match days.len() {
        0 => SENTINEL.to_string(),
        7 => "D".to_string(),
        _ => days.join(", "),
    }
}

// ── Hotel price filter ────────────────────────────────────────────────────────

/// "₹ 500 – ₹ 30,000+" → 500..30000. Both halves must carry digits.
pub fn parse_price_filter(text: &str) -> Option<PriceFilterRange> {
    let (low, high) = text.split_once(['-', '–'])?;
    Some(PriceFilterRange::new(parse_digits(low)?, parse_digits(high)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_bus_price() {
        assert_eq!(adjust_price("₹1,200", 300), "1200 - 1500");
        assert_eq!(adjust_price(" ₹ 899.90 ", 300), "899 - 1199");
        assert_eq!(adjust_price("0", 300), "0 - 300");
    }

    #[test]
    fn test_adjust_price_keeps_raw_on_failure() {
        assert_eq!(adjust_price("abc", 300), "abc");
        assert_eq!(adjust_price("Sold out", 300), "Sold out");
        assert_eq!(adjust_price("inf", 300), "inf");
        assert_eq!(adjust_price("", 300), "");
    }

    #[test]
    fn test_adjust_price_is_monotonic() {
        for raw in ["1", "₹10", "1,000", "99999.99"] {
            let out = adjust_price(raw, 300);
            let (base, max) = out.split_once(" - ").unwrap();
            let (base, max): (i64, i64) = (base.parse().unwrap(), max.parse().unwrap());
            assert!(base >= 0 && max >= base);
        }
    }

    #[test]
    fn test_adjust_class_fares() {
        let pricing = PricingConfig::default();
        let entries = vec![
            "SL ₹455".to_string(),
            "3A ₹1,245".to_string(),
            "2A ₹ Regret".to_string(),
            "WL 12".to_string(),
        ];
        assert_eq!(
            adjust_class_fares(&entries, &pricing),
            "SL 455 - 605; 3A 1245 - 1645; 2A ₹ Regret; WL 12"
        );
        assert_eq!(adjust_class_fares(&[], &pricing), SENTINEL);
    }

    #[test]
    fn test_parse_class_fare() {
        assert_eq!(parse_class_fare("3A ₹1,245"), Some(("3A", 1245)));
        assert_eq!(parse_class_fare("SL ₹ 455.50"), Some(("SL", 455)));
        assert_eq!(parse_class_fare("2A ₹ Regret"), None);
        assert_eq!(parse_class_fare("WL 12"), None);
        assert_eq!(parse_class_fare("1A ₹1 ₹2"), None);
    }

    #[test]
    fn test_cleaners_idempotent() {
        let cases: [(fn(&str) -> String, &str); 4] = [
            (clean_title, "Taj Palace\nOpens in new window"),
            (clean_address, "Colaba\nMumbai"),
            (clean_price, "₹ 12,400.50"),
            (clean_plain, "  Hotel  "),
        ];
        for (clean, raw) in cases {
            let once = clean(raw);
            assert_eq!(clean(&once), once);
        }
        assert_eq!(clean_title("Taj Palace\nOpens in new window"), "Taj Palace");
        assert_eq!(clean_address("Colaba\nMumbai"), "Colaba, Mumbai");
        assert_eq!(clean_price("₹ 12,400.50"), "12,400.50");
    }

    #[test]
    fn test_clean_or_sentinel() {
        assert_eq!(clean_or_sentinel(None, clean_plain), SENTINEL);
        assert_eq!(clean_or_sentinel(Some("   "), clean_plain), SENTINEL);
        assert_eq!(clean_or_sentinel(Some("Price on request"), clean_price), SENTINEL);
        assert_eq!(clean_or_sentinel(Some(" Hostel "), clean_plain), "Hostel");
    }

    #[test]
    fn test_split_time_and_station() {
        assert_eq!(split_time_and_station("06:25 SC"), ("06:25".into(), "SC".into()));
        assert_eq!(split_time_and_station("06:25"), ("06:25".into(), "".into()));
    }

    #[test]
    fn test_running_days() {
        let week: Vec<String> = ["M", "T", "W", "T", "F", "S", "S"].iter().map(|d| d.to_string()).collect();
        assert_eq!(running_days(&week), "D");
        assert_eq!(running_days(&week[..3]), "M, T, W");
        assert_eq!(running_days(&[]), SENTINEL);
    }

    #[test]
    fn test_parse_price_filter() {
        assert_eq!(parse_price_filter("₹ 500 - ₹ 30,000+"), Some(PriceFilterRange::new(500, 30000)));
        assert_eq!(parse_price_filter("₹ 500 – ₹ 30,000+"), Some(PriceFilterRange::new(500, 30000)));
        assert_eq!(parse_price_filter("Your budget"), None);
        assert_eq!(parse_price_filter("- ₹ 100"), None);
    }

    #[test]
    fn test_parse_digits() {
        assert_eq!(parse_digits("₹ 12,400"), Some(12400));
        assert_eq!(parse_digits("abc"), None);
    }
}
