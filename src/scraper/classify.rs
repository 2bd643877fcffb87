//! Raw label → canonical category.
//!
//! Every classifier is an ordered rule table evaluated top to bottom; the
//! first matching predicate wins. Categories overlap ("sf exp" also contains
//! "sf"), so the order of each table is part of its meaning.

use crate::models::{ExtractionLog, SENTINEL, is_sentinel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    BusOperator,
    BusType,
    TrainType,
}

pub const GOVERNMENT_BUS: &str = "Government Bus";

struct Rule<T: ?Sized> {
    matches: fn(&T) -> bool,
    category: &'static str,
}

fn first_match<T: ?Sized>(rules: &[Rule<T>], input: &T) -> Option<&'static str> {
    rules.iter().find(|r| (r.matches)(input)).map(|r| r.category)
}

pub fn classify(raw: &str, kind: LabelKind, log: &mut ExtractionLog) -> String {
    match kind {
        LabelKind::BusOperator => classify_bus_operator(raw),
        LabelKind::BusType => classify_bus_type(raw, log),
        LabelKind::TrainType => classify_train_type(raw),
    }
}

// ── Bus operator ──────────────────────────────────────────────────────────────

pub fn classify_bus_operator(raw: &str) -> String {
    if raw.to_lowercase().contains("service number") {
        GOVERNMENT_BUS.to_string()
    } else {
        raw.to_string()
    }
}

// ── Bus type ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct BusTokens {
    normal: bool,
    non_ac: bool,
    seater: bool,
    sleeper: bool,
}

impl BusTokens {
    fn scan(raw: &str) -> Self {
        let s = raw.to_lowercase();
        Self {
            normal: s.contains("normal"),
            non_ac: s.contains("non-ac") || s.contains("a/c") || s.contains("a.c."),
            seater: s.contains("seater"),
            sleeper: s.contains("sleeper"),
        }
    }
}

const BUS_TYPE_RULES: &[Rule<BusTokens>] = &[
    Rule { matches: |t| t.normal, category: "Non-AC Seater" },
    Rule { matches: |t| t.non_ac && t.seater && t.sleeper, category: "Non-AC Seater-Sleeper" },
    Rule { matches: |t| t.non_ac && t.sleeper, category: "Non-AC Sleeper" },
    Rule { matches: |t| t.non_ac && t.seater, category: "Non-AC Seater" },
    Rule { matches: |t| !t.non_ac && t.seater && t.sleeper, category: "AC Seater-Sleeper" },
    Rule { matches: |t| !t.non_ac && t.sleeper, category: "AC Sleeper" },
    Rule { matches: |t| !t.non_ac && t.seater, category: "AC Seater" },
];

/// Unmatched labels pass through unchanged and leave a log entry.
pub fn classify_bus_type(raw: &str, log: &mut ExtractionLog) -> String {
    match first_match(BUS_TYPE_RULES, &BusTokens::scan(raw)) {
        Some(category) => category.to_string(),
        None => {
            log.info(format!(
                "Bus type '{}' did not match a standard category, returning as is.",
                raw
            ));
            raw.to_string()
        }
    }
}

// ── Train type ────────────────────────────────────────────────────────────────

fn has_exp(s: &str) -> bool {
    s.contains("exp") || s.contains("ex")
}

const TRAIN_TYPE_RULES: &[Rule<str>] = &[
    Rule { matches: |s| s.contains("vande bharat") || s.contains("vandebharat"), category: "VandeBharat" },
    Rule { matches: |s| s.contains("sf") && s.contains("spl"), category: "Superfast Special" },
    Rule { matches: |s| s.contains("sf") && has_exp(s), category: "Superfast Express" },
    Rule { matches: |s| s.contains("sf"), category: "Superfast" },
    Rule { matches: |s| s.contains("spl") && has_exp(s), category: "Special Express" },
    Rule { matches: |s| s.contains("spl"), category: "Special" },
    Rule { matches: has_exp, category: "Express" },
];

pub fn classify_train_type(raw: &str) -> String {
    if raw.is_empty() || is_sentinel(raw) {
        return SENTINEL.to_string();
    }
    let normalized = raw.to_lowercase().replace(' ', "");
    first_match(TRAIN_TYPE_RULES, normalized.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
