//! DOM snapshot → raw per-field values.
//!
//! Nothing here classifies or prices; values come out cleaned but otherwise
//! as the page rendered them. Absent fields become the sentinel.

use crate::config::{BusSelectors, HotelSelectors, TrainSelectors};
use crate::error::{Result, ScrapeError};
use crate::models::sentinel;
use crate::scraper::cleaner::{
    clean_address, clean_or_sentinel, clean_plain, clean_price, clean_title, running_days,
    split_time_and_station,
};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

pub fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| {
        debug!("selector parse error for {}: {:?}", s, e);
        ScrapeError::InvalidSelector(s.to_string())
    })
}

// ── Text extraction ───────────────────────────────────────────────────────────

/// Rendered text on one line, runs of whitespace collapsed to one space.
pub fn stripped_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text as a browser lays it out: inline markup stays on its line, `<br>`
/// and block-level elements start a new one. Empty lines are dropped.
pub fn inner_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    render_into(el, &mut raw);
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

fn render_into(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            // Source line breaks inside a text node are layout whitespace, not breaks.
            Node::Text(text) => out.push_str(&text.replace(['\n', '\r'], " ")),
            Node::Element(element) => {
                let name = element.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if matches!(name, "script" | "style" | "template") {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                render_into(child_el, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Texts of every match, skipping elements that render empty.
pub fn select_texts<'a>(root: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    root.map(stripped_text).filter(|t| !t.is_empty()).collect()
}

/// One field of one card: cleaned text of the first match, or the sentinel.
pub fn card_field(card: ElementRef<'_>, sel: &Selector, clean: fn(&str) -> String) -> String {
    let raw = card.select(sel).next().map(inner_text);
    clean_or_sentinel(raw.as_deref(), clean)
}

// ── Bus results page ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusFields {
    pub titles: Vec<String>,
    pub bus_types: Vec<String>,
    pub departures: Vec<String>,
    pub arrivals: Vec<String>,
    pub sources: Vec<String>,
    pub durations: Vec<String>,
    pub destinations: Vec<String>,
    pub fares: Vec<String>,
}

pub fn parse_bus_page(html: &str, sels: &BusSelectors) -> Result<BusFields> {
    let doc = Html::parse_document(html);
    let texts = |s: &str| -> Result<Vec<String>> { Ok(select_texts(doc.select(&selector(s)?))) };

    Ok(BusFields {
        titles: texts(&sels.title)?,
        bus_types: texts(&sels.subtitle)?,
        departures: texts(&sels.departure)?,
        arrivals: texts(&sels.arrival)?,
        sources: texts(&sels.source)?,
        durations: texts(&sels.duration)?,
        destinations: texts(&sels.destination)?,
        fares: texts(&sels.fare)?,
    })
}

// ── Train results page ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainFields {
    pub names: Vec<String>,
    pub durations: Vec<String>,
    pub departures: Vec<String>,
    pub arrivals: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    /// Raw "<class> ₹<amount>" entries, one group per train.
    pub fare_groups: Vec<Vec<String>>,
    pub frequencies: Vec<String>,
}

pub fn parse_train_page(html: &str, sels: &TrainSelectors) -> Result<TrainFields> {
    let doc = Html::parse_document(html);
    let span = selector("span")?;
    let entry_sel = selector(&sels.price_entry)?;
    let day_sel = selector(&sels.running_day)?;

    let mut fields = TrainFields {
        names: select_texts(doc.select(&selector(&sels.name)?)),
        durations: select_texts(doc.select(&selector(&sels.duration)?)),
        ..Default::default()
    };

    // Departure sits in the first span, arrival in the second to last.
    for block in doc.select(&selector(&sels.time_block)?) {
        let spans: Vec<ElementRef<'_>> = block.select(&span).collect();
        if spans.len() >= 2 {
            let (dep_time, source) = split_time_and_station(&stripped_text(spans[0]));
            let (arr_time, destination) = split_time_and_station(&stripped_text(spans[spans.len() - 2]));
            fields.departures.push(dep_time);
            fields.sources.push(source);
            fields.arrivals.push(arr_time);
            fields.destinations.push(destination);
        } else {
            fields.departures.push(sentinel());
            fields.sources.push(sentinel());
            fields.arrivals.push(sentinel());
            fields.destinations.push(sentinel());
        }
    }

    for container in doc.select(&selector(&sels.price_container)?) {
        fields.fare_groups.push(select_texts(container.select(&entry_sel)));
    }

    for container in doc.select(&selector(&sels.days_container)?) {
        let days = select_texts(container.select(&day_sel));
        fields.frequencies.push(running_days(&days));
    }

    Ok(fields)
}

// ── Hotel results page ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct HotelCard {
    pub title: String,
    pub address: String,
    pub price: String,
    pub property_type: String,
    /// Star icons on the card; `None` when the card shows no star block.
    pub stars: Option<usize>,
}

pub fn parse_hotel_cards(html: &str, sels: &HotelSelectors) -> Result<Vec<HotelCard>> {
    let doc = Html::parse_document(html);
    let card_sel = selector(&sels.card)?;
    let title = selector(&sels.title)?;
    let address = selector(&sels.address)?;
    let price = selector(&sels.price)?;
    let property_type = selector(&sels.property_type)?;
    let stars = selector(&sels.rating_stars)?;
    let div = selector("div")?;

    let cards = doc
        .select(&card_sel)
        .map(|card| HotelCard {
            title: card_field(card, &title, clean_title),
            address: card_field(card, &address, clean_address),
            price: card_field(card, &price, clean_price),
            property_type: card_field(card, &property_type, clean_plain),
            stars: card.select(&stars).next().map(|s| s.select(&div).count()),
        })
        .collect();

    Ok(cards)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
