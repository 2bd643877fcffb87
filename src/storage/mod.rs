use crate::models::{BusPartition, HotelRecord, TrainRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Byte-order mark so spreadsheet tools pick up UTF-8 (₹, station names, ...).
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const GOVERNMENT_BUSES: &str = "government_buses.csv";
pub const PRIVATE_BUSES: &str = "private_buses.csv";
pub const TRAINS: &str = "train_details.csv";
pub const HOTELS: &str = "hotel_details.csv";

// ── Store ─────────────────────────────────────────────────────────────────────

/// Output directory holding one CSV per listing table.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create output dir {:?}", dir))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `rows` under `file_name`. Empty tables are skipped, not written.
    pub fn write_table<R: Serialize>(&self, file_name: &str, rows: &[R]) -> Result<Option<PathBuf>> {
        if rows.is_empty() {
            warn!("No rows for {}; file not written.", file_name);
            return Ok(None);
        }

        let path = self.dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut out = BufWriter::new(file);
        out.write_all(UTF8_BOM)
            .with_context(|| format!("Failed to write {:?}", path))?;

        let mut writer = csv::Writer::from_writer(out);
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to serialize row into {:?}", path))?;
        }
        writer.flush().with_context(|| format!("Failed to flush {:?}", path))?;

        info!("{} rows written to {:?}", rows.len(), path);
        Ok(Some(path))
    }

    pub fn save_buses(&self, buses: &BusPartition) -> Result<Vec<PathBuf>> {
        let written = [
            self.write_table(GOVERNMENT_BUSES, &buses.government)?,
            self.write_table(PRIVATE_BUSES, &buses.private)?,
        ];
        Ok(written.into_iter().flatten().collect())
    }

    pub fn save_trains(&self, trains: &[TrainRecord]) -> Result<Vec<PathBuf>> {
        Ok(self.write_table(TRAINS, trains)?.into_iter().collect())
    }

    pub fn save_hotels(&self, hotels: &[HotelRecord]) -> Result<Vec<PathBuf>> {
        Ok(self.write_table(HOTELS, hotels)?.into_iter().collect())
    }
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// Result of one run that can be counted and persisted.
pub trait Tabular {
    fn row_count(&self) -> usize;
    fn save(&self, store: &CsvStore) -> Result<Vec<PathBuf>>;
}

impl Tabular for BusPartition {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn save(&self, store: &CsvStore) -> Result<Vec<PathBuf>> {
        store.save_buses(self)
    }
}

impl Tabular for Vec<TrainRecord> {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn save(&self, store: &CsvStore) -> Result<Vec<PathBuf>> {
        store.save_trains(self)
    }
}

impl Tabular for Vec<HotelRecord> {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn save(&self, store: &CsvStore) -> Result<Vec<PathBuf>> {
        store.save_hotels(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusRecord;

    /// Fresh directory under the system temp dir, removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("travel_scraper_{}_{}", name, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            Self(dir)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn bus(name: &str) -> BusRecord {
        BusRecord {
            name: name.into(),
            bus_type: "AC Sleeper".into(),
            departure: "21:00".into(),
            arrival: "06:00".into(),
            origin: "Hyderabad".into(),
            duration: "9h".into(),
            destination: "Bangalore".into(),
            price: "1200 - 1500".into(),
            route_type: "Bus-Route".into(),
        }
    }

    #[test]
    fn test_bus_tables_have_bom_and_headers() {
        let scratch = ScratchDir::new("bus");
        let store = CsvStore::open(&scratch.0).unwrap();
        let written = store
            .save_buses(&BusPartition { government: vec![], private: vec![bus("Orange Travels")] })
            .unwrap();

        assert_eq!(written, vec![scratch.0.join(PRIVATE_BUSES)]);
        assert!(!scratch.0.join(GOVERNMENT_BUSES).exists());

        let bytes = std::fs::read(&written[0]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(BusRecord::COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("Orange Travels,AC Sleeper,21:00,06:00,Hyderabad,9h,Bangalore,1200 - 1500,Bus-Route")
        );
    }

    #[test]
    fn test_missing_map_link_is_empty_cell() {
        let scratch = ScratchDir::new("hotel");
        let store = CsvStore::open(&scratch.0).unwrap();
        let hotel = HotelRecord {
            name: "Sea View".into(),
            address: "Colaba, Mumbai".into(),
            rating: "3.8".into(),
            price: "4,000".into(),
            property_type: "Hotel".into(),
            map_link: None,
        };
        let written = store.save_hotels(&[hotel]).unwrap();

        let text = std::fs::read_to_string(&written[0]).unwrap();
        let mut lines = text.trim_start_matches('\u{FEFF}').lines();
        assert_eq!(lines.next(), Some(HotelRecord::COLUMNS.join(",").as_str()));
        assert_eq!(lines.next(), Some("Sea View,\"Colaba, Mumbai\",3.8,\"4,000\",Hotel,"));
    }

    #[test]
    fn test_empty_table_is_skipped() {
        let scratch = ScratchDir::new("empty");
        let store = CsvStore::open(&scratch.0).unwrap();
        assert!(store.save_trains(&[]).unwrap().is_empty());
        assert!(!scratch.0.join(TRAINS).exists());
    }
}
