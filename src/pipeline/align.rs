//! Parallel per-field lists → fixed-width rows.
//!
//! Each field of a results page is extracted as its own list, and the lists
//! do not always agree in length. The policy decides how a mismatch resolves:
//! bus pages truncate to the shortest non-empty list, train pages pad to the
//! longest because some of their fields come from coarser DOM groupings that
//! under-count.

use crate::models::{ExtractionLog, sentinel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignPolicy {
    TruncateToMin,
    PadToMax,
}

/// One named field list.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub values: Vec<String>,
}

impl Column {
    pub fn new(name: &'static str, values: Vec<String>) -> Self {
        Self { name, values }
    }
}

/// `N` aligned fields plus the caller's route-type tag as the last column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow<const N: usize> {
    pub fields: [String; N],
    pub route_type: String,
}

/// "Titles=3, Fares=2, ..." for the extraction log.
pub fn describe_counts(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| format!("{}={}", c.name, c.values.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn align<const N: usize>(
    columns: [Column; N],
    policy: AlignPolicy,
    route_type: &str,
    log: &mut ExtractionLog,
) -> Vec<AlignedRow<N>> {
    log.info(format!("Extracted counts: {}", describe_counts(&columns)));

    let non_empty = columns.iter().filter(|c| !c.values.is_empty()).map(|c| c.values.len());
    let target = match policy {
        AlignPolicy::TruncateToMin => non_empty.min(),
        AlignPolicy::PadToMax => non_empty.max(),
    };

    let rows = match target {
        None => {
            log.warn("All data fields returned empty.");
            return Vec::new();
        }
        Some(0) => {
            log.warn("Alignment length is 0 while some fields have data; no rows formed.");
            return Vec::new();
        }
        Some(n) => n,
    };

    // Shorter lists (always the empty ones under truncation) fill with the sentinel.
    let mut iters = columns.map(|c| {
        let mut values = c.values;
        values.resize_with(rows, sentinel);
        values.into_iter()
    });

    (0..rows)
        .map(|_| AlignedRow {
            fields: std::array::from_fn(|i| iters[i].next().unwrap_or_else(sentinel)),
            route_type: route_type.to_string(),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SENTINEL;

    fn col(name: &'static str, values: &[&str]) -> Column {
        Column::new(name, values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_truncate_to_shortest_non_empty() {
        let mut log = ExtractionLog::new();
        let rows = align(
            [col("A", &["a1", "a2", "a3"]), col("B", &["b1", "b2"]), col("C", &[])],
            AlignPolicy::TruncateToMin,
            "Bus-Route",
            &mut log,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields, ["a1", "b1", SENTINEL]);
        assert_eq!(rows[1].fields, ["a2", "b2", SENTINEL]);
        assert!(rows.iter().all(|r| r.route_type == "Bus-Route"));
        assert!(log.contains("A=3, B=2, C=0"));
    }

    #[test]
    fn test_pad_to_longest() {
        let mut log = ExtractionLog::new();
        let rows = align(
            [col("A", &["a1", "a2", "a3"]), col("B", &["b1"]), col("C", &[])],
            AlignPolicy::PadToMax,
            "Train-Enroute",
            &mut log,
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields, ["a1", "b1", SENTINEL]);
        assert_eq!(rows[2].fields, ["a3", SENTINEL, SENTINEL]);
        assert!(rows.iter().all(|r| r.fields.iter().all(|f| !f.is_empty())));
    }

    #[test]
    fn test_all_empty_yields_no_rows() {
        for policy in [AlignPolicy::TruncateToMin, AlignPolicy::PadToMax] {
            let mut log = ExtractionLog::new();
            let rows = align([col("A", &[]), col("B", &[])], policy, "Bus-Route", &mut log);
            assert!(rows.is_empty());
            assert!(log.contains("All data fields returned empty"));
        }
    }

    #[test]
    fn test_row_count_bounds() {
        let lists: [&[&str]; 4] = [&["1"], &["1", "2", "3", "4"], &["1", "2"], &[]];
        let build = || lists.map(|l| col("X", l));

        let truncated = align(build(), AlignPolicy::TruncateToMin, "t", &mut ExtractionLog::new());
        assert_eq!(truncated.len(), 1);

        let padded = align(build(), AlignPolicy::PadToMax, "t", &mut ExtractionLog::new());
        assert_eq!(padded.len(), 4);
        assert!(padded.iter().all(|r| r.fields.len() == 4));
    }
}
