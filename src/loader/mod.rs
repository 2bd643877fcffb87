//! Saved DOM snapshots for offline parsing.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SNAPSHOT_EXTENSIONS: [&str; 2] = ["html", "htm"];

fn is_snapshot(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SNAPSHOT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read one saved page. Invalid UTF-8 is replaced rather than rejected.
pub fn load_snapshot(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read snapshot {:?}", path))?;
    let html = String::from_utf8_lossy(&bytes).into_owned();
    if html.trim().is_empty() {
        bail!("Snapshot {:?} is empty", path);
    }
    debug!("Loaded {} bytes from {:?}", html.len(), path);
    Ok(html)
}

/// `.html`/`.htm` files directly under `dir`, sorted by name.
pub fn discover_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() && is_snapshot(&path) {
            files.push(path);
        }
    }
    files.sort();
    info!("Found {} snapshot(s) in {:?}", files.len(), dir);
    Ok(files)
}

/// `file://` URL recorded as the "visited" page of an offline run.
pub fn snapshot_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("travel_loader_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_discover_only_html() {
        let dir = scratch("discover");
        for name in ["b.html", "a.HTM", "notes.txt", "page.csv"] {
            std::fs::write(dir.join(name), "<html></html>").unwrap();
        }
        let found = discover_snapshots(&dir).unwrap();
        assert_eq!(found, vec![dir.join("a.HTM"), dir.join("b.html")]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = std::env::temp_dir().join("travel_loader_does_not_exist");
        assert!(discover_snapshots(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_load_snapshot() {
        let dir = scratch("load");
        let page = dir.join("page.html");
        std::fs::write(&page, "<div class=\"name\">Konark Exp</div>").unwrap();
        assert!(load_snapshot(&page).unwrap().contains("Konark Exp"));

        let blank = dir.join("blank.html");
        std::fs::write(&blank, "  \n").unwrap();
        assert!(load_snapshot(&blank).is_err());
        assert!(load_snapshot(&dir.join("missing.html")).is_err());

        assert!(snapshot_url(&page).starts_with("file://"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
