//! Listing JSON input: loading, and splitting into chunk files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use tracing::info;

use crate::models::StockRecord;
use crate::storage;

/// Read a listing JSON. A missing or malformed input file is the one error
/// that aborts a whole run.
pub fn load_stock_records(path: &Path) -> Result<Vec<StockRecord>> {
    let file = File::open(path).with_context(|| format!("Input file {path:?} not found"))?;

    let records: Vec<StockRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Input file {path:?} is not a valid stock listing"))?;

    info!("{} companies loaded from {:?}", records.len(), path);
    Ok(records)
}

/// Chunk file name derived from the input stem: US listings keep their
/// prefix so the downstream commands can tell the two apart.
pub fn chunk_file_name(input: &Path, index: usize) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    if stem.to_lowercase().contains("us_stocks") {
        format!("us_stocks_{}.json", index + 1)
    } else {
        format!("stocks_{}.json", index + 1)
    }
}

/// Split a listing into chunk files of at most `chunk_size` companies.
pub fn split_listing(input: &Path, chunk_size: usize, out_dir: &Path) -> Result<Vec<PathBuf>> {
    ensure!(chunk_size > 0, "chunk size must be a positive integer");

    let records = load_stock_records(input)?;
    let total = records.len();
    let files = total.div_ceil(chunk_size);
    info!("{} companies over {} files (up to {} per file)", total, files, chunk_size);

    let mut written = Vec::new();
    for (i, chunk) in records.chunks(chunk_size).enumerate() {
        let path = out_dir.join(chunk_file_name(input, i));
        storage::write_records_json(&path, chunk)?;
        info!(
            "{:?}: {} companies (#{}-#{})",
            path,
            chunk.len(),
            i * chunk_size + 1,
            i * chunk_size + chunk.len()
        );
        written.push(path);
    }

    info!("Split complete: {} files", written.len());
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
