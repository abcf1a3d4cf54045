//! CSV tables and the ZIP bundle offered for download.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::model::{BatchResult, ListingRecord, QueryConfig};

pub const COMBINED_ENTRY: &str = "combined_results.csv";
pub const ARCHIVE_NAME: &str = "scraped_results.zip";

// -------------------------
// CSV
// -------------------------

pub fn write_table<W: Write>(rows: &[ListingRecord], out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    if rows.is_empty() {
        w.write_record(["title", "price", "price_raw", "location", "url"])?;
    }
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn table_to_csv(rows: &[ListingRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_table(rows, &mut buf)?;
    Ok(buf)
}

pub fn read_table(data: &[u8]) -> Result<Vec<ListingRecord>> {
    let mut r = csv::Reader::from_reader(data);
    let mut rows = Vec::new();
    for rec in r.deserialize() {
        rows.push(rec.context("malformed result row")?);
    }
    Ok(rows)
}

// -------------------------
// Archive
// -------------------------

/// `{city}_{product}_result.csv` with separators and control characters
/// flattened to `_`.
pub fn entry_name(config: &QueryConfig) -> String {
    let raw = format!("{}_{}_result", config.city(), config.product());
    let clean: String = raw
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{clean}.csv")
}

fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let stem = name.trim_end_matches(".csv");
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}.csv");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// One CSV per config that produced rows, then the combined table.
pub fn package(result: &BatchResult) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut taken = HashSet::from([COMBINED_ENTRY.to_string()]);

    for run in result.runs.iter().filter(|r| !r.rows.is_empty()) {
        let name = unique_name(entry_name(&run.config), &mut taken);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("adding {name}"))?;
        zip.write_all(&table_to_csv(&run.rows)?)?;
    }

    zip.start_file(COMBINED_ENTRY, options)
        .context("adding combined table")?;
    zip.write_all(&table_to_csv(&result.combined)?)?;

    let cursor = zip.finish().context("finishing archive")?;
    Ok(cursor.into_inner())
}

pub fn write_archive(result: &BatchResult, path: &Path) -> Result<()> {
    let bytes = package(result)?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
