//! Reporting for finished rankings.
//!
//! Supports the console table, JSON lines, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::aggregate::{RankedEntry, TimestampRanking};

/// Writes each timestamp's ranking as a console table, in canonical order.
pub fn print_table(out: &mut impl Write, rankings: &[TimestampRanking]) -> Result<()> {
    for ranking in rankings {
        writeln!(
            out,
            "Traffic signals arranged on the basis of urgency | Time: {}",
            ranking.timestamp
        )?;
        writeln!(out, "------Traffic Light-------\t\t-----Number of Cars-----")?;
        for entry in &ranking.entries {
            writeln!(out, "\t{}\t\t\t\t\t{}", entry.signal_id, entry.total_car_count)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonRanking<'a> {
    generated_at: DateTime<Utc>,
    timestamp: &'a str,
    entries: &'a [RankedEntry],
}

/// Writes one JSON object per timestamp, one per line.
pub fn print_json(out: &mut impl Write, rankings: &[TimestampRanking]) -> Result<()> {
    let generated_at = Utc::now();
    for ranking in rankings {
        let line = JsonRanking {
            generated_at,
            timestamp: &ranking.timestamp,
            entries: &ranking.entries,
        };
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    generated_at: DateTime<Utc>,
    timestamp: &'a str,
    rank: usize,
    signal_id: u32,
    total_car_count: u64,
}

/// Appends one CSV row per ranked entry to the file at `path`.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &Path, rankings: &[TimestampRanking]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    let generated_at = Utc::now();
    for ranking in rankings {
        for (i, entry) in ranking.entries.iter().enumerate() {
            writer.serialize(CsvRow {
                generated_at,
                timestamp: &ranking.timestamp,
                rank: i + 1,
                signal_id: entry.signal_id,
                total_car_count: entry.total_car_count,
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}
