//! Record-source ingestion.
//!
//! Reads `signal_id,timestamp,car_count` rows after a single header line and
//! partitions them into [`TimestampGroups`]. Any bad row aborts the whole
//! read: downstream totals are only correct if no reading is dropped.

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::RankError;
use crate::readings::{Reading, TimestampGroups};

const FIELD_COUNT: usize = 3;

/// Reads and groups every reading in the source at `path`.
///
/// Paths ending in `.gz` are decompressed on the fly. The file is closed
/// before this returns.
///
/// # Errors
///
/// [`RankError::SourceUnavailable`] if the file cannot be opened or read,
/// [`RankError::MalformedRecord`] for the first row that fails to parse.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn read_source(path: &Path, signal_count: u32) -> Result<TimestampGroups, RankError> {
    let unavailable = |source: io::Error| RankError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unavailable)?;
    let gzipped = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(gzipped, "Record source opened");

    let input: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let readings = read_readings(input, signal_count).map_err(|e| match e {
        ReadFailure::Io(source) => unavailable(source),
        ReadFailure::Record(err) => err,
    })?;

    let groups = TimestampGroups::from_readings(readings);
    info!(
        groups = groups.len(),
        readings = groups.reading_count(),
        "Record source ingested"
    );
    Ok(groups)
}

enum ReadFailure {
    Io(io::Error),
    Record(RankError),
}

fn read_readings(input: impl Read, signal_count: u32) -> Result<Vec<Reading>, ReadFailure> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(input);

    let mut readings = Vec::new();
    let mut record = StringRecord::new();

    loop {
        match rdr.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                let reading = parse_record(&record, line, signal_count).map_err(ReadFailure::Record)?;
                readings.push(reading);
            }
            Err(e) => return Err(classify(e)),
        }
    }

    Ok(readings)
}

fn classify(err: csv::Error) -> ReadFailure {
    let line = err.position().map(|p| p.line()).unwrap_or_default();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => ReadFailure::Io(source),
        other => ReadFailure::Record(RankError::MalformedRecord {
            line,
            reason: format!("{other:?}"),
        }),
    }
}

fn parse_record(record: &StringRecord, line: u64, signal_count: u32) -> Result<Reading, RankError> {
    let fields: Vec<&str> = record.iter().collect();
    parse_fields(&fields, line, signal_count)
}

/// Validates one `signal_id,timestamp,car_count` row. `line` only labels
/// errors.
fn parse_fields(fields: &[&str], line: u64, signal_count: u32) -> Result<Reading, RankError> {
    let malformed = |reason: String| RankError::MalformedRecord { line, reason };

    if fields.len() != FIELD_COUNT {
        return Err(malformed(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let signal_id: u32 = fields[0]
        .parse()
        .map_err(|_| malformed(format!("signal_id '{}' is not a non-negative integer", fields[0])))?;
    if signal_id == 0 || signal_id > signal_count {
        return Err(malformed(format!(
            "signal_id {signal_id} is outside 1..={signal_count}"
        )));
    }

    let timestamp = fields[1];
    if timestamp.is_empty() {
        return Err(malformed("timestamp is empty".into()));
    }

    let car_count: u64 = fields[2]
        .parse()
        .map_err(|_| malformed(format!("car_count '{}' is not a non-negative integer", fields[2])))?;

    Ok(Reading {
        signal_id,
        car_count,
        timestamp: timestamp.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_read_source_groups_by_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = write_source(
            &dir,
            "traffic.csv",
            "light_id,time_stamp,car_count\n1,T1,10\n2,T1,25\n1,T2,5\n",
        );

        let groups = read_source(&path, 4).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.reading_count(), 3);
        let order: Vec<_> = groups.timestamps().collect();
        assert_eq!(order, vec!["T1", "T2"]);
    }

    #[test]
    fn test_read_source_trims_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n 3 , 08:00 , 7 \n\n4,08:00,1\n");

        let groups = read_source(&path, 4).unwrap();
        let group = groups.iter().next().unwrap();

        assert_eq!(group.timestamp, "08:00");
        assert_eq!(group.readings[0].signal_id, 3);
        assert_eq!(group.readings[0].car_count, 7);
        assert_eq!(groups.reading_count(), 2);
    }

    #[test]
    fn test_header_only_source_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n");

        let groups = read_source(&path, 4).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let result = read_source(&dir.path().join("absent.csv"), 4);

        assert!(matches!(result, Err(RankError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_non_numeric_signal_id_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n1,T1,4\nabc,T1,10\n");

        match read_source(&path, 4) {
            Err(RankError::MalformedRecord { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("abc"));
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n1,T1\n");

        assert!(matches!(
            read_source(&path, 4),
            Err(RankError::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_signal_outside_known_range_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n5,T1,1\n");

        assert!(matches!(
            read_source(&path, 4),
            Err(RankError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_gzip_source_is_decompressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"id,ts,count\n2,T9,11\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let groups = read_source(&path, 4).unwrap();
        let group = groups.iter().next().unwrap();
        assert_eq!(group.timestamp, "T9");
        assert_eq!(group.readings[0].car_count, 11);
    }

    #[test]
    fn test_quotes_are_not_field_delimiters() {
        let dir = TempDir::new().unwrap();
        let path = write_source(&dir, "traffic.csv", "id,ts,count\n1,\"T1,x\",5\n");

        match read_source(&path, 4) {
            Err(RankError::MalformedRecord { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("found 4"));
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_count_is_malformed() {
        let result = parse_fields(&["1", "T1", "-3"], 9, 4);
        assert!(matches!(
            result,
            Err(RankError::MalformedRecord { line: 9, .. })
        ));
    }

    #[test]
    fn test_zero_cars_is_a_valid_reading() {
        let reading = parse_fields(&["2", "T1", "0"], 1, 4).unwrap();
        assert_eq!(reading.car_count, 0);
        assert_eq!(reading.signal_id, 2);
    }
}
