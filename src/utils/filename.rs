use crate::error::{ProcessingError, Result};
use crate::utils::constants::{ISO_8601, SIDECAR_EXTENSION};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Default sidecar config location: the data file with a `.json` extension.
pub fn default_sidecar_path(data_path: &Path) -> PathBuf {
    data_path.with_extension(SIDECAR_EXTENSION)
}

/// Mine a timestamp from a file name with a named `timestamp` capture group.
///
/// `format` is the strftime layout of the captured text (e.g. `%Y%m%d`).
/// Returns `Ok(None)` when the file name does not match.
pub fn timestamp_from_filename(
    path: &Path,
    pattern: &str,
    format: &str,
) -> Result<Option<NaiveDateTime>> {
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| ProcessingError::InvalidFormat("Invalid file path".to_string()))?;

    let regex = Regex::new(pattern)?;
    let Some(captured) = regex
        .captures(filename)
        .and_then(|c| c.name("timestamp"))
        .map(|m| m.as_str().to_string())
    else {
        return Ok(None);
    };

    parse_with_format(&captured, format).map(Some)
}

fn parse_with_format(text: &str, format: &str) -> Result<NaiveDateTime> {
    // Date-only layouts do not parse as a NaiveDateTime
    match NaiveDateTime::parse_from_str(text, format) {
        Ok(dt) => Ok(dt),
        Err(_) => {
            let date = NaiveDate::parse_from_str(text, format)?;
            date.and_hms_opt(0, 0, 0).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Invalid date: '{}'", text))
            })
        }
    }
}

/// Parse the timestamp forms accepted in configs and on the command line.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for layout in [ISO_8601, "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(dt);
        }
    }

    for layout in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, layout) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(ProcessingError::InvalidFormat(format!(
        "Invalid timestamp: '{}'. Expected an ISO 8601 timestamp",
        text
    )))
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(ISO_8601).to_string()
}
