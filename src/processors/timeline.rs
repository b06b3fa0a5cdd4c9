use crate::error::{ProcessingError, Result};
use crate::utils::filename::{format_timestamp, parse_timestamp};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// Evenly spaced timestamps starting at `start`, `step_seconds` apart.
///
/// Fails when a timestamp would fall outside the representable range.
pub fn date_series(
    start: NaiveDateTime,
    step_seconds: i64,
    count: usize,
) -> Result<Vec<NaiveDateTime>> {
    (0..count)
        .map(|i| {
            i64::try_from(i)
                .ok()
                .and_then(|i| step_seconds.checked_mul(i))
                .and_then(Duration::try_seconds)
                .and_then(|offset| start.checked_add_signed(offset))
                .ok_or_else(|| {
                    ProcessingError::InvalidFormat(format!(
                        "Time step {} of {} s after {} is out of range",
                        i,
                        step_seconds,
                        format_timestamp(&start)
                    ))
                })
        })
        .collect()
}

/// Merge `[first, last]` date ranges of time-stepped grids.
pub fn merge_range(existing: &[String], incoming: &[String]) -> Result<Vec<String>> {
    let mut all = Vec::with_capacity(existing.len() + incoming.len());
    for text in existing.iter().chain(incoming) {
        all.push(parse_timestamp(text)?);
    }

    match (all.iter().min(), all.iter().max()) {
        (Some(first), Some(last)) => Ok(vec![format_timestamp(first), format_timestamp(last)]),
        _ => Ok(Vec::new()),
    }
}

/// Merge per-observation dates and their spans into one sorted series.
///
/// Dates already recorded keep their span; new dates are inserted in order.
pub fn merge_series(
    existing_dates: &[String],
    existing_spans: &[i64],
    incoming_dates: &[String],
    incoming_spans: &[i64],
) -> Result<(Vec<String>, Vec<i64>)> {
    let mut series: BTreeMap<NaiveDateTime, i64> = BTreeMap::new();

    for (i, text) in incoming_dates.iter().enumerate() {
        if let Some(span) = span_at(incoming_spans, i) {
            series.insert(parse_timestamp(text)?, span);
        }
    }
    for (i, text) in existing_dates.iter().enumerate() {
        if let Some(span) = span_at(existing_spans, i) {
            series.insert(parse_timestamp(text)?, span);
        }
    }

    Ok(series
        .into_iter()
        .map(|(date, span)| (format_timestamp(&date), span))
        .unzip())
}

// A single span applies to every date
fn span_at(spans: &[i64], index: usize) -> Option<i64> {
    spans.get(index).or_else(|| spans.last()).copied()
}
