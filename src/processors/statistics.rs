use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics of one parameter, as stored in metadata `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (n - 1); absent for fewer than two values
    pub std: Option<f64>,
    pub median: f64,
}

impl SummaryStats {
    /// Statistics over the non-null, non-NaN values; `None` if there are none.
    pub fn from_values<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Option<f64>>,
    {
        let mut present: Vec<f64> = values
            .into_iter()
            .filter_map(|v| *v)
            .filter(|v| !v.is_nan())
            .collect();

        if present.is_empty() {
            return None;
        }

        present.sort_by(|a, b| a.total_cmp(b));

        let n = present.len();
        let sum: f64 = present.iter().sum();
        let mean = sum / n as f64;

        let std = if n > 1 {
            let squares: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            Some((squares / (n - 1) as f64).sqrt())
        } else {
            None
        };

        let median = if n % 2 == 0 {
            (present[n / 2 - 1] + present[n / 2]) / 2.0
        } else {
            present[n / 2]
        };

        Some(Self {
            mean,
            min: present[0],
            max: present[n - 1],
            std,
            median,
        })
    }
}

/// Accumulates parameter values across records before summarizing.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    values: BTreeMap<String, Vec<Option<f64>>>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, parameter: &str, values: impl IntoIterator<Item = Option<f64>>) {
        self.values
            .entry(parameter.to_string())
            .or_default()
            .extend(values);
    }

    pub fn push(&mut self, parameter: &str, value: Option<f64>) {
        self.extend(parameter, std::iter::once(value));
    }

    /// Parameters without any usable value are left out.
    pub fn summarize(&self) -> BTreeMap<String, SummaryStats> {
        self.values
            .iter()
            .filter_map(|(name, values)| {
                SummaryStats::from_values(values).map(|stats| (name.clone(), stats))
            })
            .collect()
    }
}
