use crate::error::Result;
use crate::models::dataset_config::{Geometry, GridResolution};
use crate::processors::bbox::BoundingBox;
use crate::processors::statistics::SummaryStats;
use crate::processors::timeline::{merge_range, merge_series};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `metadata` collection entry describing one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub units: BTreeMap<String, String>,

    pub gridded: bool,

    #[serde(default, rename = "grid", alias = "gridres", skip_serializing_if = "Option::is_none")]
    pub gridres: Option<GridResolution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bboxmd5: Option<String>,

    #[serde(default)]
    pub dates: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,

    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub header: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<String>,

    #[serde(default)]
    pub var_name: String,

    #[serde(default)]
    pub stats: BTreeMap<String, SummaryStats>,
}

impl DatasetMetadata {
    /// Fold a newly loaded file into the existing entry.
    ///
    /// Step-based timelines keep their first and last date, span-based ones
    /// gain any new dates. The bounding box grows to cover both loads and
    /// the statistics are replaced with `incoming`'s, which were computed
    /// over the whole collection. Everything else stays as first loaded.
    pub fn merge(&self, incoming: &DatasetMetadata) -> Result<DatasetMetadata> {
        let mut merged = self.clone();

        match (&self.steps, &self.spans) {
            (Some(_), _) => {
                merged.dates = merge_range(&self.dates, &incoming.dates)?;
            }
            (None, Some(spans)) => {
                let incoming_spans = incoming.spans.clone().unwrap_or_else(|| spans.clone());
                let (dates, spans) =
                    merge_series(&self.dates, spans, &incoming.dates, &incoming_spans)?;
                merged.dates = dates;
                merged.spans = Some(spans);
            }
            (None, None) => {}
        }

        merged.bbox = match (&self.bbox, &incoming.bbox) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(*b),
        };
        merged.bboxmd5 = merged.bbox.as_ref().map(BoundingBox::md5);
        merged.stats = incoming.stats.clone();

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata(dates: &[&str], spans: Option<Vec<i64>>, steps: Option<Vec<i64>>) -> DatasetMetadata {
        DatasetMetadata {
            id: "xco2".to_string(),
            title: "XCO2".to_string(),
            units: BTreeMap::new(),
            gridded: true,
            gridres: Some(GridResolution::degrees(1.0, 1.0)),
            geometry: None,
            bbox: Some(BoundingBox::new(-166.5, 10.5, -50.5, 69.5)),
            bboxmd5: None,
            dates: dates.iter().map(|d| d.to_string()).collect(),
            steps,
            spans,
            precision: Some(1),
            columns: vec![],
            header: vec![],
            parameters: vec!["values".to_string()],
            var_name: "krigedData".to_string(),
            stats: BTreeMap::new(),
        }
    }

    #[test]
    fn test_merge_spans() -> Result<()> {
        let existing = metadata(&["2009-06-15T00:00:00"], Some(vec![518400]), None);
        let incoming = metadata(&["2009-06-21T00:00:00"], Some(vec![518400]), None);

        let merged = existing.merge(&incoming)?;
        assert_eq!(
            merged.dates,
            vec!["2009-06-15T00:00:00".to_string(), "2009-06-21T00:00:00".to_string()]
        );
        assert_eq!(merged.spans, Some(vec![518400, 518400]));
        assert_eq!(merged.bboxmd5.as_deref(), Some("6f3e33c145010bc74c5ccd3ba772f504"));

        // Loading the same file again adds nothing
        let again = merged.merge(&incoming)?;
        assert_eq!(again.dates.len(), 2);

        Ok(())
    }

    #[test]
    fn test_merge_steps_keeps_range() -> Result<()> {
        let existing = metadata(
            &["2004-06-30T00:00:00", "2004-06-30T21:00:00"],
            None,
            Some(vec![10800]),
        );
        let mut incoming = metadata(
            &["2004-07-01T00:00:00", "2004-07-01T21:00:00"],
            None,
            Some(vec![10800]),
        );
        incoming.bbox = Some(BoundingBox::new(-170.0, 0.0, -60.0, 60.0));

        let merged = existing.merge(&incoming)?;
        assert_eq!(
            merged.dates,
            vec!["2004-06-30T00:00:00".to_string(), "2004-07-01T21:00:00".to_string()]
        );
        assert_eq!(merged.bbox, Some(BoundingBox::new(-170.0, 0.0, -50.5, 69.5)));

        Ok(())
    }
}
