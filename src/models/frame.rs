use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// One time slice of a gridded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayer {
    pub timestamp: NaiveDateTime,

    /// Observation span in seconds, for span-based datasets
    pub span: Option<i64>,

    /// Parameter name to values, in coordinate index order
    pub parameters: BTreeMap<String, Vec<Option<f64>>>,
}

/// Grid cell centroids plus the layers recorded on them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridFrame {
    pub coords: Vec<[f64; 2]>,
    pub layers: Vec<GridLayer>,
}

impl GridFrame {
    pub fn cell_count(&self) -> usize {
        self.coords.len()
    }

    /// Reorder every layer onto `reference` coordinates; cells absent
    /// here become null.
    pub fn align_to(&self, reference: &[[f64; 2]]) -> GridFrame {
        let positions: BTreeMap<(u64, u64), usize> = self
            .coords
            .iter()
            .enumerate()
            .map(|(i, c)| (coord_key(c), i))
            .collect();

        let lookup: Vec<Option<usize>> = reference
            .iter()
            .map(|c| positions.get(&coord_key(c)).copied())
            .collect();

        let layers = self
            .layers
            .iter()
            .map(|layer| GridLayer {
                timestamp: layer.timestamp,
                span: layer.span,
                parameters: layer
                    .parameters
                    .iter()
                    .map(|(name, values)| {
                        let aligned = lookup
                            .iter()
                            .map(|pos| pos.and_then(|p| values.get(p).copied().flatten()))
                            .collect();
                        (name.clone(), aligned)
                    })
                    .collect(),
            })
            .collect();

        GridFrame {
            coords: reference.to_vec(),
            layers,
        }
    }
}

// Exact coordinate match; -0.0 and 0.0 are the same cell
fn coord_key(coord: &[f64; 2]) -> (u64, u64) {
    let normalize = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (normalize(coord[0]).to_bits(), normalize(coord[1]).to_bits())
}

/// A point observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub x: f64,
    pub y: f64,
    pub value: Option<f64>,
    pub error: Option<f64>,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Values of a named parameter (`value` or `error`).
    pub fn parameter(&self, name: &str) -> Vec<Option<f64>> {
        self.features
            .iter()
            .map(|f| match name {
                "value" => f.value,
                "error" => f.error,
                _ => None,
            })
            .collect()
    }
}

/// Extracted contents of a source file, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Gridded(GridFrame),
    Features(FeatureSet),
}

impl Dataset {
    pub fn points(&self) -> Vec<(f64, f64)> {
        match self {
            Dataset::Gridded(frame) => frame.coords.iter().map(|c| (c[0], c[1])).collect(),
            Dataset::Features(set) => set.features.iter().map(|f| (f.x, f.y)).collect(),
        }
    }
}
