use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Bounding box `[minx, miny, maxx, maxy]` of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .fold(None, |acc: Option<Self>, (x, y)| {
                Some(match acc {
                    None => Self::new(x, y, x, y),
                    Some(b) => Self::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
                })
            })
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Tuple text the visualization client hashes, e.g. `(-166.5, 10.5, -50.5, 69.5)`.
    pub fn tuple_repr(&self) -> String {
        format!(
            "({}, {}, {}, {})",
            python_float_repr(self.min_x),
            python_float_repr(self.min_y),
            python_float_repr(self.max_x),
            python_float_repr(self.max_y)
        )
    }

    /// Hex md5 digest of [`Self::tuple_repr`].
    pub fn md5(&self) -> String {
        format!("{:x}", Md5::digest(self.tuple_repr().as_bytes()))
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

/// Shortest round-trip float text in Python's `repr` layout.
pub fn python_float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        // Rust prints `1e-5`, Python prints `1e-05`
        let text = format!("{:e}", value);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        };
    }

    let text = format!("{}", value);
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_and_digest() {
        let points = vec![(-166.5, 61.5), (-50.5, 10.5), (-100.0, 69.5)];
        let bbox = BoundingBox::from_points(points).unwrap();

        assert_eq!(bbox, BoundingBox::new(-166.5, 10.5, -50.5, 69.5));
        assert_eq!(bbox.tuple_repr(), "(-166.5, 10.5, -50.5, 69.5)");
        assert_eq!(bbox.md5(), "6f3e33c145010bc74c5ccd3ba772f504");
    }

    #[test]
    fn test_empty_points() {
        assert!(BoundingBox::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_python_float_repr() {
        assert_eq!(python_float_repr(1.0), "1.0");
        assert_eq!(python_float_repr(-0.5), "-0.5");
        assert_eq!(python_float_repr(0.1), "0.1");
        assert_eq!(python_float_repr(1e-5), "1e-05");
        assert_eq!(python_float_repr(1.5e16), "1.5e+16");
        assert_eq!(python_float_repr(1e15), "1000000000000000.0");
    }

    #[test]
    fn test_serde_as_array() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");

        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bbox);
    }
}
