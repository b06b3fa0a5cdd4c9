use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};

/// Named element-wise transforms a config may apply to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTransform {
    Sqrt,
    Square,
    Abs,
    Log10,
    Negate,
}

impl ColumnTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            ColumnTransform::Sqrt => value.sqrt(),
            ColumnTransform::Square => value * value,
            ColumnTransform::Abs => value.abs(),
            ColumnTransform::Log10 => value.log10(),
            ColumnTransform::Negate => -value,
        }
    }
}

/// Round through decimal text, the way `float('%.Nf' % x)` does.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Decimal places of a printf-style float format such as `%.5f`.
pub fn format_decimals(format: &str) -> Result<usize> {
    format
        .strip_prefix("%.")
        .and_then(|rest| rest.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| {
            ProcessingError::Config(format!(
                "Unsupported number format '{}'. Expected '%.Nf'",
                format
            ))
        })
}

/// Value as stored: NaN becomes null, otherwise rounded to `precision`.
pub fn to_stored(value: f64, precision: Option<usize>) -> Option<f64> {
    if value.is_nan() {
        return None;
    }
    Some(match precision {
        Some(decimals) => round_to(value, decimals),
        None => value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.0812, 2), 0.08);
        assert_eq!(round_to(-165.499999, 5), -165.5);
        assert_eq!(round_to(386.7912, 2), 386.79);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_format_decimals() {
        assert_eq!(format_decimals("%.5f").unwrap(), 5);
        assert_eq!(format_decimals("%.0f").unwrap(), 0);
        assert!(format_decimals("%d").is_err());
        assert!(format_decimals("%.xf").is_err());
    }

    #[test]
    fn test_transforms() {
        assert_eq!(ColumnTransform::Sqrt.apply(16.0), 4.0);
        assert_eq!(ColumnTransform::Square.apply(3.0), 9.0);
        assert_eq!(ColumnTransform::Negate.apply(3.0), -3.0);

        let parsed: ColumnTransform = serde_json::from_str("\"sqrt\"").unwrap();
        assert_eq!(parsed, ColumnTransform::Sqrt);
    }

    #[test]
    fn test_to_stored() {
        assert_eq!(to_stored(f64::NAN, Some(2)), None);
        assert_eq!(to_stored(1.234, Some(1)), Some(1.2));
        assert_eq!(to_stored(1.234, None), Some(1.234));
    }
}
