//! Resource quantity parsing, formatting, and scaling
//!
//! Kubernetes-style quantity strings: CPU in whole cores or millicores
//! (`500m`), memory with binary suffixes (`512Mi`, `1Gi`). Parsing keeps the
//! original unit so a scaled value re-renders in the notation the manifest
//! used.

use thiserror::Error;

/// Errors produced when parsing a quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity string")]
    Empty,
    #[error("invalid quantity magnitude: {0}")]
    InvalidMagnitude(String),
}

/// Unit suffix carried by a quantity string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Bare number, no suffix
    None,
    /// CPU millicores (`m`)
    Milli,
    /// Kibibytes (`Ki`)
    Kibi,
    /// Mebibytes (`Mi`)
    Mebi,
    /// Gibibytes (`Gi`)
    Gibi,
}

impl Unit {
    fn suffix(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Milli => "m",
            Unit::Kibi => "Ki",
            Unit::Mebi => "Mi",
            Unit::Gibi => "Gi",
        }
    }
}

/// A parsed resource quantity: numeric magnitude plus its original unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Quantity {
    /// Parse a quantity string such as `500m`, `1.5Gi`, or `2`
    ///
    /// Surrounding whitespace is ignored. Without a recognized suffix the
    /// whole string must parse as a bare number.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (number, unit) = if let Some(prefix) = trimmed.strip_suffix("Ki") {
            (prefix, Unit::Kibi)
        } else if let Some(prefix) = trimmed.strip_suffix("Mi") {
            (prefix, Unit::Mebi)
        } else if let Some(prefix) = trimmed.strip_suffix("Gi") {
            (prefix, Unit::Gibi)
        } else if let Some(prefix) = trimmed.strip_suffix('m') {
            (prefix, Unit::Milli)
        } else {
            (trimmed, Unit::None)
        };

        let magnitude: f64 = number
            .trim()
            .parse()
            .map_err(|_| QuantityError::InvalidMagnitude(input.to_string()))?;

        Ok(Self { magnitude, unit })
    }

    /// Render the quantity in its original unit
    ///
    /// The magnitude prints in its shortest decimal form: no trailing zeros,
    /// no trailing decimal point, zero as `0`.
    pub fn format(&self) -> String {
        format!("{}{}", self.magnitude, self.unit.suffix())
    }

    /// Multiply the magnitude by `factor`, preserving the unit
    ///
    /// Millicore values round to the nearest whole millicore and are floored
    /// at 1 so a scaled CPU request can never collapse to zero.
    pub fn scale(&self, factor: f64) -> Self {
        let scaled = self.magnitude * factor;
        let magnitude = match self.unit {
            Unit::Milli => scaled.round().max(1.0),
            _ => scaled,
        };
        Self {
            magnitude,
            unit: self.unit,
        }
    }
}

/// Scale an optional quantity string, rendering the result in the same unit
///
/// Absent, empty, or unparseable input scales to absent so a field that was
/// never configured is never emitted as zero.
pub fn scale_quantity(value: Option<&str>, factor: f64) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    Quantity::parse(raw)
        .ok()
        .map(|quantity| quantity.scale(factor).format())
}

/// Interpret a memory quantity string as mebibytes
///
/// `Gi` multiplies by 1024, `Mi` passes through, `Ki` divides by 1024, and a
/// bare number is taken to already be in mebibytes. CPU-style suffixes and
/// unparseable input yield `None`.
pub fn memory_limit_mebibytes(value: &str) -> Option<f64> {
    let quantity = Quantity::parse(value).ok()?;
    match quantity.unit {
        Unit::Gibi => Some(quantity.magnitude * 1024.0),
        Unit::Mebi => Some(quantity.magnitude),
        Unit::Kibi => Some(quantity.magnitude / 1024.0),
        Unit::None => Some(quantity.magnitude),
        Unit::Milli => None,
    }
}

/// Normalize a fraction-style memory metric to the 0-100 percentage scale
///
/// Metric backends sometimes report memory relative to the configured limit
/// instead of as a percentage. When the limit parses and the observed value
/// is a positive fraction (at most 1), it is rescaled against the limit;
/// anything else is taken to already be a percentage.
pub fn normalize_memory_percent(value: f64, mem_limit: Option<&str>) -> f64 {
    match mem_limit.and_then(memory_limit_mebibytes) {
        Some(limit) if limit != 0.0 && value > 0.0 && value <= 1.0 => value / limit * 100.0,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millicores() {
        let quantity = Quantity::parse("500m").unwrap();
        assert_eq!(quantity.magnitude, 500.0);
        assert_eq!(quantity.unit, Unit::Milli);
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(Quantity::parse("512Mi").unwrap().unit, Unit::Mebi);
        assert_eq!(Quantity::parse("1Gi").unwrap().unit, Unit::Gibi);
        assert_eq!(Quantity::parse("2048Ki").unwrap().unit, Unit::Kibi);
        assert_eq!(Quantity::parse(" 1.5Gi ").unwrap().magnitude, 1.5);
    }

    #[test]
    fn test_parse_bare_number() {
        let quantity = Quantity::parse("2").unwrap();
        assert_eq!(quantity.magnitude, 2.0);
        assert_eq!(quantity.unit, Unit::None);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert_eq!(Quantity::parse(""), Err(QuantityError::Empty));
        assert_eq!(Quantity::parse("   "), Err(QuantityError::Empty));
        assert!(matches!(
            Quantity::parse("abcMi"),
            Err(QuantityError::InvalidMagnitude(_))
        ));
        assert!(matches!(
            Quantity::parse("Mi"),
            Err(QuantityError::InvalidMagnitude(_))
        ));
    }

    #[test]
    fn test_scale_cpu_request() {
        let scaled = Quantity::parse("500m").unwrap().scale(0.8);
        assert_eq!(scaled.format(), "400m");
    }

    #[test]
    fn test_scale_memory_limit() {
        let scaled = Quantity::parse("1Gi").unwrap().scale(1.25);
        assert_eq!(scaled.format(), "1.25Gi");
    }

    #[test]
    fn test_millicores_round_and_floor_at_one() {
        assert_eq!(Quantity::parse("3m").unwrap().scale(0.5).format(), "2m");
        assert_eq!(Quantity::parse("1m").unwrap().scale(0.1).format(), "1m");
    }

    #[test]
    fn test_format_strips_trailing_zeros() {
        assert_eq!(Quantity::parse("400.0m").unwrap().format(), "400m");
        assert_eq!(Quantity::parse("0Mi").unwrap().format(), "0Mi");
        assert_eq!(Quantity::parse("0").unwrap().format(), "0");
    }

    #[test]
    fn test_scaling_idempotent_under_reparse() {
        for (raw, factor) in [("500m", 0.8), ("512Mi", 0.8), ("1Gi", 1.25), ("250m", 1.25)] {
            let scaled = Quantity::parse(raw).unwrap().scale(factor);
            let reparsed = Quantity::parse(&scaled.format()).unwrap();
            assert!((reparsed.magnitude - scaled.magnitude).abs() < 1e-9);
            assert_eq!(reparsed.unit, scaled.unit);
        }
    }

    #[test]
    fn test_scale_quantity_absent_stays_absent() {
        assert_eq!(scale_quantity(None, 0.8), None);
        assert_eq!(scale_quantity(Some(""), 0.8), None);
        assert_eq!(scale_quantity(Some("   "), 0.8), None);
        assert_eq!(scale_quantity(Some("not-a-number"), 0.8), None);
        assert_eq!(scale_quantity(Some("512Mi"), 0.8).as_deref(), Some("409.6Mi"));
    }

    #[test]
    fn test_memory_limit_mebibytes() {
        assert_eq!(memory_limit_mebibytes("1Gi"), Some(1024.0));
        assert_eq!(memory_limit_mebibytes("512Mi"), Some(512.0));
        assert_eq!(memory_limit_mebibytes("2048Ki"), Some(2.0));
        assert_eq!(memory_limit_mebibytes("100"), Some(100.0));
        assert_eq!(memory_limit_mebibytes("500m"), None);
        assert_eq!(memory_limit_mebibytes("junk"), None);
    }

    #[test]
    fn test_normalize_fraction_against_limit() {
        let normalized = normalize_memory_percent(0.95, Some("1Mi"));
        assert!((normalized - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_passes_percentages_through() {
        assert_eq!(normalize_memory_percent(95.0, Some("1Gi")), 95.0);
        assert_eq!(normalize_memory_percent(0.5, None), 0.5);
        assert_eq!(normalize_memory_percent(0.0, Some("1Gi")), 0.0);
        assert_eq!(normalize_memory_percent(42.0, Some("garbage")), 42.0);
    }
}
