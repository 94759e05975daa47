//! Compute resource requirements for dependent workloads
//!
//! Users hand the operator CPU and memory requests/limits as plain strings.
//! [`build_resource_requirements`] turns them into a container
//! `ResourceRequirements`, silently leaving out anything empty or malformed so
//! that a typo costs a limit rather than the whole reconcile.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";

/// Reasons a quantity string is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),
    #[error("unknown suffix {suffix:?} in quantity {quantity:?}")]
    InvalidSuffix { quantity: String, suffix: String },
    #[error("scaling {0:?} does not produce a finite value")]
    NotFinite(String),
}

/// Unit suffix of a quantity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suffix {
    /// Power-of-two suffix (`Ki` .. `Ei`); the exponent is in steps of 1024
    Binary(&'static str, u32),
    /// SI suffix (`n` .. `E`, or none); the exponent is base 10
    Decimal(&'static str, i32),
    /// Explicit decimal exponent as written, e.g. `e3` or `E-2`
    Exponent(String),
}

impl Suffix {
    fn as_str(&self) -> &str {
        match self {
            Suffix::Binary(s, _) | Suffix::Decimal(s, _) => *s,
            Suffix::Exponent(s) => s.as_str(),
        }
    }

    /// Multiplier taking a value in this unit to base units.
    pub fn multiplier(&self) -> f64 {
        match self {
            Suffix::Binary(_, power) => 1024f64.powi(*power as i32),
            Suffix::Decimal(_, exp) => 10f64.powi(*exp),
            Suffix::Exponent(s) => s
                .get(1..)
                .and_then(|e| e.parse::<i32>().ok())
                .map_or(1.0, |e| 10f64.powi(e)),
        }
    }
}

const BINARY_SUFFIXES: [(&str, u32); 6] =
    [("Ki", 1), ("Mi", 2), ("Gi", 3), ("Ti", 4), ("Pi", 5), ("Ei", 6)];

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// A quantity split into its number and unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuantity {
    /// The number as written, in units of `suffix`
    pub amount: f64,
    pub suffix: Suffix,
}

impl ParsedQuantity {
    /// Value in base units (bytes, cores, ...).
    pub fn value(&self) -> f64 {
        self.amount * self.suffix.multiplier()
    }
}

/// Parses a Kubernetes resource quantity such as `1500m`, `3000Mi` or `1e3`.
pub fn parse_quantity(input: &str) -> Result<ParsedQuantity, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map_or(s.len(), |(i, _)| i);
    let (number, suffix) = s.split_at(split);

    let digits = number.trim_start_matches(['+', '-']);
    if !digits.chars().any(|c| c.is_ascii_digit()) || digits.matches('.').count() > 1 {
        return Err(QuantityError::InvalidNumber(s.to_string()));
    }
    let amount = number
        .parse::<f64>()
        .map_err(|_| QuantityError::InvalidNumber(s.to_string()))?;

    let suffix = parse_suffix(suffix).ok_or_else(|| QuantityError::InvalidSuffix {
        quantity: s.to_string(),
        suffix: suffix.to_string(),
    })?;

    Ok(ParsedQuantity { amount, suffix })
}

fn parse_suffix(suffix: &str) -> Option<Suffix> {
    if let Some(&(s, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some(Suffix::Binary(s, power));
    }
    if let Some(&(s, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some(Suffix::Decimal(s, exp));
    }
    // "E" alone is exa and was matched above; anything longer is an exponent
    let exponent = suffix.strip_prefix(['e', 'E'])?;
    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        exponent.parse::<i32>().ok()?;
        Some(Suffix::Exponent(suffix.to_string()))
    } else {
        None
    }
}

/// Builds container resource requirements from optional CPU and memory strings.
///
/// Empty or unparsable inputs are left out. Both maps are always present, even
/// when nothing was set.
pub fn build_resource_requirements(
    cpu_request: &str,
    cpu_limit: &str,
    memory_request: &str,
    memory_limit: &str,
) -> ResourceRequirements {
    let mut limits = BTreeMap::new();
    let mut requests = BTreeMap::new();

    insert_quantity(&mut requests, RESOURCE_CPU, cpu_request);
    insert_quantity(&mut limits, RESOURCE_CPU, cpu_limit);
    insert_quantity(&mut requests, RESOURCE_MEMORY, memory_request);
    insert_quantity(&mut limits, RESOURCE_MEMORY, memory_limit);

    ResourceRequirements {
        limits: Some(limits),
        requests: Some(requests),
        ..Default::default()
    }
}

fn insert_quantity(list: &mut BTreeMap<String, Quantity>, resource: &str, raw: &str) {
    if raw.is_empty() {
        return;
    }
    match parse_quantity(raw) {
        Ok(_) => {
            list.insert(resource.to_string(), Quantity(raw.trim().to_string()));
        }
        Err(e) => {
            warn!(resource = %resource, value = %raw, "Ignoring resource quantity: {}", e);
        }
    }
}

/// Scales `quantity` by `factor`, keeping the unit it was written in.
///
/// `2Mi` scaled by 10^9 is `2000000000Mi`, not a re-expression in a larger unit.
pub fn multiply_quantity(quantity: &Quantity, factor: f64) -> Result<Quantity, QuantityError> {
    let parsed = parse_quantity(&quantity.0)?;
    let scaled = parsed.amount * factor;
    if !scaled.is_finite() {
        return Err(QuantityError::NotFinite(quantity.0.clone()));
    }
    Ok(Quantity(format!(
        "{}{}",
        format_amount(scaled),
        parsed.suffix.as_str()
    )))
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        return format!("{}", amount);
    }
    // Drop float noise below nano precision, e.g. 0.30000000000000004
    let rounded = (amount * 1e9).round() / 1e9;
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity(s.to_string())
    }

    #[test]
    fn test_parse_binary_suffix() {
        let parsed = parse_quantity("3000Mi").unwrap();
        assert_eq!(parsed.amount, 3000.0);
        assert_eq!(parsed.suffix, Suffix::Binary("Mi", 2));
        assert_eq!(parsed.value(), 3000.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn test_parse_decimal_suffixes() {
        assert!((parse_quantity("1500m").unwrap().value() - 1.5).abs() < 1e-12);
        assert_eq!(parse_quantity("2k").unwrap().value(), 2000.0);
        assert_eq!(parse_quantity("256000").unwrap().suffix, Suffix::Decimal("", 0));
        assert_eq!(parse_quantity("1E").unwrap().suffix, Suffix::Decimal("E", 18));
    }

    #[test]
    fn test_parse_exponent() {
        let parsed = parse_quantity("12e3").unwrap();
        assert_eq!(parsed.suffix, Suffix::Exponent("e3".to_string()));
        assert_eq!(parsed.value(), 12000.0);
        assert!((parse_quantity("5E-1").unwrap().value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_fractional_and_signed() {
        assert_eq!(parse_quantity("0.5Gi").unwrap().amount, 0.5);
        assert_eq!(parse_quantity("+1").unwrap().amount, 1.0);
        assert_eq!(parse_quantity("-1").unwrap().amount, -1.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_quantity(""), Err(QuantityError::Empty));
        assert!(matches!(
            parse_quantity("invalid"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_quantity("1.2.3"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_quantity("10Mb"),
            Err(QuantityError::InvalidSuffix { .. })
        ));
        assert!(matches!(
            parse_quantity("10K"),
            Err(QuantityError::InvalidSuffix { .. })
        ));
        assert!(matches!(parse_quantity("1e"), Err(QuantityError::InvalidSuffix { .. })));
        assert!(matches!(parse_quantity("."), Err(QuantityError::InvalidNumber(_))));
    }

    #[test]
    fn test_build_all_specified() {
        let reqs = build_resource_requirements("1500m", "1500m", "500Mi", "3000Mi");
        let limits = reqs.limits.unwrap();
        let requests = reqs.requests.unwrap();
        assert_eq!(limits.get(RESOURCE_CPU), Some(&q("1500m")));
        assert_eq!(limits.get(RESOURCE_MEMORY), Some(&q("3000Mi")));
        assert_eq!(requests.get(RESOURCE_CPU), Some(&q("1500m")));
        assert_eq!(requests.get(RESOURCE_MEMORY), Some(&q("500Mi")));
    }

    #[test]
    fn test_build_drops_empty_cpu_limit() {
        let reqs = build_resource_requirements("1500m", "", "500Mi", "3000Mi");
        let limits = reqs.limits.unwrap();
        let requests = reqs.requests.unwrap();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits.get(RESOURCE_MEMORY), Some(&q("3000Mi")));
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_build_drops_invalid_value() {
        let reqs = build_resource_requirements("1500m", "invalid", "500Mi", "3000Mi");
        assert!(!reqs.limits.unwrap().contains_key(RESOURCE_CPU));
    }

    #[test]
    fn test_build_empty_maps_are_present() {
        let reqs = build_resource_requirements("", "", "invalid", "");
        assert_eq!(reqs.limits, Some(BTreeMap::new()));
        assert_eq!(reqs.requests, Some(BTreeMap::new()));
    }

    #[test]
    fn test_multiply_preserves_suffix() {
        assert_eq!(multiply_quantity(&q("1000Mi"), 2.0).unwrap(), q("2000Mi"));
        assert_eq!(multiply_quantity(&q("100Gi"), 2.0).unwrap(), q("200Gi"));
        assert_eq!(multiply_quantity(&q("256000"), 2.0).unwrap(), q("512000"));
        assert_eq!(multiply_quantity(&q("2000Mi"), 0.5).unwrap(), q("1000Mi"));
        assert_eq!(
            multiply_quantity(&q("1000000000Gi"), 2.0).unwrap(),
            q("2000000000Gi")
        );
        assert_eq!(
            multiply_quantity(&q("2Mi"), 1_000_000_000.0).unwrap(),
            q("2000000000Mi")
        );
    }

    #[test]
    fn test_multiply_fractional_result() {
        assert_eq!(multiply_quantity(&q("3Gi"), 0.5).unwrap(), q("1.5Gi"));
        assert_eq!(multiply_quantity(&q("100m"), 3.0).unwrap(), q("300m"));
    }

    #[test]
    fn test_multiply_invalid_input() {
        assert!(multiply_quantity(&q("lots"), 2.0).is_err());
        assert!(matches!(
            multiply_quantity(&q("1Mi"), f64::INFINITY),
            Err(QuantityError::NotFinite(_))
        ));
    }
}
