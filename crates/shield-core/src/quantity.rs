//! Capacity quantity codec.
//!
//! Parses the size strings the platform reports (claim sizes, memory
//! usage, CPU usage) into canonical integer units and formats them back
//! for display. Byte quantities accept binary (`Ki`, `Mi`, `Gi`, `Ti`)
//! and decimal (`k`/`K`, `M`, `G`, `T`) suffixes; CPU quantities accept
//! `n`, `u`, `m` or no suffix (whole cores).
//!
//! Nothing here has side effects. Callers decide whether a
//! [`QuantityError`] means "reject" (quota checks) or "unknown"
//! (status aggregation).

use thiserror::Error;

/// One kibibyte.
pub const KI: u64 = 1024;
/// One mebibyte.
pub const MI: u64 = KI * 1024;
/// One gibibyte.
pub const GI: u64 = MI * 1024;
/// One tebibyte.
pub const TI: u64 = GI * 1024;

/// A quantity string that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed quantity: {input:?} ({reason})")]
pub struct QuantityError {
    pub input: String,
    pub reason: &'static str,
}

impl QuantityError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

pub type QuantityResult<T> = Result<T, QuantityError>;

// ── Bytes ──────────────────────────────────────────────────────────

const BYTE_SUFFIXES: &[(&str, u64)] = &[
    ("Ki", KI),
    ("Mi", MI),
    ("Gi", GI),
    ("Ti", TI),
    ("k", 1_000),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
];

/// Parse a byte quantity (`"10Gi"`, `"512Mi"`, `"1G"`, `"2048"`) into bytes.
///
/// Fractional mantissas are accepted (`"1.5Gi"`) and rounded up to the
/// next whole byte, matching how the platform rounds requests.
pub fn parse_bytes(s: &str) -> QuantityResult<u64> {
    let trimmed = s.trim();
    let (number, multiplier) = split_suffix(trimmed, BYTE_SUFFIXES)
        .ok_or_else(|| QuantityError::new(s, "unrecognized byte suffix"))?;
    scale(s, number, multiplier, 1)
}

/// Format a byte count using the largest binary suffix that divides it
/// exactly, so that `parse_bytes(&format_bytes(n)) == n`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    for (suffix, unit) in [("Ti", TI), ("Gi", GI), ("Mi", MI), ("Ki", KI)] {
        if bytes % unit == 0 {
            return format!("{}{suffix}", bytes / unit);
        }
    }
    bytes.to_string()
}

/// Bytes expressed in mebibytes, for usage displays.
pub fn to_mebibytes(bytes: u64) -> f64 {
    bytes as f64 / MI as f64
}

// ── CPU ────────────────────────────────────────────────────────────

/// Parse a CPU quantity into millicores.
///
/// `"1500000000n"` → 1500, `"250000u"` → 250, `"500m"` → 500, `"2"` → 2000.
/// Sub-millicore remainders are truncated.
pub fn parse_millicpu(s: &str) -> QuantityResult<u64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::new(s, "empty"));
    }

    if let Some(nanos) = trimmed.strip_suffix('n') {
        return scale(s, nanos, 1, 1_000_000);
    }
    if let Some(micros) = trimmed.strip_suffix('u') {
        return scale(s, micros, 1, 1_000);
    }
    if let Some(millis) = trimmed.strip_suffix('m') {
        return scale(s, millis, 1, 1);
    }
    scale(s, trimmed, 1_000, 1)
}

/// Format millicores, using whole cores when exact (`2000` → `"2"`).
pub fn format_millicpu(millicores: u64) -> String {
    if millicores != 0 && millicores % 1000 == 0 {
        (millicores / 1000).to_string()
    } else {
        format!("{millicores}m")
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn split_suffix<'a>(s: &'a str, table: &[(&str, u64)]) -> Option<(&'a str, u64)> {
    let digits_end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(digits_end);
    if suffix.is_empty() {
        return Some((number, 1));
    }
    table
        .iter()
        .find(|(candidate, _)| *candidate == suffix)
        .map(|(_, multiplier)| (number, *multiplier))
}

/// Compute `number * numerator / denominator` without float error for
/// whole inputs.
fn scale(input: &str, number: &str, numerator: u64, denominator: u64) -> QuantityResult<u64> {
    if number.is_empty() {
        return Err(QuantityError::new(input, "missing number"));
    }

    if !number.contains('.') {
        let whole: u64 = number
            .parse()
            .map_err(|_| QuantityError::new(input, "invalid number"))?;
        let product = whole
            .checked_mul(numerator)
            .ok_or_else(|| QuantityError::new(input, "overflow"))?;
        return Ok(product / denominator);
    }

    let value: f64 = number
        .parse()
        .map_err(|_| QuantityError::new(input, "invalid number"))?;
    let scaled = value * numerator as f64 / denominator as f64;
    if !scaled.is_finite() || scaled >= u64::MAX as f64 {
        return Err(QuantityError::new(input, "overflow"));
    }
    if numerator > denominator {
        Ok(scaled.ceil() as u64)
    } else {
        Ok(scaled as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_suffixes() {
        assert_eq!(parse_bytes("1Ki").unwrap(), 1024);
        assert_eq!(parse_bytes("512Mi").unwrap(), 512 * MI);
        assert_eq!(parse_bytes("50Gi").unwrap(), 50 * GI);
        assert_eq!(parse_bytes("2Ti").unwrap(), 2 * TI);
    }

    #[test]
    fn decimal_suffixes() {
        assert_eq!(parse_bytes("1K").unwrap(), 1_000);
        assert_eq!(parse_bytes("1k").unwrap(), 1_000);
        assert_eq!(parse_bytes("3M").unwrap(), 3_000_000);
        assert_eq!(parse_bytes("5G").unwrap(), 5_000_000_000);
    }

    #[test]
    fn plain_bytes_and_whitespace() {
        assert_eq!(parse_bytes("2048").unwrap(), 2048);
        assert_eq!(parse_bytes(" 10Gi ").unwrap(), 10 * GI);
    }

    #[test]
    fn fractional_mantissa_rounds_up() {
        assert_eq!(parse_bytes("1.5Gi").unwrap(), 3 * GI / 2);
        assert_eq!(parse_bytes("0.5Ki").unwrap(), 512);
    }

    #[test]
    fn every_suffix_survives_format_and_reparse() {
        for suffix in ["Ki", "Mi", "Gi", "Ti", "K", "M", "G"] {
            let input = format!("7{suffix}");
            let bytes = parse_bytes(&input).unwrap();
            assert_eq!(parse_bytes(&format_bytes(bytes)).unwrap(), bytes, "{input}");
        }
    }

    #[test]
    fn format_prefers_largest_exact_unit() {
        assert_eq!(format_bytes(50 * GI), "50Gi");
        assert_eq!(format_bytes(1536 * MI), "1536Mi");
        assert_eq!(format_bytes(1000), "1000");
        assert_eq!(format_bytes(0), "0");
    }

    #[test]
    fn malformed_bytes() {
        assert!(parse_bytes("abc").is_err());
        assert!(parse_bytes("").is_err());
        assert!(parse_bytes("10Xi").is_err());
        assert!(parse_bytes("Gi").is_err());
        assert!(parse_bytes("1.2.3Mi").is_err());
        assert!(parse_bytes("99999999999Ti").is_err());
    }

    #[test]
    fn cpu_suffixes() {
        assert_eq!(parse_millicpu("500m").unwrap(), 500);
        assert_eq!(parse_millicpu("2").unwrap(), 2000);
        assert_eq!(parse_millicpu("1500000000n").unwrap(), 1500);
        assert_eq!(parse_millicpu("250000u").unwrap(), 250);
        assert_eq!(parse_millicpu("0.5").unwrap(), 500);
    }

    #[test]
    fn cpu_sub_millicore_truncates() {
        assert_eq!(parse_millicpu("999999n").unwrap(), 0);
        assert_eq!(parse_millicpu("1999999n").unwrap(), 1);
    }

    #[test]
    fn malformed_cpu() {
        assert!(parse_millicpu("abc").is_err());
        assert!(parse_millicpu("").is_err());
        assert!(parse_millicpu("m").is_err());
        assert!(parse_millicpu("5Gi").is_err());
    }

    #[test]
    fn cpu_formatting() {
        assert_eq!(format_millicpu(2000), "2");
        assert_eq!(format_millicpu(250), "250m");
        assert_eq!(format_millicpu(0), "0m");
        assert_eq!(parse_millicpu(&format_millicpu(1500)).unwrap(), 1500);
    }
}
