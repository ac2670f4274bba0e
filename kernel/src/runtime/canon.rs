//! Canonical JSON encoding.
//!
//! Plan ids, chunk ids, journal records, and outbound responses are all
//! produced by [`canonical_json_bytes`]; nothing else serializes for hashing.
//!
//! # Rules
//!
//! 1. Object keys in byte order.
//! 2. Compact: `{"a":1,"b":2}`.
//! 3. String escaping follows RFC 8259 §7 with lowercase `\u00XX` for
//!    other control characters.
//! 4. Integers (`i64`/`u64`) are written verbatim.
//! 5. Floats are rounded half-away-from-zero to the configured number of
//!    decimal places and written in minimal fixed-point form: no exponent,
//!    trailing fractional zeros trimmed, `-0` written as `0`. The rounded
//!    value is computed as an exact integer of `10^-precision` units, so the
//!    text never depends on platform float formatting.
//! 6. Non-finite floats are rejected before serialization
//!    ([`CanonicalForm::ensure_finite`]); they are never rounded or mapped
//!    to `null`.
//! 7. `null`, `true`, `false` are written literally.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

/// `10^n` for every supported precision.
const POW10: [u64; 13] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
];

/// Largest magnitude of a scaled float that is still an exact integer in `f64`.
const MAX_EXACT_SCALED: f64 = 9_007_199_254_740_992.0;

/// Error type for canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A float field was NaN or infinite.
    #[error("non-finite float in field `{field}`: {raw}")]
    NonFinite { field: String, raw: String },
    /// A float was too large to round exactly at the configured precision.
    #[error("float {raw} cannot be represented exactly at precision {precision}")]
    OutOfRange { raw: String, precision: u32 },
    /// The configured precision is unsupported.
    #[error("float precision {precision} exceeds maximum {max}")]
    PrecisionOutOfRange { precision: u32, max: u32 },
    /// `serde_json` failed to build the intermediate value.
    #[error("serialization failed: {detail}")]
    Serialize { detail: String },
}

/// A contract value that can be canonicalized.
///
/// `serde_json` maps NaN and infinity to `null` during serialization, so
/// every implementor checks its own floats first.
pub trait CanonicalForm: Serialize {
    /// # Errors
    ///
    /// Returns [`EncodingError::NonFinite`] naming the first offending field.
    fn ensure_finite(&self) -> Result<(), EncodingError>;
}

impl<T: CanonicalForm> CanonicalForm for [T] {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        self.iter().try_for_each(CanonicalForm::ensure_finite)
    }
}

impl<T: CanonicalForm> CanonicalForm for Vec<T> {
    fn ensure_finite(&self) -> Result<(), EncodingError> {
        self.as_slice().ensure_finite()
    }
}

/// Check a single float field.
///
/// # Errors
///
/// Returns [`EncodingError::NonFinite`] if `value` is NaN or infinite.
pub fn ensure_finite(field: &str, value: f64) -> Result<(), EncodingError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EncodingError::NonFinite {
            field: field.to_string(),
            raw: value.to_string(),
        })
    }
}

/// Check every float in a slice.
///
/// # Errors
///
/// Returns [`EncodingError::NonFinite`] for the first non-finite element,
/// with the element index appended to `field`.
pub fn ensure_all_finite(field: &str, values: &[f64]) -> Result<(), EncodingError> {
    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(EncodingError::NonFinite {
                field: format!("{field}[{i}]"),
                raw: v.to_string(),
            });
        }
    }
    Ok(())
}

/// Convert a contract value to its JSON intermediate form after the finite check.
///
/// # Errors
///
/// Returns [`EncodingError`] if a float is non-finite or serde fails.
pub fn to_canonical_value<T: CanonicalForm + ?Sized>(value: &T) -> Result<Value, EncodingError> {
    value.ensure_finite()?;
    serde_json::to_value(value).map_err(|e| EncodingError::Serialize {
        detail: e.to_string(),
    })
}

/// Canonical bytes of a contract value.
///
/// # Errors
///
/// Returns [`EncodingError`] if a float is non-finite or out of range.
pub fn canonicalize<T: CanonicalForm + ?Sized>(
    value: &T,
    precision: u32,
) -> Result<Vec<u8>, EncodingError> {
    let v = to_canonical_value(value)?;
    canonical_json_bytes(&v, precision)
}

/// Canonical bytes for an already-built JSON value.
///
/// # Errors
///
/// Returns [`EncodingError::OutOfRange`] if a float cannot be rounded exactly,
/// or [`EncodingError::PrecisionOutOfRange`] for an unsupported precision.
pub fn canonical_json_bytes(value: &Value, precision: u32) -> Result<Vec<u8>, EncodingError> {
    check_precision(precision)?;
    let mut buf = Vec::new();
    write_value(&mut buf, value, precision)?;
    Ok(buf)
}

/// Round a float to `precision` decimal places using the canonical rule.
///
/// `round_to_precision(x, p)` is the value whose canonical text equals the
/// canonical text of `x`.
///
/// # Errors
///
/// Returns [`EncodingError`] if `value` is non-finite or out of range.
pub fn round_to_precision(value: f64, precision: u32) -> Result<f64, EncodingError> {
    let scaled = scaled_integer(value, precision)?;
    // Both operands are exact in f64; the division is correctly rounded.
    #[allow(clippy::cast_precision_loss)]
    let rounded = scaled as f64 / pow10(precision)?;
    Ok(if rounded == 0.0 { 0.0 } else { rounded })
}

fn check_precision(precision: u32) -> Result<(), EncodingError> {
    pow10(precision).map(|_| ())
}

#[allow(clippy::cast_precision_loss)]
fn pow10(precision: u32) -> Result<f64, EncodingError> {
    POW10
        .get(precision as usize)
        .map(|p| *p as f64)
        .ok_or(EncodingError::PrecisionOutOfRange {
            precision,
            max: u32::try_from(POW10.len() - 1).unwrap_or(u32::MAX),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn scaled_integer(value: f64, precision: u32) -> Result<i64, EncodingError> {
    ensure_finite("value", value)?;
    let scaled = (value * pow10(precision)?).round();
    if scaled.abs() > MAX_EXACT_SCALED {
        return Err(EncodingError::OutOfRange {
            raw: value.to_string(),
            precision,
        });
    }
    // In range of exactly representable integers, so the cast is exact.
    Ok(scaled as i64)
}

fn write_value(buf: &mut Vec<u8>, value: &Value, precision: u32) -> Result<(), EncodingError> {
    match value {
        Value::Null => {
            buf.extend_from_slice(b"null");
        }
        Value::Bool(b) => {
            if *b {
                buf.extend_from_slice(b"true");
            } else {
                buf.extend_from_slice(b"false");
            }
        }
        Value::Number(n) => {
            write_number(buf, n, precision)?;
        }
        Value::String(s) => {
            write_string(buf, s);
        }
        Value::Array(arr) => {
            buf.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(buf, item, precision)?;
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_string(buf, key);
                buf.push(b':');
                write_value(buf, &map[*key], precision)?;
            }
            buf.push(b'}');
        }
    }
    Ok(())
}

fn write_number(
    buf: &mut Vec<u8>,
    n: &serde_json::Number,
    precision: u32,
) -> Result<(), EncodingError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(buf, "{i}");
        Ok(())
    } else if let Some(u) = n.as_u64() {
        let _ = write!(buf, "{u}");
        Ok(())
    } else if let Some(f) = n.as_f64() {
        write_float(buf, f, precision)
    } else {
        Err(EncodingError::Serialize {
            detail: format!("unrepresentable number: {n}"),
        })
    }
}

fn write_float(buf: &mut Vec<u8>, value: f64, precision: u32) -> Result<(), EncodingError> {
    let scaled = scaled_integer(value, precision)?;
    if scaled == 0 {
        buf.push(b'0');
        return Ok(());
    }
    let unit = POW10[precision as usize];
    let magnitude = scaled.unsigned_abs();
    let whole = magnitude / unit;
    let frac = magnitude % unit;

    if scaled < 0 {
        buf.push(b'-');
    }
    let _ = write!(buf, "{whole}");
    if frac != 0 {
        let digits = format!("{frac:0width$}", width = precision as usize);
        buf.push(b'.');
        buf.extend_from_slice(digits.trim_end_matches('0').as_bytes());
    }
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            // Remaining C0 controls.
            c if c < '\u{0020}' => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => {
                let mut utf8_buf = [0u8; 4];
                let encoded = c.encode_utf8(&mut utf8_buf);
                buf.extend_from_slice(encoded.as_bytes());
            }
        }
    }
    buf.push(b'"');
}
