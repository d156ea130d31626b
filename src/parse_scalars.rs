//! Scalar conversions following XML Schema lexical rules.
//!
//! Surrounding whitespace is ignored for every type except strings and
//! characters. Integers are decimal only; floating point accepts `INF`, `-INF`
//! and `NaN` in addition to Rust's usual notation.

use crate::value::Value;

/// Parse an XML Schema boolean: `true`, `false`, `1` or `0`.
///
/// Returns:
/// - Ok(true/false) on success
/// - Err(...) with a description if the text is not a boolean literal
pub(crate) fn parse_xml_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("invalid boolean: `{s}`")),
    }
}

fn parse_decimal_signed_i128(digits: &str, neg: bool) -> Option<i128> {
    let mut val: i128 = 0;
    let mut saw = false;
    for b in digits.as_bytes() {
        match *b {
            b'0'..=b'9' => {
                let d = (b - b'0') as i128;
                val = val.checked_mul(10)?;
                // Accumulate negative values directly so MIN fits.
                val = if neg {
                    val.checked_sub(d)?
                } else {
                    val.checked_add(d)?
                };
                saw = true;
            }
            _ => return None,
        }
    }
    saw.then_some(val)
}

/// Parse a decimal integer with an optional sign into `T`.
pub(crate) fn parse_int_signed<T>(s: &str, ty: &'static str) -> Result<T, String>
where
    T: TryFrom<i128>,
{
    let t = s.trim();
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let value = parse_decimal_signed_i128(digits, neg).ok_or_else(|| format!("invalid {ty}: `{s}`"))?;
    T::try_from(value).map_err(|_| format!("{ty} out of range: `{s}`"))
}

fn parse_special_float(t: &str) -> Option<f64> {
    match t {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => None,
    }
}

/// Rust accepts spellings XML does not (`inf`, `infinity`, `nan`).
fn is_numeric_literal(t: &str) -> bool {
    !t.is_empty()
        && t
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

pub(crate) fn parse_f64(s: &str) -> Result<f64, String> {
    let t = s.trim();
    if let Some(special) = parse_special_float(t) {
        return Ok(special);
    }
    if !is_numeric_literal(t) {
        return Err(format!("invalid double: `{s}`"));
    }
    t.parse::<f64>().map_err(|_| format!("invalid double: `{s}`"))
}

pub(crate) fn parse_f32(s: &str) -> Result<f32, String> {
    let t = s.trim();
    if let Some(special) = parse_special_float(t) {
        return Ok(special as f32);
    }
    if !is_numeric_literal(t) {
        return Err(format!("invalid single: `{s}`"));
    }
    let value = t.parse::<f32>().map_err(|_| format!("invalid single: `{s}`"))?;
    if value.is_infinite() {
        return Err(format!("single out of range: `{s}`"));
    }
    Ok(value)
}

/// Parse exactly one character. Surrounding whitespace is significant.
pub(crate) fn parse_char(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, found `{s}`")),
    }
}

/// Guess the value of untyped scalar text.
///
/// Integers become `Int` (or `Long` when they do not fit), decimal literals
/// `Double`, `true`/`false` booleans. Anything else, including `1`/`0` spelled
/// as booleans elsewhere, stays text.
pub(crate) fn infer_scalar(s: &str) -> Value {
    let t = s.trim();
    if let Ok(i) = parse_int_signed::<i32>(t, "int32") {
        return Value::Int(i);
    }
    if let Ok(l) = parse_int_signed::<i64>(t, "int64") {
        return Value::Long(l);
    }
    match t {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if t.contains(['.', 'e', 'E']) {
        if let Ok(d) = parse_f64(t) {
            return Value::Double(d);
        }
    }
    Value::String(s.to_owned())
}
